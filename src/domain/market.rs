//! Market descriptors, positions and the read models returned by queries.

use super::{Address, Decimal, TokenInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable lending market descriptor, created once from factory reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    pub amm: Address,
    pub controller: Address,
    pub monetary_policy: Address,
    pub vault: Address,
    pub borrowed_token: TokenInfo,
    pub collateral_token: TokenInfo,
}

/// Admissible range widths (number of bands) for a new position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLimits {
    pub min: u32,
    pub max: u32,
}

impl RangeLimits {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, range: u32) -> bool {
        range >= self.min && range <= self.max
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.min..=self.max
    }

    pub fn len(&self) -> usize {
        (self.max - self.min + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.max < self.min
    }
}

impl Default for RangeLimits {
    fn default() -> Self {
        Self { min: 4, max: 50 }
    }
}

/// Inclusive band interval `[n1, n2]`, `n1 <= n2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandRange {
    pub n1: i64,
    pub n2: i64,
}

impl BandRange {
    /// Bands placed by the controller: `n2 = n1 + range - 1`.
    pub fn from_n1(n1: i64, range: u32) -> Self {
        Self {
            n1,
            n2: n1 + range as i64 - 1,
        }
    }

    pub fn width(&self) -> u32 {
        (self.n2 - self.n1 + 1) as u32
    }
}

/// Raw controller view of a borrower: amounts held in bands plus debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    pub collateral: String,
    pub borrowed: String,
    pub debt: String,
    /// Number of bands; 0 without a loan.
    pub range: u32,
}

/// A borrower's position as reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPosition {
    pub collateral: String,
    pub borrowed: String,
    pub debt: String,
    pub range: u32,
    pub bands: BandRange,
    /// Collateral has been partially converted to the borrowed token.
    pub soft_liquidation: bool,
}

/// Balances held by one band, each bounded to its token's decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandBalances {
    pub borrowed: String,
    pub collateral: String,
}

/// Price bounds of a loan's band interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPrices {
    pub bands: BandRange,
    /// `p_oracle_down(n2)`, the lowest price of the interval.
    pub lower: String,
    /// `p_oracle_up(n1)`, the highest price of the interval.
    pub upper: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketParameters {
    /// Percentages.
    pub fee: String,
    pub admin_fee: String,
    pub liquidation_discount: String,
    pub loan_discount: String,
    pub base_price: Decimal,
    pub a: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRates {
    /// Per-second rate, 1e18 scaled input.
    pub borrow_rate: String,
    /// Simple annualized rate in percent.
    pub borrow_apr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmmBalances {
    pub borrowed: String,
    pub collateral: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandsInfo {
    pub active_band: i64,
    pub max_band: i64,
    pub min_band: i64,
    pub liquidation_band: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapAndAvailable {
    pub cap: String,
    pub available: String,
}

/// Full stats snapshot assembled by a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub parameters: MarketParameters,
    pub rates: MarketRates,
    pub amm_balances: AmmBalances,
    pub bands_info: BandsInfo,
    pub total_debt: String,
    pub cap_and_available: CapAndAvailable,
}

/// Max borrowable debt keyed by range width.
pub type MaxBorrowableTable = BTreeMap<u32, String>;
