//! Position sizing: how much can be borrowed, over which bands, at what health.

use super::MarketEngine;
use crate::cache::CacheKey;
use crate::datasource::{int256, IController};
use crate::domain::units::{
    from_base_units, from_signed_base_units, to_base_units, to_signed_base_units, WAD_DECIMALS,
};
use crate::domain::{Address, BandRange, LoanPrices, MaxBorrowableTable};
use crate::error::LendError;
use alloy_primitives::U256;
use std::collections::BTreeMap;
use tracing::debug;

/// Controller health is a 1e18 fraction; callers see it in percent.
pub(crate) fn health_to_percent(raw: i128) -> String {
    from_signed_base_units(raw.saturating_mul(100), WAD_DECIMALS)
}

/// First range whose max borrowable falls below `debt`, minus one.
///
/// `table` must hold every range of `[min, max]`. `None` when even `min`
/// cannot carry the debt.
pub fn scan_max_range(table: &BTreeMap<u32, U256>, debt: U256, min: u32, max: u32) -> Option<u32> {
    for range in min..=max {
        let borrowable = table.get(&range).copied().unwrap_or(U256::ZERO);
        if debt > borrowable {
            return if range == min { None } else { Some(range - 1) };
        }
    }
    Some(max)
}

impl MarketEngine {
    /// Max debt for `collateral` spread over `range` bands.
    pub async fn max_borrowable(&self, collateral: &str, range: u32) -> Result<String, LendError> {
        self.check_range(range)?;
        let collateral = to_base_units(collateral, self.collateral_decimals())?;
        let value = self
            .reader
            .read_one(self.controller_call(IController::max_borrowableCall {
                collateral,
                n: U256::from(range),
            }))
            .await?;
        Ok(from_base_units(value.as_u256()?, self.borrowed_decimals()))
    }

    /// Max debt for every admissible range, in base units, one round-trip.
    async fn max_borrowable_raw(&self, collateral: U256) -> Result<BTreeMap<u32, U256>, LendError> {
        let key = CacheKey::new(&self.market.controller, "max_borrowable_all_ranges")
            .with_discriminator(collateral);
        let this = self.clone();
        self.cache
            .memoize(key, self.ttls.fast, move || async move {
                let ranges: Vec<u32> = this.limits.iter().collect();
                let calls = ranges
                    .iter()
                    .map(|&n| {
                        this.controller_call(IController::max_borrowableCall {
                            collateral,
                            n: U256::from(n),
                        })
                    })
                    .collect();
                let values = this.reader.batch(calls).await?;
                ranges
                    .into_iter()
                    .zip(values.iter())
                    .map(|(n, v)| v.as_u256().map(|v| (n, v)))
                    .collect::<Result<BTreeMap<u32, U256>, LendError>>()
            })
            .await
    }

    pub async fn max_borrowable_all_ranges(
        &self,
        collateral: &str,
    ) -> Result<MaxBorrowableTable, LendError> {
        let collateral = to_base_units(collateral, self.collateral_decimals())?;
        let decimals = self.borrowed_decimals();
        Ok(self
            .max_borrowable_raw(collateral)
            .await?
            .into_iter()
            .map(|(n, v)| (n, from_base_units(v, decimals)))
            .collect())
    }

    /// Widest range that can still carry `debt` against `collateral`.
    pub async fn max_range(&self, collateral: &str, debt: &str) -> Result<u32, LendError> {
        let collateral = to_base_units(collateral, self.collateral_decimals())?;
        let debt_units = to_base_units(debt, self.borrowed_decimals())?;
        let table = self.max_borrowable_raw(collateral).await?;
        let range = scan_max_range(&table, debt_units, self.limits.min, self.limits.max)
            .ok_or_else(|| {
                LendError::domain(format!(
                    "debt {} exceeds max borrowable at the narrowest range {}",
                    debt, self.limits.min
                ))
            })?;
        debug!("max range for debt {}: {}", debt, range);
        Ok(range)
    }

    /// Band interval a new loan would occupy.
    pub async fn create_loan_bands(
        &self,
        collateral: &str,
        debt: &str,
        range: u32,
    ) -> Result<BandRange, LendError> {
        self.check_range(range)?;
        let collateral = to_base_units(collateral, self.collateral_decimals())?;
        let debt = to_base_units(debt, self.borrowed_decimals())?;
        let n1 = self
            .reader
            .read_one(self.controller_call(IController::calculate_debt_n1Call {
                collateral,
                debt,
                n: U256::from(range),
            }))
            .await?
            .as_i64()?;
        Ok(BandRange::from_n1(n1, range))
    }

    /// Oracle price bounds of the bands a new loan would occupy.
    pub async fn create_loan_prices(
        &self,
        collateral: &str,
        debt: &str,
        range: u32,
    ) -> Result<LoanPrices, LendError> {
        let bands = self.create_loan_bands(collateral, debt, range).await?;
        let [lower, upper] = self.band_prices_onchain(bands).await?;
        Ok(LoanPrices {
            bands,
            lower,
            upper,
        })
    }

    /// Health in percent after applying the given deltas to `address`'s loan.
    ///
    /// `range == 0` lets the controller use the position's own range.
    pub async fn health_ratio(
        &self,
        address: &Address,
        collateral_delta: &str,
        debt_delta: &str,
        range: u32,
        full: bool,
    ) -> Result<String, LendError> {
        if range != 0 {
            self.check_range(range)?;
        }
        self.read_health(address, collateral_delta, debt_delta, range, full)
            .await
    }

    pub(crate) async fn read_health(
        &self,
        address: &Address,
        collateral_delta: &str,
        debt_delta: &str,
        range: u32,
        full: bool,
    ) -> Result<String, LendError> {
        let d_collateral = to_signed_base_units(collateral_delta, self.collateral_decimals())?;
        let d_debt = to_signed_base_units(debt_delta, self.borrowed_decimals())?;
        let raw = self
            .reader
            .read_one(self.controller_call(IController::health_calculatorCall {
                user: address.into(),
                d_collateral: int256(d_collateral),
                d_debt: int256(d_debt),
                full,
                n: U256::from(range),
            }))
            .await?
            .as_i128()?;
        Ok(health_to_percent(raw))
    }

    /// Health a new loan would start with.
    pub async fn create_loan_health(
        &self,
        collateral: &str,
        debt: &str,
        range: u32,
        full: bool,
    ) -> Result<String, LendError> {
        self.check_range(range)?;
        self.read_health(&Address::zero(), collateral, debt, range, full)
            .await
    }
}
