//! Band geometry of the lending AMM.
//!
//! Band `n` spans `[tick(n+1), tick(n)]` with
//! `tick(n) = base_price * ((A-1)/A)^n`. Prices are 1e18-scaled integers and
//! powers are taken by stepwise multiplication, `p = p * ratio / 1e18`,
//! truncating after every step like the contracts do.

use crate::domain::units::{from_base_units, to_base_units, WAD_DECIMALS};
use crate::domain::Decimal;
use crate::error::LendError;
use alloy_primitives::U256;

/// Upper bound on steps of any band walk.
pub const MAX_BAND_STEPS: u32 = 10_000;

const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

fn overflow() -> LendError {
    LendError::domain("tick price overflow")
}

/// Human price of a 1e18-scaled value.
fn to_price(wad: U256) -> Result<Decimal, LendError> {
    Decimal::from_str_canonical(&from_base_units(wad, WAD_DECIMALS)).map_err(|_| overflow())
}

/// 1e18-scaled value of a positive human price, truncated to 18 digits.
fn to_wad(price: Decimal, what: &str) -> Result<U256, LendError> {
    if !price.is_positive() {
        return Err(LendError::domain(format!(
            "{} must be positive, got {}",
            what, price
        )));
    }
    to_base_units(&price.to_canonical_string(), WAD_DECIMALS)
}

/// Geometry of one market: amplification `A` and the band-0 base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandGeometry {
    a: u64,
    base_price: U256,
    /// `(A-1)/A` in 1e18, the price ratio from band `n` to band `n+1`.
    step_down: U256,
    /// `A/(A-1)` in 1e18, the price ratio from band `n` to band `n-1`.
    step_up: U256,
}

impl BandGeometry {
    /// Validate `A > 1` and `base_price > 0`.
    pub fn new(a: u64, base_price: Decimal) -> Result<Self, LendError> {
        Self::from_wad(a, to_wad(base_price, "base price")?)
    }

    /// Build from the raw contract values `A` and `get_base_price`.
    pub fn from_wad(a: u64, base_price: U256) -> Result<Self, LendError> {
        if a <= 1 {
            return Err(LendError::domain(format!("A must be greater than 1, got {}", a)));
        }
        if base_price.is_zero() {
            return Err(LendError::domain("base price must be positive, got 0"));
        }
        let a_wide = U256::from(a);
        let a_minus_one = U256::from(a - 1);
        Ok(Self {
            a,
            base_price,
            step_down: a_minus_one * WAD / a_wide,
            step_up: a_wide * WAD / a_minus_one,
        })
    }

    pub fn a(&self) -> u64 {
        self.a
    }

    pub fn base_price(&self) -> Result<Decimal, LendError> {
        to_price(self.base_price)
    }

    /// `start * ratio^steps` in 1e18, truncated after each multiplication.
    fn walk(start: U256, ratio: U256, steps: u64) -> Result<U256, LendError> {
        if steps > MAX_BAND_STEPS as u64 {
            return Err(LendError::domain(format!(
                "band offset {} exceeds {} steps",
                steps, MAX_BAND_STEPS
            )));
        }
        let mut price = start;
        for _ in 0..steps {
            price = Self::step(price, ratio)?;
        }
        Ok(price)
    }

    fn step(price: U256, ratio: U256) -> Result<U256, LendError> {
        price
            .checked_mul(ratio)
            .map(|p| p / WAD)
            .ok_or_else(overflow)
    }

    fn tick_wad(&self, n: i64) -> Result<U256, LendError> {
        let ratio = if n >= 0 { self.step_down } else { self.step_up };
        Self::walk(self.base_price, ratio, n.unsigned_abs())
    }

    /// `base_price * ((A-1)/A)^n`; negative `n` walks above the base price.
    pub fn tick_price(&self, n: i64) -> Result<Decimal, LendError> {
        to_price(self.tick_wad(n)?)
    }

    /// `[tick(n+1), tick(n)]`: lower then upper bound of band `n`.
    pub fn band_prices(&self, n: i64) -> Result<[Decimal; 2], LendError> {
        Ok([self.tick_price(n + 1)?, self.tick_price(n)?])
    }

    /// Percentage of price span covered by `range` consecutive bands:
    /// `(1 - ((A-1)/A)^range) * 100`.
    pub fn range_width_pct(&self, range: u32) -> Result<Decimal, LendError> {
        let remaining = Self::walk(WAD, self.step_down, range as u64)?;
        to_price((WAD - remaining) * U256::from(100u64))
    }

    /// Band containing `oracle_price`.
    pub fn oracle_price_band(&self, oracle_price: Decimal) -> Result<i64, LendError> {
        self.oracle_price_band_wad(to_wad(oracle_price, "oracle price")?)
    }

    /// Band containing a 1e18-scaled oracle price.
    ///
    /// Walks band by band from band 0: downward while the oracle price is at
    /// or below the next lower tick, upward while it is above the current
    /// tick. At `oracle_price == base_price` the walk stops at band 0.
    pub fn oracle_price_band_wad(&self, oracle_price: U256) -> Result<i64, LendError> {
        if oracle_price.is_zero() {
            return Err(LendError::domain("oracle price must be positive, got 0"));
        }

        let below = oracle_price <= self.base_price;
        let (ratio, term) = if below {
            (self.step_down, 1i64)
        } else {
            (self.step_up, -1i64)
        };
        let crossed = |tick: U256| {
            if below {
                oracle_price <= tick
            } else {
                oracle_price > tick
            }
        };

        let mut band = 0i64;
        let mut tick = if below {
            Self::step(self.base_price, ratio)?
        } else {
            self.base_price
        };
        let mut steps = 0u32;
        while crossed(tick) {
            if steps >= MAX_BAND_STEPS {
                return Err(LendError::domain(format!(
                    "oracle band search did not converge in {} steps",
                    MAX_BAND_STEPS
                )));
            }
            tick = Self::step(tick, ratio)?;
            band += term;
            steps += 1;
        }
        Ok(band)
    }
}

/// Convenience wrapper over [`BandGeometry::oracle_price_band`].
pub fn oracle_price_band(oracle_price: Decimal, base_price: Decimal, a: u64) -> Result<i64, LendError> {
    BandGeometry::new(a, base_price)?.oracle_price_band(oracle_price)
}
