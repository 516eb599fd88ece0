//! Market engine: band geometry, position sizing and market stats over live
//! contract reads.

use crate::cache::{CacheKey, CacheTtls, ResultCache};
use crate::datasource::contracts::IntoRawValue;
use crate::datasource::{BatchReader, ReadRequest, IERC20, ILlamma};
use crate::domain::units::{from_base_units, WAD_DECIMALS};
use crate::domain::{Address, Decimal, Market, RangeLimits};
use crate::error::LendError;
use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use std::sync::Arc;

pub mod bands;
pub mod geometry;
pub mod sizing;
pub mod stats;
pub mod usd_prices;
pub mod users;

pub use geometry::{oracle_price_band, BandGeometry, MAX_BAND_STEPS};
pub use usd_prices::{select_usd_prices, UsdPriceBook};

/// Query engine for one market.
///
/// Cheap to clone; clones share the reader and the cache.
#[derive(Debug, Clone)]
pub struct MarketEngine {
    market: Arc<Market>,
    reader: BatchReader,
    cache: Arc<ResultCache>,
    ttls: CacheTtls,
    limits: RangeLimits,
}

impl MarketEngine {
    pub fn new(
        market: Arc<Market>,
        reader: BatchReader,
        cache: Arc<ResultCache>,
        ttls: CacheTtls,
        limits: RangeLimits,
    ) -> Self {
        Self {
            market,
            reader,
            cache,
            ttls,
            limits,
        }
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn range_limits(&self) -> RangeLimits {
        self.limits
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Fails with `RangeOutOfBounds` unless `min <= range <= max`.
    pub fn check_range(&self, range: u32) -> Result<(), LendError> {
        if self.limits.contains(range) {
            Ok(())
        } else {
            Err(LendError::RangeOutOfBounds {
                range,
                min: self.limits.min,
                max: self.limits.max,
            })
        }
    }

    fn amm_call<C>(&self, call: C) -> ReadRequest
    where
        C: SolCall,
        C::Return: IntoRawValue,
    {
        ReadRequest::new(&self.market.amm, call)
    }

    fn controller_call<C>(&self, call: C) -> ReadRequest
    where
        C: SolCall,
        C::Return: IntoRawValue,
    {
        ReadRequest::new(&self.market.controller, call)
    }

    fn balance_of(&self, token: &Address, owner: &Address) -> ReadRequest {
        ReadRequest::new(token, IERC20::balanceOfCall { owner: owner.into() })
    }

    fn collateral_decimals(&self) -> u8 {
        self.market.collateral_token.decimals
    }

    fn borrowed_decimals(&self) -> u8 {
        self.market.borrowed_token.decimals
    }

    /// `A` and base price, read together and kept for the constants TTL.
    pub async fn geometry(&self) -> Result<BandGeometry, LendError> {
        let key = CacheKey::new(&self.market.amm, "geometry");
        let this = self.clone();
        self.cache
            .memoize(key, self.ttls.constants, move || async move {
                let values = this
                    .reader
                    .batch(vec![
                        this.amm_call(ILlamma::ACall {}),
                        this.amm_call(ILlamma::get_base_priceCall {}),
                    ])
                    .await?;
                BandGeometry::from_wad(values[0].as_u64()?, values[1].as_u256()?)
            })
            .await
    }

    pub async fn a(&self) -> Result<u64, LendError> {
        Ok(self.geometry().await?.a())
    }

    pub async fn base_price(&self) -> Result<Decimal, LendError> {
        self.geometry().await?.base_price()
    }

    async fn oracle_price_wad(&self) -> Result<U256, LendError> {
        let value = self
            .reader
            .read_one(self.amm_call(ILlamma::price_oracleCall {}))
            .await?;
        value.as_u256()
    }

    pub async fn oracle_price(&self) -> Result<Decimal, LendError> {
        wad_to_decimal(self.oracle_price_wad().await?)
    }

    /// Current AMM price (`get_p`).
    pub async fn amm_price(&self) -> Result<Decimal, LendError> {
        let value = self.reader.read_one(self.amm_call(ILlamma::get_pCall {})).await?;
        wad_to_decimal(value.as_u256()?)
    }

    /// Band the live oracle price falls into.
    pub async fn oracle_price_band(&self) -> Result<i64, LendError> {
        let (geometry, oracle) = futures::try_join!(self.geometry(), self.oracle_price_wad())?;
        geometry.oracle_price_band_wad(oracle)
    }

    pub async fn calc_tick_price(&self, n: i64) -> Result<Decimal, LendError> {
        self.geometry().await?.tick_price(n)
    }

    pub async fn calc_band_prices(&self, n: i64) -> Result<[Decimal; 2], LendError> {
        self.geometry().await?.band_prices(n)
    }

    pub async fn calc_range_pct(&self, range: u32) -> Result<Decimal, LendError> {
        self.geometry().await?.range_width_pct(range)
    }
}

/// 1e18-scaled integer to a Decimal price.
pub(crate) fn wad_to_decimal(value: U256) -> Result<Decimal, LendError> {
    let s = from_base_units(value, WAD_DECIMALS);
    Decimal::from_str_canonical(&s)
        .map_err(|e| LendError::batch_read(format!("unrepresentable value {}: {}", s, e)))
}

/// `value * 100` of a 1e18-scaled fraction, as a percentage string.
pub(crate) fn wad_to_percent(value: U256) -> String {
    from_base_units(value.saturating_mul(U256::from(100u64)), WAD_DECIMALS)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixture: a market wired to a `MockChain`.

    use super::*;
    use crate::datasource::{MockChain, RawValue};
    use crate::domain::TokenInfo;

    pub fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    pub fn wad(s: &str) -> RawValue {
        RawValue::Uint(crate::domain::units::to_base_units(s, 18).unwrap())
    }

    pub fn units(s: &str, decimals: u8) -> U256 {
        crate::domain::units::to_base_units(s, decimals).unwrap()
    }

    pub fn test_market() -> Market {
        Market {
            id: "one-way-market-0".to_string(),
            amm: addr(1),
            controller: addr(2),
            monetary_policy: addr(3),
            vault: addr(4),
            borrowed_token: TokenInfo {
                address: addr(10),
                name: "Stablecoin".to_string(),
                symbol: "crvUSD".to_string(),
                decimals: 18,
            },
            collateral_token: TokenInfo {
                address: addr(11),
                name: "Wrapped BTC".to_string(),
                symbol: "WBTC".to_string(),
                decimals: 8,
            },
        }
    }

    pub fn engine(chain: Arc<MockChain>) -> MarketEngine {
        MarketEngine::new(
            Arc::new(test_market()),
            BatchReader::new(chain, 500),
            Arc::new(ResultCache::new()),
            CacheTtls::default(),
            RangeLimits::default(),
        )
    }

    pub fn with_geometry(chain: MockChain, a: u64, base_price: &str) -> MockChain {
        let market = test_market();
        chain
            .with_value(&market.amm, ILlamma::ACall {}, RawValue::Uint(U256::from(a)))
            .with_value(&market.amm, ILlamma::get_base_priceCall {}, wad(base_price))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::datasource::MockChain;

    #[test]
    fn test_check_range() {
        let engine = engine(Arc::new(MockChain::new()));
        assert!(engine.check_range(4).is_ok());
        assert!(engine.check_range(50).is_ok());
        assert_eq!(
            engine.check_range(3),
            Err(LendError::RangeOutOfBounds {
                range: 3,
                min: 4,
                max: 50
            })
        );
    }

    #[tokio::test]
    async fn test_geometry_cached_for_constants_ttl() {
        let chain = Arc::new(with_geometry(MockChain::new(), 100, "1.0"));
        let engine = engine(chain.clone());

        assert_eq!(engine.a().await.unwrap(), 100);
        assert_eq!(
            engine.base_price().await.unwrap(),
            Decimal::from_str_canonical("1").unwrap()
        );
        assert_eq!(
            engine.calc_tick_price(1).await.unwrap(),
            Decimal::from_str_canonical("0.99").unwrap()
        );
        assert_eq!(chain.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_oracle_price_band_live() {
        let market = test_market();
        let chain = with_geometry(MockChain::new(), 100, "1.0").with_value(
            &market.amm,
            ILlamma::price_oracleCall {},
            wad("0.98"),
        );
        let engine = engine(Arc::new(chain));
        assert_eq!(engine.oracle_price_band().await.unwrap(), 2);
    }

    #[test]
    fn test_wad_helpers() {
        assert_eq!(wad_to_percent(units("0.006", 18)), "0.6");
        assert_eq!(
            wad_to_decimal(units("2500.5", 18)).unwrap(),
            Decimal::from_str_canonical("2500.5").unwrap()
        );
    }
}
