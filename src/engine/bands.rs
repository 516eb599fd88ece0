//! Band-level reads: on-chain band prices, balances and the active band.

use super::MarketEngine;
use crate::datasource::{int256, ILlamma, RawValue, ReadRequest};
use crate::domain::units::{format_bounded, from_base_units, WAD_DECIMALS};
use crate::domain::{BandBalances, BandRange};
use crate::error::LendError;
use alloy_primitives::U256;
use std::collections::BTreeMap;

/// Band balances are stored 1e18-scaled whatever the token's decimals.
fn band_amount(raw: &RawValue, token_decimals: u8) -> Result<(U256, String), LendError> {
    let value = raw.as_u256()?;
    let formatted = format_bounded(&from_base_units(value, WAD_DECIMALS), token_decimals)?;
    Ok((value, formatted))
}

impl MarketEngine {
    /// `bands_x(n)` then `bands_y(n)`.
    fn band_reads(&self, n: i64) -> [ReadRequest; 2] {
        [
            self.amm_call(ILlamma::bands_xCall { n: int256(n.into()) }),
            self.amm_call(ILlamma::bands_yCall { n: int256(n.into()) }),
        ]
    }

    /// `[p_oracle_down(n2), p_oracle_up(n1)]` as reported by the AMM.
    pub async fn band_prices_onchain(&self, bands: BandRange) -> Result<[String; 2], LendError> {
        let values = self
            .reader
            .batch(vec![
                self.amm_call(ILlamma::p_oracle_downCall {
                    n: int256(bands.n2.into()),
                }),
                self.amm_call(ILlamma::p_oracle_upCall {
                    n: int256(bands.n1.into()),
                }),
            ])
            .await?;
        Ok([
            from_base_units(values[0].as_u256()?, WAD_DECIMALS),
            from_base_units(values[1].as_u256()?, WAD_DECIMALS),
        ])
    }

    pub async fn band_balances(&self, n: i64) -> Result<BandBalances, LendError> {
        let (balances, _) = self.band_balances_raw(n).await?;
        Ok(balances)
    }

    /// Balances plus whether both sides are non-zero.
    async fn band_balances_raw(&self, n: i64) -> Result<(BandBalances, bool), LendError> {
        let values = self
            .reader
            .batch(self.band_reads(n).into())
            .await?;
        let (x, borrowed) = band_amount(&values[0], self.borrowed_decimals())?;
        let (y, collateral) = band_amount(&values[1], self.collateral_decimals())?;
        let both = !x.is_zero() && !y.is_zero();
        Ok((
            BandBalances {
                borrowed,
                collateral,
            },
            both,
        ))
    }

    /// Balances of every band in `[n1, n2]`, one round-trip.
    pub async fn band_balances_range(
        &self,
        n1: i64,
        n2: i64,
    ) -> Result<BTreeMap<i64, BandBalances>, LendError> {
        if n1 > n2 {
            return Err(LendError::domain(format!(
                "band interval [{}, {}] is empty",
                n1, n2
            )));
        }
        if (n2 - n1) as u64 >= super::MAX_BAND_STEPS as u64 {
            return Err(LendError::domain(format!(
                "band interval [{}, {}] is too wide",
                n1, n2
            )));
        }
        let calls = (n1..=n2)
            .flat_map(|n| self.band_reads(n))
            .collect();
        let values = self.reader.batch(calls).await?;

        let mut out = BTreeMap::new();
        for (n, pair) in (n1..=n2).zip(values.chunks(2)) {
            let (_, borrowed) = band_amount(&pair[0], self.borrowed_decimals())?;
            let (_, collateral) = band_amount(&pair[1], self.collateral_decimals())?;
            out.insert(
                n,
                BandBalances {
                    borrowed,
                    collateral,
                },
            );
        }
        Ok(out)
    }

    /// Always read live; see `stats_bands_info` for the cached view.
    pub async fn active_band(&self) -> Result<i64, LendError> {
        self.reader
            .read_one(self.amm_call(ILlamma::active_bandCall {}))
            .await?
            .as_i64()
    }

    /// The active band while it holds both tokens, i.e. is mid-conversion.
    pub async fn liquidating_band(&self) -> Result<Option<i64>, LendError> {
        let active = self.active_band().await?;
        self.liquidating_band_at(active).await
    }

    pub(crate) async fn liquidating_band_at(&self, active: i64) -> Result<Option<i64>, LendError> {
        let (_, both) = self.band_balances_raw(active).await?;
        Ok(both.then_some(active))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::datasource::MockChain;
    use std::sync::Arc;

    fn chain_with_band(n: i64, x: &str, y: &str) -> MockChain {
        let market = test_market();
        MockChain::new()
            .with_value(&market.amm, ILlamma::active_bandCall {}, RawValue::Int(n.into()))
            .with_value(&market.amm, ILlamma::bands_xCall { n: int256(n.into()) }, wad(x))
            .with_value(&market.amm, ILlamma::bands_yCall { n: int256(n.into()) }, wad(y))
    }

    #[tokio::test]
    async fn test_band_balances_bounded_to_token_decimals() {
        let engine = engine(Arc::new(chain_with_band(3, "1500.5", "0.123456789123")));
        let balances = engine.band_balances(3).await.unwrap();
        assert_eq!(balances.borrowed, "1500.5");
        // Collateral has 8 decimals.
        assert_eq!(balances.collateral, "0.12345678");
    }

    #[tokio::test]
    async fn test_liquidating_band_requires_both_sides() {
        let cases = [
            ("10", "0.5", Some(5)),
            ("0", "0.5", None),
            ("10", "0", None),
        ];
        for (x, y, expected) in cases {
            let market = engine(Arc::new(chain_with_band(5, x, y)));
            assert_eq!(market.liquidating_band().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_band_balances_range_single_batch() {
        let market = test_market();
        let mut chain = MockChain::new();
        for n in -1i128..=1 {
            chain = chain
                .with_value(&market.amm, ILlamma::bands_xCall { n: int256(n) }, wad("1"))
                .with_value(&market.amm, ILlamma::bands_yCall { n: int256(n) }, wad("2"));
        }
        let chain = Arc::new(chain);
        let engine = engine(chain.clone());

        let out = engine.band_balances_range(-1, 1).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[&0].collateral, "2.0");
        assert_eq!(chain.batch_count(), 1);

        assert!(matches!(
            engine.band_balances_range(2, 1).await,
            Err(LendError::Domain(_))
        ));
    }

    #[tokio::test]
    async fn test_band_prices_onchain_order() {
        let market = test_market();
        let chain = MockChain::new()
            .with_value(&market.amm, ILlamma::p_oracle_downCall { n: int256(13) }, wad("1800"))
            .with_value(&market.amm, ILlamma::p_oracle_upCall { n: int256(10) }, wad("2000.5"));
        let engine = engine(Arc::new(chain));
        let [lower, upper] = engine
            .band_prices_onchain(BandRange { n1: 10, n2: 13 })
            .await
            .unwrap();
        assert_eq!(lower, "1800.0");
        assert_eq!(upper, "2000.5");
    }
}
