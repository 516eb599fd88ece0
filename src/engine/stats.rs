//! Market statistics, each memoized for its own TTL.

use super::{wad_to_percent, MarketEngine};
use crate::cache::CacheKey;
use crate::datasource::{IController, ILlamma, IMonetaryPolicy, IVault, ReadRequest};
use crate::domain::units::{from_base_units, WAD_DECIMALS};
use crate::domain::{
    AmmBalances, BandsInfo, CapAndAvailable, MarketParameters, MarketRates, MarketStats,
};
use crate::error::LendError;
use alloy_primitives::U256;
use tracing::info;

const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

impl MarketEngine {
    pub async fn stats_parameters(&self) -> Result<MarketParameters, LendError> {
        let key = CacheKey::new(&self.market.controller, "stats_parameters");
        let this = self.clone();
        self.cache
            .memoize(key, self.ttls.rates, move || async move {
                let values = this
                    .reader
                    .batch(vec![
                        this.amm_call(ILlamma::feeCall {}),
                        this.amm_call(ILlamma::admin_feeCall {}),
                        this.controller_call(IController::liquidation_discountCall {}),
                        this.controller_call(IController::loan_discountCall {}),
                    ])
                    .await?;
                let geometry = this.geometry().await?;
                Ok(MarketParameters {
                    fee: wad_to_percent(values[0].as_u256()?),
                    admin_fee: wad_to_percent(values[1].as_u256()?),
                    liquidation_discount: wad_to_percent(values[2].as_u256()?),
                    loan_discount: wad_to_percent(values[3].as_u256()?),
                    base_price: geometry.base_price()?,
                    a: geometry.a(),
                })
            })
            .await
    }

    pub async fn stats_rates(&self) -> Result<MarketRates, LendError> {
        // One policy can serve several controllers.
        let key = CacheKey::new(&self.market.monetary_policy, "rate")
            .with_discriminator(&self.market.controller);
        let this = self.clone();
        self.cache
            .memoize(key, self.ttls.rates, move || async move {
                let rate = this
                    .reader
                    .read_one(ReadRequest::new(
                        &this.market.monetary_policy,
                        IMonetaryPolicy::rateCall {
                            controller: (&this.market.controller).into(),
                        },
                    ))
                    .await?
                    .as_u256()?;
                let yearly = rate.saturating_mul(U256::from(SECONDS_PER_YEAR));
                Ok(MarketRates {
                    borrow_rate: from_base_units(rate, WAD_DECIMALS),
                    borrow_apr: wad_to_percent(yearly),
                })
            })
            .await
    }

    /// Token balances of the AMM net of uncollected admin fees.
    pub async fn stats_amm_balances(&self) -> Result<AmmBalances, LendError> {
        let key = CacheKey::new(&self.market.amm, "stats_amm_balances");
        let this = self.clone();
        self.cache
            .memoize(key, self.ttls.fast, move || async move {
                let market = &this.market;
                let values = this
                    .reader
                    .batch(vec![
                        this.balance_of(&market.borrowed_token.address, &market.amm),
                        this.amm_call(ILlamma::admin_fees_xCall {}),
                        this.balance_of(&market.collateral_token.address, &market.amm),
                        this.amm_call(ILlamma::admin_fees_yCall {}),
                    ])
                    .await?;
                let borrowed = values[0].as_u256()?.saturating_sub(values[1].as_u256()?);
                let collateral = values[2].as_u256()?.saturating_sub(values[3].as_u256()?);
                Ok(AmmBalances {
                    borrowed: from_base_units(borrowed, this.borrowed_decimals()),
                    collateral: from_base_units(collateral, this.collateral_decimals()),
                })
            })
            .await
    }

    pub async fn stats_bands_info(&self) -> Result<BandsInfo, LendError> {
        let key = CacheKey::new(&self.market.amm, "stats_bands_info");
        let this = self.clone();
        self.cache
            .memoize(key, self.ttls.per_block, move || async move {
                let values = this
                    .reader
                    .batch(vec![
                        this.amm_call(ILlamma::active_band_with_skipCall {}),
                        this.amm_call(ILlamma::max_bandCall {}),
                        this.amm_call(ILlamma::min_bandCall {}),
                    ])
                    .await?;
                let active_band = values[0].as_i64()?;
                let liquidation_band = this.liquidating_band_at(active_band).await?;
                Ok(BandsInfo {
                    active_band,
                    max_band: values[1].as_i64()?,
                    min_band: values[2].as_i64()?,
                    liquidation_band,
                })
            })
            .await
    }

    pub async fn stats_total_debt(&self) -> Result<String, LendError> {
        let key = CacheKey::new(&self.market.controller, "total_debt");
        let this = self.clone();
        self.cache
            .memoize(key, self.ttls.per_block, move || async move {
                let debt = this
                    .reader
                    .read_one(this.controller_call(IController::total_debtCall {}))
                    .await?
                    .as_u256()?;
                Ok(from_base_units(debt, this.borrowed_decimals()))
            })
            .await
    }

    /// Vault assets and the borrowable liquidity sitting in the controller.
    pub async fn stats_cap_and_available(&self) -> Result<CapAndAvailable, LendError> {
        let key = CacheKey::new(&self.market.vault, "stats_cap_and_available");
        let this = self.clone();
        self.cache
            .memoize(key, self.ttls.fast, move || async move {
                let market = &this.market;
                let values = this
                    .reader
                    .batch(vec![
                        ReadRequest::new(&market.vault, IVault::totalAssetsCall {}),
                        this.balance_of(&market.borrowed_token.address, &market.controller),
                    ])
                    .await?;
                Ok(CapAndAvailable {
                    cap: from_base_units(values[0].as_u256()?, this.borrowed_decimals()),
                    available: from_base_units(values[1].as_u256()?, this.borrowed_decimals()),
                })
            })
            .await
    }

    /// Drop everything cached, then fetch every stat afresh.
    pub async fn refresh_stats(&self) -> Result<MarketStats, LendError> {
        self.cache.clear();
        info!("Refreshing stats for market {}", self.market.id);
        self.stats().await
    }

    /// Every stat through the cache, without clearing it first.
    pub async fn stats(&self) -> Result<MarketStats, LendError> {
        let (parameters, rates, amm_balances, bands_info, total_debt, cap_and_available) =
            futures::try_join!(
                self.stats_parameters(),
                self.stats_rates(),
                self.stats_amm_balances(),
                self.stats_bands_info(),
                self.stats_total_debt(),
                self.stats_cap_and_available(),
            )?;
        Ok(MarketStats {
            parameters,
            rates,
            amm_balances,
            bands_info,
            total_debt,
            cap_and_available,
        })
    }
}
