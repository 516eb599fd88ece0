//! Token USD prices taken from the deepest pool listing each token.

use crate::cache::{CacheKey, ResultCache};
use crate::datasource::{PoolData, PriceApi, FACTORY_TYPES};
use crate::domain::{Address, Decimal};
use crate::error::LendError;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type UsdPriceTable = HashMap<Address, Decimal>;

/// Pick every token's price from the pool with the highest USD total.
///
/// `listings` are in factory-type order; on equal totals the earlier pool
/// keeps its place. Coins without a price are ignored.
pub fn select_usd_prices(listings: &[Vec<PoolData>]) -> UsdPriceTable {
    let mut best: HashMap<Address, (Decimal, Decimal)> = HashMap::new();
    for pool in listings.iter().flatten() {
        for coin in &pool.coins {
            let Some(price) = coin.usd_price else {
                continue;
            };
            match best.get(&coin.address) {
                Some((tvl, _)) if *tvl >= pool.usd_total => {}
                _ => {
                    best.insert(coin.address.clone(), (pool.usd_total, price));
                }
            }
        }
    }
    best.into_iter()
        .map(|(address, (_, price))| (address, price))
        .collect()
}

/// USD prices for one network, refreshed at most once per TTL.
#[derive(Debug, Clone)]
pub struct UsdPriceBook {
    api: Arc<dyn PriceApi>,
    network: String,
    cache: Arc<ResultCache>,
    ttl: Duration,
}

impl UsdPriceBook {
    pub fn new(api: Arc<dyn PriceApi>, network: String, cache: Arc<ResultCache>, ttl: Duration) -> Self {
        Self {
            api,
            network,
            cache,
            ttl,
        }
    }

    pub async fn table(&self) -> Result<Arc<UsdPriceTable>, LendError> {
        let key = CacheKey::scoped(&self.network, "usd_prices");
        let api = self.api.clone();
        let network = self.network.clone();
        self.cache
            .memoize(key, self.ttl, move || async move {
                let listings = try_join_all(
                    FACTORY_TYPES
                        .iter()
                        .map(|factory_type| api.fetch_pools(&network, factory_type)),
                )
                .await?;
                let table = select_usd_prices(&listings);
                debug!("Priced {} tokens on {}", table.len(), network);
                Ok(Arc::new(table))
            })
            .await
    }

    /// Price of `token`, `0` when no pool lists it.
    pub async fn usd_price(&self, token: &Address) -> Result<Decimal, LendError> {
        let table = self.table().await?;
        Ok(table.get(token).copied().unwrap_or_else(Decimal::zero))
    }
}
