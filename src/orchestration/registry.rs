//! Market discovery from the lending factory.

use crate::cache::{CacheTtls, ResultCache};
use crate::datasource::{demux, BatchReader, ReadRequest, IERC20, IFactory};
use crate::domain::{Address, Market, RangeLimits, TokenInfo};
use crate::engine::MarketEngine;
use crate::error::LendError;
use alloy_primitives::U256;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

const MARKET_FIELDS: [&str; 6] = [
    "controllers",
    "amms",
    "monetary_policies",
    "vaults",
    "borrowed_tokens",
    "collateral_tokens",
];

const TOKEN_FIELDS: [&str; 3] = ["name", "symbol", "decimals"];

/// Factory getters of market `i`, in `MARKET_FIELDS` order.
fn market_reads(factory: &Address, i: u64) -> [ReadRequest; 6] {
    let i = U256::from(i);
    [
        ReadRequest::new(factory, IFactory::controllersCall { i }),
        ReadRequest::new(factory, IFactory::ammsCall { i }),
        ReadRequest::new(factory, IFactory::monetary_policiesCall { i }),
        ReadRequest::new(factory, IFactory::vaultsCall { i }),
        ReadRequest::new(factory, IFactory::borrowed_tokensCall { i }),
        ReadRequest::new(factory, IFactory::collateral_tokensCall { i }),
    ]
}

/// ERC20 metadata reads, in `TOKEN_FIELDS` order.
fn token_reads(token: &Address) -> [ReadRequest; 3] {
    [
        ReadRequest::new(token, IERC20::nameCall {}),
        ReadRequest::new(token, IERC20::symbolCall {}),
        ReadRequest::new(token, IERC20::decimalsCall {}),
    ]
}

/// Every market the factory knows about, in factory index order.
///
/// Three round-trips: the count, the per-market addresses, the token metadata.
pub async fn fetch_markets(reader: &BatchReader, factory: &Address) -> Result<Vec<Market>, LendError> {
    let count = reader
        .read_one(ReadRequest::new(factory, IFactory::market_countCall {}))
        .await?
        .as_u64()?;
    if count == 0 {
        return Ok(Vec::new());
    }

    let calls = (0..count).flat_map(|i| market_reads(factory, i)).collect();
    let columns = demux(reader.batch(calls).await?, &MARKET_FIELDS)?;
    let column = |field: &str| -> Result<Vec<Address>, LendError> {
        columns
            .get(field)
            .ok_or_else(|| LendError::batch_read(format!("missing column {}", field)))?
            .iter()
            .map(|v| v.as_address())
            .collect()
    };
    let controllers = column("controllers")?;
    let amms = column("amms")?;
    let policies = column("monetary_policies")?;
    let vaults = column("vaults")?;
    let borrowed = column("borrowed_tokens")?;
    let collateral = column("collateral_tokens")?;

    let mut seen = HashSet::new();
    let tokens: Vec<Address> = borrowed
        .iter()
        .chain(collateral.iter())
        .filter(|t| seen.insert((*t).clone()))
        .cloned()
        .collect();
    let token_info = fetch_tokens(reader, &tokens).await?;
    let info_for = |address: &Address| {
        token_info
            .get(address)
            .cloned()
            .ok_or_else(|| LendError::batch_read(format!("no metadata for token {}", address)))
    };

    let mut markets = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        markets.push(Market {
            id: format!("one-way-market-{}", i),
            amm: amms[i].clone(),
            controller: controllers[i].clone(),
            monetary_policy: policies[i].clone(),
            vault: vaults[i].clone(),
            borrowed_token: info_for(&borrowed[i])?,
            collateral_token: info_for(&collateral[i])?,
        });
    }
    info!("Loaded {} markets from factory {}", markets.len(), factory);
    Ok(markets)
}

async fn fetch_tokens(
    reader: &BatchReader,
    tokens: &[Address],
) -> Result<HashMap<Address, TokenInfo>, LendError> {
    let calls = tokens.iter().flat_map(token_reads).collect();
    let columns = demux(reader.batch(calls).await?, &TOKEN_FIELDS)?;
    let (names, symbols, decimals) = match (
        columns.get("name"),
        columns.get("symbol"),
        columns.get("decimals"),
    ) {
        (Some(n), Some(s), Some(d)) => (n, s, d),
        _ => return Err(LendError::batch_read("token metadata columns missing")),
    };

    let mut out = HashMap::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let raw_decimals = decimals[i].as_u64()?;
        let decimals = u8::try_from(raw_decimals).map_err(|_| {
            LendError::batch_read(format!("token {} reports {} decimals", token, raw_decimals))
        })?;
        out.insert(
            token.clone(),
            TokenInfo {
                address: token.clone(),
                name: names[i].as_str()?.to_string(),
                symbol: symbols[i].as_str()?.to_string(),
                decimals,
            },
        );
    }
    Ok(out)
}

/// One engine per market, all sharing a reader and a cache.
#[derive(Debug, Clone)]
pub struct MarketRegistry {
    engines: Vec<MarketEngine>,
    by_id: HashMap<String, usize>,
}

impl MarketRegistry {
    pub fn new(
        markets: Vec<Market>,
        reader: BatchReader,
        cache: Arc<ResultCache>,
        ttls: CacheTtls,
        limits: RangeLimits,
    ) -> Self {
        let engines: Vec<MarketEngine> = markets
            .into_iter()
            .map(|m| MarketEngine::new(Arc::new(m), reader.clone(), cache.clone(), ttls, limits))
            .collect();
        let by_id = engines
            .iter()
            .enumerate()
            .map(|(i, e)| (e.market().id.clone(), i))
            .collect();
        Self { engines, by_id }
    }

    /// Discover markets from `factory` and build their engines.
    pub async fn load(
        factory: &Address,
        reader: BatchReader,
        cache: Arc<ResultCache>,
        ttls: CacheTtls,
        limits: RangeLimits,
    ) -> Result<Self, LendError> {
        let markets = fetch_markets(&reader, factory).await?;
        Ok(Self::new(markets, reader, cache, ttls, limits))
    }

    pub fn get(&self, id: &str) -> Option<&MarketEngine> {
        self.by_id.get(id).map(|&i| &self.engines[i])
    }

    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.engines.iter().map(|e| e.market())
    }

    pub fn engines(&self) -> &[MarketEngine] {
        &self.engines
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
