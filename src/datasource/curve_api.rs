//! Pool listings from the public price API (USD prices and TVL per pool).

use super::TransportError;
use crate::domain::{Address, Decimal};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use tracing::{debug, warn};

/// Factory types queried for USD prices, in tie-break order.
pub const FACTORY_TYPES: [&str; 8] = [
    "main",
    "crypto",
    "factory",
    "factory-crvusd",
    "factory-crypto",
    "factory-tricrypto",
    "factory-stable-ng",
    "factory-twocrypto",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCoin {
    pub address: Address,
    pub usd_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolData {
    pub address: Address,
    pub coins: Vec<PoolCoin>,
    pub usd_total: Decimal,
}

/// Source of pool listings, one network/factory-type pair at a time.
#[async_trait]
pub trait PriceApi: Send + Sync + fmt::Debug {
    async fn fetch_pools(
        &self,
        network: &str,
        factory_type: &str,
    ) -> Result<Vec<PoolData>, TransportError>;
}

#[derive(Debug, Clone)]
pub struct CurveApiClient {
    client: Client,
    base_url: String,
}

impl CurveApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn pools_url(&self, network: &str, factory_type: &str) -> String {
        format!("{}/getPools/{}/{}", self.base_url, network, factory_type)
    }
}

#[async_trait]
impl PriceApi for CurveApiClient {
    async fn fetch_pools(
        &self,
        network: &str,
        factory_type: &str,
    ) -> Result<Vec<PoolData>, TransportError> {
        let url = self.pools_url(network, factory_type);
        debug!("Fetching pools from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == 429 {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            return Err(TransportError::HttpError {
                status: status.as_u16(),
                message: format!("GET {}", url),
            });
        }

        let json = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TransportError::ParseError(e.to_string()))?;
        parse_pools_response(&json)
    }
}

fn parse_number(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str_lenient(&n.to_string()).ok(),
        serde_json::Value::String(s) => Decimal::from_str_lenient(s).ok(),
        _ => None,
    }
}

/// Parse `{data: {poolData: [...], tvlAll}}`.
///
/// Pools or coins with unusable fields are skipped, not fatal.
pub fn parse_pools_response(json: &serde_json::Value) -> Result<Vec<PoolData>, TransportError> {
    let pools_json = json
        .get("data")
        .and_then(|d| d.get("poolData"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| TransportError::ParseError("Missing data.poolData".to_string()))?;

    let mut pools = Vec::with_capacity(pools_json.len());
    for pool_json in pools_json {
        match parse_pool(pool_json) {
            Ok(pool) => pools.push(pool),
            Err(e) => warn!("Failed to parse pool: {}", e),
        }
    }
    Ok(pools)
}

fn parse_pool(pool_json: &serde_json::Value) -> Result<PoolData, TransportError> {
    let address = pool_json
        .get("address")
        .and_then(|v| v.as_str())
        .ok_or_else(|| TransportError::ParseError("Missing address field".to_string()))?;
    let address = Address::parse(address)
        .map_err(|e| TransportError::ParseError(format!("Invalid pool address: {}", e)))?;

    let usd_total = pool_json
        .get("usdTotal")
        .and_then(parse_number)
        .unwrap_or_else(Decimal::zero);

    let coins = pool_json
        .get("coins")
        .and_then(|v| v.as_array())
        .ok_or_else(|| TransportError::ParseError("Missing coins field".to_string()))?
        .iter()
        .filter_map(|coin| {
            let address = coin.get("address").and_then(|v| v.as_str())?;
            let address = Address::parse(address).ok()?;
            let usd_price = coin.get("usdPrice").and_then(parse_number);
            Some(PoolCoin { address, usd_price })
        })
        .collect();

    Ok(PoolData {
        address,
        coins,
        usd_total,
    })
}
