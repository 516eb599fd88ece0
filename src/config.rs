use crate::cache::CacheTtls;
use crate::domain::{Address, RangeLimits};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rpc_url: String,
    pub factory_address: Address,
    pub network: String,
    pub price_api_url: String,
    pub range_limits: RangeLimits,
    pub max_batch_size: usize,
    pub cache_ttls: CacheTtls,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
    expected: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), format!("must be a valid {}", expected)))
}

fn ttl_secs(env_map: &HashMap<String, String>, key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(env_map, key, &default.as_secs().to_string(), "number of seconds")?;
    Ok(Duration::from_secs(secs))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or::<u16>(&env_map, "PORT", "8080", "u16")?;

        let rpc_url = env_map
            .get("RPC_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("RPC_URL".to_string()))?;

        let factory_address = env_map
            .get("FACTORY_ADDRESS")
            .ok_or_else(|| ConfigError::MissingEnv("FACTORY_ADDRESS".to_string()))?;
        let factory_address = Address::parse(factory_address).map_err(|e| {
            ConfigError::InvalidValue("FACTORY_ADDRESS".to_string(), e.to_string())
        })?;

        let network = env_map
            .get("NETWORK")
            .cloned()
            .unwrap_or_else(|| "ethereum".to_string());

        let price_api_url = env_map
            .get("PRICE_API_URL")
            .cloned()
            .unwrap_or_else(|| "https://api.curve.fi/api".to_string());

        let min_range = parse_or::<u32>(&env_map, "MIN_RANGE", "4", "u32")?;
        let max_range = parse_or::<u32>(&env_map, "MAX_RANGE", "50", "u32")?;
        if min_range == 0 || min_range > max_range {
            return Err(ConfigError::InvalidValue(
                "MIN_RANGE".to_string(),
                format!("must be in [1, MAX_RANGE], got {}", min_range),
            ));
        }

        let max_batch_size = parse_or::<usize>(&env_map, "MAX_BATCH_SIZE", "500", "usize")?;
        if max_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_BATCH_SIZE".to_string(),
                "must be positive".to_string(),
            ));
        }

        let defaults = CacheTtls::default();
        let cache_ttls = CacheTtls {
            fast: ttl_secs(&env_map, "CACHE_TTL_FAST_SECS", defaults.fast)?,
            per_block: ttl_secs(&env_map, "CACHE_TTL_BLOCK_SECS", defaults.per_block)?,
            rates: ttl_secs(&env_map, "CACHE_TTL_RATES_SECS", defaults.rates)?,
            constants: ttl_secs(&env_map, "CACHE_TTL_CONSTANTS_SECS", defaults.constants)?,
            usd_prices: ttl_secs(&env_map, "CACHE_TTL_USD_PRICES_SECS", defaults.usd_prices)?,
        };

        Ok(Config {
            port,
            rpc_url,
            factory_address,
            network,
            price_api_url,
            range_limits: RangeLimits::new(min_range, max_range),
            max_batch_size,
            cache_ttls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("RPC_URL".to_string(), "http://localhost:8545".to_string());
        map.insert(
            "FACTORY_ADDRESS".to_string(),
            "0xeA6876DDE9e3467564acBeE1Ed5bac88783205E0".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.network, "ethereum");
        assert_eq!(config.range_limits, RangeLimits::new(4, 50));
        assert_eq!(config.max_batch_size, 500);
        assert_eq!(config.cache_ttls, CacheTtls::default());
        assert_eq!(
            config.factory_address.as_str(),
            "0xea6876dde9e3467564acbee1ed5bac88783205e0"
        );
    }

    #[test]
    fn test_missing_rpc_url() {
        let mut env_map = setup_required_env();
        env_map.remove("RPC_URL");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "RPC_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_factory_address() {
        let mut env_map = setup_required_env();
        env_map.remove("FACTORY_ADDRESS");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "FACTORY_ADDRESS"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_factory_address() {
        let mut env_map = setup_required_env();
        env_map.insert("FACTORY_ADDRESS".to_string(), "factory".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "FACTORY_ADDRESS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_inverted_range_limits() {
        let mut env_map = setup_required_env();
        env_map.insert("MIN_RANGE".to_string(), "60".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MIN_RANGE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_ttl_override() {
        let mut env_map = setup_required_env();
        env_map.insert("CACHE_TTL_FAST_SECS".to_string(), "3".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.cache_ttls.fast, Duration::from_secs(3));
        assert_eq!(config.cache_ttls.per_block, Duration::from_secs(60));
    }
}
