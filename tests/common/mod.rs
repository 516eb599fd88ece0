#![allow(dead_code)]

use alloy_primitives::U256;
use llamaband::datasource::{IController, MockChain, RawValue};
use llamaband::domain::units::to_base_units;
use llamaband::domain::TokenInfo;
use llamaband::{Address, BatchReader, CacheTtls, Market, MarketEngine, RangeLimits, ResultCache};
use std::sync::Arc;

pub fn addr(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address::from_bytes(bytes)
}

pub fn units(s: &str, decimals: u8) -> U256 {
    to_base_units(s, decimals).unwrap()
}

/// 1e18-scaled value.
pub fn wad(s: &str) -> RawValue {
    RawValue::Uint(units(s, 18))
}

pub fn market() -> Market {
    Market {
        id: "one-way-market-0".to_string(),
        amm: addr(1),
        controller: addr(2),
        monetary_policy: addr(3),
        vault: addr(4),
        borrowed_token: TokenInfo {
            address: addr(10),
            name: "Curve.Fi USD Stablecoin".to_string(),
            symbol: "crvUSD".to_string(),
            decimals: 18,
        },
        collateral_token: TokenInfo {
            address: addr(11),
            name: "Wrapped Ether".to_string(),
            symbol: "WETH".to_string(),
            decimals: 18,
        },
    }
}

pub fn engine_with(chain: Arc<MockChain>, ttls: CacheTtls) -> MarketEngine {
    MarketEngine::new(
        Arc::new(market()),
        BatchReader::new(chain, 500),
        Arc::new(ResultCache::new()),
        ttls,
        RangeLimits::default(),
    )
}

pub fn engine(chain: Arc<MockChain>) -> MarketEngine {
    engine_with(chain, CacheTtls::default())
}

/// `max_borrowable(collateral, n)` for every range 4..=50: 1200 up to
/// range 10, 950 from range 11 on.
pub fn max_borrowable_chain(collateral: &str) -> MockChain {
    let m = market();
    let collateral = units(collateral, 18);
    let mut chain = MockChain::new();
    for n in 4u64..=50 {
        let value = if n <= 10 { "1200" } else { "950" };
        chain = chain.with_value(
            &m.controller,
            IController::max_borrowableCall {
                collateral,
                n: U256::from(n),
            },
            wad(value),
        );
    }
    chain
}
