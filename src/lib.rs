pub mod api;
pub mod cache;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use cache::{CacheKey, CacheTtls, ResultCache};
pub use config::Config;
pub use datasource::{BatchReader, ContractReader, ContractWriter, JsonRpcReader, PriceApi};
pub use domain::{Address, BandRange, Decimal, Market, RangeLimits};
pub use engine::{BandGeometry, MarketEngine, UsdPriceBook};
pub use error::{AppError, LendError};
pub use orchestration::{LoanPlanner, MarketRegistry};
