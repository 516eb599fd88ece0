//! Domain types for the lending market read layer.
//!
//! This module provides:
//! - Decimal prices with truncating arithmetic
//! - Base-unit conversion for token amounts
//! - Address and token primitives
//! - Market descriptors and query read models

pub mod decimal;
pub mod market;
pub mod primitives;
pub mod units;

pub use decimal::Decimal;
pub use market::{
    AmmBalances, BandBalances, BandRange, BandsInfo, CapAndAvailable, LoanPrices, Market,
    MarketParameters, MarketRates, MarketStats, MaxBorrowableTable, RangeLimits, UserPosition,
    UserState,
};
pub use primitives::{Address, AddressParseError, TokenInfo};
