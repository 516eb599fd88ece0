//! Contract interfaces of a lending market and the decoding of their return data.

use super::{RawValue, TransportError};
use crate::domain::Address;
use alloy_primitives::{I256, U256};
use alloy_sol_types::{sol, SolCall};

sol! {
    /// LLAMMA: the band AMM holding a market's collateral.
    interface ILlamma {
        function A() external view returns (uint256);
        function get_base_price() external view returns (uint256);
        function price_oracle() external view returns (uint256);
        function get_p() external view returns (uint256);
        function active_band() external view returns (int256);
        function active_band_with_skip() external view returns (int256);
        function min_band() external view returns (int256);
        function max_band() external view returns (int256);
        function bands_x(int256 n) external view returns (uint256);
        function bands_y(int256 n) external view returns (uint256);
        function p_oracle_up(int256 n) external view returns (uint256);
        function p_oracle_down(int256 n) external view returns (uint256);
        function read_user_tick_numbers(address user) external view returns (int256[2] memory);
        function fee() external view returns (uint256);
        function admin_fee() external view returns (uint256);
        function admin_fees_x() external view returns (uint256);
        function admin_fees_y() external view returns (uint256);
    }

    /// Loan controller of a market.
    interface IController {
        function max_borrowable(uint256 collateral, uint256 n) external view returns (uint256);
        function calculate_debt_n1(uint256 collateral, uint256 debt, uint256 n) external view returns (int256);
        function health_calculator(address user, int256 d_collateral, int256 d_debt, bool full, uint256 n) external view returns (int256);
        function health(address user, bool full) external view returns (int256);
        function user_state(address user) external view returns (uint256[4] memory);
        function loan_exists(address user) external view returns (bool);
        function total_debt() external view returns (uint256);
        function liquidation_discount() external view returns (uint256);
        function loan_discount() external view returns (uint256);
        function create_loan(uint256 collateral, uint256 debt, uint256 n) external;
    }

    interface IMonetaryPolicy {
        function rate(address controller) external view returns (uint256);
    }

    interface IVault {
        function totalAssets() external view returns (uint256);
    }

    /// One-way lending factory.
    interface IFactory {
        function market_count() external view returns (uint256);
        function controllers(uint256 i) external view returns (address);
        function amms(uint256 i) external view returns (address);
        function monetary_policies(uint256 i) external view returns (address);
        function vaults(uint256 i) external view returns (address);
        function borrowed_tokens(uint256 i) external view returns (address);
        function collateral_tokens(uint256 i) external view returns (address);
    }

    interface IERC20 {
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

/// Return type of a view call that can be carried as a [`RawValue`].
pub trait IntoRawValue {
    fn into_raw(self) -> Result<RawValue, TransportError>;
}

impl IntoRawValue for U256 {
    fn into_raw(self) -> Result<RawValue, TransportError> {
        Ok(RawValue::Uint(self))
    }
}

impl IntoRawValue for u8 {
    fn into_raw(self) -> Result<RawValue, TransportError> {
        Ok(RawValue::Uint(U256::from(self)))
    }
}

impl IntoRawValue for I256 {
    fn into_raw(self) -> Result<RawValue, TransportError> {
        i128::try_from(self)
            .map(RawValue::Int)
            .map_err(|_| TransportError::ParseError(format!("int256 {} exceeds int128", self)))
    }
}

impl IntoRawValue for bool {
    fn into_raw(self) -> Result<RawValue, TransportError> {
        Ok(RawValue::Bool(self))
    }
}

impl IntoRawValue for alloy_primitives::Address {
    fn into_raw(self) -> Result<RawValue, TransportError> {
        Ok(RawValue::Address(Address::from(self)))
    }
}

impl IntoRawValue for String {
    fn into_raw(self) -> Result<RawValue, TransportError> {
        Ok(RawValue::Str(self))
    }
}

impl<T: IntoRawValue, const N: usize> IntoRawValue for [T; N] {
    fn into_raw(self) -> Result<RawValue, TransportError> {
        self.into_iter()
            .map(IntoRawValue::into_raw)
            .collect::<Result<Vec<_>, _>>()
            .map(RawValue::Array)
    }
}

/// Decode the return data of `C`.
pub(crate) fn decode_returns<C>(data: &[u8]) -> Result<RawValue, TransportError>
where
    C: SolCall,
    C::Return: IntoRawValue,
{
    C::abi_decode_returns(data)
        .map_err(|e| TransportError::ParseError(format!("{}: {}", C::SIGNATURE, e)))?
        .into_raw()
}

/// Signed call argument, e.g. a band index or a collateral delta.
pub fn int256(value: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}
