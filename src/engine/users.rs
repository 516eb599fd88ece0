//! Reads about one borrower, and health quotes for changes to an open loan.

use super::sizing::health_to_percent;
use super::MarketEngine;
use crate::datasource::{IController, IERC20, ILlamma, RawValue, ReadRequest};
use crate::domain::units::from_base_units;
use crate::domain::{Address, BandRange, UserPosition, UserState};
use crate::error::LendError;
use alloy_primitives::U256;

/// `read_user_tick_numbers` ordered so that `n1 <= n2`.
fn tick_numbers(raw: &RawValue) -> Result<BandRange, LendError> {
    let pair = raw.as_array(2)?;
    let a = pair[0].as_i64()?;
    let b = pair[1].as_i64()?;
    Ok(BandRange {
        n1: a.min(b),
        n2: a.max(b),
    })
}

impl MarketEngine {
    fn loan_exists_call(&self, address: &Address) -> ReadRequest {
        self.controller_call(IController::loan_existsCall {
            user: address.into(),
        })
    }

    fn user_state_call(&self, address: &Address) -> ReadRequest {
        self.controller_call(IController::user_stateCall {
            user: address.into(),
        })
    }

    fn user_ticks_call(&self, address: &Address) -> ReadRequest {
        self.amm_call(ILlamma::read_user_tick_numbersCall {
            user: address.into(),
        })
    }

    pub async fn loan_exists(&self, address: &Address) -> Result<bool, LendError> {
        self.reader
            .read_one(self.loan_exists_call(address))
            .await?
            .as_bool()
    }

    pub async fn user_state(&self, address: &Address) -> Result<UserState, LendError> {
        let value = self
            .reader
            .read_one(self.user_state_call(address))
            .await?;
        self.decode_user_state(&value)
    }

    fn decode_user_state(&self, value: &RawValue) -> Result<UserState, LendError> {
        let items = value.as_array(4)?;
        let range = items[3].as_u64()?;
        Ok(UserState {
            collateral: from_base_units(items[0].as_u256()?, self.collateral_decimals()),
            borrowed: from_base_units(items[1].as_u256()?, self.borrowed_decimals()),
            debt: from_base_units(items[2].as_u256()?, self.borrowed_decimals()),
            range: u32::try_from(range)
                .map_err(|_| LendError::batch_read(format!("band count {} out of range", range)))?,
        })
    }

    pub async fn user_bands(&self, address: &Address) -> Result<BandRange, LendError> {
        let value = self
            .reader
            .read_one(self.user_ticks_call(address))
            .await?;
        tick_numbers(&value)
    }

    /// Number of bands the loan spans; 0 without a loan.
    pub async fn user_range(&self, address: &Address) -> Result<u32, LendError> {
        let values = self
            .reader
            .batch(vec![
                self.loan_exists_call(address),
                self.user_ticks_call(address),
            ])
            .await?;
        if !values[0].as_bool()? {
            return Ok(0);
        }
        Ok(tick_numbers(&values[1])?.width())
    }

    /// Full position in one round-trip; `None` without a loan.
    pub async fn user_position(&self, address: &Address) -> Result<Option<UserPosition>, LendError> {
        let values = self
            .reader
            .batch(vec![
                self.loan_exists_call(address),
                self.user_state_call(address),
                self.user_ticks_call(address),
            ])
            .await?;
        if !values[0].as_bool()? {
            return Ok(None);
        }
        let state = self.decode_user_state(&values[1])?;
        let bands = tick_numbers(&values[2])?;
        let soft_liquidation = !values[1].as_array(4)?[1].as_u256()?.is_zero();
        Ok(Some(UserPosition {
            collateral: state.collateral,
            borrowed: state.borrowed,
            debt: state.debt,
            range: bands.width(),
            bands,
            soft_liquidation,
        }))
    }

    /// Collateral `owner` has approved the controller to pull, in base units.
    pub async fn collateral_allowance(&self, owner: &Address) -> Result<U256, LendError> {
        let market = &self.market;
        self.reader
            .read_one(ReadRequest::new(
                &market.collateral_token.address,
                IERC20::allowanceCall {
                    owner: owner.into(),
                    spender: (&market.controller).into(),
                },
            ))
            .await?
            .as_u256()
    }

    /// Current health of `address`'s loan, in percent.
    pub async fn user_health(&self, address: &Address, full: bool) -> Result<String, LendError> {
        let raw = self
            .reader
            .read_one(self.controller_call(IController::healthCall {
                user: address.into(),
                full,
            }))
            .await?
            .as_i128()?;
        Ok(health_to_percent(raw))
    }

    /// Range of an existing loan, or `Domain` if there is none.
    async fn existing_range(&self, address: &Address) -> Result<u32, LendError> {
        match self.user_range(address).await? {
            0 => Err(LendError::domain(format!("loan for {} does not exist", address))),
            range => Ok(range),
        }
    }

    pub async fn borrow_more_health(
        &self,
        address: &Address,
        collateral: &str,
        debt: &str,
        full: bool,
    ) -> Result<String, LendError> {
        let range = self.existing_range(address).await?;
        self.read_health(address, collateral, debt, range, full).await
    }

    pub async fn add_collateral_health(
        &self,
        address: &Address,
        collateral: &str,
        full: bool,
    ) -> Result<String, LendError> {
        let range = self.existing_range(address).await?;
        self.read_health(address, collateral, "0", range, full).await
    }

    pub async fn remove_collateral_health(
        &self,
        address: &Address,
        collateral: &str,
        full: bool,
    ) -> Result<String, LendError> {
        let range = self.existing_range(address).await?;
        self.read_health(address, &negate(collateral), "0", range, full)
            .await
    }

    pub async fn repay_health(
        &self,
        address: &Address,
        debt: &str,
        full: bool,
    ) -> Result<String, LendError> {
        let range = self.existing_range(address).await?;
        self.read_health(address, "0", &negate(debt), range, full).await
    }
}

fn negate(amount: &str) -> String {
    let trimmed = amount.trim();
    match trimmed.strip_prefix('-') {
        Some(rest) => rest.to_string(),
        None => format!("-{}", trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::datasource::{int256, MockChain};
    use std::sync::Arc;

    fn uint(v: U256) -> RawValue {
        RawValue::Uint(v)
    }

    fn borrower_chain(user: &Address, exists: bool) -> MockChain {
        let market = test_market();
        MockChain::new()
            .with_value(
                &market.controller,
                IController::loan_existsCall { user: user.into() },
                RawValue::Bool(exists),
            )
            .with_value(
                &market.controller,
                IController::user_stateCall { user: user.into() },
                RawValue::Array(vec![
                    uint(units("2", 8)),
                    uint(units("150", 18)),
                    uint(units("3000", 18)),
                    uint(U256::from(10u64)),
                ]),
            )
            .with_value(
                &market.amm,
                ILlamma::read_user_tick_numbersCall { user: user.into() },
                RawValue::Array(vec![RawValue::Int(12), RawValue::Int(3)]),
            )
    }

    #[tokio::test]
    async fn test_user_position_one_round_trip() {
        let user = addr(42);
        let chain = Arc::new(borrower_chain(&user, true));
        let engine = engine(chain.clone());

        let position = engine.user_position(&user).await.unwrap().unwrap();
        assert_eq!(position.collateral, "2.0");
        assert_eq!(position.borrowed, "150.0");
        assert_eq!(position.debt, "3000.0");
        assert_eq!(position.bands, BandRange { n1: 3, n2: 12 });
        assert_eq!(position.range, 10);
        assert!(position.soft_liquidation);
        assert_eq!(chain.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_user_without_loan() {
        let user = addr(42);
        let engine = engine(Arc::new(borrower_chain(&user, false)));
        assert_eq!(engine.user_position(&user).await.unwrap(), None);
        assert_eq!(engine.user_range(&user).await.unwrap(), 0);
        assert!(matches!(
            engine.repay_health(&user, "100", true).await,
            Err(LendError::Domain(_))
        ));
    }

    #[tokio::test]
    async fn test_repay_health_uses_negative_debt_delta_and_user_range() {
        let user = addr(42);
        let market = test_market();
        let chain = borrower_chain(&user, true).with_value(
            &market.controller,
            IController::health_calculatorCall {
                user: (&user).into(),
                d_collateral: int256(0),
                d_debt: int256(-100_000_000_000_000_000_000),
                full: false,
                n: U256::from(10u64),
            },
            RawValue::Int(120_000_000_000_000_000),
        );
        let engine = engine(Arc::new(chain));
        assert_eq!(engine.repay_health(&user, "100", false).await.unwrap(), "12.0");
    }

    #[test]
    fn test_negate() {
        assert_eq!(negate("1.5"), "-1.5");
        assert_eq!(negate("-2"), "2");
    }
}
