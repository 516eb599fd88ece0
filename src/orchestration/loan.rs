//! Loan creation: preflight quote, allowance check, gas estimate, send.

use crate::datasource::{ContractWriter, IController, TxOverrides, WriteRequest};
use crate::domain::units::{from_base_units, to_base_units};
use crate::domain::{Address, BandRange, LoanPrices};
use crate::engine::MarketEngine;
use crate::error::LendError;
use alloy_primitives::U256;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Gas limit sent with a transaction, in percent of the estimate.
const GAS_BUFFER_PCT: u64 = 130;

/// Everything known about a loan before it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPlan {
    pub owner: Address,
    pub collateral: String,
    pub debt: String,
    pub range: u32,
    pub bands: BandRange,
    pub prices: LoanPrices,
    pub health: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedLoan {
    pub plan: LoanPlan,
    pub gas_limit: u64,
    pub tx_hash: String,
}

#[derive(Debug, Clone)]
pub struct LoanPlanner {
    engine: MarketEngine,
    writer: Arc<dyn ContractWriter>,
}

impl LoanPlanner {
    pub fn new(engine: MarketEngine, writer: Arc<dyn ContractWriter>) -> Self {
        Self { engine, writer }
    }

    /// Quote a new loan for `owner` without touching state.
    pub async fn plan_create_loan(
        &self,
        owner: &Address,
        collateral: &str,
        debt: &str,
        range: u32,
    ) -> Result<LoanPlan, LendError> {
        self.engine.check_range(range)?;
        let market = self.engine.market();
        to_base_units(collateral, market.collateral_token.decimals)?;
        to_base_units(debt, market.borrowed_token.decimals)?;

        if self.engine.loan_exists(owner).await? {
            return Err(LendError::domain(format!("loan for {} already exists", owner)));
        }

        let (prices, health) = futures::try_join!(
            self.engine.create_loan_prices(collateral, debt, range),
            self.engine.create_loan_health(collateral, debt, range, true),
        )?;
        Ok(LoanPlan {
            owner: owner.clone(),
            collateral: collateral.to_string(),
            debt: debt.to_string(),
            range,
            bands: prices.bands,
            prices,
            health,
        })
    }

    /// Open the loan. Fails with `ApproveRequired` before estimating gas if
    /// the controller cannot pull the collateral yet.
    pub async fn create_loan(
        &self,
        owner: &Address,
        collateral: &str,
        debt: &str,
        range: u32,
    ) -> Result<CreatedLoan, LendError> {
        let plan = self.plan_create_loan(owner, collateral, debt, range).await?;
        let market = self.engine.market();
        let token = &market.collateral_token;

        let required = to_base_units(collateral, token.decimals)?;
        let allowance = self.engine.collateral_allowance(owner).await?;
        if allowance < required {
            return Err(LendError::ApproveRequired {
                token: token.symbol.clone(),
                required: from_base_units(required, token.decimals),
                allowance: from_base_units(allowance, token.decimals),
            });
        }

        let request = WriteRequest::new(
            owner,
            &market.controller,
            IController::create_loanCall {
                collateral: required,
                debt: to_base_units(debt, market.borrowed_token.decimals)?,
                n: U256::from(range),
            },
        );
        let estimate = self.writer.estimate_gas(&request).await?;
        let gas_limit = estimate.saturating_mul(GAS_BUFFER_PCT) / 100;
        let tx_hash = self
            .writer
            .send(
                &request,
                TxOverrides {
                    gas_limit: Some(gas_limit),
                },
            )
            .await?;
        info!(
            "Sent create_loan on {} for {}: {}",
            market.id, owner, tx_hash
        );
        Ok(CreatedLoan {
            plan,
            gas_limit,
            tx_hash,
        })
    }
}
