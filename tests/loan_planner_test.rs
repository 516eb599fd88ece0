mod common;

use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use common::*;
use llamaband::datasource::{
    int256, IController, IERC20, ILlamma, MockChain, MockWriter, RawValue,
};
use llamaband::{Address, BandRange, LendError, LoanPlanner};
use std::sync::Arc;

fn owner() -> Address {
    addr(0x77)
}

/// Chain quoting a 1 WETH / 1000 crvUSD loan over 10 bands.
fn loan_chain(exists: bool, allowance: &str) -> MockChain {
    let m = market();
    MockChain::new()
        .with_value(
            &m.controller,
            IController::loan_existsCall {
                user: (&owner()).into(),
            },
            RawValue::Bool(exists),
        )
        .with_value(
            &m.controller,
            IController::calculate_debt_n1Call {
                collateral: units("1", 18),
                debt: units("1000", 18),
                n: U256::from(10u64),
            },
            RawValue::Int(15),
        )
        .with_value(&m.amm, ILlamma::p_oracle_downCall { n: int256(24) }, wad("1500"))
        .with_value(&m.amm, ILlamma::p_oracle_upCall { n: int256(15) }, wad("1700"))
        .with_value(
            &m.controller,
            IController::health_calculatorCall {
                user: (&Address::zero()).into(),
                d_collateral: int256(1_000_000_000_000_000_000),
                d_debt: int256(1_000_000_000_000_000_000_000),
                full: true,
                n: U256::from(10u64),
            },
            RawValue::Int(420_000_000_000_000_000),
        )
        .with_value(
            &m.collateral_token.address,
            IERC20::allowanceCall {
                owner: (&owner()).into(),
                spender: (&m.controller).into(),
            },
            wad(allowance),
        )
}

fn planner(chain: Arc<MockChain>, writer: Arc<MockWriter>) -> LoanPlanner {
    LoanPlanner::new(engine(chain), writer)
}

#[tokio::test]
async fn test_plan_create_loan() {
    let chain = Arc::new(loan_chain(false, "0"));
    let planner = planner(chain, Arc::new(MockWriter::new(300_000)));

    let plan = planner
        .plan_create_loan(&owner(), "1", "1000", 10)
        .await
        .unwrap();
    assert_eq!(plan.bands, BandRange { n1: 15, n2: 24 });
    assert_eq!(plan.prices.lower, "1500.0");
    assert_eq!(plan.prices.upper, "1700.0");
    assert_eq!(plan.health, "42.0");
}

#[tokio::test]
async fn test_plan_rejects_existing_loan() {
    let chain = Arc::new(loan_chain(true, "0"));
    let planner = planner(chain, Arc::new(MockWriter::new(300_000)));
    assert!(matches!(
        planner.plan_create_loan(&owner(), "1", "1000", 10).await,
        Err(LendError::Domain(_))
    ));
}

#[tokio::test]
async fn test_plan_validates_before_network() {
    let chain = Arc::new(MockChain::new());
    let planner = planner(chain.clone(), Arc::new(MockWriter::new(300_000)));

    assert!(matches!(
        planner.plan_create_loan(&owner(), "1", "1000", 60).await,
        Err(LendError::RangeOutOfBounds { range: 60, .. })
    ));
    assert!(matches!(
        planner.plan_create_loan(&owner(), "1 WETH", "1000", 10).await,
        Err(LendError::InvalidNumber(_))
    ));
    assert_eq!(chain.batch_count(), 0);
}

#[tokio::test]
async fn test_create_loan_requires_approval_before_gas_estimate() {
    let chain = Arc::new(loan_chain(false, "0.5"));
    let writer = Arc::new(MockWriter::new(300_000));
    let planner = planner(chain, writer.clone());

    match planner.create_loan(&owner(), "1", "1000", 10).await {
        Err(LendError::ApproveRequired {
            token,
            required,
            allowance,
        }) => {
            assert_eq!(token, "WETH");
            assert_eq!(required, "1.0");
            assert_eq!(allowance, "0.5");
        }
        other => panic!("expected ApproveRequired, got {:?}", other),
    }
    assert!(writer.estimated().is_empty());
    assert!(writer.sent().is_empty());
}

#[tokio::test]
async fn test_create_loan_sends_with_gas_buffer() {
    let chain = Arc::new(loan_chain(false, "1"));
    let writer = Arc::new(MockWriter::new(300_000));
    let planner = planner(chain, writer.clone());

    let created = planner
        .create_loan(&owner(), "1", "1000", 10)
        .await
        .unwrap();
    assert_eq!(created.gas_limit, 390_000);
    assert_eq!(created.tx_hash.len(), 66);

    let sent = writer.sent();
    assert_eq!(sent.len(), 1);
    let (request, overrides) = &sent[0];
    assert_eq!(request.method(), "create_loan");
    assert_eq!(
        request.calldata,
        IController::create_loanCall {
            collateral: units("1", 18),
            debt: units("1000", 18),
            n: U256::from(10u64),
        }
        .abi_encode()
    );
    assert_eq!(request.from, owner());
    assert_eq!(request.contract, market().controller);
    assert_eq!(overrides.gas_limit, Some(390_000));
    assert_eq!(writer.estimated().len(), 1);
}
