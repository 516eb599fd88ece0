pub mod loan;
pub mod registry;

pub use loan::{CreatedLoan, LoanPlan, LoanPlanner};
pub use registry::{fetch_markets, MarketRegistry};
