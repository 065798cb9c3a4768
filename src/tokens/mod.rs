//! Token counting, truncation and token windowing

pub mod budget;
pub mod estimator;

pub use budget::{BudgetError, TokenBudget, TokenBudgetConfig, TokenInfo, TRUNCATION_MARKER};
pub use estimator::{default_estimator, CharRatioEstimator, TiktokenEstimator, TokenEstimator};
