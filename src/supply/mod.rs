//! Supply-side inputs: demand, baseline generation and their providers.

/// Baseline generation and the residual renewable requirement.
pub mod baseline;
/// Hourly demand providers.
pub mod demand;
pub mod provider;

pub use baseline::{BaselineRule, BaselineTechnology, MonthlyBaseline};
pub use provider::{DataProvider, Provided, ProviderChain};
