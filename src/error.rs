//! Error taxonomy for the temporal-reduction pipeline.
//!
//! Every fatal failure names the ISO (and technology or cell set where one
//! is involved) so a caller can retry that unit with relaxed inputs.

use thiserror::Error;

use crate::config::ConfigError;
use crate::resources::types::{CellId, Technology};

/// Maximum number of example cell ids quoted in a resolution failure.
pub const MAX_EXAMPLE_IDS: usize = 5;

/// Unified error type for timeslice generation.
#[derive(Error, Debug)]
pub enum TimesliceError {
    /// A required input is missing or empty for the ISO. Halts that ISO.
    #[error("data unavailable for {iso}: {what}")]
    DataUnavailable { iso: String, what: String },

    /// Hourly capacity-factor series could not be resolved for some cells.
    #[error(
        "unresolved {technology} shapes for {iso}: {total} cell(s) missing (e.g. {})",
        format_ids(.examples)
    )]
    ShapeResolutionFailure {
        iso: String,
        technology: Technology,
        examples: Vec<CellId>,
        total: usize,
    },

    /// Scenario or engine configuration is invalid.
    #[error("configuration error: {}", format_config_errors(.0))]
    Configuration(Vec<ConfigError>),

    /// Neither technology has a cost-competitive resource. Callers treat
    /// this as informational; the allocator never returns it as `Err`.
    #[error("no relevant renewable resource for {iso}")]
    AllocationInfeasible { iso: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TimesliceError>;

impl TimesliceError {
    /// Builds a resolution failure from the full list of unresolved ids.
    pub fn unresolved(iso: &str, technology: Technology, missing: &[CellId]) -> Self {
        let mut examples: Vec<CellId> = missing.to_vec();
        examples.sort_unstable();
        examples.truncate(MAX_EXAMPLE_IDS);
        Self::ShapeResolutionFailure {
            iso: iso.to_string(),
            technology,
            examples,
            total: missing.len(),
        }
    }

    /// Shorthand for a single configuration problem.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration(vec![ConfigError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn unavailable(iso: &str, what: impl Into<String>) -> Self {
        Self::DataUnavailable {
            iso: iso.to_string(),
            what: what.into(),
        }
    }

    /// Whether this error halts the ISO run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::AllocationInfeasible { .. })
    }
}

fn format_ids(ids: &[CellId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
