//! Coverage statistics and explicit stress-period selection.

pub mod detector;
pub mod metrics;

pub use detector::{
    CoverageStats, Granularity, StressCategory, StressCounts, StressDetector, StressPeriod,
    StressRequest,
};
pub use metrics::{WindowStats, coverage_profile};
