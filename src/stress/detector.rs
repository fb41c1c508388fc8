//! Selection of explicit stress windows from coverage statistics.
//!
//! Daily selection draws scarcity, surplus and volatile days from a shared
//! pool so no day is picked twice. Weekly selection only supports the
//! scarcity direction. Daily and weekly picks are concatenated as-is when
//! both are requested.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::metrics::{WindowStats, coverage_profile, daily_stats, weekly_stats};
use crate::calendar::{HOURS_PER_DAY, HourlyProfile, format_mm_dd};
use crate::error::{Result, TimesliceError};

/// Volatile days must not be in surplus on average (coverage ≤ 100%).
pub const VOLATILE_MAX_MEAN_COVERAGE: f64 = 100.0;

/// Kind of adequacy extreme a period represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressCategory {
    /// Lowest mean coverage.
    Scarcity,
    /// Highest mean coverage.
    Surplus,
    /// Highest coverage variance among non-surplus days.
    Volatile,
    /// Lowest mean coverage over a whole week.
    SustainedStress,
}

impl StressCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            StressCategory::Scarcity => "scarcity",
            StressCategory::Surplus => "surplus",
            StressCategory::Volatile => "volatile",
            StressCategory::SustainedStress => "sustained_stress",
        }
    }
}

impl fmt::Display for StressCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window length a period was selected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Daily,
    Weekly,
}

/// Coverage statistics (percent) of a selected window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageStats {
    pub mean: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

/// An explicitly retained calendar window.
#[derive(Debug, Clone, PartialEq)]
pub struct StressPeriod {
    /// `<category>_<rank>`, rank 1 being the most extreme.
    pub id: String,
    pub category: StressCategory,
    pub granularity: Granularity,
    /// 0-based day of year of the first day.
    pub start_day: usize,
    /// 0-based day of year of the last day (inclusive).
    pub end_day: usize,
    pub duration_days: usize,
    pub coverage: CoverageStats,
}

impl StressPeriod {
    fn from_window(
        category: StressCategory,
        granularity: Granularity,
        rank: usize,
        w: &WindowStats,
    ) -> Self {
        Self {
            id: format!("{}_{:02}", category.as_str(), rank + 1),
            category,
            granularity,
            start_day: w.start_day,
            end_day: w.end_day(),
            duration_days: w.days,
            coverage: CoverageStats {
                mean: w.mean,
                variance: w.variance,
                min: w.min,
                max: w.max,
            },
        }
    }

    pub fn days(&self) -> RangeInclusive<usize> {
        self.start_day..=self.end_day
    }

    pub fn hours(&self) -> usize {
        self.duration_days * HOURS_PER_DAY
    }

    pub fn start_mm_dd(&self) -> String {
        format_mm_dd(self.start_day)
    }

    pub fn end_mm_dd(&self) -> String {
        format_mm_dd(self.end_day)
    }
}

/// Requested number of windows per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StressCounts {
    pub scarcity: usize,
    pub surplus: usize,
    pub volatile: usize,
}

impl StressCounts {
    /// Sum of the three counts, saturating at `usize::MAX`.
    pub fn total(&self) -> usize {
        self.scarcity
            .saturating_add(self.surplus)
            .saturating_add(self.volatile)
    }
}

/// Per-scenario stress request. `None` at both granularities means pure
/// clustering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StressRequest {
    pub daily: Option<StressCounts>,
    pub weekly: Option<StressCounts>,
}

impl StressRequest {
    pub fn is_empty(&self) -> bool {
        self.daily.is_none_or(|c| c.total() == 0) && self.weekly.is_none_or(|c| c.total() == 0)
    }
}

/// Daily and weekly coverage statistics for one ISO.
#[derive(Debug, Clone)]
pub struct StressDetector {
    daily: Vec<WindowStats>,
    weekly: Vec<WindowStats>,
}

impl StressDetector {
    /// Builds the detector from an hourly coverage series (percent).
    pub fn new(coverage: &HourlyProfile) -> Self {
        Self {
            daily: daily_stats(coverage),
            weekly: weekly_stats(coverage),
        }
    }

    /// Builds the detector from renewable supply and demand.
    pub fn from_profiles(renewable: &HourlyProfile, demand: &HourlyProfile) -> Self {
        Self::new(&coverage_profile(renewable, demand))
    }

    pub fn daily(&self) -> &[WindowStats] {
        &self.daily
    }

    pub fn weekly(&self) -> &[WindowStats] {
        &self.weekly
    }

    /// Runs the daily and weekly selections and concatenates the results
    /// (daily first) without de-duplicating days across granularities.
    ///
    /// # Errors
    ///
    /// `Configuration` if weekly surplus or volatile windows are requested.
    pub fn detect(&self, request: &StressRequest) -> Result<Vec<StressPeriod>> {
        let mut periods = Vec::new();
        if let Some(counts) = request.daily {
            periods.extend(self.select_daily(&counts));
        }
        if let Some(counts) = request.weekly {
            periods.extend(self.select_weekly(&counts)?);
        }
        Ok(periods)
    }

    /// Picks scarcity, then surplus, then volatile days from a shrinking pool.
    pub fn select_daily(&self, counts: &StressCounts) -> Vec<StressPeriod> {
        let mut taken: BTreeSet<usize> = BTreeSet::new();
        let mut periods = Vec::with_capacity(counts.total().min(self.daily.len()));

        let scarcity = pick(&self.daily, &taken, counts.scarcity, |_| true, |a, b| {
            a.mean.total_cmp(&b.mean)
        });
        record(&mut periods, &mut taken, StressCategory::Scarcity, &scarcity, counts.scarcity);

        let surplus = pick(&self.daily, &taken, counts.surplus, |_| true, |a, b| {
            b.mean.total_cmp(&a.mean)
        });
        record(&mut periods, &mut taken, StressCategory::Surplus, &surplus, counts.surplus);

        let volatile = pick(
            &self.daily,
            &taken,
            counts.volatile,
            |w| w.mean <= VOLATILE_MAX_MEAN_COVERAGE,
            |a, b| b.variance.total_cmp(&a.variance),
        );
        record(&mut periods, &mut taken, StressCategory::Volatile, &volatile, counts.volatile);

        periods
    }

    /// Picks the weeks of lowest mean coverage.
    ///
    /// # Errors
    ///
    /// `Configuration` if `counts` asks for surplus or volatile weeks.
    pub fn select_weekly(&self, counts: &StressCounts) -> Result<Vec<StressPeriod>> {
        let mut unsupported = Vec::new();
        if counts.surplus > 0 {
            unsupported.push(crate::config::ConfigError {
                field: "weekly.surplus".into(),
                message: "weekly surplus selection is not supported".into(),
            });
        }
        if counts.volatile > 0 {
            unsupported.push(crate::config::ConfigError {
                field: "weekly.volatile".into(),
                message: "weekly volatile selection is not supported".into(),
            });
        }
        if !unsupported.is_empty() {
            return Err(TimesliceError::Configuration(unsupported));
        }

        let weeks = pick(&self.weekly, &BTreeSet::new(), counts.scarcity, |_| true, |a, b| {
            a.mean.total_cmp(&b.mean)
        });
        if weeks.len() < counts.scarcity {
            warn!(
                requested = counts.scarcity,
                available = weeks.len(),
                "not enough weeks for sustained stress selection"
            );
        }
        Ok(weeks
            .iter()
            .enumerate()
            .map(|(rank, w)| {
                StressPeriod::from_window(
                    StressCategory::SustainedStress,
                    Granularity::Weekly,
                    rank,
                    w,
                )
            })
            .collect())
    }
}

/// Takes up to `count` windows not in `taken` that pass `eligible`, best
/// first according to `order`; ties keep calendar order.
fn pick(
    windows: &[WindowStats],
    taken: &BTreeSet<usize>,
    count: usize,
    eligible: impl Fn(&WindowStats) -> bool,
    order: impl Fn(&WindowStats, &WindowStats) -> Ordering,
) -> Vec<WindowStats> {
    if count == 0 {
        return Vec::new();
    }
    let mut pool: Vec<WindowStats> = windows
        .iter()
        .filter(|w| !taken.contains(&w.start_day) && eligible(w))
        .copied()
        .collect();
    // stable sort keeps calendar order among equal keys
    pool.sort_by(|a, b| order(a, b));
    pool.truncate(count);
    pool
}

fn record(
    periods: &mut Vec<StressPeriod>,
    taken: &mut BTreeSet<usize>,
    category: StressCategory,
    picked: &[WindowStats],
    requested: usize,
) {
    if picked.len() < requested {
        warn!(
            %category,
            requested,
            available = picked.len(),
            "not enough eligible days for stress category"
        );
    }
    for (rank, w) in picked.iter().enumerate() {
        taken.insert(w.start_day);
        periods.push(StressPeriod::from_window(category, Granularity::Daily, rank, w));
    }
}
