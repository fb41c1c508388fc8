//! Coverage series and per-window summary statistics.

use crate::calendar::{DAYS_PER_YEAR, HOURS_PER_DAY, HourlyProfile, WEEKS_PER_YEAR};

/// Hourly coverage: renewable supply ÷ demand × 100, and 0 where demand is 0.
pub fn coverage_profile(renewable: &HourlyProfile, demand: &HourlyProfile) -> HourlyProfile {
    renewable.zip_with(demand, |supply, load| {
        if load == 0.0 {
            0.0
        } else {
            supply / load * 100.0
        }
    })
}

/// Summary of coverage over a contiguous run of days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// 0-based day of year the window starts on.
    pub start_day: usize,
    pub days: usize,
    pub mean: f64,
    /// Population variance.
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl WindowStats {
    /// Last day of the window (inclusive).
    pub fn end_day(&self) -> usize {
        self.start_day + self.days - 1
    }

    /// Computes the statistics of `values` for a window starting on
    /// `start_day` and spanning `days` days.
    pub fn from_values(values: &[f64], start_day: usize, days: usize) -> Self {
        if values.is_empty() {
            return Self {
                start_day,
                days,
                mean: 0.0,
                variance: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let n = values.len() as f64;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in values {
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        let mean = sum / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Self {
            start_day,
            days,
            mean,
            variance,
            min,
            max,
        }
    }
}

/// Statistics for each of the 365 days.
pub fn daily_stats(coverage: &HourlyProfile) -> Vec<WindowStats> {
    (0..DAYS_PER_YEAR)
        .map(|d| WindowStats::from_values(coverage.day_slice(d), d, 1))
        .collect()
}

/// Statistics for each of the 52 non-overlapping 7-day windows starting
/// on 1 January. The 365th day belongs to no week.
pub fn weekly_stats(coverage: &HourlyProfile) -> Vec<WindowStats> {
    let values = coverage.values();
    (0..WEEKS_PER_YEAR)
        .map(|w| {
            let start_day = w * 7;
            let start = start_day * HOURS_PER_DAY;
            WindowStats::from_values(&values[start..start + 7 * HOURS_PER_DAY], start_day, 7)
        })
        .collect()
}
