//! Contiguous season and diurnal-period clustering of net load.
//!
//! Months and hours of the day are treated as circular sequences (December
//! neighbours January, hour 23 neighbours hour 0). Clusters are always one
//! contiguous circular run, so a season never consists of two separate
//! stretches of the year.

use serde::Serialize;
use tracing::debug;

use crate::calendar::{HOURS_PER_DAY, HourlyProfile, MONTH_DAYS};
use crate::error::{Result, TimesliceError};

/// Hours (inclusive) averaged for the daytime feature.
pub const DAYTIME_HOURS: std::ops::RangeInclusive<usize> = 10..=15;
/// Hours (inclusive) averaged for the evening-peak feature.
pub const EVENING_HOURS: std::ops::RangeInclusive<usize> = 17..=20;

/// Month features: mean, max, min, stdev, daytime mean, evening mean.
pub type MonthFeatures = [f64; 6];
/// Hour-of-day features: mean, max, stdev, 95th percentile.
pub type HourFeatures = [f64; 4];

/// Month → season label and hour → diurnal label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationScheme {
    /// Season label per month, January first.
    pub month_labels: [String; 12],
    /// Diurnal label per hour of day, hour 0 first.
    pub hour_labels: [String; 24],
}

impl AggregationScheme {
    /// A single season and a single diurnal period.
    pub fn single() -> Self {
        Self {
            month_labels: std::array::from_fn(|_| label('S', 0)),
            hour_labels: std::array::from_fn(|_| label('H', 0)),
        }
    }

    pub fn season_of(&self, month: usize) -> &str {
        &self.month_labels[month - 1]
    }

    pub fn period_of(&self, hour: usize) -> &str {
        &self.hour_labels[hour]
    }

    pub fn season_count(&self) -> usize {
        distinct(&self.month_labels)
    }

    pub fn period_count(&self) -> usize {
        distinct(&self.hour_labels)
    }

    /// Number of aggregated timeslices (season × diurnal period).
    pub fn timeslice_count(&self) -> usize {
        self.season_count() * self.period_count()
    }
}

fn distinct(labels: &[String]) -> usize {
    let mut seen: Vec<&str> = labels.iter().map(String::as_str).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

fn label(prefix: char, index: usize) -> String {
    format!("{prefix}{:02}", index + 1)
}

/// Clusters months into seasons and hours into diurnal periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousAggregator {
    pub seasons: usize,
    pub diurnal_periods: usize,
}

impl ContiguousAggregator {
    pub fn new(seasons: usize, diurnal_periods: usize) -> Self {
        Self {
            seasons,
            diurnal_periods,
        }
    }

    /// Builds the aggregation scheme from an hourly net-load profile.
    ///
    /// # Errors
    ///
    /// `Configuration` if either requested count is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use timeslicer::aggregate::ContiguousAggregator;
    /// use timeslicer::calendar::HourlyProfile;
    ///
    /// // higher load in the first half of each day
    /// let net = HourlyProfile::from_fn(|h| if h % 24 < 12 { 100.0 } else { 10.0 });
    /// let scheme = ContiguousAggregator::new(1, 2).aggregate(&net).unwrap();
    /// assert_eq!(scheme.period_of(0), "H01");
    /// assert_eq!(scheme.period_of(12), "H02");
    /// assert_eq!(scheme.season_count(), 1);
    /// ```
    pub fn aggregate(&self, net_load: &HourlyProfile) -> Result<AggregationScheme> {
        let months = month_features(net_load);
        let hours = hour_features(net_load);
        let seasons = circular_clusters(&months, self.seasons)
            .map_err(|_| zero_count("seasons"))?;
        let periods = circular_clusters(&hours, self.diurnal_periods)
            .map_err(|_| zero_count("diurnal_periods"))?;
        debug!(seasons = ?seasons, periods = ?periods, "clustered months and hours");

        Ok(AggregationScheme {
            month_labels: std::array::from_fn(|m| label('S', seasons[m])),
            hour_labels: std::array::from_fn(|h| label('H', periods[h])),
        })
    }
}

fn zero_count(field: &str) -> TimesliceError {
    TimesliceError::config(field, "must be > 0")
}

/// Per-month feature vectors (12 entries).
pub fn month_features(net_load: &HourlyProfile) -> Vec<MonthFeatures> {
    (1..=MONTH_DAYS.len())
        .map(|m| {
            let slice = net_load.month_slice(m);
            let (mean, stdev) = mean_stdev(slice);
            let max = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = slice.iter().copied().fold(f64::INFINITY, f64::min);
            let window_mean = |hours: &std::ops::RangeInclusive<usize>| {
                let picked: Vec<f64> = slice
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| hours.contains(&(i % HOURS_PER_DAY)))
                    .map(|(_, v)| *v)
                    .collect();
                mean_stdev(&picked).0
            };
            [
                mean,
                max,
                min,
                stdev,
                window_mean(&DAYTIME_HOURS),
                window_mean(&EVENING_HOURS),
            ]
        })
        .collect()
}

/// Per-hour-of-day feature vectors (24 entries).
pub fn hour_features(net_load: &HourlyProfile) -> Vec<HourFeatures> {
    let values = net_load.values();
    (0..HOURS_PER_DAY)
        .map(|h| {
            let slice: Vec<f64> = values.iter().skip(h).step_by(HOURS_PER_DAY).copied().collect();
            let (mean, stdev) = mean_stdev(&slice);
            let max = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            [mean, max, stdev, percentile(&slice, 95.0)]
        })
        .collect()
}

/// Mean and population standard deviation; zeros for an empty slice.
fn mean_stdev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Percentile `p` (0–100) by linear interpolation between closest ranks.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Splits a circular sequence of feature vectors into contiguous clusters
/// and returns the cluster index of each item.
///
/// Gap `i` separates item `i` from item `(i + 1) % n`, so the wrap pair
/// (last item, item 0) is a candidate too. The `k - 1` largest gaps (ties to
/// the lower index) are boundaries. Walking from item 0, a new index starts
/// each time a boundary is crossed. With `k >= n` every item is its own
/// cluster.
///
/// When the wrap gap is one of the boundaries the walk never crosses it, so
/// `k - 1` clusters come out instead of `k`.
///
/// # Errors
///
/// `Configuration` if `k` is zero.
pub fn circular_clusters<F: AsRef<[f64]>>(items: &[F], k: usize) -> Result<Vec<usize>> {
    if k == 0 {
        return Err(TimesliceError::config("k", "cluster count must be > 0"));
    }
    let n = items.len();
    if k >= n {
        return Ok((0..n).collect());
    }

    let gaps: Vec<f64> = (0..n)
        .map(|i| distance(items[i].as_ref(), items[(i + 1) % n].as_ref()))
        .collect();
    let mut order: Vec<usize> = (0..n).collect();
    // stable: equal gaps keep ascending index
    order.sort_by(|&a, &b| gaps[b].total_cmp(&gaps[a]));
    let mut boundary = vec![false; n];
    for &i in order.iter().take(k - 1) {
        boundary[i] = true;
    }

    let mut labels = vec![0usize; n];
    let mut current = 0;
    for i in 1..n {
        if boundary[i - 1] {
            current += 1;
        }
        labels[i] = current;
    }
    Ok(labels)
}

/// Whether every cluster in `labels` is one contiguous circular run.
pub fn is_circularly_contiguous(labels: &[usize]) -> bool {
    let n = labels.len();
    if n == 0 {
        return true;
    }
    let changes = (0..n).filter(|&i| labels[i] != labels[(i + 1) % n]).count();
    let mut distinct = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    // a circle with c runs has c label changes (or 0 for a single run)
    if distinct.len() == 1 {
        changes == 0
    } else {
        changes == distinct.len()
    }
}
