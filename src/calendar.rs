//! Fixed non-leap calendar and the 8760-hour profile type.
//!
//! All calendar arithmetic in the crate goes through this module. February
//! always has 28 days; there is no leap-year support.

use std::ops::Index;

use crate::error::{Result, TimesliceError};

/// Days per month in the non-leap reference year.
pub const MONTH_DAYS: [usize; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
/// Hours per day.
pub const HOURS_PER_DAY: usize = 24;
/// Days in the reference year.
pub const DAYS_PER_YEAR: usize = 365;
/// Hours in the reference year.
pub const HOURS_PER_YEAR: usize = DAYS_PER_YEAR * HOURS_PER_DAY;
/// Number of complete, non-overlapping 7-day windows in the year.
pub const WEEKS_PER_YEAR: usize = DAYS_PER_YEAR / 7;

/// Calendar position of an hour of the reference year.
///
/// `month` is 1-based, `day` is the 1-based day of month, `hour` is 0..24.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourStamp {
    pub month: usize,
    pub day: usize,
    pub hour: usize,
}

/// Maps an hour index to its calendar position. Indices past the end of
/// the year wrap modulo 8760.
///
/// # Examples
///
/// ```
/// use timeslicer::calendar::{hour_stamp, HourStamp};
///
/// assert_eq!(hour_stamp(0), HourStamp { month: 1, day: 1, hour: 0 });
/// assert_eq!(hour_stamp(31 * 24 + 5), HourStamp { month: 2, day: 1, hour: 5 });
/// assert_eq!(hour_stamp(8760), hour_stamp(0));
/// ```
pub fn hour_stamp(index: usize) -> HourStamp {
    let index = index % HOURS_PER_YEAR;
    let (month, day) = day_to_month_day(index / HOURS_PER_DAY);
    HourStamp {
        month,
        day,
        hour: index % HOURS_PER_DAY,
    }
}

/// Converts a 0-based day of year into `(month, day_of_month)`, both 1-based.
/// Days past the end of the year wrap.
pub fn day_to_month_day(day_of_year: usize) -> (usize, usize) {
    let mut remaining = day_of_year % DAYS_PER_YEAR;
    for (m, &len) in MONTH_DAYS.iter().enumerate() {
        if remaining < len {
            return (m + 1, remaining + 1);
        }
        remaining -= len;
    }
    // Unreachable: MONTH_DAYS sums to DAYS_PER_YEAR.
    (12, 31)
}

/// Converts a 1-based `(month, day)` pair back into a 0-based day of year.
pub fn month_day_to_day(month: usize, day: usize) -> Option<usize> {
    if !(1..=12).contains(&month) || day == 0 || day > MONTH_DAYS[month - 1] {
        return None;
    }
    Some(first_day_of_month(month) + day - 1)
}

/// 0-based day of year on which a 1-based month starts.
pub fn first_day_of_month(month: usize) -> usize {
    MONTH_DAYS[..month.saturating_sub(1).min(12)].iter().sum()
}

/// Hour-index range covered by a 1-based month.
pub fn month_hours(month: usize) -> std::ops::Range<usize> {
    let start = first_day_of_month(month) * HOURS_PER_DAY;
    start..start + MONTH_DAYS[month - 1] * HOURS_PER_DAY
}

/// Formats a day of year as `mm-dd`.
///
/// # Examples
///
/// ```
/// use timeslicer::calendar::format_mm_dd;
///
/// assert_eq!(format_mm_dd(0), "01-01");
/// assert_eq!(format_mm_dd(59), "03-01");
/// assert_eq!(format_mm_dd(364), "12-31");
/// ```
pub fn format_mm_dd(day_of_year: usize) -> String {
    let (month, day) = day_to_month_day(day_of_year);
    format!("{month:02}-{day:02}")
}

/// An annual hourly series with exactly 8760 values (MW).
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyProfile {
    values: Vec<f64>,
}

impl HourlyProfile {
    /// Wraps a vector of hourly values.
    ///
    /// # Errors
    ///
    /// Returns `DataUnavailable` naming `iso` and `what` if the vector does
    /// not hold exactly 8760 values.
    pub fn new(iso: &str, what: &str, values: Vec<f64>) -> Result<Self> {
        if values.len() != HOURS_PER_YEAR {
            return Err(TimesliceError::unavailable(
                iso,
                format!(
                    "{what} has {} hourly values, expected {HOURS_PER_YEAR}",
                    values.len()
                ),
            ));
        }
        Ok(Self { values })
    }

    /// All-zero profile.
    pub fn zeros() -> Self {
        Self {
            values: vec![0.0; HOURS_PER_YEAR],
        }
    }

    /// Constant profile.
    pub fn constant(value: f64) -> Self {
        Self {
            values: vec![value; HOURS_PER_YEAR],
        }
    }

    /// Builds a profile by evaluating `f` at every hour index.
    pub fn from_fn(f: impl FnMut(usize) -> f64) -> Self {
        Self {
            values: (0..HOURS_PER_YEAR).map(f).collect(),
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Value at an hour index, wrapping past the end of the year.
    pub fn at(&self, index: usize) -> f64 {
        self.values[index % HOURS_PER_YEAR]
    }

    /// Annual energy (MWh) for a profile in MW.
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        self.sum() / HOURS_PER_YEAR as f64
    }

    /// Values of a 1-based month.
    pub fn month_slice(&self, month: usize) -> &[f64] {
        &self.values[month_hours(month)]
    }

    /// Values of a 0-based day of year.
    pub fn day_slice(&self, day_of_year: usize) -> &[f64] {
        let start = (day_of_year % DAYS_PER_YEAR) * HOURS_PER_DAY;
        &self.values[start..start + HOURS_PER_DAY]
    }

    /// Adds another profile in place.
    pub fn add_assign(&mut self, other: &Self) {
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += b;
        }
    }

    /// Element-wise combination of two profiles.
    pub fn zip_with(&self, other: &Self, mut f: impl FnMut(f64, f64) -> f64) -> Self {
        Self {
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }
}

impl Index<usize> for HourlyProfile {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index % HOURS_PER_YEAR]
    }
}
