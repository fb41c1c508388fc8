//! Assembly of timeslice mapping tables.
//!
//! A standalone mapping lists, for one scenario, the season label of each
//! month, the diurnal label of each hour and the start/end date of every
//! explicitly retained stress segment. Segments are lettered from `b`; the
//! letter `a` stands for the aggregated remainder of the year.
//!
//! The consolidated table places several scenarios side by side, one value
//! column per scenario.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationScheme;
use crate::calendar::{DAYS_PER_YEAR, HOURS_PER_DAY, HOURS_PER_YEAR, format_mm_dd};
use crate::stress::{StressCategory, StressPeriod};

/// Letter of the aggregated remainder.
pub const AGGREGATE_LETTER: &str = "a";

/// Kind of a mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Description {
    Month,
    Hour,
    Adv,
    /// Scalar scenario tag carried through from configuration.
    Tag,
}

impl Description {
    pub fn as_str(self) -> &'static str {
        match self {
            Description::Month => "month",
            Description::Hour => "hour",
            Description::Adv => "adv",
            Description::Tag => "tag",
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named scalar attached to a scenario (e.g. `hydro_availability = dry`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioTag {
    pub name: String,
    pub value: String,
}

/// One row of a standalone mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimesliceRow {
    pub description: Description,
    /// Month number, hour number, `mm-dd` date or tag name.
    pub source: String,
    /// Season label, diurnal label, segment letter or tag value.
    pub timeslice: String,
}

impl TimesliceRow {
    fn new(
        description: Description,
        source: impl Into<String>,
        timeslice: impl Into<String>,
    ) -> Self {
        Self {
            description,
            source: source.into(),
            timeslice: timeslice.into(),
        }
    }
}

/// A lettered, explicitly retained window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressSegment {
    pub letter: String,
    pub period_id: String,
    pub category: StressCategory,
    pub start_day: usize,
    /// Inclusive.
    pub end_day: usize,
}

impl StressSegment {
    pub fn hours(&self) -> std::ops::Range<usize> {
        self.start_day * HOURS_PER_DAY..(self.end_day + 1) * HOURS_PER_DAY
    }
}

/// Letter of the segment at `index`, where index 0 is the aggregated
/// remainder. Letters run `a..z`, then continue bijectively `aa`, `ab`, ….
///
/// # Examples
///
/// ```
/// use timeslicer::mapping::segment_letter;
///
/// assert_eq!(segment_letter(0), "a");
/// assert_eq!(segment_letter(1), "b");
/// assert_eq!(segment_letter(25), "z");
/// assert_eq!(segment_letter(26), "aa");
/// assert_eq!(segment_letter(27), "ab");
/// ```
pub fn segment_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Mapping table of a single scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct TimesliceMapping {
    pub scenario: String,
    pub scheme: AggregationScheme,
    pub segments: Vec<StressSegment>,
    pub tag: Option<ScenarioTag>,
}

impl TimesliceMapping {
    /// Letters the stress periods chronologically and attaches the
    /// aggregation scheme.
    pub fn assemble(
        scenario: &str,
        scheme: AggregationScheme,
        periods: &[StressPeriod],
        tag: Option<ScenarioTag>,
    ) -> Self {
        let mut ordered: Vec<&StressPeriod> = periods.iter().collect();
        ordered.sort_by_key(|p| (p.start_day, p.end_day, p.category));
        let segments = ordered
            .into_iter()
            .enumerate()
            .map(|(i, p)| StressSegment {
                letter: segment_letter(i + 1),
                period_id: p.id.clone(),
                category: p.category,
                start_day: p.start_day,
                end_day: p.end_day,
            })
            .collect();
        Self {
            scenario: scenario.to_string(),
            scheme,
            segments,
            tag,
        }
    }

    /// Rows in output order: months, hours, segment start/end pairs, tag.
    pub fn rows(&self) -> Vec<TimesliceRow> {
        let mut rows = Vec::with_capacity(12 + 24 + 2 * self.segments.len() + 1);
        for (m, label) in self.scheme.month_labels.iter().enumerate() {
            rows.push(TimesliceRow::new(Description::Month, (m + 1).to_string(), label));
        }
        for (h, label) in self.scheme.hour_labels.iter().enumerate() {
            rows.push(TimesliceRow::new(Description::Hour, h.to_string(), label));
        }
        for seg in &self.segments {
            for day in [seg.start_day, seg.end_day] {
                rows.push(TimesliceRow::new(Description::Adv, format_mm_dd(day), &seg.letter));
            }
        }
        if let Some(tag) = &self.tag {
            rows.push(TimesliceRow::new(Description::Tag, &tag.name, &tag.value));
        }
        rows
    }

    /// Per hour of the year, how many buckets claim it: each segment
    /// covering the hour counts once, and an hour no segment covers counts
    /// once for the aggregated remainder.
    pub fn hour_claims(&self) -> Vec<u8> {
        let mut claims = vec![0u8; HOURS_PER_YEAR];
        for seg in &self.segments {
            for h in seg.hours() {
                claims[h] = claims[h].saturating_add(1);
            }
        }
        for c in claims.iter_mut().filter(|c| **c == 0) {
            *c = 1;
        }
        claims
    }

    /// Hours covered by at least one segment.
    pub fn stress_hours(&self) -> usize {
        let days: BTreeSet<usize> = self
            .segments
            .iter()
            .flat_map(|s| s.start_day..=s.end_day)
            .filter(|d| *d < DAYS_PER_YEAR)
            .collect();
        days.len() * HOURS_PER_DAY
    }

    /// Aggregated timeslices plus one per segment.
    pub fn timeslice_count(&self) -> usize {
        self.scheme.timeslice_count() + self.segments.len()
    }

    fn segment(&self, letter: &str) -> Option<&StressSegment> {
        self.segments.iter().find(|s| s.letter == letter)
    }
}

/// One row of the consolidated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedRow {
    pub description: Description,
    pub source: String,
    /// One value per scenario; blank where the scenario has none.
    pub values: Vec<String>,
}

/// Several scenario mappings side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedMapping {
    pub scenarios: Vec<String>,
    pub rows: Vec<ConsolidatedRow>,
}

impl ConsolidatedMapping {
    /// Merges standalone mappings, keeping their order as column order.
    ///
    /// Adv rows come in start/end pairs per letter in the union of all
    /// scenarios' letters. Tag rows follow, one per distinct tag name in
    /// order of first appearance.
    pub fn consolidate(mappings: &[TimesliceMapping]) -> Self {
        let scenarios: Vec<String> = mappings.iter().map(|m| m.scenario.clone()).collect();
        let mut rows = Vec::new();

        for m in 0..12 {
            rows.push(ConsolidatedRow {
                description: Description::Month,
                source: (m + 1).to_string(),
                values: mappings.iter().map(|t| t.scheme.month_labels[m].clone()).collect(),
            });
        }
        for h in 0..HOURS_PER_DAY {
            rows.push(ConsolidatedRow {
                description: Description::Hour,
                source: h.to_string(),
                values: mappings.iter().map(|t| t.scheme.hour_labels[h].clone()).collect(),
            });
        }

        let letter_count = mappings.iter().map(|t| t.segments.len()).max().unwrap_or(0);
        for letter in (1..=letter_count).map(segment_letter) {
            let dates = |day: fn(&StressSegment) -> usize| -> Vec<String> {
                mappings
                    .iter()
                    .map(|t| t.segment(&letter).map(|s| format_mm_dd(day(s))).unwrap_or_default())
                    .collect()
            };
            rows.push(ConsolidatedRow {
                description: Description::Adv,
                source: letter.clone(),
                values: dates(|s: &StressSegment| s.start_day),
            });
            rows.push(ConsolidatedRow {
                description: Description::Adv,
                source: letter.clone(),
                values: dates(|s: &StressSegment| s.end_day),
            });
        }

        let mut tag_names: Vec<&str> = Vec::new();
        for tag in mappings.iter().filter_map(|t| t.tag.as_ref()) {
            if !tag_names.contains(&tag.name.as_str()) {
                tag_names.push(&tag.name);
            }
        }
        for name in tag_names {
            rows.push(ConsolidatedRow {
                description: Description::Tag,
                source: name.to_string(),
                values: mappings
                    .iter()
                    .map(|t| {
                        t.tag
                            .as_ref()
                            .filter(|tag| tag.name == name)
                            .map(|tag| tag.value.clone())
                            .unwrap_or_default()
                    })
                    .collect(),
            });
        }

        Self { scenarios, rows }
    }

    pub fn rows_of(&self, description: Description) -> impl Iterator<Item = &ConsolidatedRow> {
        self.rows.iter().filter(move |r| r.description == description)
    }
}
