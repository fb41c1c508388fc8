//! Common types for renewable resource cells and their allocation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calendar::HOURS_PER_YEAR;

/// Identifier of a grid cell within an (ISO, technology) cell table.
pub type CellId = u64;

/// Variable renewable technologies the allocator distributes energy across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technology {
    Solar,
    Wind,
}

impl Technology {
    /// All technologies in allocation order.
    pub const ALL: [Technology; 2] = [Technology::Solar, Technology::Wind];

    pub fn as_str(self) -> &'static str {
        match self {
            Technology::Solar => "solar",
            Technology::Wind => "wind",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete resource site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub id: CellId,
    /// Installable capacity potential (MW).
    pub capacity_mw: f64,
    /// Annual-average capacity factor (0.0–1.0).
    pub capacity_factor: f64,
    /// Levelized cost of energy ($/MWh).
    pub lcoe: f64,
}

impl GridCell {
    pub fn new(id: CellId, capacity_mw: f64, capacity_factor: f64, lcoe: f64) -> Self {
        Self {
            id,
            capacity_mw,
            capacity_factor,
            lcoe,
        }
    }

    /// Annual generation potential (MWh) = capacity × CF × 8760.
    pub fn generation_potential_mwh(&self) -> f64 {
        self.capacity_mw * self.capacity_factor * HOURS_PER_YEAR as f64
    }
}

/// One cell picked by merit-order selection.
///
/// All cells ahead of the boundary cell in merit order have
/// `utilization == 1.0`; the boundary cell may be partially used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedAllocation {
    pub cell_id: CellId,
    pub technology: Technology,
    /// Full installable capacity of the cell (MW).
    pub cell_capacity_mw: f64,
    /// Capacity actually allocated, `cell_capacity_mw × utilization` (MW).
    pub allocated_capacity_mw: f64,
    pub capacity_factor: f64,
    /// Fraction of the cell used (0.0–1.0).
    pub utilization: f64,
    /// Annual generation of the allocated capacity (MWh).
    pub generation_mwh: f64,
}

impl SelectedAllocation {
    pub fn is_full(&self) -> bool {
        self.utilization >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn potential_is_capacity_times_cf_times_hours() {
        let cell = GridCell::new(1, 100.0, 0.5, 50.0);
        assert_eq!(cell.generation_potential_mwh(), 438_000.0);
    }

    #[test]
    fn technology_displays_lowercase() {
        assert_eq!(Technology::Solar.to_string(), "solar");
        assert_eq!(Technology::Wind.to_string(), "wind");
    }
}
