//! Renewable capacity allocation across grid cells.
//!
//! Three stages, each usable on its own:
//!
//! 1. [`split_requirement`] brackets the cost-competitive cells of every
//!    technology and divides the residual energy requirement between
//!    technologies by score share.
//! 2. [`select_cells`] walks one technology's cells in merit order until its
//!    target is met, prorating the boundary cell.
//! 3. [`synthesize_profile`] turns a selection into an hourly generation
//!    profile using the cached per-cell shapes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cache::ShapeCache;
use super::types::{CellId, GridCell, SelectedAllocation, Technology};
use crate::calendar::{HOURS_PER_YEAR, HourlyProfile};
use crate::error::{Result, TimesliceError};

/// Default share of selected cells allowed to lack shape data.
pub const DEFAULT_MISSING_SHAPE_TOLERANCE: f64 = 0.10;

const MWH_PER_TWH: f64 = 1.0e6;
const EPSILON: f64 = 1.0e-9;

/// Candidate cells per technology for one ISO.
pub type CellTable = BTreeMap<Technology, Vec<GridCell>>;

/// Ordering used when walking cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Cheapest LCOE first against an energy target (MWh).
    #[default]
    Lcoe,
    /// Highest capacity factor first against a capacity target (MW).
    FixedCapacity,
}

/// Cost-competitive resource of one technology.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevantResource {
    pub technology: Technology,
    pub cells: usize,
    pub potential_mwh: f64,
    /// Potential-weighted average LCOE over the relevant cells ($/MWh).
    pub weighted_lcoe: f64,
    /// Relevant potential (TWh) per unit of weighted LCOE.
    pub score: f64,
}

/// Division of the residual requirement between technologies.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnologySplit {
    pub requirement_mwh: f64,
    pub relevant: Vec<RelevantResource>,
    /// Energy target per technology (MWh); shares sum to the requirement
    /// unless the split is infeasible.
    pub targets_mwh: BTreeMap<Technology, f64>,
    /// No technology has a relevant cell while the requirement is positive.
    pub infeasible: bool,
}

impl TechnologySplit {
    pub fn target(&self, technology: Technology) -> f64 {
        self.targets_mwh.get(&technology).copied().unwrap_or(0.0)
    }

    /// Share of the requirement assigned to `technology` (0.0–1.0).
    pub fn share(&self, technology: Technology) -> f64 {
        if self.requirement_mwh <= 0.0 {
            0.0
        } else {
            self.target(technology) / self.requirement_mwh
        }
    }
}

/// Cells sorted ascending by LCOE, truncated right after cumulative
/// potential reaches `requirement_mwh`. Cells without potential are skipped.
pub fn relevant_subset(cells: &[GridCell], requirement_mwh: f64) -> Vec<&GridCell> {
    let mut sorted: Vec<&GridCell> = cells
        .iter()
        .filter(|c| c.generation_potential_mwh() > 0.0)
        .collect();
    sorted.sort_by(|a, b| by_lcoe(a, b));

    let mut relevant = Vec::new();
    let mut cumulative = 0.0;
    for cell in sorted {
        if cumulative >= requirement_mwh {
            break;
        }
        cumulative += cell.generation_potential_mwh();
        relevant.push(cell);
    }
    relevant
}

/// Splits `requirement_mwh` between technologies in proportion to
/// `relevant potential (TWh) / weighted LCOE`.
///
/// A technology with no relevant cell gets nothing; if none has any the
/// split is flagged infeasible and every target is zero.
pub fn split_requirement(iso: &str, cells: &CellTable, requirement_mwh: f64) -> TechnologySplit {
    let mut split = TechnologySplit {
        requirement_mwh,
        relevant: Vec::new(),
        targets_mwh: Technology::ALL.iter().map(|&t| (t, 0.0)).collect(),
        infeasible: false,
    };
    if requirement_mwh <= 0.0 {
        return split;
    }

    for technology in Technology::ALL {
        let Some(candidates) = cells.get(&technology) else {
            continue;
        };
        let subset = relevant_subset(candidates, requirement_mwh);
        if subset.is_empty() {
            continue;
        }
        let potential_mwh: f64 = subset.iter().map(|c| c.generation_potential_mwh()).sum();
        let weighted_lcoe = subset
            .iter()
            .map(|c| c.generation_potential_mwh() * c.lcoe)
            .sum::<f64>()
            / potential_mwh;
        split.relevant.push(RelevantResource {
            technology,
            cells: subset.len(),
            potential_mwh,
            weighted_lcoe,
            score: (potential_mwh / MWH_PER_TWH) / weighted_lcoe.max(EPSILON),
        });
    }

    let total_score: f64 = split.relevant.iter().map(|r| r.score).sum();
    if split.relevant.is_empty() || total_score <= 0.0 {
        split.infeasible = true;
        warn!(iso, requirement_mwh, "no relevant renewable resource for either technology");
        return split;
    }
    for r in &split.relevant {
        split
            .targets_mwh
            .insert(r.technology, requirement_mwh * r.score / total_score);
    }
    split
}

/// Outcome of a merit-order walk for one technology.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSelection {
    pub technology: Technology,
    pub mode: SelectionMode,
    /// MWh in `Lcoe` mode, MW in `FixedCapacity` mode.
    pub target: f64,
    pub selections: Vec<SelectedAllocation>,
    /// Part of the target covered, same unit as `target`.
    pub achieved: f64,
    /// Part of the target no cell could cover.
    pub unmet: f64,
}

impl CellSelection {
    pub fn generation_mwh(&self) -> f64 {
        self.selections.iter().map(|s| s.generation_mwh).sum()
    }

    pub fn allocated_capacity_mw(&self) -> f64 {
        self.selections.iter().map(|s| s.allocated_capacity_mw).sum()
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        self.selections.iter().map(|s| s.cell_id).collect()
    }
}

/// Walks `cells` in merit order, taking each whole while it fits under the
/// remaining target and prorating the first cell that does not.
///
/// # Examples
///
/// ```
/// use timeslicer::resources::allocator::{select_cells, SelectionMode};
/// use timeslicer::resources::types::{GridCell, Technology};
///
/// let cells = vec![
///     GridCell::new(1, 10.0, 0.2, 40.0), // 17,520 MWh
///     GridCell::new(2, 10.0, 0.2, 30.0), // cheaper
/// ];
/// let sel = select_cells(Technology::Solar, &cells, SelectionMode::Lcoe, 26_280.0);
/// assert_eq!(sel.selections[0].cell_id, 2);
/// assert_eq!(sel.selections[1].utilization, 0.5);
/// assert_eq!(sel.unmet, 0.0);
/// ```
pub fn select_cells(
    technology: Technology,
    cells: &[GridCell],
    mode: SelectionMode,
    target: f64,
) -> CellSelection {
    let mut ordered: Vec<&GridCell> = cells.iter().collect();
    match mode {
        SelectionMode::Lcoe => ordered.sort_by(|a, b| by_lcoe(a, b)),
        SelectionMode::FixedCapacity => ordered.sort_by(|a, b| {
            b.capacity_factor
                .total_cmp(&a.capacity_factor)
                .then(a.id.cmp(&b.id))
        }),
    }

    let target = target.max(0.0);
    let mut remaining = target;
    let mut selections = Vec::new();
    for cell in ordered {
        if remaining <= EPSILON * target.max(1.0) {
            break;
        }
        let quantity = match mode {
            SelectionMode::Lcoe => cell.generation_potential_mwh(),
            SelectionMode::FixedCapacity => cell.capacity_mw,
        };
        if quantity <= 0.0 {
            continue;
        }
        let utilization = if quantity <= remaining {
            remaining -= quantity;
            1.0
        } else {
            let fraction = remaining / quantity;
            remaining = 0.0;
            fraction
        };
        let allocated_capacity_mw = cell.capacity_mw * utilization;
        selections.push(SelectedAllocation {
            cell_id: cell.id,
            technology,
            cell_capacity_mw: cell.capacity_mw,
            allocated_capacity_mw,
            capacity_factor: cell.capacity_factor,
            utilization,
            generation_mwh: allocated_capacity_mw * cell.capacity_factor * HOURS_PER_YEAR as f64,
        });
    }

    let unmet = remaining.max(0.0);
    CellSelection {
        technology,
        mode,
        target,
        selections,
        achieved: target - unmet,
        unmet,
    }
}

/// Hourly generation built from a selection.
#[derive(Debug, Clone)]
pub struct SynthesizedProfile {
    pub technology: Technology,
    pub profile: HourlyProfile,
    /// Selected cells left out because no shape was available.
    pub dropped: Vec<CellId>,
    pub warnings: Vec<String>,
}

/// Sums `cell capacity × utilization × hourly CF` over the selected cells.
///
/// # Errors
///
/// `ShapeResolutionFailure` when more than `missing_tolerance` of the
/// selected cells (by count) have no shape; store errors are propagated.
pub fn synthesize_profile(
    iso: &str,
    technology: Technology,
    selections: &[SelectedAllocation],
    cache: &ShapeCache,
    missing_tolerance: f64,
) -> Result<SynthesizedProfile> {
    let mut out = SynthesizedProfile {
        technology,
        profile: HourlyProfile::zeros(),
        dropped: Vec::new(),
        warnings: Vec::new(),
    };
    if selections.is_empty() {
        return Ok(out);
    }

    let ids: Vec<CellId> = selections.iter().map(|s| s.cell_id).collect();
    let resolved = cache.resolve_cell_shapes(iso, technology, &ids)?;
    if !resolved.missing.is_empty() {
        let missing_share = resolved.missing.len() as f64 / ids.len() as f64;
        if missing_share > missing_tolerance {
            return Err(TimesliceError::unresolved(iso, technology, &resolved.missing));
        }
        let message = format!(
            "{iso}/{technology}: dropped {} of {} selected cells without shape data",
            resolved.missing.len(),
            ids.len()
        );
        warn!(iso, %technology, dropped = resolved.missing.len(), "{message}");
        out.warnings.push(message);
        out.dropped = resolved.missing;
    }

    let mut hourly = vec![0.0; HOURS_PER_YEAR];
    for sel in selections {
        let Some(shape) = resolved.shapes.get(&sel.cell_id) else {
            continue;
        };
        let scale = sel.cell_capacity_mw * sel.utilization;
        for (h, cf) in hourly.iter_mut().zip(shape.iter()) {
            *h += scale * cf;
        }
    }
    out.profile = HourlyProfile::new(iso, technology.as_str(), hourly)?;
    Ok(out)
}

/// Everything the allocation stage produces for one ISO.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    /// Present in energy mode only.
    pub split: Option<TechnologySplit>,
    pub selections: BTreeMap<Technology, CellSelection>,
    pub profiles: BTreeMap<Technology, HourlyProfile>,
    pub warnings: Vec<String>,
}

impl AllocationOutcome {
    /// Sum of all technology profiles.
    pub fn renewable_profile(&self) -> HourlyProfile {
        let mut total = HourlyProfile::zeros();
        for p in self.profiles.values() {
            total.add_assign(p);
        }
        total
    }

    pub fn profile(&self, technology: Technology) -> Option<&HourlyProfile> {
        self.profiles.get(&technology)
    }

    /// Requirement left uncovered, in the selection unit (MWh or MW).
    ///
    /// In energy mode this includes any part of the requirement the split
    /// could not assign to a technology.
    pub fn unmet(&self) -> f64 {
        let per_tech: f64 = self.selections.values().map(|s| s.unmet).sum();
        match &self.split {
            Some(split) => {
                let assigned: f64 = split.targets_mwh.values().sum();
                per_tech + (split.requirement_mwh - assigned).max(0.0)
            }
            None => per_tech,
        }
    }

    pub fn is_infeasible(&self) -> bool {
        self.split.as_ref().is_some_and(|s| s.infeasible)
    }
}

/// Runs split, selection and synthesis against a shared shape cache.
#[derive(Debug, Clone, Copy)]
pub struct Allocator<'a> {
    cache: &'a ShapeCache,
    missing_tolerance: f64,
}

impl<'a> Allocator<'a> {
    pub fn new(cache: &'a ShapeCache) -> Self {
        Self {
            cache,
            missing_tolerance: DEFAULT_MISSING_SHAPE_TOLERANCE,
        }
    }

    pub fn with_missing_tolerance(mut self, tolerance: f64) -> Self {
        self.missing_tolerance = tolerance;
        self
    }

    /// Allocates the residual energy requirement by LCOE merit order.
    pub fn allocate_energy(
        &self,
        iso: &str,
        cells: &CellTable,
        requirement_mwh: f64,
    ) -> Result<AllocationOutcome> {
        let split = split_requirement(iso, cells, requirement_mwh);
        let mut warnings = Vec::new();
        if split.infeasible {
            let infeasible = TimesliceError::AllocationInfeasible {
                iso: iso.to_string(),
            };
            warnings.push(infeasible.to_string());
        }
        let targets = split.targets_mwh.clone();
        let mut outcome = self.run(iso, cells, SelectionMode::Lcoe, &targets, warnings)?;
        outcome.split = Some(split);
        Ok(outcome)
    }

    /// Allocates fixed capacity targets (MW) to the highest-CF cells.
    pub fn allocate_capacity(
        &self,
        iso: &str,
        cells: &CellTable,
        targets_mw: &BTreeMap<Technology, f64>,
    ) -> Result<AllocationOutcome> {
        self.run(iso, cells, SelectionMode::FixedCapacity, targets_mw, Vec::new())
    }

    fn run(
        &self,
        iso: &str,
        cells: &CellTable,
        mode: SelectionMode,
        targets: &BTreeMap<Technology, f64>,
        mut warnings: Vec<String>,
    ) -> Result<AllocationOutcome> {
        let mut selections = BTreeMap::new();
        let mut profiles = BTreeMap::new();
        for technology in Technology::ALL {
            let target = targets.get(&technology).copied().unwrap_or(0.0);
            let candidates = cells.get(&technology).map(Vec::as_slice).unwrap_or(&[]);
            let selection = select_cells(technology, candidates, mode, target);
            if selection.unmet > 0.0 && target > 0.0 {
                warn!(
                    iso,
                    %technology,
                    target,
                    unmet = selection.unmet,
                    "cell potential does not cover the target"
                );
            }
            let synthesized = synthesize_profile(
                iso,
                technology,
                &selection.selections,
                self.cache,
                self.missing_tolerance,
            )?;
            info!(
                iso,
                %technology,
                cells = selection.selections.len(),
                capacity_mw = selection.allocated_capacity_mw(),
                generation_mwh = selection.generation_mwh(),
                "allocated renewable capacity"
            );
            warnings.extend(synthesized.warnings);
            profiles.insert(technology, synthesized.profile);
            selections.insert(technology, selection);
        }
        Ok(AllocationOutcome {
            split: None,
            selections,
            profiles,
            warnings,
        })
    }
}

fn by_lcoe(a: &GridCell, b: &GridCell) -> Ordering {
    a.lcoe.total_cmp(&b.lcoe).then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::cache::InMemoryShapeStore;

    fn cell(id: CellId, capacity_mw: f64, cf: f64, lcoe: f64) -> GridCell {
        GridCell::new(id, capacity_mw, cf, lcoe)
    }

    #[test]
    fn relevant_subset_stops_after_crossing_requirement() {
        // potentials: 8760 MWh each (1 MW at CF 1.0)
        let cells = vec![
            cell(1, 1.0, 1.0, 30.0),
            cell(2, 1.0, 1.0, 10.0),
            cell(3, 1.0, 1.0, 20.0),
        ];
        let subset = relevant_subset(&cells, 10_000.0);
        let ids: Vec<CellId> = subset.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn split_is_proportional_to_score() {
        let mut table = CellTable::new();
        // solar: 8.76 TWh at 50 $/MWh -> score 0.1752
        table.insert(Technology::Solar, vec![cell(1, 1000.0, 1.0, 50.0)]);
        // wind: 8.76 TWh at 25 $/MWh -> score 0.3504
        table.insert(Technology::Wind, vec![cell(2, 1000.0, 1.0, 25.0)]);
        let split = split_requirement("DEU", &table, 9.0e6);
        assert!(!split.infeasible);
        assert!((split.share(Technology::Solar) - 1.0 / 3.0).abs() < 1e-9);
        assert!((split.share(Technology::Wind) - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn missing_technology_gets_nothing() {
        let mut table = CellTable::new();
        table.insert(Technology::Wind, vec![cell(2, 10.0, 0.3, 40.0)]);
        let split = split_requirement("DEU", &table, 1.0e5);
        assert_eq!(split.share(Technology::Wind), 1.0);
        assert_eq!(split.target(Technology::Solar), 0.0);
    }

    #[test]
    fn no_cells_is_infeasible_not_an_error() {
        let split = split_requirement("DEU", &CellTable::new(), 1.0e5);
        assert!(split.infeasible);
        assert_eq!(split.target(Technology::Solar), 0.0);
        assert_eq!(split.target(Technology::Wind), 0.0);
    }

    #[test]
    fn zero_requirement_is_not_infeasible() {
        let split = split_requirement("DEU", &CellTable::new(), 0.0);
        assert!(!split.infeasible);
    }

    #[test]
    fn nan_cost_sorts_after_every_priced_cell() {
        let cells = vec![
            cell(1, 1.0, 1.0, f64::NAN),
            cell(2, 1.0, 1.0, 30.0),
            cell(4, 1.0, 1.0, 20.0),
        ];
        let sel = select_cells(Technology::Wind, &cells, SelectionMode::Lcoe, 8760.0 * 2.0);
        let ids: Vec<CellId> = sel.selections.iter().map(|s| s.cell_id).collect();
        assert_eq!(ids, vec![4, 2]);
    }

    #[test]
    fn boundary_cell_lands_exactly_on_target() {
        let cells = vec![cell(1, 1.0, 1.0, 10.0), cell(2, 2.0, 1.0, 20.0)];
        let sel = select_cells(Technology::Wind, &cells, SelectionMode::Lcoe, 8760.0 * 2.0);
        assert_eq!(sel.selections.len(), 2);
        assert!(sel.selections[0].is_full());
        assert!((sel.selections[1].utilization - 0.5).abs() < 1e-12);
        assert!((sel.selections[1].allocated_capacity_mw - 1.0).abs() < 1e-12);
        assert!((sel.generation_mwh() - 17_520.0).abs() < 1e-6);
        assert!(sel.unmet.abs() < 1e-9);
    }

    #[test]
    fn insufficient_potential_reports_unmet() {
        let cells = vec![cell(1, 100.0, 0.5, 50.0)];
        let sel = select_cells(Technology::Solar, &cells, SelectionMode::Lcoe, 8_760_000.0);
        assert_eq!(sel.selections.len(), 1);
        assert!(sel.selections[0].is_full());
        assert!((sel.achieved - 438_000.0).abs() < 1e-6);
        assert!((sel.unmet - 8_322_000.0).abs() < 1e-6);
    }

    #[test]
    fn fixed_capacity_prefers_high_capacity_factor() {
        let cells = vec![
            cell(1, 50.0, 0.20, 10.0),
            cell(2, 50.0, 0.40, 90.0),
            cell(3, 50.0, 0.30, 50.0),
        ];
        let sel = select_cells(Technology::Wind, &cells, SelectionMode::FixedCapacity, 75.0);
        assert_eq!(sel.cell_ids(), vec![2, 3]);
        assert_eq!(sel.selections[0].capacity_factor, 0.40);
        assert!((sel.selections[1].utilization - 0.5).abs() < 1e-12);
        assert!((sel.allocated_capacity_mw() - 75.0).abs() < 1e-9);
    }

    fn day_shape() -> Vec<f64> {
        (0..HOURS_PER_YEAR)
            .map(|h| if (8..16).contains(&(h % 24)) { 0.5 } else { 0.0 })
            .collect()
    }

    #[test]
    fn synthesis_scales_shape_by_allocated_capacity() {
        let mut store = InMemoryShapeStore::new();
        store.insert("ESP", Technology::Solar, 2023, 1, day_shape());
        let cache = ShapeCache::new(store, 2023, 2);
        let sel = select_cells(
            Technology::Solar,
            &[cell(1, 100.0, 0.5, 50.0)],
            SelectionMode::Lcoe,
            219_000.0,
        );
        let out = synthesize_profile("ESP", Technology::Solar, &sel.selections, &cache, 0.1)
            .expect("shape exists");
        assert!((out.profile[12] - 25.0).abs() < 1e-9);
        assert_eq!(out.profile[3], 0.0);
    }

    #[test]
    fn missing_shapes_within_tolerance_are_dropped() {
        let mut store = InMemoryShapeStore::new();
        let cells: Vec<GridCell> = (1..=10).map(|id| cell(id, 1.0, 0.5, id as f64)).collect();
        for id in 1..=9 {
            store.insert("ESP", Technology::Solar, 2023, id, day_shape());
        }
        let cache = ShapeCache::new(store, 2023, 2);
        let sel = select_cells(Technology::Solar, &cells, SelectionMode::Lcoe, 1.0e9);
        let out = synthesize_profile("ESP", Technology::Solar, &sel.selections, &cache, 0.1)
            .expect("one of ten missing is tolerated");
        assert_eq!(out.dropped, vec![10]);
        assert_eq!(out.warnings.len(), 1);
        assert!((out.profile[10] - 4.5).abs() < 1e-9);
    }

    #[test]
    fn missing_shapes_beyond_tolerance_fail() {
        let mut store = InMemoryShapeStore::new();
        store.insert("ESP", Technology::Wind, 2023, 1, day_shape());
        let cache = ShapeCache::new(store, 2023, 2);
        let cells: Vec<GridCell> = (1..=4).map(|id| cell(id, 1.0, 0.5, 10.0)).collect();
        let sel = select_cells(Technology::Wind, &cells, SelectionMode::Lcoe, 1.0e9);
        let err = synthesize_profile("ESP", Technology::Wind, &sel.selections, &cache, 0.1)
            .expect_err("three of four missing");
        assert!(matches!(
            err,
            TimesliceError::ShapeResolutionFailure { total: 3, .. }
        ));
    }

    #[test]
    fn allocate_energy_with_no_cells_yields_zero_profiles() {
        let cache = ShapeCache::new(InMemoryShapeStore::new(), 2023, 2);
        let outcome = Allocator::new(&cache)
            .allocate_energy("NOR", &CellTable::new(), 1.0e6)
            .expect("infeasible is not fatal");
        assert!(outcome.is_infeasible());
        assert_eq!(outcome.renewable_profile().sum(), 0.0);
        assert!((outcome.unmet() - 1.0e6).abs() < 1e-6);
        assert_eq!(outcome.warnings.len(), 1);
    }
}
