//! End-to-end timeslice generation for one ISO and a set of scenarios.
//!
//! Baseline, residual requirement, allocation and coverage are computed
//! once per ISO; stress detection, aggregation and mapping then run for
//! every declared scenario in parallel over those shared profiles.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::calendar::{HOURS_PER_YEAR, HourlyProfile};
use crate::config::{EngineConfig, ScenarioConfig, ScenarioSet};
use crate::error::{Result, TimesliceError};
use crate::mapping::{ConsolidatedMapping, TimesliceMapping};
use crate::resources::allocator::{AllocationOutcome, Allocator, CellTable, SelectionMode};
use crate::resources::cache::ShapeCache;
use crate::stress::{StressDetector, StressPeriod, coverage_profile};
use crate::supply::baseline::{MonthlyBaseline, residual_requirement_mwh};
use crate::supply::provider::ProviderChain;

/// Per-scenario counts reported alongside the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioDiagnostics {
    /// Number of stress periods kept explicitly.
    pub periods: usize,
    /// Sum of the stress periods' hours (overlaps counted twice).
    pub stress_hours: usize,
    /// Hours left to the aggregated season/diurnal buckets.
    pub aggregated_hours: usize,
    /// Aggregated timeslices plus one per stress segment.
    pub timeslices: usize,
}

impl ScenarioDiagnostics {
    fn new(periods: &[StressPeriod], mapping: &TimesliceMapping) -> Self {
        Self {
            periods: periods.len(),
            stress_hours: periods.iter().map(StressPeriod::hours).sum(),
            aggregated_hours: HOURS_PER_YEAR - mapping.stress_hours(),
            timeslices: mapping.timeslice_count(),
        }
    }
}

/// Result of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub periods: Vec<StressPeriod>,
    pub mapping: TimesliceMapping,
    pub diagnostics: ScenarioDiagnostics,
}

/// Everything produced for one ISO.
#[derive(Debug, Clone)]
pub struct IsoRun {
    pub iso: String,
    /// Name of the provider that supplied demand.
    pub demand_provider: String,
    /// Name of the provider that supplied baseline totals, if any did.
    pub baseline_provider: Option<String>,
    pub demand: HourlyProfile,
    pub baseline: HourlyProfile,
    /// Energy the renewable fleet must supply (MWh).
    pub residual_mwh: f64,
    pub allocation: AllocationOutcome,
    /// Demand − (baseline + renewable), MW.
    pub net_load: HourlyProfile,
    /// Renewable supply ÷ demand × 100.
    pub coverage: HourlyProfile,
    /// One entry per scenario, in declaration order.
    pub scenarios: Vec<ScenarioResult>,
    pub consolidated: ConsolidatedMapping,
}

impl IsoRun {
    pub fn scenario(&self, name: &str) -> Option<&ScenarioResult> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

/// Input sources and shared state a run draws on.
///
/// The cache and the provider chains are built by the caller and shared
/// across ISOs.
#[derive(Debug)]
pub struct Pipeline<'a> {
    config: &'a ScenarioSet,
    cache: &'a ShapeCache,
    demand: &'a ProviderChain<HourlyProfile>,
    baseline: &'a ProviderChain<MonthlyBaseline>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a ScenarioSet,
        cache: &'a ShapeCache,
        demand: &'a ProviderChain<HourlyProfile>,
        baseline: &'a ProviderChain<MonthlyBaseline>,
    ) -> Self {
        Self {
            config,
            cache,
            demand,
            baseline,
        }
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.config.engine
    }

    /// Runs the full pipeline for one ISO.
    ///
    /// # Arguments
    ///
    /// * `iso` - Country code used to query every input source
    /// * `cells` - Candidate grid cells per technology
    ///
    /// # Errors
    ///
    /// * `Configuration` if the scenario set does not validate or the cache
    ///   serves another weather year
    /// * `DataUnavailable` if demand or every candidate cell is missing
    /// * `ShapeResolutionFailure` if too many selected cells lack shapes
    pub fn run_iso(&self, iso: &str, cells: &CellTable) -> Result<IsoRun> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            return Err(TimesliceError::Configuration(errors));
        }
        let engine = &self.config.engine;
        if self.cache.year() != engine.year {
            return Err(TimesliceError::config(
                "engine.year",
                format!(
                    "shape cache serves weather year {}, configured {}",
                    self.cache.year(),
                    engine.year
                ),
            ));
        }
        if cells.values().all(Vec::is_empty) {
            return Err(TimesliceError::unavailable(iso, "no candidate grid cells"));
        }

        let demand = self.demand.require(iso)?;
        let (baseline_provider, monthly) = match self.baseline.resolve(iso)? {
            Some(found) => (Some(found.provider), found.value),
            None => {
                info!(iso, "no baseline generation data, using a zero baseline");
                (None, MonthlyBaseline::default())
            }
        };
        let baseline = monthly.total_hourly(engine.baseline_rule, &demand.value);
        let residual_mwh = residual_requirement_mwh(&demand.value, &baseline);
        info!(
            iso,
            demand_provider = %demand.provider,
            demand_mwh = demand.value.sum(),
            baseline_mwh = baseline.sum(),
            residual_mwh,
            "computed residual requirement"
        );

        let allocator =
            Allocator::new(self.cache).with_missing_tolerance(engine.missing_shape_tolerance);
        let allocation = match engine.selection_mode {
            SelectionMode::Lcoe => allocator.allocate_energy(iso, cells, residual_mwh)?,
            SelectionMode::FixedCapacity => {
                allocator.allocate_capacity(iso, cells, &engine.fixed_capacity_mw)?
            }
        };
        if allocation.is_infeasible() {
            warn!(iso, "no relevant renewable resource, continuing without renewables");
        }

        let renewable = allocation.renewable_profile();
        let mut supply = baseline.clone();
        supply.add_assign(&renewable);
        let net_load = demand.value.zip_with(&supply, |d, s| d - s);
        let coverage = coverage_profile(&renewable, &demand.value);
        let detector = StressDetector::new(&coverage);

        let scenarios: Vec<ScenarioResult> = self
            .config
            .scenarios
            .par_iter()
            .map(|scenario| run_scenario(iso, scenario, &detector, &net_load))
            .collect::<Result<_>>()?;

        let mappings: Vec<TimesliceMapping> =
            scenarios.iter().map(|s| s.mapping.clone()).collect();
        let consolidated = ConsolidatedMapping::consolidate(&mappings);

        Ok(IsoRun {
            iso: iso.to_string(),
            demand_provider: demand.provider,
            baseline_provider,
            demand: demand.value,
            baseline,
            residual_mwh,
            allocation,
            net_load,
            coverage,
            scenarios,
            consolidated,
        })
    }

    /// Runs several ISOs one after another, sharing the shape cache.
    /// Failures are reported per ISO and do not stop the batch.
    pub fn run_many<'c>(
        &self,
        isos: impl IntoIterator<Item = (&'c str, &'c CellTable)>,
    ) -> Vec<(String, Result<IsoRun>)> {
        isos.into_iter()
            .map(|(iso, cells)| {
                let result = self.run_iso(iso, cells);
                if let Err(e) = &result {
                    warn!(iso, error = %e, "timeslice generation failed");
                }
                (iso.to_string(), result)
            })
            .collect()
    }
}

fn run_scenario(
    iso: &str,
    scenario: &ScenarioConfig,
    detector: &StressDetector,
    net_load: &HourlyProfile,
) -> Result<ScenarioResult> {
    let periods = detector.detect(&scenario.stress_request())?;
    let scheme = scenario.aggregator().aggregate(net_load)?;
    let mapping =
        TimesliceMapping::assemble(&scenario.name, scheme, &periods, scenario.tag.clone());
    let diagnostics = ScenarioDiagnostics::new(&periods, &mapping);
    info!(
        iso,
        scenario = %scenario.name,
        periods = diagnostics.periods,
        stress_hours = diagnostics.stress_hours,
        aggregated_hours = diagnostics.aggregated_hours,
        timeslices = diagnostics.timeslices,
        "scenario complete"
    );
    Ok(ScenarioResult {
        name: scenario.name.clone(),
        periods,
        mapping,
        diagnostics,
    })
}
