//! Integration tests for end-to-end timeslice generation.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::Fixture;
use timeslicer::calendar::{HOURS_PER_DAY, HOURS_PER_YEAR};
use timeslicer::config::{ScenarioConfig, ScenarioSet};
use timeslicer::mapping::Description;
use timeslicer::resources::{CellTable, GridCell, SelectionMode, Technology};
use timeslicer::stress::{StressCategory, StressCounts, StressDetector};
use timeslicer::supply::baseline::AnnualBaselineTable;
use timeslicer::supply::demand::{InMemoryDemand, SyntheticDemand};
use timeslicer::supply::{BaselineTechnology, ProviderChain};
use timeslicer::{Pipeline, TimesliceError};

/// Wind fleet whose coverage of a flat 100 MW load varies day to day.
fn varying_wind_fixture() -> (Fixture, CellTable) {
    let store = common::store_with(&[("DEU", Technology::Wind, 1, common::varying_shape())]);
    let fx = Fixture::new("DEU", common::flat_demand(100.0), store);
    let cells = CellTable::from([(Technology::Wind, vec![GridCell::new(1, 200.0, 0.5, 30.0)])]);
    (fx, cells)
}

/// Shape that is nearly calm on days 70–76 and steady otherwise.
fn calm_week_shape() -> Vec<f64> {
    (0..HOURS_PER_YEAR)
        .map(|h| {
            let d = h / HOURS_PER_DAY;
            if (70..77).contains(&d) {
                0.05
            } else {
                0.6 + 0.001 * (d % 13) as f64
            }
        })
        .collect()
}

#[test]
fn single_solar_cell_leaves_unmet_remainder() {
    let store = common::store_with(&[("ESP", Technology::Solar, 1, common::daylight_shape(0.5))]);
    let fx = Fixture::new("ESP", common::flat_demand(1000.0), store);
    let config = ScenarioSet::pure_clustering();
    let run = Pipeline::new(&config, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("ESP", &common::single_solar_cell())
        .expect("pipeline runs");

    assert!((run.residual_mwh - 8_760_000.0).abs() < 1e-6);
    let solar = &run.allocation.selections[&Technology::Solar];
    assert_eq!(solar.selections.len(), 1);
    assert_eq!(solar.selections[0].utilization, 1.0);
    assert!((solar.generation_mwh() - 438_000.0).abs() < 1e-6);
    assert!((run.allocation.unmet() - 8_322_000.0).abs() < 1e-3);

    let profile = run
        .allocation
        .profile(Technology::Solar)
        .expect("solar profile");
    for h in 0..HOURS_PER_YEAR {
        let expected = if (8..=15).contains(&(h % 24)) { 50.0 } else { 0.0 };
        assert!(
            (profile[h] - expected).abs() < 1e-9,
            "hour {h}: got {}, expected {expected}",
            profile[h]
        );
    }
}

#[test]
fn three_two_one_stress_days_are_disjoint() {
    let coverage = common::distinct_daily_coverage();
    let detector = StressDetector::new(&coverage);
    let periods = detector.select_daily(&StressCounts {
        scarcity: 3,
        surplus: 2,
        volatile: 1,
    });
    assert_eq!(periods.len(), 6);

    let days: BTreeSet<usize> = periods.iter().map(|p| p.start_day).collect();
    assert_eq!(days.len(), 6, "periods share a calendar day: {periods:?}");

    let scarcity_max = periods
        .iter()
        .filter(|p| p.category == StressCategory::Scarcity)
        .map(|p| p.coverage.mean)
        .fold(f64::NEG_INFINITY, f64::max);
    let rest_min = detector
        .daily()
        .iter()
        .filter(|w| !days.contains(&w.start_day))
        .map(|w| w.mean)
        .fold(f64::INFINITY, f64::min);
    assert!(scarcity_max <= rest_min);

    let volatile = periods
        .iter()
        .find(|p| p.category == StressCategory::Volatile)
        .expect("one volatile day");
    assert!(volatile.coverage.mean <= 100.0);
}

#[test]
fn daily_stress_preset_covers_year_exactly_once() {
    let (fx, cells) = varying_wind_fixture();
    let config = ScenarioSet::daily_stress();
    let run = Pipeline::new(&config, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("DEU", &cells)
        .expect("pipeline runs");

    let scenario = &run.scenarios[0];
    assert_eq!(scenario.periods.len(), 6);
    assert!(scenario.mapping.hour_claims().iter().all(|c| *c == 1));

    let d = scenario.diagnostics;
    assert_eq!(d.periods, 6);
    assert_eq!(d.stress_hours, 6 * 24);
    assert_eq!(d.aggregated_hours, HOURS_PER_YEAR - 6 * 24);
    let scheme = &scenario.mapping.scheme;
    assert!((1..=2).contains(&scheme.season_count()));
    assert!((3..=4).contains(&scheme.period_count()));
    assert_eq!(d.timeslices, scheme.timeslice_count() + 6);

    let letters: Vec<&str> = scenario.mapping.segments.iter().map(|s| s.letter.as_str()).collect();
    assert_eq!(letters, vec!["b", "c", "d", "e", "f", "g"]);
    let starts: Vec<usize> = scenario.mapping.segments.iter().map(|s| s.start_day).collect();
    assert!(starts.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn mixed_preset_consolidates_three_scenarios() {
    let (fx, cells) = varying_wind_fixture();
    let config = ScenarioSet::mixed();
    let run = Pipeline::new(&config, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("DEU", &cells)
        .expect("pipeline runs");

    let names: Vec<&str> = run.scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["clustering", "stress_only", "mixed"]);
    assert_eq!(run.consolidated.scenarios, vec!["clustering", "stress_only", "mixed"]);

    let stress_only = run.scenario("stress_only").expect("declared");
    assert_eq!(stress_only.mapping.scheme.timeslice_count(), 1);
    assert_eq!(stress_only.diagnostics.timeslices, 1 + 4);

    let mixed = run.scenario("mixed").expect("declared");
    assert_eq!(mixed.diagnostics.periods, 3);
    assert_eq!(mixed.diagnostics.stress_hours, 2 * 24 + 7 * 24);

    let tags: Vec<_> = run.consolidated.rows_of(Description::Tag).collect();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].source, "hydro_availability");
    assert_eq!(tags[0].values, vec!["normal", "", "dry"]);

    // clustering has no segments, so its adv columns stay blank
    assert!(
        run.consolidated
            .rows_of(Description::Adv)
            .all(|r| r.values[0].is_empty())
    );
    assert_eq!(run.consolidated.rows_of(Description::Month).count(), 12);
    assert_eq!(run.consolidated.rows_of(Description::Hour).count(), 24);
}

#[test]
fn mixed_scenario_keeps_overlapping_days() {
    let store = common::store_with(&[("DEU", Technology::Wind, 1, calm_week_shape())]);
    let fx = Fixture::new("DEU", common::flat_demand(100.0), store);
    let cells = CellTable::from([(Technology::Wind, vec![GridCell::new(1, 100.0, 0.5, 30.0)])]);
    let config = ScenarioSet {
        scenarios: vec![ScenarioConfig {
            seasons: Some(2),
            diurnal_periods: Some(2),
            daily: Some(StressCounts {
                scarcity: 2,
                ..StressCounts::default()
            }),
            weekly: Some(StressCounts {
                scarcity: 1,
                ..StressCounts::default()
            }),
            ..ScenarioConfig::named("mixed")
        }],
        ..ScenarioSet::default()
    };
    let run = Pipeline::new(&config, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("DEU", &cells)
        .expect("pipeline runs");

    let mapping = &run.scenarios[0].mapping;
    let spans: Vec<(usize, usize, StressCategory)> = mapping
        .segments
        .iter()
        .map(|s| (s.start_day, s.end_day, s.category))
        .collect();
    assert_eq!(
        spans,
        vec![
            (70, 70, StressCategory::Scarcity),
            (70, 76, StressCategory::SustainedStress),
            (71, 71, StressCategory::Scarcity),
        ]
    );
    let claims = mapping.hour_claims();
    assert_eq!(claims[70 * 24], 2);
    assert_eq!(claims[72 * 24], 1);
    assert_eq!(run.scenarios[0].diagnostics.aggregated_hours, HOURS_PER_YEAR - 7 * 24);
}

#[test]
fn fallback_providers_supply_demand_and_baseline() {
    let store = common::store_with(&[("NOR", Technology::Wind, 1, vec![0.3; HOURS_PER_YEAR])]);
    let mut fx = Fixture::new("SWE", common::flat_demand(100.0), store);
    fx.demand = ProviderChain::new("demand")
        .with(InMemoryDemand::new("measured"))
        .with(SyntheticDemand::new(11).with_annual_twh("NOR", 120.0));
    fx.baseline = ProviderChain::new("baseline").with(AnnualBaselineTable::new().with(
        "NOR",
        BaselineTechnology::Hydro,
        80.0,
    ));
    let cells = CellTable::from([(Technology::Wind, vec![GridCell::new(1, 5000.0, 0.3, 40.0)])]);
    let config = ScenarioSet::pure_clustering();
    let run = Pipeline::new(&config, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("NOR", &cells)
        .expect("pipeline runs");

    assert_eq!(run.demand_provider, "synthetic");
    assert_eq!(run.baseline_provider.as_deref(), Some("annual"));
    assert!((run.demand.sum() - 120.0e6).abs() / 120.0e6 < 1e-9);
    assert!((run.residual_mwh - 40.0e6).abs() / 40.0e6 < 1e-6);
}

#[test]
fn missing_shapes_above_tolerance_fail() {
    let store = common::store_with(&[("ITA", Technology::Solar, 1, common::daylight_shape(0.4))]);
    let fx = Fixture::new("ITA", common::flat_demand(500.0), store);
    let cells = CellTable::from([(
        Technology::Solar,
        vec![GridCell::new(1, 100.0, 0.2, 40.0), GridCell::new(2, 100.0, 0.2, 45.0)],
    )]);

    let strict = ScenarioSet::pure_clustering();
    let err = Pipeline::new(&strict, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("ITA", &cells)
        .expect_err("half the selected cells have no shape");
    match err {
        TimesliceError::ShapeResolutionFailure {
            technology,
            examples,
            total,
            ..
        } => {
            assert_eq!(technology, Technology::Solar);
            assert_eq!(examples, vec![2]);
            assert_eq!(total, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut lenient = ScenarioSet::pure_clustering();
    lenient.engine.missing_shape_tolerance = 0.5;
    let run = Pipeline::new(&lenient, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("ITA", &cells)
        .expect("within tolerance");
    assert_eq!(run.allocation.warnings.len(), 1);
    assert!(run.allocation.warnings[0].contains("dropped 1 of 2"));
}

#[test]
fn weekly_surplus_is_a_configuration_error() {
    let (fx, cells) = varying_wind_fixture();
    let mut config = ScenarioSet::pure_clustering();
    config.scenarios[0].weekly = Some(StressCounts {
        surplus: 1,
        ..StressCounts::default()
    });
    let err = Pipeline::new(&config, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("DEU", &cells)
        .expect_err("weekly surplus is unsupported");
    assert!(matches!(err, TimesliceError::Configuration(_)));
}

#[test]
fn fixed_capacity_mode_prefers_high_capacity_factor() {
    let store = common::store_with(&[
        ("DEU", Technology::Solar, 1, common::daylight_shape(0.6)),
        ("DEU", Technology::Solar, 2, common::daylight_shape(0.9)),
    ]);
    let fx = Fixture::new("DEU", common::flat_demand(100.0), store);
    let cells = CellTable::from([(
        Technology::Solar,
        vec![GridCell::new(1, 100.0, 0.2, 20.0), GridCell::new(2, 100.0, 0.3, 60.0)],
    )]);
    let mut config = ScenarioSet::pure_clustering();
    config.engine.selection_mode = SelectionMode::FixedCapacity;
    config.engine.fixed_capacity_mw = BTreeMap::from([(Technology::Solar, 150.0)]);

    let run = Pipeline::new(&config, &fx.cache, &fx.demand, &fx.baseline)
        .run_iso("DEU", &cells)
        .expect("pipeline runs");
    assert!(run.allocation.split.is_none());
    let solar = &run.allocation.selections[&Technology::Solar];
    assert_eq!(solar.cell_ids(), vec![2, 1]);
    assert_eq!(solar.selections[1].utilization, 0.5);
    assert!((solar.allocated_capacity_mw() - 150.0).abs() < 1e-9);
    // noon: 100 MW × 0.9 + 50 MW × 0.6
    let profile = run.allocation.profile(Technology::Solar).expect("solar profile");
    assert!((profile[12] - 120.0).abs() < 1e-9);
}
