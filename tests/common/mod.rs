//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use timeslicer::calendar::{HOURS_PER_DAY, HOURS_PER_YEAR, HourlyProfile};
use timeslicer::resources::{CellTable, GridCell, InMemoryShapeStore, ShapeCache, Technology};
use timeslicer::supply::demand::InMemoryDemand;
use timeslicer::supply::{MonthlyBaseline, ProviderChain};

/// Default weather year used by every fixture.
pub const YEAR: u16 = 2023;

/// Flat demand series (MW).
pub fn flat_demand(mw: f64) -> Vec<f64> {
    vec![mw; HOURS_PER_YEAR]
}

/// Capacity-factor shape equal to `cf` in hours 8–15 of every day and 0
/// elsewhere.
pub fn daylight_shape(cf: f64) -> Vec<f64> {
    (0..HOURS_PER_YEAR)
        .map(|h| if (8..=15).contains(&(h % HOURS_PER_DAY)) { cf } else { 0.0 })
        .collect()
}

/// Capacity-factor shape whose daily mean differs from day to day.
///
/// Day `d` averages `0.1 + 0.8 × ((d × 37) mod 365) / 364`; the multiplier
/// 37 is coprime with 365 so every day gets a distinct mean.
pub fn varying_shape() -> Vec<f64> {
    (0..HOURS_PER_YEAR)
        .map(|h| {
            let d = h / HOURS_PER_DAY;
            let level = 0.1 + 0.8 * ((d * 37) % 365) as f64 / 364.0;
            let swing = if h % 2 == 0 { 0.05 } else { -0.05 };
            (level + swing * (1.0 + (d % 7) as f64 / 7.0)).max(0.0)
        })
        .collect()
}

/// Coverage series with a distinct mean and a distinct swing per day.
pub fn distinct_daily_coverage() -> HourlyProfile {
    HourlyProfile::from_fn(|h| {
        let d = h / HOURS_PER_DAY;
        let mean = ((d * 37) % 365) as f64 * 0.5;
        let swing = 1.0 + ((d * 11) % 365) as f64 * 0.01;
        if h % 2 == 0 { mean + swing } else { mean - swing }
    })
}

/// One solar cell (id 1): 100 MW, CF 0.5, 50 $/MWh.
pub fn single_solar_cell() -> CellTable {
    CellTable::from([(Technology::Solar, vec![GridCell::new(1, 100.0, 0.5, 50.0)])])
}

/// Shared inputs for running the pipeline over one ISO.
pub struct Fixture {
    pub cache: ShapeCache,
    pub demand: ProviderChain<HourlyProfile>,
    pub baseline: ProviderChain<MonthlyBaseline>,
}

impl Fixture {
    /// Fixture with measured demand for `iso`, an empty baseline chain and
    /// the given shapes.
    pub fn new(iso: &str, demand: Vec<f64>, store: InMemoryShapeStore) -> Self {
        Self {
            cache: ShapeCache::with_default_capacity(store, YEAR),
            demand: ProviderChain::new("demand")
                .with(InMemoryDemand::new("measured").with_series(iso, demand)),
            baseline: ProviderChain::new("baseline"),
        }
    }
}

/// Store holding `shape` for every (iso, technology, id) given.
pub fn store_with(entries: &[(&str, Technology, u64, Vec<f64>)]) -> InMemoryShapeStore {
    let mut store = InMemoryShapeStore::new();
    for (iso, technology, id, shape) in entries {
        store.insert(iso, *technology, YEAR, *id, shape.clone());
    }
    store
}
