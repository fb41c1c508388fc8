//! Temporal reduction of hourly power-system profiles into timeslices.
//!
//! For one ISO the pipeline nets baseline generation off demand, allocates
//! renewable capacity to grid cells in merit order, keeps the most extreme
//! coverage days and weeks explicitly and clusters the remaining hours into
//! contiguous seasons and diurnal periods. See [`runner::Pipeline`].

/// Contiguous circular clustering of months and hours.
pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod error;
pub mod io;
/// Standalone and consolidated timeslice mapping tables.
pub mod mapping;
pub mod resources;
pub mod runner;
/// Coverage statistics and stress-period selection.
pub mod stress;
/// Demand and baseline inputs behind fallback provider chains.
pub mod supply;

pub use config::{ConfigError, EngineConfig, ScenarioConfig, ScenarioSet};
pub use error::{Result, TimesliceError};
pub use runner::{IsoRun, Pipeline};
