//! Hourly demand providers.

use std::collections::HashMap;
use std::f64::consts::PI;

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::provider::DataProvider;
use crate::calendar::{HOURS_PER_DAY, HOURS_PER_YEAR, HourlyProfile};
use crate::error::Result;

/// Demand series held in memory, keyed by ISO.
#[derive(Debug, Clone)]
pub struct InMemoryDemand {
    name: String,
    series: HashMap<String, Vec<f64>>,
}

impl InMemoryDemand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: HashMap::new(),
        }
    }

    pub fn with_series(mut self, iso: &str, values: Vec<f64>) -> Self {
        self.series.insert(iso.to_string(), values);
        self
    }
}

impl DataProvider<HourlyProfile> for InMemoryDemand {
    fn name(&self) -> &str {
        &self.name
    }

    fn provide(&self, iso: &str) -> Result<Option<HourlyProfile>> {
        match self.series.get(iso) {
            Some(values) if !values.is_empty() => {
                HourlyProfile::new(iso, "demand", values.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// Shape parameters for synthetic demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticShape {
    /// Diurnal swing as a fraction of mean load.
    pub diurnal_amp: f64,
    /// Seasonal swing as a fraction of mean load (peak in winter).
    pub seasonal_amp: f64,
    /// Phase offset of the diurnal sinusoid (radians).
    pub phase_rad: f64,
    /// Gaussian noise standard deviation as a fraction of mean load.
    pub noise_std: f64,
}

impl Default for SyntheticShape {
    fn default() -> Self {
        Self {
            diurnal_amp: 0.2,
            seasonal_amp: 0.1,
            phase_rad: 1.2,
            noise_std: 0.02,
        }
    }
}

/// Last-resort demand built from an annual total.
///
/// The profile is a diurnal sinusoid on top of a seasonal one with seeded
/// Gaussian noise, rescaled so it integrates to the annual total exactly.
#[derive(Debug, Clone)]
pub struct SyntheticDemand {
    annual_twh: HashMap<String, f64>,
    shape: SyntheticShape,
    seed: u64,
}

impl SyntheticDemand {
    pub fn new(seed: u64) -> Self {
        Self {
            annual_twh: HashMap::new(),
            shape: SyntheticShape::default(),
            seed,
        }
    }

    pub fn with_shape(mut self, shape: SyntheticShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_annual_twh(mut self, iso: &str, twh: f64) -> Self {
        self.annual_twh.insert(iso.to_string(), twh);
        self
    }

    /// Generates the hourly profile for an annual total.
    pub fn generate(&self, iso: &str, annual_twh: f64) -> Result<HourlyProfile> {
        let mean_mw = annual_twh * 1.0e6 / HOURS_PER_YEAR as f64;
        let iso_salt = iso.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b.into()));
        let mut rng = StdRng::seed_from_u64(self.seed ^ iso_salt);
        let s = self.shape;

        let raw: Vec<f64> = (0..HOURS_PER_YEAR)
            .map(|h| {
                let hour = (h % HOURS_PER_DAY) as f64;
                let day = (h / HOURS_PER_DAY) as f64;
                let diurnal = (2.0 * PI * hour / HOURS_PER_DAY as f64 - s.phase_rad).sin();
                let seasonal = (2.0 * PI * day / 365.0).cos();
                let noise = gaussian_noise(&mut rng, s.noise_std);
                (1.0 + s.diurnal_amp * diurnal + s.seasonal_amp * seasonal + noise).max(0.0)
            })
            .collect();

        let raw_sum: f64 = raw.iter().sum();
        let scale = if raw_sum > 0.0 {
            mean_mw * HOURS_PER_YEAR as f64 / raw_sum
        } else {
            0.0
        };
        HourlyProfile::new(iso, "synthetic demand", raw.into_iter().map(|v| v * scale).collect())
    }
}

impl DataProvider<HourlyProfile> for SyntheticDemand {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn provide(&self, iso: &str) -> Result<Option<HourlyProfile>> {
        match self.annual_twh.get(iso) {
            Some(&twh) if twh > 0.0 => self.generate(iso, twh).map(Some),
            _ => Ok(None),
        }
    }
}

/// Gaussian noise via the Box-Muller transform.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    z0 * std_dev
}
