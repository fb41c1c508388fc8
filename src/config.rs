//! TOML-based engine and scenario configuration and preset definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::aggregate::ContiguousAggregator;
use crate::error::{Result, TimesliceError};
use crate::mapping::ScenarioTag;
use crate::resources::allocator::{DEFAULT_MISSING_SHAPE_TOLERANCE, SelectionMode};
use crate::resources::cache::{DEFAULT_CACHE_CAPACITY, ShapeCache, ShapeStore};
use crate::resources::types::Technology;
use crate::stress::{StressCounts, StressRequest};
use crate::supply::BaselineRule;

/// Engine-wide parameters shared by every scenario of a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Weather year of the capacity-factor shapes.
    pub year: u16,
    /// Maximum number of (ISO, technology) entries held by the shape cache.
    pub cache_capacity: usize,
    /// Largest share of selected cells (by count) whose shapes may be
    /// missing before synthesis fails (0.0–1.0).
    pub missing_shape_tolerance: f64,
    /// Merit order used for cell selection.
    pub selection_mode: SelectionMode,
    /// How monthly baseline energy is spread over hours.
    pub baseline_rule: BaselineRule,
    /// Capacity targets (MW) per technology for `fixed_capacity` mode.
    pub fixed_capacity_mw: BTreeMap<Technology, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            year: 2023,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            missing_shape_tolerance: DEFAULT_MISSING_SHAPE_TOLERANCE,
            selection_mode: SelectionMode::Lcoe,
            baseline_rule: BaselineRule::DemandShaped,
            fixed_capacity_mw: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Shape cache over `store` for the configured year and capacity.
    pub fn shape_cache(&self, store: impl ShapeStore + 'static) -> ShapeCache {
        ShapeCache::new(store, self.year, self.cache_capacity)
    }
}

/// One declared scenario.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Scenario name, used as the column header of the consolidated table.
    pub name: String,
    /// Requested number of seasons.
    pub seasons: Option<usize>,
    /// Requested number of diurnal periods.
    pub diurnal_periods: Option<usize>,
    /// Display-only flag; parsed and ignored.
    pub plot: bool,
    /// Daily stress counts.
    pub daily: Option<StressCounts>,
    /// Weekly stress counts (scarcity only).
    pub weekly: Option<StressCounts>,
    /// Optional scalar tag carried into the mapping tables.
    pub tag: Option<ScenarioTag>,
}

impl ScenarioConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn stress_request(&self) -> StressRequest {
        StressRequest {
            daily: self.daily,
            weekly: self.weekly,
        }
    }

    pub fn has_stress(&self) -> bool {
        !self.stress_request().is_empty()
    }

    pub fn has_clustering(&self) -> bool {
        self.seasons.is_some() || self.diurnal_periods.is_some()
    }

    /// Aggregator for the remainder. A count left unset is 1.
    pub fn aggregator(&self) -> ContiguousAggregator {
        ContiguousAggregator::new(self.seasons.unwrap_or(1), self.diurnal_periods.unwrap_or(1))
    }

    fn validate_into(&self, index: usize, errors: &mut Vec<ConfigError>) {
        let path = |field: &str| format!("scenarios[{index}].{field}");

        if self.name.trim().is_empty() {
            errors.push(ConfigError {
                field: path("name"),
                message: "must not be empty".into(),
            });
        }
        if self.seasons == Some(0) {
            errors.push(ConfigError {
                field: path("seasons"),
                message: "must be > 0".into(),
            });
        }
        if self.diurnal_periods == Some(0) {
            errors.push(ConfigError {
                field: path("diurnal_periods"),
                message: "must be > 0".into(),
            });
        }
        if !self.has_stress() && !self.has_clustering() {
            errors.push(ConfigError {
                field: path("seasons"),
                message: "scenario requests neither stress periods nor clustering".into(),
            });
        }
        if let Some(weekly) = &self.weekly {
            if weekly.surplus > 0 {
                errors.push(ConfigError {
                    field: path("weekly.surplus"),
                    message: "weekly surplus selection is not supported".into(),
                });
            }
            if weekly.volatile > 0 {
                errors.push(ConfigError {
                    field: path("weekly.volatile"),
                    message: "weekly volatile selection is not supported".into(),
                });
            }
        }
        if let Some(tag) = &self.tag
            && tag.name.trim().is_empty()
        {
            errors.push(ConfigError {
                field: path("tag.name"),
                message: "must not be empty".into(),
            });
        }
    }
}

/// Top-level configuration parsed from TOML: engine parameters plus the
/// declared scenarios.
///
/// Load from TOML with [`ScenarioSet::from_toml_file`] or use one of the
/// [`ScenarioSet::PRESETS`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioSet {
    pub engine: EngineConfig,
    pub scenarios: Vec<ScenarioConfig>,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"scenarios[0].seasons"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ScenarioSet {
    /// Single scenario clustering the whole year into 4 seasons × 6 periods.
    pub fn pure_clustering() -> Self {
        Self {
            engine: EngineConfig::default(),
            scenarios: vec![ScenarioConfig {
                seasons: Some(4),
                diurnal_periods: Some(6),
                ..ScenarioConfig::named("clustering")
            }],
        }
    }

    /// Single scenario keeping 3 scarcity, 2 surplus and 1 volatile day.
    pub fn daily_stress() -> Self {
        Self {
            engine: EngineConfig::default(),
            scenarios: vec![ScenarioConfig {
                seasons: Some(2),
                diurnal_periods: Some(4),
                daily: Some(StressCounts {
                    scarcity: 3,
                    surplus: 2,
                    volatile: 1,
                }),
                ..ScenarioConfig::named("daily_stress")
            }],
        }
    }

    /// Three scenarios side by side, one of them combining daily and
    /// weekly selection.
    pub fn mixed() -> Self {
        let dry = ScenarioTag {
            name: "hydro_availability".into(),
            value: "dry".into(),
        };
        Self {
            engine: EngineConfig::default(),
            scenarios: vec![
                ScenarioConfig {
                    seasons: Some(4),
                    diurnal_periods: Some(6),
                    tag: Some(ScenarioTag {
                        value: "normal".into(),
                        ..dry.clone()
                    }),
                    ..ScenarioConfig::named("clustering")
                },
                ScenarioConfig {
                    daily: Some(StressCounts {
                        scarcity: 2,
                        surplus: 1,
                        volatile: 1,
                    }),
                    ..ScenarioConfig::named("stress_only")
                },
                ScenarioConfig {
                    seasons: Some(3),
                    diurnal_periods: Some(4),
                    daily: Some(StressCounts {
                        scarcity: 2,
                        ..StressCounts::default()
                    }),
                    weekly: Some(StressCounts {
                        scarcity: 1,
                        ..StressCounts::default()
                    }),
                    tag: Some(dry),
                    ..ScenarioConfig::named("mixed")
                },
            ],
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["pure_clustering", "daily_stress", "mixed"];

    /// Loads a scenario set from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> std::result::Result<Self, ConfigError> {
        match name {
            "pure_clustering" => Ok(Self::pure_clustering()),
            "daily_stress" => Ok(Self::daily_stress()),
            "mixed" => Ok(Self::mixed()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario set from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenarios".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario set from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let e = &self.engine;

        if e.cache_capacity == 0 {
            errors.push(ConfigError {
                field: "engine.cache_capacity".into(),
                message: "must be > 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&e.missing_shape_tolerance) {
            errors.push(ConfigError {
                field: "engine.missing_shape_tolerance".into(),
                message: "must be in [0.0, 1.0]".into(),
            });
        }
        if e.selection_mode == SelectionMode::FixedCapacity && e.fixed_capacity_mw.is_empty() {
            errors.push(ConfigError {
                field: "engine.fixed_capacity_mw".into(),
                message: "must name at least one technology in fixed_capacity mode".into(),
            });
        }
        for (tech, mw) in &e.fixed_capacity_mw {
            if !mw.is_finite() || *mw < 0.0 {
                errors.push(ConfigError {
                    field: format!("engine.fixed_capacity_mw.{tech}"),
                    message: "must be a finite value >= 0".into(),
                });
            }
        }

        if self.scenarios.is_empty() {
            errors.push(ConfigError {
                field: "scenarios".into(),
                message: "at least one scenario must be declared".into(),
            });
        }
        let mut seen = BTreeSet::new();
        for (i, scenario) in self.scenarios.iter().enumerate() {
            scenario.validate_into(i, &mut errors);
            if !scenario.name.is_empty() && !seen.insert(scenario.name.as_str()) {
                errors.push(ConfigError {
                    field: format!("scenarios[{i}].name"),
                    message: format!("duplicate scenario name \"{}\"", scenario.name),
                });
            }
        }

        errors
    }

    /// Validates and returns the set, or every problem as one
    /// `Configuration` error.
    ///
    /// # Errors
    ///
    /// `Configuration` if [`validate`](Self::validate) reports anything.
    pub fn validated(self) -> Result<Self> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(TimesliceError::Configuration(errors))
        }
    }
}
