//! Baseline (hydro, nuclear) generation and the residual requirement.
//!
//! Baseline inputs are monthly energy totals. They are spread over the
//! hours of each month either evenly or following the within-month demand
//! shape.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::provider::DataProvider;
use crate::calendar::{HOURS_PER_DAY, HOURS_PER_YEAR, HourlyProfile, MONTH_DAYS, month_hours};
use crate::error::Result;

const MWH_PER_TWH: f64 = 1.0e6;

/// Dispatch-independent generation sources netted off demand first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineTechnology {
    Hydro,
    Nuclear,
}

impl fmt::Display for BaselineTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BaselineTechnology::Hydro => "hydro",
            BaselineTechnology::Nuclear => "nuclear",
        })
    }
}

/// How monthly baseline energy is spread over hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineRule {
    /// Monthly energy ÷ hours in month.
    Flat,
    /// Monthly energy × normalized within-month demand shape.
    #[default]
    DemandShaped,
}

/// Monthly baseline energy per technology (TWh, January first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyBaseline {
    pub monthly_twh: BTreeMap<BaselineTechnology, [f64; 12]>,
}

impl MonthlyBaseline {
    pub fn with(mut self, technology: BaselineTechnology, monthly_twh: [f64; 12]) -> Self {
        self.monthly_twh.insert(technology, monthly_twh);
        self
    }

    /// Spreads an annual total over months in proportion to month length.
    pub fn from_annual(annual_twh: &BTreeMap<BaselineTechnology, f64>) -> Self {
        let monthly_twh = annual_twh
            .iter()
            .map(|(&tech, &twh)| {
                let share = |days: usize| (days * HOURS_PER_DAY) as f64 / HOURS_PER_YEAR as f64;
                (tech, MONTH_DAYS.map(|d| twh * share(d)))
            })
            .collect();
        Self { monthly_twh }
    }

    pub fn annual_twh(&self) -> f64 {
        self.monthly_twh.values().flat_map(|m| m.iter()).sum()
    }

    /// Hourly profile of one technology.
    pub fn hourly(
        &self,
        technology: BaselineTechnology,
        rule: BaselineRule,
        demand: &HourlyProfile,
    ) -> HourlyProfile {
        let Some(months) = self.monthly_twh.get(&technology) else {
            return HourlyProfile::zeros();
        };
        monthly_to_hourly(months, rule, demand)
    }

    /// Hourly profile of all technologies together.
    pub fn total_hourly(&self, rule: BaselineRule, demand: &HourlyProfile) -> HourlyProfile {
        let mut total = HourlyProfile::zeros();
        for months in self.monthly_twh.values() {
            total.add_assign(&monthly_to_hourly(months, rule, demand));
        }
        total
    }
}

/// Converts twelve monthly totals (TWh) into an hourly MW profile.
///
/// Under [`BaselineRule::DemandShaped`] a month whose demand sums to zero
/// falls back to the flat rule.
pub fn monthly_to_hourly(
    monthly_twh: &[f64; 12],
    rule: BaselineRule,
    demand: &HourlyProfile,
) -> HourlyProfile {
    let mut hourly = HourlyProfile::zeros().into_values();
    for (m, &twh) in monthly_twh.iter().enumerate() {
        let range = month_hours(m + 1);
        let hours = range.len() as f64;
        let energy_mwh = twh * MWH_PER_TWH;
        let month_demand: f64 = demand.values()[range.clone()].iter().sum();
        for h in range {
            hourly[h] = match rule {
                BaselineRule::DemandShaped if month_demand > 0.0 => {
                    energy_mwh * demand[h] / month_demand
                }
                _ => energy_mwh / hours,
            };
        }
    }
    HourlyProfile::from_fn(|h| hourly[h])
}

/// Energy the renewable fleet must supply: demand minus baseline, floored
/// at zero (MWh).
pub fn residual_requirement_mwh(demand: &HourlyProfile, baseline: &HourlyProfile) -> f64 {
    (demand.sum() - baseline.sum()).max(0.0)
}

/// Monthly baseline totals by ISO.
#[derive(Debug, Clone, Default)]
pub struct MonthlyBaselineTable {
    rows: HashMap<String, MonthlyBaseline>,
}

impl MonthlyBaselineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, iso: &str, baseline: MonthlyBaseline) -> Self {
        self.rows.insert(iso.to_string(), baseline);
        self
    }
}

impl DataProvider<MonthlyBaseline> for MonthlyBaselineTable {
    fn name(&self) -> &str {
        "monthly"
    }

    fn provide(&self, iso: &str) -> Result<Option<MonthlyBaseline>> {
        Ok(self
            .rows
            .get(iso)
            .filter(|b| !b.monthly_twh.is_empty())
            .cloned())
    }
}

/// Annual baseline totals by ISO, spread over months by length.
#[derive(Debug, Clone, Default)]
pub struct AnnualBaselineTable {
    rows: HashMap<String, BTreeMap<BaselineTechnology, f64>>,
}

impl AnnualBaselineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, iso: &str, technology: BaselineTechnology, annual_twh: f64) -> Self {
        self.rows
            .entry(iso.to_string())
            .or_default()
            .insert(technology, annual_twh);
        self
    }
}

impl DataProvider<MonthlyBaseline> for AnnualBaselineTable {
    fn name(&self) -> &str {
        "annual"
    }

    fn provide(&self, iso: &str) -> Result<Option<MonthlyBaseline>> {
        Ok(self
            .rows
            .get(iso)
            .filter(|r| !r.is_empty())
            .map(MonthlyBaseline::from_annual))
    }
}
