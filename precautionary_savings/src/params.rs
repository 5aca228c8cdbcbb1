use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ModelError, Result};
use crate::grid::AssetGrid;
use crate::process::ProcessModel;
use crate::utility::{BorrowingRule, ReturnSchedule};

/// Weeks per year used to convert annual rates to model periods
pub const WEEKS_PER_YEAR: f64 = 52.0;

/// Asset grid bounds and resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    pub a_min: f64,
    pub a_max: f64,
    pub points: usize,
}

impl Default for GridParams {
    fn default() -> Self {
        GridParams {
            a_min: 0.0,
            a_max: 8.0,
            points: 301,
        }
    }
}

/// Stopping rule and reporting cadence handed to an iterative solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationParams {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub report_every: usize,
}

impl IterationParams {
    fn validate(&self, name: &'static str) -> std::result::Result<(), ConfigError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::Tolerance {
                name,
                value: self.tolerance,
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::IterationCap { name });
        }
        Ok(())
    }
}

/// Value iteration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueIterationParams {
    /// Sup-norm tolerance between successive value functions
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Progress callback cadence in iterations
    pub report_every: usize,
}

impl Default for ValueIterationParams {
    fn default() -> Self {
        ValueIterationParams {
            tolerance: 1e-7,
            max_iterations: 5000,
            report_every: 100,
        }
    }
}

impl ValueIterationParams {
    pub fn settings(&self) -> IterationParams {
        IterationParams {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            report_every: self.report_every,
        }
    }
}

/// Stationary distribution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionParams {
    /// Sup-norm tolerance between successive distributions
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Progress callback cadence in iterations
    pub report_every: usize,
}

impl Default for DistributionParams {
    fn default() -> Self {
        DistributionParams {
            tolerance: 1e-10,
            max_iterations: 200,
            report_every: 10,
        }
    }
}

impl DistributionParams {
    pub fn settings(&self) -> IterationParams {
        IterationParams {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            report_every: self.report_every,
        }
    }
}

/// Explicit Markov chain overriding the calibrated ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomProcess {
    pub transition: Vec<Vec<f64>>,
    pub income: Vec<f64>,
}

/// Model parameters for the precautionary savings problem
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Model period length in weeks
    pub period_weeks: f64,
    /// Net real return on savings per period
    pub r_save: f64,
    /// Net real borrowing rate per period (only used under `sign_dependent`)
    pub r_borrow: f64,
    /// Which rate discounts next-period assets
    pub borrowing: BorrowingRule,
    /// Income when employed (y)
    pub income_employed: f64,
    /// Income when unemployed (θ)
    pub income_unemployed: f64,
    /// Discount factor (β)
    pub beta: f64,
    /// Coefficient of relative risk aversion (σ)
    pub sigma: f64,
    /// Cross employment with an aggregate good/bad state
    pub business_cycle: bool,
    /// Explicit chain; takes precedence over `business_cycle`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_process: Option<CustomProcess>,
    pub grid: GridParams,
    pub value_iteration: ValueIterationParams,
    pub distribution: DistributionParams,
    /// Spread per-cell work over rayon's pool
    pub parallel: bool,
    /// Size of a dedicated thread pool (rayon's global pool when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
}

impl ModelParams {
    /// Six-week periods, storage-only savings, 8% annual borrowing rate
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Baseline with the 4-state business-cycle income process
    pub fn with_business_cycle() -> Self {
        ModelParams {
            business_cycle: true,
            ..Self::default()
        }
    }

    /// Convert an annual net rate to a per-period net rate
    pub fn per_period_rate(annual: f64, period_weeks: f64) -> f64 {
        (1.0 + annual).powf(period_weeks / WEEKS_PER_YEAR) - 1.0
    }

    /// Model periods per year
    pub fn periods_per_year(&self) -> f64 {
        WEEKS_PER_YEAR / self.period_weeks
    }

    /// Parse parameters from TOML, filling missing keys with defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load parameters from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ModelError::io(format!("reading {}", path.display()), e))?;
        Self::from_toml_str(&contents)
    }

    /// Check scalar parameters; grid and process are checked when built
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.period_weeks.is_finite() && self.period_weeks > 0.0) {
            return Err(ConfigError::PeriodLength(self.period_weeks));
        }
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err(ConfigError::DiscountFactor(self.beta));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(ConfigError::RiskAversion(self.sigma));
        }
        for (name, value) in [("r_save", self.r_save), ("r_borrow", self.r_borrow)] {
            if !(value.is_finite() && value > -1.0) {
                return Err(ConfigError::ReturnRate { name, value });
            }
        }
        self.value_iteration.settings().validate("value iteration")?;
        self.distribution.settings().validate("distribution")?;
        if self.num_threads == Some(0) {
            return Err(ConfigError::ThreadCount);
        }
        Ok(())
    }

    pub fn asset_grid(&self) -> std::result::Result<AssetGrid, ConfigError> {
        AssetGrid::uniform(self.grid.a_min, self.grid.a_max, self.grid.points)
    }

    /// Income process selected by `custom_process` or `business_cycle`
    pub fn process_model(&self) -> std::result::Result<ProcessModel, ConfigError> {
        match (&self.custom_process, self.business_cycle) {
            (Some(custom), _) => ProcessModel::from_rows(&custom.transition, &custom.income),
            (None, true) => {
                ProcessModel::business_cycle(self.income_employed, self.income_unemployed)
            }
            (None, false) => ProcessModel::employment(self.income_employed, self.income_unemployed),
        }
    }

    pub fn returns(&self) -> ReturnSchedule {
        ReturnSchedule {
            r_save: self.r_save,
            r_borrow: self.r_borrow,
            rule: self.borrowing,
        }
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        let period_weeks = 6.0;
        ModelParams {
            period_weeks,
            r_save: 0.0,
            r_borrow: Self::per_period_rate(0.08, period_weeks),
            borrowing: BorrowingRule::SaveRateOnly,
            income_employed: 1.0,
            income_unemployed: 0.25,
            beta: 0.995,
            sigma: 6.2,
            business_cycle: false,
            custom_process: None,
            grid: GridParams::default(),
            value_iteration: ValueIterationParams::default(),
            distribution: DistributionParams::default(),
            parallel: true,
            num_threads: None,
        }
    }
}
