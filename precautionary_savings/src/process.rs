//! Exogenous income process
//!
//! A finite Markov chain over income states: a row-stochastic transition
//! matrix `P` and one income level per state. Two calibrated chains are
//! provided as named constructors; any other chain can be supplied as an
//! explicit `(P, income)` pair.

use fixed_point::{sup_norm, FixedPoint};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum allowed deviation of a transition row sum from 1
pub const ROW_SUM_TOLERANCE: f64 = 1e-8;

/// Employment-only chain, states (employed, unemployed)
pub const EMPLOYMENT_TRANSITION: [[f64; 2]; 2] = [[0.9565, 0.0435], [0.5, 0.5]];

/// Aggregate cycle × employment chain, states
/// (good/employed, good/unemployed, bad/employed, bad/unemployed)
pub const BUSINESS_CYCLE_TRANSITION: [[f64; 4]; 4] = [
    [0.9141, 0.0234, 0.0587, 0.0038],
    [0.5625, 0.3750, 0.0269, 0.0356],
    [0.0608, 0.0016, 0.8813, 0.0563],
    [0.0375, 0.0250, 0.4031, 0.5344],
];

/// Which chain a [`ProcessModel`] was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    /// 2 states: employed, unemployed
    Employment,
    /// 4 states: aggregate good/bad crossed with employed/unemployed
    BusinessCycle,
    /// User-supplied chain of any size
    Custom,
}

impl std::fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessKind::Employment => write!(f, "Employment"),
            ProcessKind::BusinessCycle => write!(f, "Business Cycle"),
            ProcessKind::Custom => write!(f, "Custom"),
        }
    }
}

/// Validated Markov income process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessModel {
    kind: ProcessKind,
    transition: Array2<f64>,
    income: Array1<f64>,
    labels: Vec<String>,
}

impl ProcessModel {
    /// Build a process from an explicit transition matrix and income vector
    ///
    /// Rows must sum to 1 within [`ROW_SUM_TOLERANCE`]; they are then rescaled
    /// to sum to 1 as closely as floating point allows, so that pushing
    /// probability mass through `P` does not drift.
    pub fn new(
        kind: ProcessKind,
        transition: Array2<f64>,
        income: Array1<f64>,
    ) -> Result<Self, ConfigError> {
        let ns = income.len();
        if ns == 0 {
            return Err(ConfigError::NoStates);
        }

        let (rows, cols) = transition.dim();
        if rows != ns || cols != ns {
            return Err(ConfigError::TransitionShape {
                rows,
                cols,
                expected: ns,
            });
        }

        if let Some((state, &value)) = income.iter().enumerate().find(|(_, y)| !y.is_finite()) {
            return Err(ConfigError::NonFiniteIncome { state, value });
        }

        let mut transition = transition;
        for (row, mut probs) in transition.rows_mut().into_iter().enumerate() {
            for (col, &value) in probs.iter().enumerate() {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::TransitionEntry { row, col, value });
                }
            }

            let sum = probs.sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(ConfigError::RowNotStochastic { row, sum });
            }
            probs.mapv_inplace(|p| p / sum);
        }

        let labels = default_labels(kind, ns);

        Ok(ProcessModel {
            kind,
            transition,
            income,
            labels,
        })
    }

    /// Build a custom process from nested rows
    pub fn from_rows(transition: &[Vec<f64>], income: &[f64]) -> Result<Self, ConfigError> {
        let ns = income.len();
        if ns == 0 {
            return Err(ConfigError::NoStates);
        }
        if let Some(bad) = transition.iter().find(|row| row.len() != ns) {
            return Err(ConfigError::TransitionShape {
                rows: transition.len(),
                cols: bad.len(),
                expected: ns,
            });
        }
        if transition.len() != ns {
            return Err(ConfigError::TransitionShape {
                rows: transition.len(),
                cols: ns,
                expected: ns,
            });
        }

        let matrix = Array2::from_shape_fn((ns, ns), |(i, j)| transition[i][j]);
        Self::new(ProcessKind::Custom, matrix, Array1::from(income.to_vec()))
    }

    /// Employed/unemployed chain with the calibrated transition matrix
    pub fn employment(employed: f64, unemployed: f64) -> Result<Self, ConfigError> {
        Self::employment_with_transition(EMPLOYMENT_TRANSITION, employed, unemployed)
    }

    /// Employed/unemployed chain with a caller-supplied transition matrix
    pub fn employment_with_transition(
        transition: [[f64; 2]; 2],
        employed: f64,
        unemployed: f64,
    ) -> Result<Self, ConfigError> {
        let matrix = Array2::from_shape_fn((2, 2), |(i, j)| transition[i][j]);
        Self::new(
            ProcessKind::Employment,
            matrix,
            Array1::from(vec![employed, unemployed]),
        )
    }

    /// Aggregate cycle × employment chain; income depends on employment only
    pub fn business_cycle(employed: f64, unemployed: f64) -> Result<Self, ConfigError> {
        let matrix = Array2::from_shape_fn((4, 4), |(i, j)| BUSINESS_CYCLE_TRANSITION[i][j]);
        Self::new(
            ProcessKind::BusinessCycle,
            matrix,
            Array1::from(vec![employed, unemployed, employed, unemployed]),
        )
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Number of exogenous states (`Ns`)
    pub fn num_states(&self) -> usize {
        self.income.len()
    }

    pub fn transition(&self) -> &Array2<f64> {
        &self.transition
    }

    pub fn income(&self) -> &Array1<f64> {
        &self.income
    }

    /// Income in state `s`
    pub fn income_in(&self, s: usize) -> f64 {
        self.income[s]
    }

    /// Transition probability `P[s, s_next]`
    pub fn prob(&self, s: usize, s_next: usize) -> f64 {
        self.transition[[s, s_next]]
    }

    pub fn label(&self, s: usize) -> &str {
        &self.labels[s]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Long-run distribution of the exogenous chain alone
    ///
    /// Power iteration on the lazy chain `(P + I) / 2`, which has the same
    /// stationary distribution as `P` but is aperiodic.
    pub fn stationary_marginal(&self) -> Array1<f64> {
        let ns = self.num_states();
        let lazy = (&self.transition + &Array2::<f64>::eye(ns)) * 0.5;

        let outcome = FixedPoint::new(
            |pi: &Array1<f64>| pi.dot(&lazy),
            |a: &Array1<f64>, b: &Array1<f64>| sup_norm(a, b),
        )
        .tolerance(1e-14)
        .max_iterations(100_000)
        .label("income chain marginal")
        .run(Array1::from_elem(ns, 1.0 / ns as f64));

        let pi = outcome.state;
        let total = pi.sum();
        pi / total
    }
}

fn default_labels(kind: ProcessKind, ns: usize) -> Vec<String> {
    match (kind, ns) {
        (ProcessKind::Employment, 2) => vec!["employed".to_string(), "unemployed".to_string()],
        (ProcessKind::BusinessCycle, 4) => vec![
            "good/employed".to_string(),
            "good/unemployed".to_string(),
            "bad/employed".to_string(),
            "bad/unemployed".to_string(),
        ],
        _ => (0..ns).map(|s| format!("state {}", s)).collect(),
    }
}
