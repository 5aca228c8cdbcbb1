//! Per-period utility table
//!
//! Tabulates, for every (current asset, state, next asset) triple, the utility
//! of the consumption implied by the budget constraint
//!
//! ```text
//! c = a[a0] + y[s] - a[a1] / (1 + r)
//! ```
//!
//! Infeasible choices (`c < 0`) carry [`INFEASIBLE_UTILITY`] instead of being
//! pruned, so the Bellman maximisation stays a plain dense scan. Feasibility
//! itself is kept in a separate mask: with high risk aversion a small positive
//! consumption can score below the sentinel, so the utility value alone cannot
//! tell the two apart.

use ndarray::Array3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::grid::AssetGrid;
use crate::process::ProcessModel;

/// Utility assigned to choices that violate the budget constraint
pub const INFEASIBLE_UTILITY: f64 = -1.0e6;

/// Which rate discounts next-period assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowingRule {
    /// `r_save` for every choice, whatever the sign of `a1`
    #[default]
    SaveRateOnly,
    /// `r_borrow` when `a1 < 0`, `r_save` otherwise
    SignDependent,
}

/// Net returns faced by the household
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnSchedule {
    pub r_save: f64,
    pub r_borrow: f64,
    pub rule: BorrowingRule,
}

impl ReturnSchedule {
    /// Savings rate only
    pub fn save_only(r_save: f64) -> Self {
        ReturnSchedule {
            r_save,
            r_borrow: r_save,
            rule: BorrowingRule::SaveRateOnly,
        }
    }

    /// Net rate applied to a next-period asset position
    pub fn rate_for(&self, a_next: f64) -> f64 {
        match self.rule {
            BorrowingRule::SignDependent if a_next < 0.0 => self.r_borrow,
            _ => self.r_save,
        }
    }

    /// Consumption left after choosing `a_next` out of `a + y`
    pub fn consumption(&self, a: f64, y: f64, a_next: f64) -> f64 {
        a + y - a_next / (1.0 + self.rate_for(a_next))
    }
}

/// CRRA utility `c^(1-σ)/(1-σ)`, with `ln c` at `σ = 1`
pub fn crra(c: f64, sigma: f64) -> f64 {
    if sigma == 1.0 {
        c.ln()
    } else {
        c.powf(1.0 - sigma) / (1.0 - sigma)
    }
}

/// Whether consumption `c` satisfies the budget constraint
pub fn is_affordable(c: f64) -> bool {
    c >= 0.0
}

/// Utility of consumption `c`, or the sentinel when `c` is infeasible
///
/// Zero consumption with `σ ≥ 1` has utility `-∞`; it is floored at the
/// sentinel so the table stays finite.
pub fn period_utility(c: f64, sigma: f64) -> f64 {
    if !is_affordable(c) {
        return INFEASIBLE_UTILITY;
    }
    let u = crra(c, sigma);
    if u.is_finite() {
        u
    } else {
        INFEASIBLE_UTILITY
    }
}

/// Dense utility table indexed `[a0, s, a1]`
#[derive(Debug, Clone, PartialEq)]
pub struct UtilityTable {
    values: Array3<f64>,
    feasible: Array3<bool>,
}

impl UtilityTable {
    /// Tabulate utilities for every (a0, s, a1)
    ///
    /// Each entry is independent; with `parallel` the flat index space is
    /// split across rayon's pool.
    pub fn build(
        grid: &AssetGrid,
        process: &ProcessModel,
        returns: &ReturnSchedule,
        sigma: f64,
        parallel: bool,
    ) -> Self {
        let na = grid.len();
        let ns = process.num_states();
        let assets = grid.values();
        let income = process.income();

        let entry = |flat: usize| {
            let a0 = flat / (ns * na);
            let s = (flat / na) % ns;
            let a1 = flat % na;
            let c = returns.consumption(assets[a0], income[s], assets[a1]);
            (period_utility(c, sigma), is_affordable(c))
        };

        let total = na * ns * na;
        let (flat, mask): (Vec<f64>, Vec<bool>) = if parallel {
            (0..total).into_par_iter().map(entry).unzip()
        } else {
            (0..total).map(entry).unzip()
        };

        let values = Array3::from_shape_vec((na, ns, na), flat)
            .expect("flat utility buffer has na * ns * na entries");
        let feasible = Array3::from_shape_vec((na, ns, na), mask)
            .expect("flat feasibility mask has na * ns * na entries");

        UtilityTable { values, feasible }
    }

    /// Utility of moving from asset `a0` in state `s` to asset `a1`
    pub fn get(&self, a0: usize, s: usize, a1: usize) -> f64 {
        self.values[[a0, s, a1]]
    }

    /// Whether moving from `a0` to `a1` in state `s` leaves `c ≥ 0`
    pub fn is_feasible(&self, a0: usize, s: usize, a1: usize) -> bool {
        self.feasible[[a0, s, a1]]
    }

    /// `(Na, Ns, Na)`
    pub fn dim(&self) -> (usize, usize, usize) {
        self.values.dim()
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    /// Budget feasibility per entry, same indexing as [`values`](Self::values)
    pub fn feasible(&self) -> &Array3<bool> {
        &self.feasible
    }
}
