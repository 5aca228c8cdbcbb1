//! Property-based tests for the process, utility table and operators.

use ndarray::Array2;
use proptest::prelude::*;

use precautionary_savings::distribution::{push_forward, PolicyKernel, MASS_TOLERANCE};
use precautionary_savings::utility::INFEASIBLE_UTILITY;
use precautionary_savings::{
    AssetGrid, BellmanOperator, ConfigError, ProcessModel, ReturnSchedule, UtilityTable,
};

/// Strategy: square matrix of positive weights, 1 to 5 states.
fn weights_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..=5).prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0.01f64..1.0, n), n))
}

fn normalise(weights: &[Vec<f64>]) -> Vec<Vec<f64>> {
    weights
        .iter()
        .map(|row| {
            let sum: f64 = row.iter().sum();
            row.iter().map(|w| w / sum).collect()
        })
        .collect()
}

fn employment() -> ProcessModel {
    ProcessModel::employment_with_transition([[0.9, 0.1], [0.5, 0.5]], 1.0, 0.25).unwrap()
}

proptest! {
    // 1. Normalised rows are accepted and stay stochastic
    #[test]
    fn stochastic_rows_accepted(weights in weights_strategy()) {
        let rows = normalise(&weights);
        let income = vec![1.0; rows.len()];
        let process = ProcessModel::from_rows(&rows, &income).unwrap();
        for row in process.transition().rows() {
            prop_assert!((row.sum() - 1.0).abs() <= 1e-8);
        }
    }

    // 2. A row pushed off unit sum is rejected
    #[test]
    fn non_stochastic_row_rejected(
        weights in weights_strategy(),
        which in 0usize..5,
        excess in 1e-6f64..0.5,
    ) {
        let mut rows = normalise(&weights);
        let row = which % rows.len();
        let last = rows[row].len() - 1;
        rows[row][last] += excess;
        let income = vec![1.0; rows.len()];

        let err = ProcessModel::from_rows(&rows, &income).unwrap_err();
        let is_row_error = matches!(
            err,
            ConfigError::RowNotStochastic { .. } | ConfigError::TransitionEntry { .. }
        );
        prop_assert!(is_row_error, "unexpected error {:?}", err);
    }

    // 3. Choices beyond cash on hand carry exactly the sentinel
    #[test]
    fn infeasible_choices_hold_sentinel(
        a_max in 0.5f64..10.0,
        points in 2usize..40,
        sigma in 0.5f64..8.0,
    ) {
        let grid = AssetGrid::uniform(0.0, a_max, points).unwrap();
        let process = employment();
        let table = UtilityTable::build(&grid, &process, &ReturnSchedule::save_only(0.0), sigma, false);

        for a0 in 0..points {
            for s in 0..2 {
                for a1 in 0..points {
                    if grid.value(a0) + process.income_in(s) < grid.value(a1) {
                        prop_assert_eq!(table.get(a0, s, a1), INFEASIBLE_UTILITY);
                    }
                }
            }
        }
    }

    // 4. Bellman operator is thread-count independent
    #[test]
    fn bellman_parallel_matches_sequential(
        values in prop::collection::vec(-50.0f64..0.0, 2 * 15),
        beta in 0.5f64..0.99,
    ) {
        let grid = AssetGrid::uniform(0.0, 2.0, 15).unwrap();
        let process = employment();
        let table = UtilityTable::build(&grid, &process, &ReturnSchedule::save_only(0.0), 2.0, false);
        let value = Array2::from_shape_vec((15, 2), values).unwrap();

        let seq = BellmanOperator::new(&table, &process, beta, false).apply(&value);
        let par = BellmanOperator::new(&table, &process, beta, true).apply(&value);
        prop_assert_eq!(seq, par);
    }

    // 5. A feasible choice is always taken when one exists, whatever σ and income
    #[test]
    fn bellman_prefers_feasible_choices(
        values in prop::collection::vec(-1.0e7f64..0.0, 2 * 21),
        sigma in 0.5f64..8.0,
        income_low in 0.01f64..1.0,
        beta in 0.5f64..0.99,
    ) {
        let grid = AssetGrid::uniform(0.0, 2.0, 21).unwrap();
        let process =
            ProcessModel::employment_with_transition([[0.9, 0.1], [0.5, 0.5]], 1.0, income_low)
                .unwrap();
        let returns = ReturnSchedule::save_only(0.0);
        let table = UtilityTable::build(&grid, &process, &returns, sigma, false);
        let value = Array2::from_shape_vec((21, 2), values).unwrap();
        let update = BellmanOperator::new(&table, &process, beta, true).apply(&value);

        for a0 in 0..21 {
            for s in 0..2 {
                let a1 = update.policy[[a0, s]];
                let c = returns.consumption(grid.value(a0), process.income_in(s), grid.value(a1));
                if (0..21).any(|k| table.is_feasible(a0, s, k)) {
                    prop_assert!(table.is_feasible(a0, s, a1));
                    prop_assert!(c >= 0.0, "c = {} at a0={}, s={}", c, a0, s);
                }
            }
        }
    }

    // 6. Any policy conserves mass
    #[test]
    fn push_forward_conserves_mass(
        choices in prop::collection::vec(0usize..20, 2 * 20),
        masses in prop::collection::vec(0.0f64..1.0, 2 * 20),
    ) {
        let total: f64 = masses.iter().sum();
        prop_assume!(total > 0.0);

        let policy = Array2::from_shape_vec((20, 2), choices).unwrap();
        let pmf = Array2::from_shape_vec((20, 2), masses.iter().map(|m| m / total).collect()).unwrap();
        let kernel = PolicyKernel::new(&policy);

        let (next, drift) = push_forward(&pmf, &kernel, &employment(), true);
        prop_assert!(drift <= MASS_TOLERANCE);
        prop_assert!((next.sum() - 1.0).abs() <= 1e-9);
        prop_assert!(next.iter().all(|&m| m >= 0.0));
    }
}
