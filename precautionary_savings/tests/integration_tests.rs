use approx::assert_abs_diff_eq;
use precautionary_savings::analysis::{consumption_policy, state_marginal};
use precautionary_savings::distribution::{push_forward, uniform, PolicyKernel, MASS_TOLERANCE};
use precautionary_savings::params::{CustomProcess, GridParams};
use precautionary_savings::{
    BorrowingRule, ConfigError, Model, ModelError, ModelParams, Solution, Status,
};

/// Small two-state problem that solves in well under a second
fn small_params() -> ModelParams {
    let mut params = ModelParams {
        r_save: 0.0,
        income_employed: 1.0,
        income_unemployed: 0.25,
        beta: 0.95,
        sigma: 2.0,
        custom_process: Some(CustomProcess {
            transition: vec![vec![0.9, 0.1], vec![0.5, 0.5]],
            income: vec![1.0, 0.25],
        }),
        grid: GridParams {
            a_min: 0.0,
            a_max: 1.0,
            points: 11,
        },
        ..Default::default()
    };
    params.value_iteration.tolerance = 1e-6;
    params.value_iteration.max_iterations = 500;
    params.distribution.tolerance = 1e-12;
    params.distribution.max_iterations = 2000;
    params
}

fn solve(params: ModelParams) -> (Model, Solution) {
    let model = Model::new(params).unwrap();
    let solution = model.solve();
    (model, solution)
}

#[test]
fn test_small_problem_converges_within_500_iterations() {
    let (_, solution) = solve(small_params());

    assert_eq!(solution.value_status(), Status::Converged);
    assert!(solution.value_iteration.iterations <= 500);
    assert!(solution.value_iteration.error <= 1e-6);
}

#[test]
fn test_value_and_policy_non_decreasing_in_assets() {
    let (_, solution) = solve(small_params());
    let value = solution.value();
    let policy = solution.policy();

    for s in 0..2 {
        for a in 1..11 {
            assert!(
                value[[a, s]] >= value[[a - 1, s]],
                "value decreases at a={}, s={}",
                a,
                s
            );
            assert!(
                policy[[a, s]] >= policy[[a - 1, s]],
                "policy decreases at a={}, s={}",
                a,
                s
            );
        }
    }
}

#[test]
fn test_chosen_assets_are_feasible() {
    let (model, solution) = solve(small_params());
    let policy = solution.policy();
    let consumption = consumption_policy(
        model.grid(),
        model.process(),
        model.returns(),
        policy,
    );

    for ((a0, s), &a1) in policy.indexed_iter() {
        assert!(model.utility().is_feasible(a0, s, a1));
        assert!(consumption[[a0, s]] > 0.0);
    }
}

#[test]
fn test_high_risk_aversion_never_chooses_negative_consumption() {
    // σ = 6.2 puts u(0.05) near -1.12e6, below the infeasibility sentinel
    let mut params = ModelParams::baseline();
    params.income_unemployed = 0.05;
    params.grid = GridParams {
        a_min: 0.0,
        a_max: 2.0,
        points: 41,
    };
    params.value_iteration.max_iterations = 1000;
    let (model, solution) = solve(params);
    let policy = solution.policy();
    let consumption = consumption_policy(
        model.grid(),
        model.process(),
        model.returns(),
        policy,
    );

    for ((a0, s), &a1) in policy.indexed_iter() {
        assert!(
            model.utility().is_feasible(a0, s, a1),
            "infeasible choice {} at a0={}, s={}",
            a1,
            a0,
            s
        );
        assert!(
            consumption[[a0, s]] >= 0.0,
            "c = {} at a0={}, s={}",
            consumption[[a0, s]],
            a0,
            s
        );
    }
}

#[test]
fn test_stationary_distribution_is_a_distribution() {
    let (_, solution) = solve(small_params());
    let dist = solution.distribution();

    assert!(dist.iter().all(|&m| m >= 0.0));
    assert_abs_diff_eq!(dist.sum(), 1.0, epsilon = 1e-9);
    assert!(solution.distribution.max_mass_drift <= MASS_TOLERANCE);
}

#[test]
fn test_state_marginal_matches_income_chain() {
    let (model, solution) = solve(small_params());
    let states = state_marginal(solution.distribution());
    let chain = model.process().stationary_marginal();

    for s in 0..2 {
        assert_abs_diff_eq!(states[s], chain[s], epsilon = 1e-8);
    }
}

#[test]
fn test_mass_conserved_every_iteration_large_grid() {
    // Baseline grid with the 4-state process; a short value iteration is
    // enough to get a non-trivial policy.
    let mut params = ModelParams::with_business_cycle();
    params.value_iteration.max_iterations = 25;
    let model = Model::new(params).unwrap();
    let vi = model.solve_value_function(None);
    assert_eq!(vi.policy.dim(), (301, 4));

    let kernel = PolicyKernel::new(&vi.policy);
    let mut pmf = uniform(301, 4);
    for step in 0..200 {
        let (next, drift) = push_forward(&pmf, &kernel, model.process(), true);
        assert!(drift <= MASS_TOLERANCE, "drift {} at step {}", drift, step);
        assert!((next.sum() - 1.0).abs() <= 1e-9, "mass {} at step {}", next.sum(), step);
        assert!(next.iter().all(|&m| m >= 0.0));
        pmf = next;
    }
}

#[test]
fn test_two_point_grid() {
    let mut params = small_params();
    params.grid.points = 2;
    let (model, solution) = solve(params);

    assert_eq!(solution.policy().dim(), (2, 2));
    for ((a0, s), &a1) in solution.policy().indexed_iter() {
        assert!(a1 < 2);
        assert!(model.utility().is_feasible(a0, s, a1));
    }
    assert_abs_diff_eq!(solution.distribution().sum(), 1.0, epsilon = 1e-9);
    assert!(solution.distribution().iter().all(|&m| m >= 0.0));
}

#[test]
fn test_repeat_runs_are_bit_identical() {
    let (_, first) = solve(small_params());
    let (_, second) = solve(small_params());

    assert_eq!(first.value(), second.value());
    assert_eq!(first.policy(), second.policy());
    assert_eq!(first.distribution(), second.distribution());
    assert_eq!(
        first.value_iteration.iterations,
        second.value_iteration.iterations
    );
}

#[test]
fn test_parallel_and_sequential_agree() {
    let mut params = small_params();
    params.business_cycle = true;
    params.custom_process = None;
    params.grid.points = 41;

    let (_, par) = solve(ModelParams {
        parallel: true,
        ..params.clone()
    });
    let (_, seq) = solve(ModelParams {
        parallel: false,
        ..params
    });

    assert_eq!(par.value(), seq.value());
    assert_eq!(par.policy(), seq.policy());
    assert_eq!(par.distribution(), seq.distribution());
}

#[test]
fn test_costly_borrowing_lowers_value() {
    let mut params = small_params();
    params.grid = GridParams {
        a_min: -0.5,
        a_max: 1.0,
        points: 16,
    };
    params.r_borrow = 0.25;

    let (_, save_only) = solve(ModelParams {
        borrowing: BorrowingRule::SaveRateOnly,
        ..params.clone()
    });
    let (_, sign_dependent) = solve(ModelParams {
        borrowing: BorrowingRule::SignDependent,
        ..params
    });

    assert!(save_only.value_iteration.is_converged());
    assert!(sign_dependent.value_iteration.is_converged());
    for (cheap, costly) in save_only.value().iter().zip(sign_dependent.value().iter()) {
        assert!(costly <= &(cheap + 1e-4));
    }
}

#[test]
fn test_iteration_cap_is_reported_not_raised() {
    let mut params = small_params();
    params.value_iteration.max_iterations = 5;
    let (_, solution) = solve(params);

    assert_eq!(solution.value_status(), Status::MaxIterExceeded);
    assert_eq!(solution.value_iteration.iterations, 5);
    assert!(!solution.is_converged());
    assert_abs_diff_eq!(solution.distribution().sum(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_invalid_configurations_rejected() {
    let cases: [(ModelParams, fn(&ConfigError) -> bool); 6] = [
        (
            ModelParams {
                beta: 1.0,
                ..small_params()
            },
            |e: &ConfigError| matches!(e, ConfigError::DiscountFactor(_)),
        ),
        (
            ModelParams {
                sigma: 0.0,
                ..small_params()
            },
            |e: &ConfigError| matches!(e, ConfigError::RiskAversion(_)),
        ),
        (
            ModelParams {
                grid: GridParams {
                    a_min: 0.0,
                    a_max: 1.0,
                    points: 1,
                },
                ..small_params()
            },
            |e: &ConfigError| matches!(e, ConfigError::TooFewGridPoints(1)),
        ),
        (
            ModelParams {
                grid: GridParams {
                    a_min: 1.0,
                    a_max: 0.0,
                    points: 11,
                },
                ..small_params()
            },
            |e: &ConfigError| matches!(e, ConfigError::EmptyGridRange { .. }),
        ),
        (
            ModelParams {
                custom_process: Some(CustomProcess {
                    transition: vec![vec![0.7, 0.2], vec![0.5, 0.5]],
                    income: vec![1.0, 0.25],
                }),
                ..small_params()
            },
            |e: &ConfigError| matches!(e, ConfigError::RowNotStochastic { row: 0, .. }),
        ),
        (
            ModelParams {
                custom_process: Some(CustomProcess {
                    transition: vec![vec![1.0]],
                    income: vec![1.0, 0.25],
                }),
                ..small_params()
            },
            |e: &ConfigError| matches!(e, ConfigError::TransitionShape { .. }),
        ),
    ];

    for (params, expected) in cases {
        match Model::new(params) {
            Err(ModelError::Config(e)) => assert!(expected(&e), "unexpected error {:?}", e),
            other => panic!("expected a configuration error, got {:?}", other.map(|_| ())),
        }
    }
}

#[test]
fn test_toml_config_drives_model() {
    let params = ModelParams::from_toml_str(
        r#"
        beta = 0.95
        sigma = 2.0

        [custom_process]
        transition = [[0.9, 0.1], [0.5, 0.5]]
        income = [1.0, 0.25]

        [grid]
        a_min = 0.0
        a_max = 1.0
        points = 11

        [value_iteration]
        tolerance = 1e-6
        max_iterations = 500
        "#,
    )
    .unwrap();

    let (_, from_toml) = solve(params);
    let (_, direct) = solve(small_params());
    assert_eq!(from_toml.policy(), direct.policy());
    assert_eq!(from_toml.value(), direct.value());
}

#[test]
fn test_shipped_configs_parse_and_validate() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("configs");
    for name in ["baseline.toml", "business_cycle.toml", "borrowing.toml"] {
        let params = ModelParams::from_file(dir.join(name)).unwrap();
        params.validate().unwrap();
        params.asset_grid().unwrap();
        params.process_model().unwrap();
    }
}
