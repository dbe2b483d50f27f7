use rand::rngs::StdRng;
use rand::SeedableRng;
use slice_registration::*;
use std::cell::Cell;

fn scenario_images(size: usize) -> (Image, Image, TransformParams) {
    let fixed = synthetic_phantom(size, size).unwrap();
    let truth = TransformParams::from_degrees(15.0, 1.1, 10.0, -20.0);
    let moving = warp(&fixed, &truth).unwrap();
    (fixed, moving, truth)
}

fn short_config(max_iterations: usize) -> AnnealingConfig {
    AnnealingConfig {
        max_iterations,
        ..AnnealingConfig::default()
    }
}

#[test]
fn test_same_seed_is_bit_identical() {
    let (fixed, moving, _) = scenario_images(48);
    let config = short_config(300);
    let metric = NormalizedMutualInformation::default();

    let mut rng_a = StdRng::seed_from_u64(2024);
    let mut rng_b = StdRng::seed_from_u64(2024);
    let a = optimize(
        &fixed,
        &moving,
        TransformParams::identity(),
        &config,
        &metric,
        &mut rng_a,
        &mut NoProgress,
    )
    .unwrap();
    let b = optimize(
        &fixed,
        &moving,
        TransformParams::identity(),
        &config,
        &metric,
        &mut rng_b,
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.best_score.to_bits(), b.best_score.to_bits());
    assert_eq!(a.accepted_moves, b.accepted_moves);
}

#[test]
fn test_observer_does_not_change_outcome() {
    let (fixed, moving, _) = scenario_images(40);
    let config = short_config(250);
    let metric = NormalizedMutualInformation::default();

    let mut reports = Vec::new();
    let mut rng = StdRng::seed_from_u64(5);
    let observed = optimize(
        &fixed,
        &moving,
        TransformParams::identity(),
        &config,
        &metric,
        &mut rng,
        &mut |iteration: usize, best: f64| reports.push((iteration, best)),
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(5);
    let silent = optimize(
        &fixed,
        &moving,
        TransformParams::identity(),
        &config,
        &metric,
        &mut rng,
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(observed.best_params, silent.best_params);
    assert_eq!(observed.best_score, silent.best_score);

    let iterations: Vec<usize> = reports.iter().map(|(i, _)| *i).collect();
    assert_eq!(iterations, vec![0, 100, 200]);
    assert!(reports.windows(2).all(|w| w[1].1 >= w[0].1));
    assert!(reports.iter().all(|(_, best)| *best <= observed.best_score));
}

#[test]
fn test_best_is_monotone_and_tracks_candidates() {
    let (fixed, moving, _) = scenario_images(40);
    let metric = NormalizedMutualInformation::default();
    let config = short_config(400);
    let mut search =
        AnnealingSearch::new(&fixed, &moving, TransformParams::identity(), &config, &metric)
            .unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    let mut previous_best = search.best().1;
    while !search.is_finished() {
        let outcome = search.step(&mut rng).unwrap();
        let (best_params, best_score) = search.best();

        assert!(best_score >= previous_best);
        if outcome.new_best {
            assert_eq!(best_params, outcome.candidate);
            assert_eq!(best_score, outcome.candidate_score);
            // beating the incumbent means beating the current state too
            assert!(outcome.accepted);
        }
        if outcome.accepted {
            assert_eq!(search.current().0, outcome.candidate);
        }
        previous_best = best_score;
    }

    let result = search.into_result();
    assert_eq!(result.iterations, 400);
    assert!(result.best_score >= result.initial_score);
}

#[test]
fn test_neighbours_are_drawn_around_current_state() {
    let (fixed, moving, _) = scenario_images(40);
    let metric = NormalizedMutualInformation::default();
    let config = short_config(400);
    let mut search =
        AnnealingSearch::new(&fixed, &moving, TransformParams::identity(), &config, &metric)
            .unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    // wait for an accepted downhill move so current and best diverge
    while search.current().0 == search.best().0 {
        assert!(!search.is_finished(), "current state never left the best");
        search.step(&mut rng).unwrap();
    }

    let (current, _) = search.current();
    let (best, _) = search.best();
    let expected = perturb(&current, &config, &mut rng.clone());
    let around_best = perturb(&best, &config, &mut rng.clone());

    let outcome = search.step(&mut rng).unwrap();
    assert_eq!(outcome.candidate, expected);
    assert_ne!(outcome.candidate, around_best);
}

#[test]
fn test_temperature_follows_geometric_schedule() {
    let (fixed, moving, _) = scenario_images(32);
    let metric = NormalizedMutualInformation::default();
    let config = AnnealingConfig {
        max_iterations: 50,
        initial_temperature: 1.0,
        cooling_rate: 0.95,
        ..AnnealingConfig::default()
    };
    let mut search =
        AnnealingSearch::new(&fixed, &moving, TransformParams::identity(), &config, &metric)
            .unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    for _ in 0..50 {
        search.step(&mut rng).unwrap();
    }
    let expected = 0.95f64.powi(50);
    assert!((search.temperature() - expected).abs() < 1e-12);
    assert_eq!(search.iteration(), 50);
}

#[test]
fn test_manual_stepping_supports_cancellation() {
    let (fixed, moving, _) = scenario_images(32);
    let metric = NormalizedMutualInformation::default();
    let config = short_config(1000);
    let mut search =
        AnnealingSearch::new(&fixed, &moving, TransformParams::identity(), &config, &metric)
            .unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    let cancel_after = 25;
    while !search.is_finished() && search.iteration() < cancel_after {
        search.step(&mut rng).unwrap();
    }
    assert_eq!(search.iteration(), cancel_after);
    assert!(!search.is_finished());
}

#[test]
fn test_search_improves_on_initial_guess() {
    let (fixed, moving, _) = scenario_images(64);
    let mut rng = StdRng::seed_from_u64(42);

    let initial = score(&fixed, &warp(&moving, &TransformParams::identity()).unwrap()).unwrap();
    let (best_params, best_score) =
        anneal(&fixed, &moving, TransformParams::identity(), 500, 1.0, 0.95, &mut rng).unwrap();

    assert!(best_score > initial);
    assert!(best_params.scale > 0.0);
}

#[test]
fn test_recovers_known_misalignment() {
    let (fixed, moving, truth) = scenario_images(128);
    let expected = inverse(&truth).unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    let initial = score(&fixed, &moving).unwrap();
    let (best_params, best_score) =
        anneal(&fixed, &moving, TransformParams::identity(), 2500, 1.0, 0.95, &mut rng).unwrap();

    assert!(best_score > initial);
    let errors = ParameterErrors::between(&best_params, &expected);
    assert!(errors.within(&Tolerance::default()), "errors: {:?}", errors);
}

#[test]
fn test_shape_mismatch_fails_fast() {
    let fixed = synthetic_phantom(32, 32).unwrap();
    let moving = synthetic_phantom(32, 30).unwrap();
    let mut rng = StdRng::seed_from_u64(1);

    let err = anneal(&fixed, &moving, TransformParams::identity(), 100, 1.0, 0.95, &mut rng)
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ShapeMismatch { .. }));
}

/// Scores normally for a fixed number of calls, then fails
struct FailingMetric {
    remaining: Cell<usize>,
}

impl SimilarityMetric for FailingMetric {
    fn score(&self, fixed: &Image, candidate: &Image) -> Result<f64> {
        if self.remaining.get() == 0 {
            return Err(RegistrationError::InvalidParameter("metric exhausted".to_string()));
        }
        self.remaining.set(self.remaining.get() - 1);
        NormalizedMutualInformation::default().score(fixed, candidate)
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn max_score(&self) -> f64 {
        2.0
    }
}

#[test]
fn test_metric_error_propagates_without_partial_result() {
    let (fixed, moving, _) = scenario_images(24);
    let metric = FailingMetric {
        remaining: Cell::new(10),
    };
    let mut rng = StdRng::seed_from_u64(8);
    let mut reports = 0;

    let result = optimize(
        &fixed,
        &moving,
        TransformParams::identity(),
        &short_config(100),
        &metric,
        &mut rng,
        &mut |_: usize, _: f64| reports += 1,
    );

    assert!(matches!(
        result,
        Err(RegistrationError::InvalidParameter(ref msg)) if msg.contains("exhausted")
    ));
    // iteration 0 reported before the failure on iteration 9
    assert_eq!(reports, 1);
}
