//! Simulated-annealing search over [`TransformParams`]
//!
//! A single Markov chain: each iteration perturbs the *current* state, scores
//! the candidate against the fixed image and applies the Metropolis criterion.
//! The incumbent best is tracked separately and can be updated by any
//! candidate that beats it.

use crate::error::{RegistrationError, Result};
use crate::similarity::{NormalizedMutualInformation, SimilarityMetric};
use crate::slice::Image;
use crate::transform::{warp, TransformParams};
use instant::Instant;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{span, Level, Span};
use uuid::Uuid;

/// Annealing schedule and neighbourhood size
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingConfig {
    pub max_iterations: usize,
    pub initial_temperature: f64,
    /// Temperature multiplier applied after every iteration
    pub cooling_rate: f64,
    /// Progress is reported on iterations `i` with `i % report_interval == 0`
    pub report_interval: usize,
    /// Angle perturbation half-width, degrees
    pub angle_step_degrees: f64,
    /// Scale is multiplied by a factor drawn from `[1 - scale_step, 1 + scale_step]`
    pub scale_step: f64,
    /// Translation perturbation half-width, pixels
    pub translation_step: f64,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2500,
            initial_temperature: 1.0,
            cooling_rate: 0.95,
            report_interval: 100,
            angle_step_degrees: 5.0,
            scale_step: 0.05,
            translation_step: 5.0,
        }
    }
}

impl AnnealingConfig {
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !(self.initial_temperature.is_finite() && self.initial_temperature > 0.0) {
            errors.push(format!(
                "initial_temperature must be positive, got {}",
                self.initial_temperature
            ));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate <= 1.0) {
            errors.push(format!(
                "cooling_rate must be in (0, 1], got {}",
                self.cooling_rate
            ));
        }
        if self.report_interval == 0 {
            errors.push("report_interval must be at least 1".to_string());
        }
        if !(self.angle_step_degrees.is_finite() && self.angle_step_degrees >= 0.0) {
            errors.push(format!(
                "angle_step_degrees must be non-negative, got {}",
                self.angle_step_degrees
            ));
        }
        if !(self.scale_step >= 0.0 && self.scale_step < 1.0) {
            errors.push(format!(
                "scale_step must be in [0, 1), got {}",
                self.scale_step
            ));
        }
        if !(self.translation_step.is_finite() && self.translation_step >= 0.0) {
            errors.push(format!(
                "translation_step must be non-negative, got {}",
                self.translation_step
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RegistrationError::Config(errors.join("; ")))
        }
    }
}

/// Sink for `(iteration, best_score)` progress reports
pub trait ProgressObserver {
    fn on_progress(&mut self, iteration: usize, best_score: f64);
}

impl<F: FnMut(usize, f64)> ProgressObserver for F {
    fn on_progress(&mut self, iteration: usize, best_score: f64) {
        self(iteration, best_score)
    }
}

/// Discards progress reports
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _iteration: usize, _best_score: f64) {}
}

/// Emits progress reports as `tracing` events
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_progress(&mut self, iteration: usize, best_score: f64) {
        tracing::info!(
            iteration = iteration,
            best_score = best_score,
            "Annealing progress"
        );
    }
}

/// Draw a neighbour of `params`.
///
/// Four independent uniform draws over closed intervals, in the order angle,
/// scale, tx, ty. Scale is perturbed multiplicatively so it stays positive.
pub fn perturb<R: Rng>(
    params: &TransformParams,
    config: &AnnealingConfig,
    rng: &mut R,
) -> TransformParams {
    let max_angle = config.angle_step_degrees.to_radians();
    let step = config.translation_step;

    TransformParams {
        angle: params.angle + rng.gen_range(-max_angle..=max_angle),
        scale: params.scale
            * rng.gen_range((1.0 - config.scale_step)..=(1.0 + config.scale_step)),
        tx: params.tx + rng.gen_range(-step..=step),
        ty: params.ty + rng.gen_range(-step..=step),
    }
}

/// Metropolis acceptance for a maximized score.
///
/// Improvements are accepted without consuming randomness.
pub fn metropolis_accept<R: Rng>(
    candidate_score: f64,
    current_score: f64,
    temperature: f64,
    rng: &mut R,
) -> bool {
    if candidate_score > current_score {
        return true;
    }
    rng.gen::<f64>() < ((candidate_score - current_score) / temperature).exp()
}

/// What happened during one iteration
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    /// 0-based index of the iteration just run
    pub iteration: usize,
    pub candidate: TransformParams,
    pub candidate_score: f64,
    pub accepted: bool,
    pub new_best: bool,
    /// Temperature after cooling
    pub temperature: f64,
}

/// Final outcome of a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnealingResult {
    pub best_params: TransformParams,
    pub best_score: f64,
    pub initial_params: TransformParams,
    pub initial_score: f64,
    pub iterations: usize,
    pub accepted_moves: usize,
    pub final_temperature: f64,
    pub processing_time_ms: f32,
    pub run_id: Uuid,
}

/// Search state for one annealing run.
///
/// Created from a starting guess, advanced one iteration at a time by
/// [`AnnealingSearch::step`], consumed by [`AnnealingSearch::into_result`].
/// Driving `step` by hand lets a caller check for cancellation between
/// iterations.
pub struct AnnealingSearch<'a, M: SimilarityMetric> {
    fixed: &'a Image,
    moving: &'a Image,
    metric: &'a M,
    config: AnnealingConfig,
    initial_params: TransformParams,
    initial_score: f64,
    current_params: TransformParams,
    current_score: f64,
    best_params: TransformParams,
    best_score: f64,
    temperature: f64,
    iteration: usize,
    accepted_moves: usize,
    start_time: Instant,
    run_id: Uuid,
    span: Span,
}

impl<'a, M: SimilarityMetric> AnnealingSearch<'a, M> {
    /// Score the starting guess and set the temperature to its initial value.
    pub fn new(
        fixed: &'a Image,
        moving: &'a Image,
        initial_params: TransformParams,
        config: &AnnealingConfig,
        metric: &'a M,
    ) -> Result<Self> {
        config.validate()?;

        let run_id = crate::logging::get_correlation_id().unwrap_or_else(Uuid::new_v4);
        let span = span!(
            Level::INFO,
            "annealing_search",
            metric = metric.name(),
            max_iterations = config.max_iterations,
            run_id = %run_id
        );

        let initial_image = warp(moving, &initial_params)?;
        let initial_score = metric.score(fixed, &initial_image)?;

        tracing::debug!(
            parent: &span,
            angle = initial_params.angle,
            scale = initial_params.scale,
            tx = initial_params.tx,
            ty = initial_params.ty,
            score = initial_score,
            "Initial state scored"
        );

        Ok(Self {
            fixed,
            moving,
            metric,
            config: config.clone(),
            initial_params,
            initial_score,
            current_params: initial_params,
            current_score: initial_score,
            best_params: initial_params,
            best_score: initial_score,
            temperature: config.initial_temperature,
            iteration: 0,
            accepted_moves: 0,
            start_time: Instant::now(),
            run_id,
            span,
        })
    }

    /// Run one perturb / evaluate / accept / track-best / cool iteration.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<StepOutcome> {
        let iteration = self.iteration;
        let candidate = perturb(&self.current_params, &self.config, rng);
        let candidate_image = warp(self.moving, &candidate)?;
        let candidate_score = self.metric.score(self.fixed, &candidate_image)?;

        let accepted =
            metropolis_accept(candidate_score, self.current_score, self.temperature, rng);
        if accepted {
            self.current_params = candidate;
            self.current_score = candidate_score;
            self.accepted_moves += 1;
            tracing::trace!(
                parent: &self.span,
                iteration = iteration,
                score = candidate_score,
                temperature = self.temperature,
                "Candidate accepted"
            );
        }

        // Compared against the candidate, not the accepted state
        let new_best = candidate_score > self.best_score;
        if new_best {
            self.best_params = candidate;
            self.best_score = candidate_score;
            tracing::debug!(
                parent: &self.span,
                iteration = iteration,
                best_score = candidate_score,
                "New best transform"
            );
        }

        self.temperature *= self.config.cooling_rate;
        self.iteration += 1;

        Ok(StepOutcome {
            iteration,
            candidate,
            candidate_score,
            accepted,
            new_best,
            temperature: self.temperature,
        })
    }

    /// True once `max_iterations` steps have run
    pub fn is_finished(&self) -> bool {
        self.iteration >= self.config.max_iterations
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn current(&self) -> (TransformParams, f64) {
        (self.current_params, self.current_score)
    }

    pub fn best(&self) -> (TransformParams, f64) {
        (self.best_params, self.best_score)
    }

    pub fn initial_score(&self) -> f64 {
        self.initial_score
    }

    pub fn into_result(self) -> AnnealingResult {
        let processing_time_ms = self.start_time.elapsed().as_millis() as f32;

        tracing::info!(
            parent: &self.span,
            iterations = self.iteration,
            accepted_moves = self.accepted_moves,
            initial_score = self.initial_score,
            best_score = self.best_score,
            execution_time_ms = processing_time_ms,
            "Annealing search completed"
        );

        AnnealingResult {
            best_params: self.best_params,
            best_score: self.best_score,
            initial_params: self.initial_params,
            initial_score: self.initial_score,
            iterations: self.iteration,
            accepted_moves: self.accepted_moves,
            final_temperature: self.temperature,
            processing_time_ms,
            run_id: self.run_id,
        }
    }
}

/// Run a full search of `config.max_iterations` iterations.
///
/// Any error from warping or scoring aborts the search; no partial result is
/// returned.
pub fn optimize<M, R, O>(
    fixed: &Image,
    moving: &Image,
    initial_params: TransformParams,
    config: &AnnealingConfig,
    metric: &M,
    rng: &mut R,
    observer: &mut O,
) -> Result<AnnealingResult>
where
    M: SimilarityMetric,
    R: Rng,
    O: ProgressObserver + ?Sized,
{
    let mut search = AnnealingSearch::new(fixed, moving, initial_params, config, metric)?;

    while !search.is_finished() {
        let outcome = search.step(rng)?;
        if outcome.iteration % config.report_interval == 0 {
            observer.on_progress(outcome.iteration, search.best_score);
        }
    }

    Ok(search.into_result())
}

/// Search with the default neighbourhood and NMI, returning `(best_params, best_score)`.
pub fn anneal<R: Rng>(
    fixed: &Image,
    moving: &Image,
    initial_params: TransformParams,
    max_iterations: usize,
    initial_temperature: f64,
    cooling_rate: f64,
    rng: &mut R,
) -> Result<(TransformParams, f64)> {
    let config = AnnealingConfig {
        max_iterations,
        initial_temperature,
        cooling_rate,
        ..AnnealingConfig::default()
    };
    let metric = NormalizedMutualInformation::default();
    let result = optimize(fixed, moving, initial_params, &config, &metric, rng, &mut NoProgress)?;
    Ok((result.best_params, result.best_score))
}
