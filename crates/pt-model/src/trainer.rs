//! Maximum-entropy (multinomial logistic regression) trainer.
//!
//! Minimizes
//!
//! ```text
//! F(W, b) = mean_i -ln softmax(W x_i + b)[y_i] + l2/2 * ||W||^2 + l1 * |W|_1
//! ```
//!
//! by proximal gradient descent: a gradient step on the smooth part followed
//! by soft-thresholding for the L1 term, with a backtracking line search on the
//! step size. The bias is not regularized. Each accepted step never increases
//! `F`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use pt_types::{LabelKey, LabelKeyMap, ModelError, PtResult, FEATURE_COUNT};

use crate::model::MulticlassModel;

const MIN_STEP: f64 = 1e-12;
const MAX_STEP: f64 = 16.0;

/// Hyperparameters for [`MaxEntTrainer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxEntOptions {
    pub l1_regularization: f32,
    pub l2_regularization: f32,
    pub maximum_number_of_iterations: u32,
    /// Initial weights are drawn uniformly from `[-d/2, d/2]`; zero means all-zero weights.
    pub initial_weights_diameter: f32,
    /// Stop once the relative objective improvement falls below this value.
    pub optimization_tolerance: f64,
    /// Seed for initial weight sampling.
    pub seed: u64,
}

impl Default for MaxEntOptions {
    fn default() -> Self {
        Self {
            l1_regularization: 1.0,
            l2_regularization: 1.0,
            maximum_number_of_iterations: 100,
            initial_weights_diameter: 0.0,
            optimization_tolerance: 1e-7,
            seed: 0,
        }
    }
}

impl MaxEntOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> PtResult<()> {
        let invalid = |message: String| -> PtResult<()> {
            Err(ModelError::InvalidOptions { message }.into())
        };

        if !(self.l1_regularization.is_finite() && self.l1_regularization >= 0.0) {
            return invalid(format!("l1_regularization must be >= 0, got {}", self.l1_regularization));
        }
        if !(self.l2_regularization.is_finite() && self.l2_regularization >= 0.0) {
            return invalid(format!("l2_regularization must be >= 0, got {}", self.l2_regularization));
        }
        if self.maximum_number_of_iterations == 0 {
            return invalid("maximum_number_of_iterations must be >= 1".to_string());
        }
        if !(self.initial_weights_diameter.is_finite() && self.initial_weights_diameter >= 0.0) {
            return invalid(format!(
                "initial_weights_diameter must be >= 0, got {}",
                self.initial_weights_diameter
            ));
        }
        if !(self.optimization_tolerance >= 0.0) {
            return invalid(format!(
                "optimization_tolerance must be >= 0, got {}",
                self.optimization_tolerance
            ));
        }
        Ok(())
    }
}

/// Linear softmax parameters: one weight row and one bias per class.
#[derive(Debug, Clone, PartialEq)]
struct Params {
    weights: Vec<[f64; FEATURE_COUNT]>,
    biases: Vec<f64>,
}

impl Params {
    fn zeros(classes: usize) -> Self {
        Self {
            weights: vec![[0.0; FEATURE_COUNT]; classes],
            biases: vec![0.0; classes],
        }
    }

    fn l1_norm(&self) -> f64 {
        self.weights.iter().flatten().map(|w| w.abs()).sum()
    }

    fn l2_norm_sq(&self) -> f64 {
        self.weights.iter().flatten().map(|w| w * w).sum()
    }
}

/// Trainer bound to one set of [`MaxEntOptions`].
#[derive(Debug, Clone)]
pub struct MaxEntTrainer {
    options: MaxEntOptions,
}

impl MaxEntTrainer {
    pub fn new(options: MaxEntOptions) -> PtResult<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &MaxEntOptions {
        &self.options
    }

    /// Fit on concatenated feature vectors and their label keys.
    ///
    /// `keys` must index into `labels`.
    pub fn train(
        &self,
        features: &[[f64; FEATURE_COUNT]],
        keys: &[LabelKey],
        labels: LabelKeyMap,
    ) -> PtResult<MulticlassModel> {
        if features.is_empty() {
            return Err(ModelError::EmptyTrainingSet.into());
        }
        if keys.len() != features.len() {
            return Err(ModelError::InvalidLabels {
                message: format!("{} label keys for {} feature rows", keys.len(), features.len()),
            }
            .into());
        }
        if let Some(row) = keys.iter().position(|&k| k >= labels.len()) {
            return Err(ModelError::InvalidLabels {
                message: format!(
                    "key {} at row {} is outside the {} known labels",
                    keys[row],
                    row,
                    labels.len()
                ),
            }
            .into());
        }
        if let Some(row) = features.iter().position(|x| x.iter().any(|v| !v.is_finite())) {
            return Err(ModelError::NonFiniteFeature { row }.into());
        }

        let classes = labels.len();
        let l1 = self.options.l1_regularization as f64;
        let l2 = self.options.l2_regularization as f64;

        let mut params = self.initial_params(classes);
        let mut smooth = smooth_objective(&params, features, keys, l2);
        let mut objective = smooth + l1 * params.l1_norm();
        if !objective.is_finite() {
            return Err(ModelError::Diverged { iteration: 0 }.into());
        }

        let mut step = 1.0;
        let mut iterations = 0;

        for iteration in 1..=self.options.maximum_number_of_iterations as usize {
            iterations = iteration;
            let grad = smooth_gradient(&params, features, keys, l2);

            let mut accepted = None;
            while step >= MIN_STEP {
                let candidate = proximal_step(&params, &grad, step, l1);
                let candidate_smooth = smooth_objective(&candidate, features, keys, l2);
                if candidate_smooth.is_finite()
                    && candidate_smooth <= quadratic_bound(&params, &grad, &candidate, smooth, step)
                {
                    accepted = Some((candidate, candidate_smooth));
                    break;
                }
                step *= 0.5;
            }

            let Some((candidate, candidate_smooth)) = accepted else {
                tracing::debug!("Line search exhausted at iteration {}", iteration);
                break;
            };

            let candidate_objective = candidate_smooth + l1 * candidate.l1_norm();
            if !candidate_objective.is_finite() {
                return Err(ModelError::Diverged { iteration }.into());
            }

            let improvement = objective - candidate_objective;
            params = candidate;
            smooth = candidate_smooth;
            let previous = objective;
            objective = candidate_objective;
            step = (step * 2.0).min(MAX_STEP);

            if improvement <= self.options.optimization_tolerance * previous.abs().max(1e-12) {
                tracing::debug!("Converged at iteration {} (objective {:.6})", iteration, objective);
                break;
            }
        }

        tracing::debug!(
            "Trained {} classes in {} iterations, objective {:.6}",
            classes,
            iterations,
            objective
        );

        Ok(MulticlassModel::new(
            params.weights,
            params.biases,
            labels,
            iterations,
            objective,
        ))
    }

    fn initial_params(&self, classes: usize) -> Params {
        let mut params = Params::zeros(classes);
        let diameter = self.options.initial_weights_diameter as f64;
        if diameter > 0.0 {
            let half = diameter / 2.0;
            let mut rng = ChaCha8Rng::seed_from_u64(self.options.seed);
            for w in params.weights.iter_mut().flatten() {
                *w = rng.gen_range(-half..=half);
            }
        }
        params
    }
}

/// Class probabilities for one feature vector.
pub(crate) fn softmax_scores(
    weights: &[[f64; FEATURE_COUNT]],
    biases: &[f64],
    x: &[f64; FEATURE_COUNT],
) -> Vec<f64> {
    let logits: Vec<f64> = weights
        .iter()
        .zip(biases)
        .map(|(w, b)| w.iter().zip(x).map(|(wi, xi)| wi * xi).sum::<f64>() + b)
        .collect();
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn smooth_objective(
    params: &Params,
    features: &[[f64; FEATURE_COUNT]],
    keys: &[LabelKey],
    l2: f64,
) -> f64 {
    let nll: f64 = features
        .iter()
        .zip(keys)
        .map(|(x, &y)| {
            let p = softmax_scores(&params.weights, &params.biases, x)[y];
            -p.max(f64::MIN_POSITIVE).ln()
        })
        .sum();
    nll / features.len() as f64 + 0.5 * l2 * params.l2_norm_sq()
}

fn smooth_gradient(
    params: &Params,
    features: &[[f64; FEATURE_COUNT]],
    keys: &[LabelKey],
    l2: f64,
) -> Params {
    let classes = params.biases.len();
    let n = features.len() as f64;
    let mut grad = Params::zeros(classes);

    for (x, &y) in features.iter().zip(keys) {
        let p = softmax_scores(&params.weights, &params.biases, x);
        for c in 0..classes {
            let residual = p[c] - if c == y { 1.0 } else { 0.0 };
            for (g, xi) in grad.weights[c].iter_mut().zip(x) {
                *g += residual * xi / n;
            }
            grad.biases[c] += residual / n;
        }
    }

    for (g_row, w_row) in grad.weights.iter_mut().zip(&params.weights) {
        for (g, w) in g_row.iter_mut().zip(w_row) {
            *g += l2 * w;
        }
    }
    grad
}

fn soft_threshold(v: f64, threshold: f64) -> f64 {
    if v > threshold {
        v - threshold
    } else if v < -threshold {
        v + threshold
    } else {
        0.0
    }
}

fn proximal_step(params: &Params, grad: &Params, step: f64, l1: f64) -> Params {
    let weights = params
        .weights
        .iter()
        .zip(&grad.weights)
        .map(|(w_row, g_row)| {
            let mut row = [0.0; FEATURE_COUNT];
            for ((out, w), g) in row.iter_mut().zip(w_row).zip(g_row) {
                *out = soft_threshold(w - step * g, step * l1);
            }
            row
        })
        .collect();
    let biases = params
        .biases
        .iter()
        .zip(&grad.biases)
        .map(|(b, g)| b - step * g)
        .collect();
    Params { weights, biases }
}

/// Upper model of the smooth objective at `next` used for the sufficient-decrease test.
fn quadratic_bound(params: &Params, grad: &Params, next: &Params, smooth: f64, step: f64) -> f64 {
    let mut linear = 0.0;
    let mut dist_sq = 0.0;
    for ((w_row, n_row), g_row) in params.weights.iter().zip(&next.weights).zip(&grad.weights) {
        for ((w, nw), g) in w_row.iter().zip(n_row).zip(g_row) {
            let d = nw - w;
            linear += g * d;
            dist_sq += d * d;
        }
    }
    for ((b, nb), g) in params.biases.iter().zip(&next.biases).zip(&grad.biases) {
        let d = nb - b;
        linear += g * d;
        dist_sq += d * d;
    }
    smooth + linear + dist_sq / (2.0 * step)
}
