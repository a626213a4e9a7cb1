//! Single-trial execution: fit one configuration and score it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use pt_model::{MulticlassModel, Pipeline};
use pt_types::{DataSplit, ModelError, PtResult};

use crate::params::MaxEntParams;
use crate::search::ParameterSet;

/// The only way a trial can fail. Causes are logged, not propagated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialError {
    #[error("trial execution failed")]
    ExecutionFailed,
}

/// One point proposed by the search strategy, numbered within its experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSettings {
    pub trial_id: Uuid,
    pub trial_number: usize,
    pub parameters: ParameterSet,
}

impl TrialSettings {
    pub fn new(trial_number: usize, parameters: ParameterSet) -> Self {
        Self {
            trial_id: Uuid::new_v4(),
            trial_number,
            parameters,
        }
    }
}

/// Result of a single trial.
///
/// A failed trial carries `f64::MAX` as its metric, no model, and zero duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub metric: f64,
    pub model: Option<MulticlassModel>,
    pub settings: TrialSettings,
    pub duration_millis: u64,
}

impl TrialResult {
    /// Sentinel result for a trial that raised [`TrialError`].
    pub fn failed(settings: TrialSettings) -> Self {
        Self {
            metric: f64::MAX,
            model: None,
            settings,
            duration_millis: 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.model.is_none()
    }

    pub fn to_json(&self) -> PtResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs one trial for the given settings.
pub trait TrialRunner {
    fn run(&self, settings: &TrialSettings) -> Result<TrialResult, TrialError>;
}

impl<T: TrialRunner + ?Sized> TrialRunner for &T {
    fn run(&self, settings: &TrialSettings) -> Result<TrialResult, TrialError> {
        (**self).run(settings)
    }
}

/// Fitness of a scored dataset: the root of the mean of
/// `(score[0] + score[1] + score[2])^2` over all rows.
///
/// The sum is taken in `f32`, the precision scores are produced in. Returns
/// `None` for empty input, for any row with fewer than three scores, or when
/// the result is not finite.
pub fn fitness_metric(scores: &[Vec<f32>]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }

    let mut total = 0.0f64;
    for row in scores {
        let [a, b, c, ..] = row.as_slice() else {
            return None;
        };
        let sum = (a + b + c) as f64;
        total += sum * sum;
    }

    let metric = (total / scores.len() as f64).sqrt();
    metric.is_finite().then_some(metric)
}

/// Trial runner for the maximum-entropy pipeline over a fixed data split.
///
/// The fitness metric re-scores the training subset; the test subset is held
/// but not consulted.
#[derive(Debug, Clone)]
pub struct MaxEntTrialRunner {
    split: Arc<DataSplit>,
    seed: u64,
}

impl MaxEntTrialRunner {
    pub fn new(split: Arc<DataSplit>, seed: u64) -> Self {
        Self { split, seed }
    }

    pub fn split(&self) -> &DataSplit {
        &self.split
    }

    /// Fit `params` on the training subset and compute the fitness metric.
    pub fn evaluate(&self, params: &MaxEntParams) -> PtResult<(f64, MulticlassModel)> {
        let pipeline = Pipeline::new(params.trainer_options(self.seed))?;
        let train = &self.split.train.samples;
        let model = pipeline.fit(train)?;

        let scores: Vec<Vec<f32>> = model
            .transform(train)
            .into_iter()
            .map(|prediction| prediction.scores)
            .collect();

        let metric = fitness_metric(&scores).ok_or_else(|| ModelError::ScoringFailed {
            message: format!(
                "cannot compute fitness over {} rows with {} classes",
                scores.len(),
                model.num_classes()
            ),
        })?;

        Ok((metric, model))
    }
}

impl TrialRunner for MaxEntTrialRunner {
    fn run(&self, settings: &TrialSettings) -> Result<TrialResult, TrialError> {
        let started = Instant::now();

        let outcome = MaxEntParams::from_parameters(&settings.parameters)
            .and_then(|params| self.evaluate(&params));

        match outcome {
            Ok((metric, model)) => Ok(TrialResult {
                metric,
                model: Some(model),
                settings: settings.clone(),
                duration_millis: started.elapsed().as_millis() as u64,
            }),
            Err(e) => {
                tracing::debug!("Trial {} failed: {}", settings.trial_number, e);
                Err(TrialError::ExecutionFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{L1_REGULARIZATION, MAXIMUM_NUMBER_OF_ITERATIONS};
    use crate::search::ParameterValue;
    use pt_types::{Dataset, Sample};

    fn toy_split(labels: &[&str]) -> Arc<DataSplit> {
        let train: Vec<Sample> = (0..12)
            .map(|i| {
                let label = labels[i % labels.len()];
                let offset = (i % labels.len()) as f32 * 2.0;
                Sample::labelled(4.5 + offset * 0.5, 3.0, 1.0 + offset, 0.2 + offset * 0.3, label)
            })
            .collect();
        let test = vec![Sample::labelled(5.0, 3.4, 1.5, 0.2, labels[0])];
        Arc::new(DataSplit::new(Dataset::new(train), Dataset::new(test)))
    }

    fn settings(params: MaxEntParams) -> TrialSettings {
        TrialSettings::new(0, params.to_parameters())
    }

    #[test]
    fn fitness_metric_of_three_rows() {
        let scores: Vec<Vec<f32>> = vec![vec![0.1, 0.2, 0.3], vec![0.0, 0.0, 0.0], vec![0.5, 0.1, 0.1]];
        let metric = fitness_metric(&scores).unwrap();
        let expected = ((0.36 + 0.0 + 0.49) / 3.0f64).sqrt();
        assert!((metric - expected).abs() < 1e-6, "metric {}", metric);
        assert!((metric - 0.5323).abs() < 1e-4);
    }

    #[test]
    fn fitness_metric_ignores_extra_components() {
        let metric = fitness_metric(&[vec![0.5, 0.25, 0.25, 9.0]]).unwrap();
        assert!((metric - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fitness_metric_rejects_short_or_empty_rows() {
        assert_eq!(fitness_metric(&[]), None);
        assert_eq!(fitness_metric(&[vec![0.5, 0.5]]), None);
        assert_eq!(fitness_metric(&[vec![f32::NAN, 0.0, 0.0]]), None);
    }

    #[test]
    fn successful_trial_has_model_and_finite_metric() {
        let runner = MaxEntTrialRunner::new(toy_split(&["a", "b", "c"]), 0);
        let result = runner
            .run(&settings(MaxEntParams {
                maximum_number_of_iterations: 50,
                ..MaxEntParams::default()
            }))
            .unwrap();

        assert!(result.model.is_some());
        assert!(!result.is_failure());
        let json = result.to_json().unwrap();
        assert!(json.contains("\"trial_number\": 0"));
        assert!(result.metric.is_finite() && result.metric >= 0.0);
        // softmax scores over exactly three classes always sum to one
        assert!((result.metric - 1.0).abs() < 1e-5);
    }

    #[test]
    fn non_finite_training_row_does_not_fail_trial() {
        let mut split = (*toy_split(&["a", "b", "c"])).clone();
        split.train.samples.push(Sample::labelled(f32::NAN, 3.0, 1.4, 0.2, "a"));
        let runner = MaxEntTrialRunner::new(Arc::new(split), 0);

        let params = MaxEntParams {
            l1_regularization: 0.0,
            l2_regularization: 0.01,
            maximum_number_of_iterations: 200,
            initial_weights_diameter: 0.0,
        };
        let result = runner.run(&settings(params)).unwrap();
        assert!(result.model.is_some());
        assert!(result.metric.is_finite());
    }

    #[test]
    fn trial_is_deterministic() {
        let runner = MaxEntTrialRunner::new(toy_split(&["a", "b", "c"]), 4);
        let params = MaxEntParams {
            initial_weights_diameter: 0.8,
            maximum_number_of_iterations: 10,
            ..MaxEntParams::default()
        };
        let first = runner.run(&settings(params)).unwrap();
        let second = runner.run(&settings(params)).unwrap();
        assert_eq!(first.metric, second.metric);
        assert_eq!(first.model, second.model);
    }

    #[test]
    fn invalid_hyperparameters_fail_the_trial() {
        let runner = MaxEntTrialRunner::new(toy_split(&["a", "b", "c"]), 0);
        let mut parameters = ParameterSet::new();
        parameters.insert(L1_REGULARIZATION.into(), ParameterValue::Float(-1.0));
        let settings = TrialSettings::new(3, parameters);

        assert_eq!(runner.run(&settings), Err(TrialError::ExecutionFailed));

        let sentinel = TrialResult::failed(settings.clone());
        assert_eq!(sentinel.metric, f64::MAX);
        assert!(sentinel.model.is_none());
        assert_eq!(sentinel.duration_millis, 0);
        assert_eq!(sentinel.settings, settings);
    }

    #[test]
    fn zero_iterations_fail_the_trial() {
        let runner = MaxEntTrialRunner::new(toy_split(&["a", "b", "c"]), 0);
        let mut parameters = ParameterSet::new();
        parameters.insert(MAXIMUM_NUMBER_OF_ITERATIONS.into(), ParameterValue::Int(0));
        assert!(runner.run(&TrialSettings::new(0, parameters)).is_err());
    }

    #[test]
    fn two_class_training_set_fails_scoring() {
        let runner = MaxEntTrialRunner::new(toy_split(&["a", "b"]), 0);
        let result = runner.run(&settings(MaxEntParams::default()));
        assert_eq!(result, Err(TrialError::ExecutionFailed));
    }
}
