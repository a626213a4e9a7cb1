//! Experiment configuration, the sequential search loop, and trial observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

use pt_types::{config_error, PtResult};

use crate::search::SearchStrategy;
use crate::trial::{TrialError, TrialResult, TrialRunner, TrialSettings};

/// Unique experiment identifier.
pub type ExperimentId = Uuid;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl Default for ObjectiveDirection {
    fn default() -> Self {
        Self::Minimize
    }
}

impl ObjectiveDirection {
    /// Returns true if `candidate` is strictly better than `current`.
    pub fn improves(self, candidate: f64, current: f64) -> bool {
        match self {
            Self::Maximize => candidate > current,
            Self::Minimize => candidate < current,
        }
    }
}

/// Top-level configuration for an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub id: ExperimentId,
    pub name: String,

    /// Which search strategy to use: "grid", "random", or "frugal".
    pub strategy: String,

    /// Maximum number of trials to run.
    pub max_trials: usize,

    /// Wall-clock budget; checked before each trial starts.
    pub time_budget: Duration,

    /// Direction of optimization.
    pub direction: ObjectiveDirection,

    /// Probability of a uniform sample for frugal search (ignored otherwise).
    pub exploration_weight: f64,

    /// Number of steps per continuous dimension for grid search.
    pub grid_steps: usize,

    /// Seed shared by the search strategy and trainer weight initialization.
    pub seed: u64,

    pub created_at: DateTime<Utc>,
}

impl ExperimentConfig {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            strategy: "frugal".to_string(),
            max_trials: 200,
            time_budget: Duration::from_secs(30),
            direction: ObjectiveDirection::Minimize,
            exploration_weight: 0.3,
            grid_steps: 5,
            seed: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_strategy(mut self, strategy: &str) -> Self {
        self.strategy = strategy.to_string();
        self
    }

    pub fn with_max_trials(mut self, n: usize) -> Self {
        self.max_trials = n;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_grid_steps(mut self, steps: usize) -> Self {
        self.grid_steps = steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> PtResult<()> {
        if self.max_trials == 0 {
            return Err(config_error!("max_trials must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.exploration_weight) {
            return Err(config_error!(
                "exploration_weight must lie in [0, 1], got {}",
                self.exploration_weight
            ));
        }
        Ok(())
    }
}

/// Lifecycle state for an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentStatus {
    pub id: ExperimentId,
    pub config: ExperimentConfig,
    pub state: ExperimentState,
    pub trials_completed: usize,
    pub trials_failed: usize,
    pub best_trial: Option<TrialResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ExperimentStatus {
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            id: config.id,
            config,
            state: ExperimentState::Pending,
            trials_completed: 0,
            trials_failed: 0,
            best_trial: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = ExperimentState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = ExperimentState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = ExperimentState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn trials_run(&self) -> usize {
        self.trials_completed + self.trials_failed
    }

    /// Update the best trial if `result` improves on the current best.
    ///
    /// Failed trials never become best. Returns true if the best changed.
    pub fn update_best(&mut self, result: &TrialResult) -> bool {
        if result.is_failure() {
            return false;
        }
        let dominated = match &self.best_trial {
            None => true,
            Some(current_best) => self
                .config
                .direction
                .improves(result.metric, current_best.metric),
        };
        if dominated {
            self.best_trial = Some(result.clone());
        }
        dominated
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Per-trial notifications emitted by [`Experiment::run`].
#[derive(Debug, Clone, Copy)]
pub enum TrialEvent<'a> {
    Started { settings: &'a TrialSettings },
    Completed { result: &'a TrialResult },
    Failed { settings: &'a TrialSettings },
    NewBest { result: &'a TrialResult },
}

/// Receives trial events. Closures taking `&TrialEvent` implement this.
pub trait TrialObserver {
    fn on_event(&mut self, event: &TrialEvent<'_>);
}

impl<F> TrialObserver for F
where
    F: FnMut(&TrialEvent<'_>),
{
    fn on_event(&mut self, event: &TrialEvent<'_>) {
        self(event)
    }
}

/// Observer that forwards trial events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TrialObserver for TracingObserver {
    fn on_event(&mut self, event: &TrialEvent<'_>) {
        match event {
            TrialEvent::Started { settings } => {
                tracing::debug!("Trial {} started: {:?}", settings.trial_number, settings.parameters)
            }
            TrialEvent::Completed { result } => tracing::info!(
                "Trial {} finished with metric {:.6} in {} ms",
                result.settings.trial_number,
                result.metric,
                result.duration_millis
            ),
            TrialEvent::Failed { settings } => {
                tracing::info!("Trial {} failed", settings.trial_number)
            }
            TrialEvent::NewBest { result } => tracing::info!(
                "Trial {} is the new best (metric {:.6})",
                result.settings.trial_number,
                result.metric
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Experiment loop
// ---------------------------------------------------------------------------

/// Outcome of [`Experiment::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub status: ExperimentStatus,
    pub elapsed: Duration,
}

impl ExperimentSummary {
    pub fn best(&self) -> Option<&TrialResult> {
        self.status.best_trial.as_ref()
    }

    pub fn into_best(self) -> Option<TrialResult> {
        self.status.best_trial
    }
}

/// Sequential search loop: one trial at a time until the trial cap, the time
/// budget, or the strategy runs out.
pub struct Experiment<R, O> {
    strategy: Box<dyn SearchStrategy>,
    runner: R,
    observer: O,
    status: ExperimentStatus,
}

impl<R: TrialRunner, O: TrialObserver> Experiment<R, O> {
    pub fn new(config: ExperimentConfig, strategy: Box<dyn SearchStrategy>, runner: R, observer: O) -> Self {
        Self {
            strategy,
            runner,
            observer,
            status: ExperimentStatus::new(config),
        }
    }

    pub fn run(mut self) -> ExperimentSummary {
        let started = Instant::now();
        let max_trials = self.status.config.max_trials;
        let budget = self.status.config.time_budget;

        tracing::info!(
            "Starting experiment '{}' ({} search, up to {} trials, {:?} budget)",
            self.status.config.name,
            self.strategy.name(),
            max_trials,
            budget
        );
        self.status.mark_running();

        while self.status.trials_run() < max_trials {
            if started.elapsed() >= budget {
                tracing::info!("Time budget of {:?} reached", budget);
                break;
            }
            let Some(parameters) = self.strategy.suggest(1).pop() else {
                tracing::info!("Search strategy exhausted");
                break;
            };

            let settings = TrialSettings::new(self.status.trials_run(), parameters);
            self.observer.on_event(&TrialEvent::Started { settings: &settings });

            let result = match self.runner.run(&settings) {
                Ok(result) => {
                    self.status.trials_completed += 1;
                    self.observer.on_event(&TrialEvent::Completed { result: &result });
                    result
                }
                Err(TrialError::ExecutionFailed) => {
                    self.status.trials_failed += 1;
                    self.observer.on_event(&TrialEvent::Failed { settings: &settings });
                    TrialResult::failed(settings)
                }
            };

            self.strategy.report(&result.settings.parameters, result.metric);
            if self.status.update_best(&result) {
                self.observer.on_event(&TrialEvent::NewBest { result: &result });
            }
        }

        if self.status.best_trial.is_some() {
            self.status.mark_completed();
        } else {
            self.status
                .mark_failed("no trial produced a model within the budget".to_string());
        }

        let elapsed = started.elapsed();
        tracing::info!(
            "Experiment finished: {} completed, {} failed in {:?}",
            self.status.trials_completed,
            self.status.trials_failed,
            elapsed
        );

        ExperimentSummary {
            status: self.status,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{GridSearch, ParameterSet, ParameterValue, RandomSearch, SearchSpace};
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};

    /// Scores a trial by its "x" parameter; fails when x is negative.
    struct FakeRunner {
        calls: Cell<usize>,
    }

    impl FakeRunner {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl TrialRunner for FakeRunner {
        fn run(&self, settings: &TrialSettings) -> Result<TrialResult, TrialError> {
            self.calls.set(self.calls.get() + 1);
            let x = settings.parameters["x"].as_f64().unwrap();
            if x < 0.0 {
                return Err(TrialError::ExecutionFailed);
            }
            let model = pt_model::MulticlassModel::new(
                vec![[0.0; 4]],
                vec![0.0],
                pt_types::LabelKeyMap::new(),
                1,
                x,
            );
            Ok(TrialResult {
                metric: x,
                model: Some(model),
                settings: settings.clone(),
                duration_millis: 1,
            })
        }
    }

    fn result_with_metric(metric: f64) -> TrialResult {
        let settings = TrialSettings::new(0, Default::default());
        TrialResult {
            metric,
            model: Some(pt_model::MulticlassModel::new(
                vec![],
                vec![],
                pt_types::LabelKeyMap::new(),
                0,
                0.0,
            )),
            settings,
            duration_millis: 0,
        }
    }

    #[test]
    fn config_validation() {
        assert!(ExperimentConfig::new("ok").validate().is_ok());
        assert!(ExperimentConfig::new("none").with_max_trials(0).validate().is_err());

        let mut config = ExperimentConfig::new("weight");
        config.exploration_weight = 1.5;
        assert!(matches!(config.validate(), Err(pt_types::PtError::Config(_))));
    }

    #[test]
    fn experiment_status_lifecycle() {
        let mut status = ExperimentStatus::new(ExperimentConfig::new("lifecycle"));
        assert_eq!(status.state, ExperimentState::Pending);
        assert!(status.started_at.is_none());

        status.mark_running();
        assert_eq!(status.state, ExperimentState::Running);
        assert!(status.started_at.is_some());

        status.mark_completed();
        assert_eq!(status.state, ExperimentState::Completed);
        assert!(status.finished_at.is_some());
    }

    #[test]
    fn best_trial_tracking_minimize() {
        let mut status = ExperimentStatus::new(ExperimentConfig::new("min"));
        assert!(status.update_best(&result_with_metric(0.15)));
        assert!(status.update_best(&result_with_metric(0.05)));
        assert!(!status.update_best(&result_with_metric(0.10)));
        assert_eq!(status.best_trial.as_ref().unwrap().metric, 0.05);
    }

    #[test]
    fn best_trial_tracking_maximize() {
        let config = ExperimentConfig::new("max").with_direction(ObjectiveDirection::Maximize);
        let mut status = ExperimentStatus::new(config);
        status.update_best(&result_with_metric(1.5));
        status.update_best(&result_with_metric(2.0));
        status.update_best(&result_with_metric(1.0));
        assert_eq!(status.best_trial.as_ref().unwrap().metric, 2.0);
    }

    #[test]
    fn failed_trial_never_becomes_best() {
        let config = ExperimentConfig::new("max").with_direction(ObjectiveDirection::Maximize);
        let mut status = ExperimentStatus::new(config);
        let failed = TrialResult::failed(TrialSettings::new(0, Default::default()));
        assert!(!status.update_best(&failed));
        assert!(status.best_trial.is_none());
    }

    #[test]
    fn experiment_stops_at_trial_cap() {
        let space = SearchSpace::new().add_float("x", 0.0, 1.0);
        let config = ExperimentConfig::new("cap").with_max_trials(7);
        let runner = FakeRunner::new();
        let summary = Experiment::new(config, Box::new(RandomSearch::new(space, 1)), &runner, TracingObserver).run();

        assert_eq!(runner.calls.get(), 7);
        assert_eq!(summary.status.trials_completed, 7);
        assert_eq!(summary.status.state, ExperimentState::Completed);
        let best = summary.best().unwrap();
        assert!(best.metric <= 1.0 && best.metric >= 0.0);
    }

    #[test]
    fn experiment_stops_when_grid_exhausted() {
        let space = SearchSpace::new().add_int("x", 0, 3);
        let config = ExperimentConfig::new("grid").with_max_trials(100);
        let summary = Experiment::new(config, Box::new(GridSearch::new(space, 5)), FakeRunner::new(), TracingObserver).run();

        assert_eq!(summary.status.trials_run(), 4);
        assert_eq!(summary.best().unwrap().metric, 0.0);
    }

    #[test]
    fn zero_budget_yields_no_model() {
        let space = SearchSpace::new().add_float("x", 0.0, 1.0);
        let config = ExperimentConfig::new("none").with_time_budget(Duration::ZERO);
        let summary = Experiment::new(config, Box::new(RandomSearch::new(space, 0)), FakeRunner::new(), TracingObserver).run();

        assert_eq!(summary.status.trials_run(), 0);
        assert_eq!(summary.status.state, ExperimentState::Failed);
        assert!(summary.into_best().is_none());
    }

    #[test]
    fn failures_are_absorbed_and_observed() {
        let space = SearchSpace::new().add_int("x", -2, 1);
        let config = ExperimentConfig::new("mixed");
        let mut events: Vec<String> = Vec::new();
        let observer = |event: &TrialEvent<'_>| {
            events.push(match event {
                TrialEvent::Started { .. } => "started".to_string(),
                TrialEvent::Completed { result } => format!("completed {}", result.metric),
                TrialEvent::Failed { .. } => "failed".to_string(),
                TrialEvent::NewBest { result } => format!("best {}", result.metric),
            })
        };
        let summary = Experiment::new(config, Box::new(GridSearch::new(space, 5)), FakeRunner::new(), observer).run();

        assert_eq!(summary.status.trials_failed, 2);
        assert_eq!(summary.status.trials_completed, 2);
        assert_eq!(summary.best().unwrap().metric, 0.0);
        assert_eq!(events.iter().filter(|e| *e == "failed").count(), 2);
        assert!(events.contains(&"best 0".to_string()));
    }

    #[test]
    fn all_failures_mean_no_best() {
        let space = SearchSpace::new().add_int("x", -3, -1);
        let config = ExperimentConfig::new("broken");
        let summary = Experiment::new(config, Box::new(GridSearch::new(space, 5)), FakeRunner::new(), TracingObserver).run();
        assert_eq!(summary.status.trials_failed, 3);
        assert!(summary.best().is_none());
        assert!(summary.status.error.is_some());
    }

    #[test]
    fn strategy_sees_sentinel_metric_for_failures() {
        struct Recording {
            reported: Arc<Mutex<Vec<f64>>>,
            left: usize,
        }
        impl SearchStrategy for Recording {
            fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
                let n = count.min(self.left);
                self.left -= n;
                (0..n)
                    .map(|i| {
                        let x = if i % 2 == 0 && self.left % 2 == 1 { -1 } else { 2 };
                        [("x".to_string(), ParameterValue::Int(x))].into_iter().collect()
                    })
                    .collect()
            }
            fn report(&mut self, _params: &ParameterSet, objective: f64) {
                self.reported.lock().unwrap().push(objective);
            }
            fn name(&self) -> &str {
                "recording"
            }
        }

        let reported = Arc::new(Mutex::new(Vec::new()));
        let strategy = Recording {
            reported: Arc::clone(&reported),
            left: 2,
        };
        let summary = Experiment::new(ExperimentConfig::new("sentinel"), Box::new(strategy), FakeRunner::new(), TracingObserver).run();

        assert_eq!(summary.status.trials_run(), 2);
        assert_eq!(*reported.lock().unwrap(), vec![f64::MAX, 2.0]);
    }
}
