//! # pt-optimizer
//!
//! Hyperparameter search for the Petal pipeline.
//!
//! Provides search space definitions, sweep strategies (grid, random,
//! frugal), the binding from sampled points to trainer hyperparameters, the
//! single-trial evaluator with its fitness metric, and the sequential
//! experiment loop that keeps the best trial within a trial cap and time budget.

mod experiment;
mod params;
mod search;
mod trial;

pub use experiment::{
    Experiment, ExperimentConfig, ExperimentId, ExperimentState, ExperimentStatus,
    ExperimentSummary, ObjectiveDirection, TracingObserver, TrialEvent, TrialObserver,
};
pub use params::{
    MaxEntParams, INITIAL_WEIGHTS_DIAMETER, L1_REGULARIZATION, L2_REGULARIZATION,
    MAXIMUM_NUMBER_OF_ITERATIONS,
};
pub use search::{
    build_strategy, FrugalSearch, GridSearch, ParameterDef, ParameterKind, ParameterSet,
    ParameterValue, RandomSearch, SearchSpace, SearchStrategy,
};
pub use trial::{
    fitness_metric, MaxEntTrialRunner, TrialError, TrialResult, TrialRunner, TrialSettings,
};
