//! Binding between sampled parameter sets and trainer hyperparameters.

use serde::{Deserialize, Serialize};

use pt_model::MaxEntOptions;
use pt_types::{ExperimentError, PtResult};

use crate::search::{ParameterSet, ParameterValue, SearchSpace};

pub const L1_REGULARIZATION: &str = "l1_regularization";
pub const L2_REGULARIZATION: &str = "l2_regularization";
pub const MAXIMUM_NUMBER_OF_ITERATIONS: &str = "maximum_number_of_iterations";
pub const INITIAL_WEIGHTS_DIAMETER: &str = "initial_weights_diameter";

/// One configuration of the maximum-entropy trainer's tunable hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxEntParams {
    pub l1_regularization: f32,
    pub l2_regularization: f32,
    pub maximum_number_of_iterations: u32,
    pub initial_weights_diameter: f32,
}

impl Default for MaxEntParams {
    fn default() -> Self {
        Self {
            l1_regularization: 0.5,
            l2_regularization: 1.0,
            maximum_number_of_iterations: 1,
            initial_weights_diameter: 0.0,
        }
    }
}

impl MaxEntParams {
    /// The four-dimensional space the experiment searches.
    pub fn search_space() -> SearchSpace {
        SearchSpace::new()
            .add_float(L1_REGULARIZATION, 0.0, 1.0)
            .add_float(L2_REGULARIZATION, 0.0, 1.0)
            .add_int(MAXIMUM_NUMBER_OF_ITERATIONS, 1, 1000)
            .add_float(INITIAL_WEIGHTS_DIAMETER, 0.0, 1.0)
    }

    /// Bind sampled values, falling back to the defaults for missing names.
    ///
    /// Values are not range-checked here; keeping them in bounds is the search
    /// strategy's job.
    pub fn from_parameters(params: &ParameterSet) -> PtResult<Self> {
        let defaults = Self::default();

        let float = |name: &str, default: f32| -> PtResult<f32> {
            match params.get(name) {
                None => Ok(default),
                Some(value) => value
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .map(|v| v as f32)
                    .ok_or_else(|| invalid(name, value)),
            }
        };

        let iterations = match params.get(MAXIMUM_NUMBER_OF_ITERATIONS) {
            None => defaults.maximum_number_of_iterations,
            Some(value) => value
                .as_i64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| invalid(MAXIMUM_NUMBER_OF_ITERATIONS, value))?,
        };

        Ok(Self {
            l1_regularization: float(L1_REGULARIZATION, defaults.l1_regularization)?,
            l2_regularization: float(L2_REGULARIZATION, defaults.l2_regularization)?,
            maximum_number_of_iterations: iterations,
            initial_weights_diameter: float(INITIAL_WEIGHTS_DIAMETER, defaults.initial_weights_diameter)?,
        })
    }

    pub fn to_parameters(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.insert(L1_REGULARIZATION.into(), ParameterValue::Float(self.l1_regularization as f64));
        params.insert(L2_REGULARIZATION.into(), ParameterValue::Float(self.l2_regularization as f64));
        params.insert(
            MAXIMUM_NUMBER_OF_ITERATIONS.into(),
            ParameterValue::Int(self.maximum_number_of_iterations as i64),
        );
        params.insert(
            INITIAL_WEIGHTS_DIAMETER.into(),
            ParameterValue::Float(self.initial_weights_diameter as f64),
        );
        params
    }

    /// Trainer options with these hyperparameters bound in.
    pub fn trainer_options(&self, seed: u64) -> MaxEntOptions {
        MaxEntOptions {
            l1_regularization: self.l1_regularization,
            l2_regularization: self.l2_regularization,
            maximum_number_of_iterations: self.maximum_number_of_iterations,
            initial_weights_diameter: self.initial_weights_diameter,
            ..MaxEntOptions::default()
        }
        .with_seed(seed)
    }
}

fn invalid(name: &str, value: &ParameterValue) -> pt_types::PtError {
    ExperimentError::InvalidParameter {
        parameter: name.to_string(),
        message: format!("unusable value {}", value),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_names_use_defaults() {
        let params = MaxEntParams::from_parameters(&ParameterSet::new()).unwrap();
        assert_eq!(params, MaxEntParams::default());
        assert_eq!(params.maximum_number_of_iterations, 1);
        assert_eq!(params.l1_regularization, 0.5);
    }

    #[test]
    fn to_and_from_parameters_agree() {
        let params = MaxEntParams {
            l1_regularization: 0.25,
            l2_regularization: 0.75,
            maximum_number_of_iterations: 300,
            initial_weights_diameter: 0.5,
        };
        assert_eq!(MaxEntParams::from_parameters(&params.to_parameters()).unwrap(), params);
    }

    #[test]
    fn unusable_iteration_counts_rejected() {
        let mut fractional = ParameterSet::new();
        fractional.insert(MAXIMUM_NUMBER_OF_ITERATIONS.into(), ParameterValue::Float(12.5));
        assert!(MaxEntParams::from_parameters(&fractional).is_err());

        let mut nan = ParameterSet::new();
        nan.insert(L2_REGULARIZATION.into(), ParameterValue::Float(f64::NAN));
        assert!(MaxEntParams::from_parameters(&nan).is_err());

        let mut negative = ParameterSet::new();
        negative.insert(MAXIMUM_NUMBER_OF_ITERATIONS.into(), ParameterValue::Int(-3));
        assert!(MaxEntParams::from_parameters(&negative).is_err());
    }

    #[test]
    fn out_of_range_values_pass_through() {
        let mut set = ParameterSet::new();
        set.insert(L1_REGULARIZATION.into(), ParameterValue::Float(-2.0));
        let params = MaxEntParams::from_parameters(&set).unwrap();
        assert_eq!(params.l1_regularization, -2.0);
        assert!(params.trainer_options(0).validate().is_err());
    }

    #[test]
    fn search_space_has_four_dimensions() {
        let space = MaxEntParams::search_space();
        let names: Vec<&str> = space.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                L1_REGULARIZATION,
                L2_REGULARIZATION,
                MAXIMUM_NUMBER_OF_ITERATIONS,
                INITIAL_WEIGHTS_DIAMETER
            ]
        );
    }
}
