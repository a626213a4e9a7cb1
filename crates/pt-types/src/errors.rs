use thiserror::Error;

/// Main error type for the Petal system
#[derive(Error, Debug)]
pub enum PtError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Experiment error: {0}")]
    Experiment(#[from] ExperimentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Data-related errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("Missing column: {column}")]
    MissingColumn { column: String },

    #[error("Missing label at row {row}")]
    MissingLabel { row: usize },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Invalid split: {message}")]
    InvalidSplit { message: String },
}

/// Model training and scoring errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid trainer options: {message}")]
    InvalidOptions { message: String },

    #[error("Empty training set")]
    EmptyTrainingSet,

    #[error("Invalid training labels: {message}")]
    InvalidLabels { message: String },

    #[error("Non-finite feature value at row {row}")]
    NonFiniteFeature { row: usize },

    #[error("Training diverged at iteration {iteration}")]
    Diverged { iteration: usize },

    #[error("Scoring failed: {message}")]
    ScoringFailed { message: String },
}

/// Experiment (search loop) errors
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("Unknown search strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("Invalid parameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },
}

/// Result type alias for Petal operations
pub type PtResult<T> = Result<T, PtError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PtError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ModelError::Diverged { iteration: 42 };
        assert!(error.to_string().contains("diverged"));
        assert!(error.to_string().contains("42"));
    }

    #[test]
    fn test_error_conversion() {
        let data_error = DataError::MissingColumn {
            column: "Label".to_string(),
        };
        let pt_error: PtError = data_error.into();

        match pt_error {
            PtError::Data(_) => (),
            _ => panic!("Expected Data error"),
        }
    }

    #[test]
    fn test_config_error_macro() {
        let config_err = config_error!("Missing required field: {}", "data");
        assert!(matches!(config_err, PtError::Config(_)));
        assert!(config_err.to_string().contains("data"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let pt_error: PtError = io.into();
        assert!(pt_error.to_string().starts_with("IO error"));
    }
}
