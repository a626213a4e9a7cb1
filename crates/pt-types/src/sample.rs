use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of numeric feature columns in an iris record.
pub const FEATURE_COUNT: usize = 4;

/// Feature column names, in the order they are concatenated into the feature vector.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] =
    ["sepal_length", "sepal_width", "petal_length", "petal_width"];

/// Name of the categorical label column.
pub const LABEL_COLUMN: &str = "Label";

/// One iris flower measurement, optionally labelled with its species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sepal_length: f32,
    pub sepal_width: f32,
    pub petal_length: f32,
    pub petal_width: f32,
    pub label: Option<String>,
}

impl Sample {
    pub fn new(sepal_length: f32, sepal_width: f32, petal_length: f32, petal_width: f32) -> Self {
        Self {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
            label: None,
        }
    }

    pub fn labelled(
        sepal_length: f32,
        sepal_width: f32,
        petal_length: f32,
        petal_width: f32,
        label: &str,
    ) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::new(sepal_length, sepal_width, petal_length, petal_width)
        }
    }

    /// The four measurements concatenated in `FEATURE_COLUMNS` order.
    pub fn features(&self) -> [f32; FEATURE_COUNT] {
        [
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }

    /// Returns true if every feature is a finite number.
    pub fn is_finite(&self) -> bool {
        self.features().iter().all(|v| v.is_finite())
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.sepal_length, self.sepal_width, self.petal_length, self.petal_width
        )?;
        if let Some(label) = &self.label {
            write!(f, " {}", label)?;
        }
        Ok(())
    }
}

/// Ordered collection of samples loaded from one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

impl From<Vec<Sample>> for Dataset {
    fn from(samples: Vec<Sample>) -> Self {
        Self::new(samples)
    }
}

/// A dataset partitioned once into disjoint training and evaluation subsets.
///
/// Trials share one split read-only; it is never re-shuffled between trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSplit {
    pub train: Dataset,
    pub test: Dataset,
}

impl DataSplit {
    pub fn new(train: Dataset, test: Dataset) -> Self {
        Self { train, test }
    }

    pub fn total_len(&self) -> usize {
        self.train.len() + self.test.len()
    }
}
