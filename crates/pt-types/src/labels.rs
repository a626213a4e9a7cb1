use serde::{Deserialize, Serialize};

use crate::errors::{DataError, PtResult};
use crate::sample::Sample;

/// Dense key assigned to a label value.
pub type LabelKey = usize;

/// Bijection between label strings and the dense key space `0..len()`.
///
/// Keys are assigned in order of first occurrence, so the same training
/// subset always yields the same mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelKeyMap {
    values: Vec<String>,
}

impl LabelKeyMap {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Build the mapping from the labels of `samples`.
    ///
    /// Every sample must carry a label.
    pub fn fit(samples: &[Sample]) -> PtResult<Self> {
        let mut map = Self::new();
        for (row, sample) in samples.iter().enumerate() {
            let label = sample.label.as_deref().ok_or(DataError::MissingLabel { row })?;
            map.insert(label);
        }
        Ok(map)
    }

    /// Insert a value, returning its key (existing or newly assigned).
    pub fn insert(&mut self, value: &str) -> LabelKey {
        match self.key_of(value) {
            Some(key) => key,
            None => {
                self.values.push(value.to_string());
                self.values.len() - 1
            }
        }
    }

    pub fn key_of(&self, value: &str) -> Option<LabelKey> {
        self.values.iter().position(|v| v == value)
    }

    pub fn value_of(&self, key: LabelKey) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_first_occurrence() {
        let samples = vec![
            Sample::labelled(1.0, 1.0, 1.0, 1.0, "virginica"),
            Sample::labelled(1.0, 1.0, 1.0, 1.0, "setosa"),
            Sample::labelled(1.0, 1.0, 1.0, 1.0, "virginica"),
        ];
        let map = LabelKeyMap::fit(&samples).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.key_of("virginica"), Some(0));
        assert_eq!(map.key_of("setosa"), Some(1));
        assert_eq!(map.value_of(1), Some("setosa"));
        assert_eq!(map.value_of(2), None);
    }

    #[test]
    fn unlabelled_row_is_rejected() {
        let samples = vec![
            Sample::labelled(1.0, 1.0, 1.0, 1.0, "setosa"),
            Sample::new(1.0, 1.0, 1.0, 1.0),
        ];
        match LabelKeyMap::fit(&samples) {
            Err(crate::PtError::Data(DataError::MissingLabel { row })) => assert_eq!(row, 1),
            other => panic!("Expected MissingLabel error, got {:?}", other),
        }
    }
}
