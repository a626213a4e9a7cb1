//! Fitted multiclass model and its predictions.

use serde::{Deserialize, Serialize};

use pt_types::{LabelKey, LabelKeyMap, Sample, FEATURE_COUNT};

use crate::pipeline::concatenate_features;
use crate::trainer::softmax_scores;

/// Output of scoring one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_label: String,
    /// Per-class probabilities in key order.
    pub scores: Vec<f32>,
}

impl Prediction {
    /// Key of the highest score; ties resolve to the lowest key.
    pub fn predicted_key(&self) -> Option<LabelKey> {
        argmax(&self.scores)
    }
}

/// A trained softmax model together with the label mapping it was fitted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticlassModel {
    weights: Vec<[f64; FEATURE_COUNT]>,
    biases: Vec<f64>,
    labels: LabelKeyMap,
    iterations: usize,
    objective: f64,
}

impl MulticlassModel {
    pub fn new(
        weights: Vec<[f64; FEATURE_COUNT]>,
        biases: Vec<f64>,
        labels: LabelKeyMap,
        iterations: usize,
        objective: f64,
    ) -> Self {
        Self {
            weights,
            biases,
            labels,
            iterations,
            objective,
        }
    }

    pub fn weights(&self) -> &[[f64; FEATURE_COUNT]] {
        &self.weights
    }

    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    pub fn labels(&self) -> &LabelKeyMap {
        &self.labels
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// Optimizer iterations actually run.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Final value of the regularized training objective.
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Per-class probabilities for one sample, in key order.
    pub fn scores(&self, sample: &Sample) -> Vec<f32> {
        let x = concatenate_features(sample);
        softmax_scores(&self.weights, &self.biases, &x)
            .into_iter()
            .map(|p| p as f32)
            .collect()
    }

    /// Score one sample and map the winning key back to its label value.
    pub fn predict(&self, sample: &Sample) -> Prediction {
        let scores = self.scores(sample);
        let predicted_label = argmax(&scores)
            .and_then(|key| self.labels.value_of(key))
            .unwrap_or_default()
            .to_string();
        Prediction {
            predicted_label,
            scores,
        }
    }

    /// Score every sample, preserving order.
    pub fn transform(&self, samples: &[Sample]) -> Vec<Prediction> {
        samples.iter().map(|s| self.predict(s)).collect()
    }
}

fn argmax(scores: &[f32]) -> Option<LabelKey> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if s <= b => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_class_model() -> MulticlassModel {
        let mut labels = LabelKeyMap::new();
        labels.insert("short");
        labels.insert("long");
        // class "long" wins when petal_length is large
        MulticlassModel::new(
            vec![[0.0, 0.0, -1.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
            vec![3.0, -3.0],
            labels,
            10,
            0.5,
        )
    }

    #[test]
    fn predict_maps_key_to_label() {
        let model = two_class_model();
        assert_eq!(model.predict(&Sample::new(5.0, 3.0, 1.0, 0.2)).predicted_label, "short");
        assert_eq!(model.predict(&Sample::new(6.0, 3.0, 5.5, 2.0)).predicted_label, "long");
    }

    #[test]
    fn scores_are_probabilities() {
        let model = two_class_model();
        let scores = model.scores(&Sample::new(6.3, 3.4, 5.6, 2.4));
        assert_eq!(scores.len(), 2);
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn transform_preserves_order() {
        let model = two_class_model();
        let samples = vec![Sample::new(5.0, 3.0, 1.0, 0.2), Sample::new(6.0, 3.0, 5.5, 2.0)];
        let predictions = model.transform(&samples);
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].predicted_key(), Some(0));
        assert_eq!(predictions[1].predicted_key(), Some(1));
    }

    #[test]
    fn argmax_ties_pick_lowest_key() {
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
