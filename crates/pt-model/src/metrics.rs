//! Multiclass evaluation metrics.
//!
//! [`MulticlassMetrics::evaluate`] scores labelled samples through a fitted
//! model and reports log-loss, accuracy, top-K accuracy, and a confusion
//! matrix with per-class precision and recall.

use serde::{Deserialize, Serialize};

use pt_types::{DataError, PtResult, Sample};

use crate::model::MulticlassModel;

/// Probabilities are clipped to this floor before taking logs.
const LOG_LOSS_EPSILON: f64 = 1e-15;

/// Confusion matrix over the model's label key space.
///
/// `counts[t][p]` is the number of rows with true key `t` predicted as `p`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: Vec<Vec<usize>>,
    pub per_class_precision: Vec<f64>,
    pub per_class_recall: Vec<f64>,
    pub class_labels: Vec<String>,
}

impl ConfusionMatrix {
    pub fn from_counts(counts: Vec<Vec<usize>>, class_labels: Vec<String>) -> Self {
        let classes = counts.len();
        let mut per_class_precision = vec![0.0; classes];
        let mut per_class_recall = vec![0.0; classes];

        for c in 0..classes {
            let hits = counts[c][c] as f64;
            let predicted: usize = counts.iter().map(|row| row[c]).sum();
            let actual: usize = counts[c].iter().sum();
            if predicted > 0 {
                per_class_precision[c] = hits / predicted as f64;
            }
            if actual > 0 {
                per_class_recall[c] = hits / actual as f64;
            }
        }

        Self {
            counts,
            per_class_precision,
            per_class_recall,
            class_labels,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Number of rows whose true class is `key`.
    pub fn support(&self, key: usize) -> usize {
        self.counts.get(key).map(|row| row.iter().sum()).unwrap_or(0)
    }
}

/// Aggregate multiclass metrics for one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticlassMetrics {
    pub log_loss: f64,
    /// Relative log-loss improvement over predicting the label prior.
    pub log_loss_reduction: f64,
    /// Mean of per-class recall over classes present in the data.
    pub macro_accuracy: f64,
    /// Fraction of rows predicted correctly.
    pub micro_accuracy: f64,
    pub top_k_accuracy: f64,
    pub top_k_prediction_count: usize,
    /// Top-k accuracy for every k in `1..=top_k_prediction_count`.
    pub top_k_accuracy_for_all_k: Option<Vec<f64>>,
    pub per_class_log_loss: Vec<f64>,
    pub confusion_matrix: ConfusionMatrix,
}

impl MulticlassMetrics {
    /// Evaluate `model` against labelled `samples`.
    ///
    /// Rows with a missing label, or a label the model never saw, are skipped.
    /// `top_k` of zero disables top-K accuracy.
    pub fn evaluate(model: &MulticlassModel, samples: &[Sample], top_k: usize) -> PtResult<Self> {
        let classes = model.num_classes();
        let mut counts = vec![vec![0usize; classes]; classes];
        let mut class_loss = vec![0.0; classes];
        let mut rank_hits = vec![0usize; top_k];
        let mut total_loss = 0.0;
        let mut rows = 0usize;
        let mut skipped = 0usize;

        for sample in samples {
            let Some(truth) = sample.label.as_deref().and_then(|l| model.labels().key_of(l)) else {
                skipped += 1;
                continue;
            };

            let prediction = model.predict(sample);
            let Some(predicted) = prediction.predicted_key() else {
                skipped += 1;
                continue;
            };

            let p_true = (prediction.scores[truth] as f64).max(LOG_LOSS_EPSILON);
            let loss = -p_true.ln();
            total_loss += loss;
            class_loss[truth] += loss;
            counts[truth][predicted] += 1;
            rows += 1;

            // rank of the true class among all scores, 0 = best
            let true_score = prediction.scores[truth];
            let rank = prediction.scores.iter().filter(|&&s| s > true_score).count();
            for hits in rank_hits.iter_mut().skip(rank) {
                *hits += 1;
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} rows with missing or unknown labels", skipped);
        }
        if rows == 0 {
            return Err(DataError::InsufficientData {
                message: "no rows with known labels to evaluate".to_string(),
            }
            .into());
        }

        let n = rows as f64;
        let confusion_matrix =
            ConfusionMatrix::from_counts(counts, model.labels().values().to_vec());

        let log_loss = total_loss / n;
        let prior_log_loss: f64 = (0..classes)
            .map(|c| confusion_matrix.support(c) as f64 / n)
            .filter(|q| *q > 0.0)
            .map(|q| -q * q.ln())
            .sum();
        let log_loss_reduction = if prior_log_loss > 0.0 {
            (prior_log_loss - log_loss) / prior_log_loss
        } else {
            0.0
        };

        let present: Vec<usize> = (0..classes)
            .filter(|&c| confusion_matrix.support(c) > 0)
            .collect();
        let macro_accuracy = present
            .iter()
            .map(|&c| confusion_matrix.per_class_recall[c])
            .sum::<f64>()
            / present.len() as f64;
        let correct: usize = (0..classes).map(|c| confusion_matrix.counts[c][c]).sum();
        let micro_accuracy = correct as f64 / n;

        let per_class_log_loss = class_loss
            .iter()
            .enumerate()
            .map(|(c, loss)| match confusion_matrix.support(c) {
                0 => 0.0,
                support => loss / support as f64,
            })
            .collect();

        let top_k_accuracy_for_all_k: Option<Vec<f64>> = if top_k > 0 {
            Some(rank_hits.iter().map(|&h| h as f64 / n).collect())
        } else {
            None
        };
        let top_k_accuracy = top_k_accuracy_for_all_k
            .as_ref()
            .and_then(|all| all.last().copied())
            .unwrap_or(0.0);

        tracing::info!(
            "Evaluated {} rows: micro accuracy {:.4}, macro accuracy {:.4}, log-loss {:.4}",
            rows,
            micro_accuracy,
            macro_accuracy,
            log_loss
        );

        Ok(Self {
            log_loss,
            log_loss_reduction,
            macro_accuracy,
            micro_accuracy,
            top_k_accuracy,
            top_k_prediction_count: top_k,
            top_k_accuracy_for_all_k,
            per_class_log_loss,
            confusion_matrix,
        })
    }
}
