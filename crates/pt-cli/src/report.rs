//! Console report formatting.

use std::fmt::Display;

use pt_model::{MulticlassMetrics, MulticlassModel};
use pt_optimizer::{TrialResult, TrialSettings};
use pt_types::Sample;

pub const METRICS_HEADER: &str = "LogLoss,LogLossReduction,MacroAccuracy,MicroAccuracy,TopKAccuracy,\
TopKPredictionCount,TopKAccuracyForAllK,PerClassLogLoss,ConfusionMatrix";

/// The three fixed inputs predicted at the end of a run, one per species.
pub fn demo_samples() -> [Sample; 3] {
    [
        Sample::new(4.8, 3.4, 1.6, 0.2),
        Sample::new(7.0, 3.2, 4.7, 1.4),
        Sample::new(6.3, 3.4, 5.6, 2.4),
    ]
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parameters sorted by name so trial lines are stable across runs.
fn parameters_line(settings: &TrialSettings) -> String {
    let mut entries: Vec<_> = settings.parameters.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn trial_completed_line(result: &TrialResult) -> String {
    format!(
        "[Trial {}] metric {:.6} in {} ms ({})",
        result.settings.trial_number,
        result.metric,
        result.duration_millis,
        parameters_line(&result.settings)
    )
}

pub fn trial_failed_line(settings: &TrialSettings) -> String {
    format!("[Trial {}] failed ({})", settings.trial_number, parameters_line(settings))
}

/// One CSV-like line of aggregate metrics, matching [`METRICS_HEADER`].
pub fn metrics_line(metrics: &MulticlassMetrics) -> String {
    let all_k = match &metrics.top_k_accuracy_for_all_k {
        Some(values) => format!("[{}]", join(values)),
        None => "null".to_string(),
    };
    let cm = &metrics.confusion_matrix;
    let counts = cm
        .counts
        .iter()
        .map(|row| format!("[{}]", join(row)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{},{},{},{},{},{},{},[{}],PerClassPrecision: [{}], PerClassRecall: [{}], Counts: [{}], NumberOfClasses: {}",
        metrics.log_loss,
        metrics.log_loss_reduction,
        metrics.macro_accuracy,
        metrics.micro_accuracy,
        metrics.top_k_accuracy,
        metrics.top_k_prediction_count,
        all_k,
        join(&metrics.per_class_log_loss),
        join(&cm.per_class_precision),
        join(&cm.per_class_recall),
        counts,
        cm.num_classes()
    )
}

pub fn prediction_block(model: &MulticlassModel, sample: &Sample) -> String {
    let prediction = model.predict(sample);
    format!(
        "Sepal_length: {}\nSepal_width: {}\nPetal_length: {}\nPetal_width: {}\nPredicted Label: {}\n",
        sample.sepal_length,
        sample.sepal_width,
        sample.petal_length,
        sample.petal_width,
        prediction.predicted_label
    )
}
