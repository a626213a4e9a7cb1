//! Training pipeline: feature concatenation, value-to-key label mapping, and
//! the maximum-entropy trainer.

use pt_types::{LabelKeyMap, PtResult, Sample, FEATURE_COUNT};

use crate::model::MulticlassModel;
use crate::trainer::{MaxEntOptions, MaxEntTrainer};

/// Concatenate the four measurement columns into one feature vector.
pub(crate) fn concatenate_features(sample: &Sample) -> [f64; FEATURE_COUNT] {
    sample.features().map(f64::from)
}

/// A trainer instance with its hyperparameters bound, ready to fit.
#[derive(Debug, Clone)]
pub struct Pipeline {
    trainer: MaxEntTrainer,
}

impl Pipeline {
    /// Bind `options` into a trainer. Fails if the options are invalid.
    pub fn new(options: MaxEntOptions) -> PtResult<Self> {
        Ok(Self {
            trainer: MaxEntTrainer::new(options)?,
        })
    }

    pub fn options(&self) -> &MaxEntOptions {
        self.trainer.options()
    }

    /// Fit against labelled samples.
    ///
    /// Labels are mapped to keys in order of first occurrence; the fitted model
    /// carries that mapping so predictions come back as label values. Rows with
    /// a non-finite measurement are dropped before training.
    pub fn fit(&self, samples: &[Sample]) -> PtResult<MulticlassModel> {
        let finite: Vec<Sample>;
        let samples = if samples.iter().all(Sample::is_finite) {
            samples
        } else {
            finite = samples.iter().filter(|s| s.is_finite()).cloned().collect();
            tracing::warn!(
                "Dropping {} rows with non-finite features",
                samples.len() - finite.len()
            );
            &finite[..]
        };

        let labels = LabelKeyMap::fit(samples)?;
        let features: Vec<[f64; FEATURE_COUNT]> = samples.iter().map(concatenate_features).collect();
        let keys = samples
            .iter()
            .filter_map(|s| s.label.as_deref())
            .filter_map(|label| labels.key_of(label))
            .collect::<Vec<_>>();

        tracing::debug!(
            "Fitting pipeline on {} rows, {} classes ({:?})",
            samples.len(),
            labels.len(),
            self.options()
        );
        self.trainer.train(&features, &keys, labels)
    }
}
