//! Mock classifiers for testing
//!
//! These don't load any trained model. They return predictable classes so
//! the request pipeline can be tested without a model file.

use super::{Classifier, ClassifierInfo};
use crate::error::{Result, ScreenError};
use crate::features::{FEATURE_COUNT, FEATURE_NAMES};

fn mock_info(name: &str, kind: &str) -> ClassifierInfo {
    ClassifierInfo {
        name: name.to_string(),
        version: "1.0-mock".to_string(),
        kind: kind.to_string(),
        classes: [0, 1],
        checksum: None,
    }
}

/// Always returns the same class
pub struct FixedClassifier {
    class: i64,
}

impl FixedClassifier {
    pub fn new(class: i64) -> Self {
        Self { class }
    }
}

impl Classifier for FixedClassifier {
    fn info(&self) -> ClassifierInfo {
        mock_info("fixed", "fixed")
    }

    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Result<i64> {
        Ok(self.class)
    }
}

/// Always fails
pub struct FailingClassifier {
    reason: String,
}

impl FailingClassifier {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl Classifier for FailingClassifier {
    fn info(&self) -> ClassifierInfo {
        mock_info("failing", "failing")
    }

    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Result<i64> {
        Err(ScreenError::ClassifierFailure {
            reason: self.reason.clone(),
        })
    }
}

/// Returns `above` when one feature exceeds a threshold, else `below`
pub struct ThresholdClassifier {
    index: usize,
    threshold: f64,
    above: i64,
    below: i64,
}

impl ThresholdClassifier {
    /// Threshold on the feature with canonical name `feature`
    ///
    /// Returns `None` for an unknown feature name.
    pub fn new(feature: &str, threshold: f64, above: i64, below: i64) -> Option<Self> {
        let index = FEATURE_NAMES.iter().position(|name| *name == feature)?;
        Some(Self {
            index,
            threshold,
            above,
            below,
        })
    }
}

impl Classifier for ThresholdClassifier {
    fn info(&self) -> ClassifierInfo {
        mock_info(
            &format!("threshold({} > {})", FEATURE_NAMES[self.index], self.threshold),
            "threshold",
        )
    }

    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<i64> {
        Ok(if features[self.index] > self.threshold {
            self.above
        } else {
            self.below
        })
    }
}
