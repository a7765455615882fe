//! Classifier interfaces and the predictor
//!
//! This module provides:
//! - `Classifier` trait for any externally trained model
//! - `Label` and its fixed user-facing messages
//! - `Predictor`, which validates a vector and maps the class to a label
//! - `PersistedModel`, the JSON model file format
//! - Test doubles

mod mock;
mod model;

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::{FeatureVector, FEATURE_COUNT};

pub use mock::{FailingClassifier, FixedClassifier, ThresholdClassifier};
pub use model::{LinearScaler, ModelKind, PersistedModel};

/// Class value that means no disease indicators were found
pub const NEGATIVE_CLASS: i64 = 1;

/// Descriptive information about a loaded classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierInfo {
    /// Model name
    pub name: String,
    /// Model version string
    pub version: String,
    /// Decision rule, e.g. "logistic"
    pub kind: String,
    /// The two class values the model emits
    pub classes: [i64; 2],
    /// SHA-256 of the model file, when loaded from disk
    pub checksum: Option<String>,
}

/// Opaque function from a canonical-order feature array to a class value
///
/// Implementations are shared read-only across requests.
pub trait Classifier: Send + Sync {
    /// Describe the model
    fn info(&self) -> ClassifierInfo;

    /// Predict a class for one vector
    ///
    /// # Errors
    /// * `ClassifierFailure` - the model could not produce a class
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<i64>;
}

/// Binary screening label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Disease indicators present
    Positive,
    /// No disease indicators
    Negative,
}

impl Label {
    /// Map a raw class value; only [`NEGATIVE_CLASS`] is negative
    pub fn from_class(class: i64) -> Self {
        if class == NEGATIVE_CLASS {
            Label::Negative
        } else {
            Label::Positive
        }
    }

    /// Result sentence shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            Label::Negative => "Person Has No Parkinson Disease",
            Label::Positive => "Person Has Parkinson Disease",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Positive => write!(f, "positive"),
            Label::Negative => write!(f, "negative"),
        }
    }
}

/// Validates feature vectors and delegates to the injected classifier
#[derive(Clone)]
pub struct Predictor {
    classifier: Arc<dyn Classifier>,
}

impl Predictor {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Predict the label of one vector
    ///
    /// No retries and no fallback model.
    ///
    /// # Errors
    /// * `NonFiniteFeature` - a field is NaN or infinite
    /// * `ClassifierFailure` - the classifier failed
    pub fn predict(&self, features: &FeatureVector) -> Result<Label> {
        features.validate()?;

        let class = self.classifier.predict(&features.to_array())?;
        let label = Label::from_class(class);
        debug!("Classifier returned class {} ({})", class, label);

        Ok(label)
    }

    pub fn classifier_info(&self) -> ClassifierInfo {
        self.classifier.info()
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("classifier", &self.classifier.info().name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScreenError;

    fn vector() -> FeatureVector {
        FeatureVector::from_array([1.0; FEATURE_COUNT])
    }

    #[test]
    fn test_label_mapping_boundaries() {
        assert_eq!(Label::from_class(1), Label::Negative);
        assert_eq!(Label::from_class(0), Label::Positive);
        assert_eq!(Label::from_class(-1), Label::Positive);
        assert_eq!(Label::from_class(2), Label::Positive);
    }

    #[test]
    fn test_label_messages() {
        assert_eq!(Label::Negative.message(), "Person Has No Parkinson Disease");
        assert_eq!(Label::Positive.message(), "Person Has Parkinson Disease");
    }

    #[test]
    fn test_predictor_delegates() {
        let predictor = Predictor::new(Arc::new(FixedClassifier::new(1)));
        assert_eq!(predictor.predict(&vector()).unwrap(), Label::Negative);

        let predictor = Predictor::new(Arc::new(FixedClassifier::new(0)));
        assert_eq!(predictor.predict(&vector()).unwrap(), Label::Positive);
    }

    #[test]
    fn test_predictor_rejects_non_finite() {
        let mut values = [1.0; FEATURE_COUNT];
        values[21] = f64::NAN;
        let predictor = Predictor::new(Arc::new(FixedClassifier::new(1)));

        let err = predictor.predict(&FeatureVector::from_array(values)).unwrap_err();
        assert!(matches!(err, ScreenError::NonFiniteFeature { field: "PPE", .. }));
    }

    #[test]
    fn test_predictor_surfaces_failure() {
        let predictor = Predictor::new(Arc::new(FailingClassifier::new("model offline")));
        let err = predictor.predict(&vector()).unwrap_err();
        assert!(matches!(err, ScreenError::ClassifierFailure { .. }));
    }
}
