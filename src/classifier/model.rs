//! JSON-persisted classifier
//!
//! A trained model exported as plain parameters:
//!
//! ```json
//! {
//!   "name": "parkinsons-svm-export",
//!   "version": "1.0",
//!   "classes": [0, 1],
//!   "scaler": { "mean": [...22], "scale": [...22] },
//!   "model": { "kind": "logistic", "coefficients": [...22], "intercept": -0.4 }
//! }
//! ```
//!
//! `model.kind` may also be `nearest_centroid` with `"centroids": [[...22], [...22]]`,
//! one per entry of `classes`.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Classifier, ClassifierInfo};
use crate::error::{Result, ScreenError};
use crate::features::{FEATURE_COUNT, FEATURE_NAMES};

/// Standardisation applied before the decision rule: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl LinearScaler {
    fn transform(&self, features: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = *features;
        for ((x, m), s) in out.iter_mut().zip(&self.mean).zip(&self.scale) {
            *x = (*x - m) / s;
        }
        out
    }
}

/// Decision rule of a persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    /// `z = w·x + b`; `z > 0` selects `classes[1]`
    Logistic { coefficients: Vec<f64>, intercept: f64 },
    /// Class of the closest centroid (Euclidean); ties go to `classes[0]`
    NearestCentroid { centroids: Vec<Vec<f64>> },
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Logistic { .. } => "logistic",
            ModelKind::NearestCentroid { .. } => "nearest_centroid",
        }
    }
}

/// A classifier loaded from a JSON model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Column order the model was trained on; must be canonical when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<LinearScaler>,
    pub classes: [i64; 2],
    pub model: ModelKind,
    /// SHA-256 of the file this model was read from
    #[serde(skip)]
    pub checksum: Option<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl PersistedModel {
    /// Load and validate a model file
    ///
    /// # Errors
    /// * `ModelNotFound` - no file at `path`
    /// * `InvalidModel` - malformed JSON, wrong dimensions, non-finite or
    ///   zero-scale parameters
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScreenError::ModelNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read(path)?;
        let checksum = format!("{:x}", Sha256::digest(&content));

        let mut model = Self::from_json(&content)?;
        model.checksum = Some(checksum);

        info!(
            "Loaded {} model '{}' v{} from {} (sha256 {})",
            model.model.name(),
            model.name,
            model.version,
            path.display(),
            model.checksum.as_deref().unwrap_or_default()
        );

        Ok(model)
    }

    /// Parse and validate a model from JSON bytes
    pub fn from_json(content: &[u8]) -> Result<Self> {
        let model: Self = serde_json::from_slice(content).map_err(|e| ScreenError::InvalidModel {
            reason: e.to_string(),
        })?;
        model.validate()?;
        Ok(model)
    }

    /// Check dimensions and parameter values
    pub fn validate(&self) -> Result<()> {
        if let Some(names) = &self.feature_names {
            let canonical = names.len() == FEATURE_COUNT
                && names.iter().zip(FEATURE_NAMES).all(|(a, b)| a == b);
            if !canonical {
                return Err(invalid("feature_names do not match the canonical feature order"));
            }
        }

        if self.classes[0] == self.classes[1] {
            return Err(invalid("classes must be two distinct values"));
        }

        if let Some(scaler) = &self.scaler {
            check_vector("scaler.mean", &scaler.mean)?;
            check_vector("scaler.scale", &scaler.scale)?;
            if let Some(i) = scaler.scale.iter().position(|s| *s == 0.0) {
                return Err(invalid(format!(
                    "scaler.scale for {} is zero",
                    FEATURE_NAMES[i]
                )));
            }
        }

        match &self.model {
            ModelKind::Logistic {
                coefficients,
                intercept,
            } => {
                check_vector("coefficients", coefficients)?;
                if !intercept.is_finite() {
                    return Err(invalid("intercept is not finite"));
                }
            }
            ModelKind::NearestCentroid { centroids } => {
                if centroids.len() != 2 {
                    return Err(invalid(format!(
                        "expected 2 centroids, found {}",
                        centroids.len()
                    )));
                }
                for centroid in centroids {
                    check_vector("centroid", centroid)?;
                }
            }
        }

        Ok(())
    }

    /// Serialise to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Classifier for PersistedModel {
    fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            kind: self.model.name().to_string(),
            classes: self.classes,
            checksum: self.checksum.clone(),
        }
    }

    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<i64> {
        let x = match &self.scaler {
            Some(scaler) => scaler.transform(features),
            None => *features,
        };

        let class_index = match &self.model {
            ModelKind::Logistic {
                coefficients,
                intercept,
            } => {
                let z = x.iter().zip(coefficients).map(|(a, w)| a * w).sum::<f64>() + intercept;
                if !z.is_finite() {
                    return Err(ScreenError::ClassifierFailure {
                        reason: "decision value is not finite".to_string(),
                    });
                }
                usize::from(z > 0.0)
            }
            ModelKind::NearestCentroid { centroids } => {
                let distance = |c: &Vec<f64>| {
                    x.iter().zip(c).map(|(a, b)| (a - b).powi(2)).sum::<f64>()
                };
                let (d0, d1) = (distance(&centroids[0]), distance(&centroids[1]));
                if !d0.is_finite() || !d1.is_finite() {
                    return Err(ScreenError::ClassifierFailure {
                        reason: "centroid distance is not finite".to_string(),
                    });
                }
                usize::from(d1 < d0)
            }
        };

        Ok(self.classes[class_index])
    }
}

fn invalid(reason: impl Into<String>) -> ScreenError {
    ScreenError::InvalidModel {
        reason: reason.into(),
    }
}

fn check_vector(what: &str, values: &[f64]) -> Result<()> {
    if values.len() != FEATURE_COUNT {
        return Err(invalid(format!(
            "{} has {} values, expected {}",
            what,
            values.len(),
            FEATURE_COUNT
        )));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(invalid(format!(
            "{} for {} is not finite",
            what, FEATURE_NAMES[i]
        )));
    }
    Ok(())
}
