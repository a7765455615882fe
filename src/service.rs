//! Request handling
//!
//! [`ScreeningService`] is built once at startup and shared read-only. Each
//! call to [`ScreeningService::handle`] runs one submission to completion and
//! always returns an [`Outcome`]; failures become a user-facing message
//! instead of propagating.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::analysis::FeatureExtractor;
use crate::classifier::{Label, Predictor};
use crate::error::{ErrorKind, Result, ScreenError};
use crate::features::FeatureVector;
use crate::upload::UploadStore;

/// Message for uploads with a missing or disallowed extension
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid file format. Please upload a WAV or MP3 file.";

/// One screening request
#[derive(Debug, Clone)]
pub enum Submission {
    /// An uploaded recording
    Audio { filename: String, bytes: Vec<u8> },
    /// All 22 measurements entered by hand, keyed by canonical name
    Manual(HashMap<String, String>),
}

/// What a request produced
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Text shown to the user
    pub message: String,
    /// Set when a prediction was made
    pub label: Option<Label>,
    /// Set when features were extracted or parsed
    pub features: Option<FeatureVector>,
    /// Error code when the request failed
    pub error_code: Option<&'static str>,
}

impl Outcome {
    fn predicted(label: Label, features: FeatureVector) -> Self {
        Self {
            message: label.message().to_string(),
            label: Some(label),
            features: Some(features),
            error_code: None,
        }
    }

    fn failed(message: String, error: &ScreenError) -> Self {
        Self {
            message,
            label: None,
            features: None,
            error_code: Some(error.error_code()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.label.is_some()
    }
}

/// Extract-then-predict pipeline behind every request
#[derive(Debug)]
pub struct ScreeningService {
    extractor: FeatureExtractor,
    predictor: Predictor,
    uploads: UploadStore,
}

impl ScreeningService {
    pub fn new(predictor: Predictor, uploads: UploadStore) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            predictor,
            uploads,
        }
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Run one submission and describe the result
    pub fn handle(&self, submission: Submission) -> Outcome {
        match submission {
            Submission::Audio { filename, bytes } => match self.screen_audio(&filename, &bytes) {
                Ok((label, features)) => {
                    info!("Screened upload '{}': {}", filename, label);
                    Outcome::predicted(label, features)
                }
                Err(e) => audio_failure(&filename, &e),
            },
            Submission::Manual(fields) => match self.screen_manual(&fields) {
                Ok((label, features)) => {
                    info!("Screened manual submission: {}", label);
                    Outcome::predicted(label, features)
                }
                Err(e) => {
                    warn!("Manual submission failed [{}]: {}", e.error_code(), e);
                    Outcome::failed(format!("Error processing form data: {}", e), &e)
                }
            },
        }
    }

    /// Read a recording from disk and run it as an audio submission
    ///
    /// A file that cannot be read fails the request like any other audio
    /// error instead of escaping as an `Err`.
    pub fn handle_file(&self, path: &Path) -> Outcome {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match fs::read(path) {
            Ok(bytes) => self.handle(Submission::Audio { filename, bytes }),
            Err(e) => {
                let e = ScreenError::FileNotFound {
                    path: path.display().to_string(),
                    source: Some(e),
                };
                audio_failure(&filename, &e)
            }
        }
    }

    /// Stage, extract and predict an uploaded recording
    ///
    /// The staged file is removed before this returns, whatever the result.
    pub fn screen_audio(&self, filename: &str, bytes: &[u8]) -> Result<(Label, FeatureVector)> {
        let staged = self.uploads.stage(filename, bytes)?;
        let features = self.extractor.extract(staged.path())?;
        let label = self.predictor.predict(&features)?;
        Ok((label, features))
    }

    /// Parse and predict a manual submission
    pub fn screen_manual(&self, fields: &HashMap<String, String>) -> Result<(Label, FeatureVector)> {
        let features = FeatureVector::from_form(fields)?;
        let label = self.predictor.predict(&features)?;
        Ok((label, features))
    }
}

fn audio_failure(filename: &str, e: &ScreenError) -> Outcome {
    warn!("Upload '{}' failed [{}]: {}", filename, e.error_code(), e);
    let message = match e.kind() {
        ErrorKind::UnsupportedFormat => INVALID_FORMAT_MESSAGE.to_string(),
        _ => format!("Error processing audio file: {}", e),
    };
    Outcome::failed(message, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{FailingClassifier, FixedClassifier};
    use crate::features::FEATURE_NAMES;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(classifier: Arc<dyn crate::classifier::Classifier>, dir: &TempDir) -> ScreeningService {
        ScreeningService::new(
            Predictor::new(classifier),
            UploadStore::new(dir.path()).unwrap(),
        )
    }

    fn full_form() -> HashMap<String, String> {
        FEATURE_NAMES
            .iter()
            .map(|name| (name.to_string(), "0.5".to_string()))
            .collect()
    }

    #[test]
    fn test_manual_negative() {
        let dir = TempDir::new().unwrap();
        let outcome = service(Arc::new(FixedClassifier::new(1)), &dir)
            .handle(Submission::Manual(full_form()));

        assert_eq!(outcome.message, "Person Has No Parkinson Disease");
        assert_eq!(outcome.label, Some(Label::Negative));
        assert!(outcome.is_success());
    }

    #[test]
    fn test_manual_missing_field() {
        let dir = TempDir::new().unwrap();
        let mut form = full_form();
        form.remove("PPE");

        let outcome = service(Arc::new(FixedClassifier::new(1)), &dir).handle(Submission::Manual(form));
        assert_eq!(outcome.message, "Error processing form data: Missing required field: PPE");
        assert_eq!(outcome.error_code, Some("MISSING_FIELD"));
    }

    #[test]
    fn test_manual_classifier_failure() {
        let dir = TempDir::new().unwrap();
        let outcome = service(Arc::new(FailingClassifier::new("model offline")), &dir)
            .handle(Submission::Manual(full_form()));

        assert_eq!(
            outcome.message,
            "Error processing form data: Classifier failed: model offline"
        );
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_unsupported_upload() {
        let dir = TempDir::new().unwrap();
        let outcome = service(Arc::new(FixedClassifier::new(1)), &dir).handle(Submission::Audio {
            filename: "notes.txt".to_string(),
            bytes: b"hello".to_vec(),
        });

        assert_eq!(outcome.message, INVALID_FORMAT_MESSAGE);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_undecodable_upload_is_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let outcome = service(Arc::new(FixedClassifier::new(1)), &dir).handle(Submission::Audio {
            filename: "broken.wav".to_string(),
            bytes: b"definitely not a wav file".to_vec(),
        });

        assert!(outcome.message.starts_with("Error processing audio file: "));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unreadable_file_becomes_outcome() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.wav");
        let outcome = service(Arc::new(FixedClassifier::new(1)), &dir).handle_file(&missing);

        assert!(!outcome.is_success());
        assert_eq!(outcome.error_code, Some("FILE_NOT_FOUND"));
        assert!(outcome.message.starts_with("Error processing audio file: File not found"));
    }

    #[test]
    fn test_file_with_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let outcome = service(Arc::new(FixedClassifier::new(1)), &dir).handle_file(&path);
        assert_eq!(outcome.message, INVALID_FORMAT_MESSAGE);
    }
}
