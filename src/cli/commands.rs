//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::analysis::FeatureExtractor;
use crate::classifier::{Classifier, PersistedModel, Predictor};
use crate::config::AppConfig;
use crate::error::{Result, ScreenError};
use crate::service::{Outcome, ScreeningService, Submission};
use crate::upload::UploadStore;

/// JSON report printed with `--json`
#[derive(Debug, Serialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Load the model and upload directory named by `config`.
pub fn build_service(config: &AppConfig) -> Result<ScreeningService> {
    let model = PersistedModel::load(&config.model_path)?;
    let uploads = UploadStore::new(&config.upload_dir)?;
    Ok(ScreeningService::new(Predictor::new(Arc::new(model)), uploads))
}

/// Screen a recording as if it had been uploaded.
pub fn predict_audio(service: &ScreeningService, file: &Path, json: bool) -> Result<()> {
    info!("Screening recording: {}", file.display());

    let outcome = service.handle_file(file);
    print_outcome(outcome, &file.display().to_string(), json)
}

/// Screen manually entered measurements.
pub fn predict_manual(
    service: &ScreeningService,
    fields: Vec<(String, String)>,
    input: Option<&Path>,
    json: bool,
) -> Result<()> {
    let (form, source) = match input {
        Some(path) => {
            info!("Reading measurements from: {}", path.display());
            (read_form(path)?, path.display().to_string())
        }
        None => (fields.into_iter().collect(), "manual".to_string()),
    };

    let outcome = service.handle(Submission::Manual(form));
    print_outcome(outcome, &source, json)
}

/// Print the extracted feature vector as JSON.
pub fn extract(file: &Path) -> Result<()> {
    let features = FeatureExtractor::new().extract(file)?;
    println!("{}", serde_json::to_string_pretty(&features)?);
    Ok(())
}

/// Print details of the configured model.
pub fn model_info(config: &AppConfig) -> Result<()> {
    let info = PersistedModel::load(&config.model_path)?.info();

    println!("Model: {}", info.name);
    println!("Version: {}", info.version);
    println!("Kind: {}", info.kind);
    println!("Classes: {:?}", info.classes);
    if let Some(checksum) = &info.checksum {
        println!("SHA-256: {}", checksum);
    }

    Ok(())
}

/// Read a JSON object of measurements; numbers and strings are both accepted
fn read_form(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path).map_err(|e| ScreenError::FileNotFound {
        path: path.display().to_string(),
        source: Some(e),
    })?;
    let raw: HashMap<String, serde_json::Value> = serde_json::from_str(&content)?;

    Ok(raw
        .into_iter()
        .map(|(name, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (name, text)
        })
        .collect())
}

fn print_outcome(outcome: Outcome, source: &str, json: bool) -> Result<()> {
    if json {
        let report = Report {
            timestamp: Utc::now(),
            source: source.to_string(),
            outcome,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", outcome.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FixedClassifier;
    use tempfile::TempDir;

    #[test]
    fn test_read_form_accepts_numbers_and_strings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("form.json");
        fs::write(&path, r#"{ "HNR": 21.033, "PPE": " 0.28 " }"#).unwrap();

        let form = read_form(&path).unwrap();
        assert_eq!(form["HNR"], "21.033");
        assert_eq!(form["PPE"], " 0.28 ");
    }

    #[test]
    fn test_build_service_needs_model() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            model_path: dir.path().join("missing.json"),
            upload_dir: dir.path().join("uploads"),
        };
        assert!(matches!(
            build_service(&config),
            Err(ScreenError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_predict_audio_missing_file_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let service = ScreeningService::new(
            Predictor::new(Arc::new(FixedClassifier::new(0))),
            UploadStore::new(dir.path().join("uploads")).unwrap(),
        );

        assert!(predict_audio(&service, &dir.path().join("absent.wav"), true).is_ok());
    }
}
