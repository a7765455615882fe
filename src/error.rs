//! Error handling for Voicescreen
//!
//! Every failure a request can hit maps onto one of a handful of
//! [`ErrorKind`]s, which decide the message shown to the user.

use thiserror::Error;

/// Result type alias for Voicescreen operations
pub type Result<T> = std::result::Result<T, ScreenError>;

/// Broad classification of a [`ScreenError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Upload rejected before any decoding
    UnsupportedFormat,
    /// Decoding or an acoustic measurement failed
    Extraction,
    /// A manually submitted field was missing or malformed
    InvalidInput,
    /// The classifier itself failed
    Classifier,
    /// Model or configuration could not be loaded
    Configuration,
}

/// Main error type for Voicescreen operations
#[derive(Error, Debug)]
pub enum ScreenError {
    // Upload Errors
    #[error("Unsupported file format: {filename}")]
    UnsupportedFormat { filename: String },

    // Extraction Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Audio is silent (peak level {peak:.2e})")]
    SilentAudio { peak: f64 },

    #[error("{measure} is undefined: {reason}")]
    MeasurementUndefined { measure: &'static str, reason: String },

    #[error("Mean harmonics-to-noise ratio is exactly zero; NHR is undefined")]
    HarmonicityZero,

    // Input Errors
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: '{value}' is not a decimal number")]
    InvalidField { field: String, value: String },

    #[error("Feature {field} is not finite ({value})")]
    NonFiniteFeature { field: &'static str, value: f64 },

    // Classifier Errors
    #[error("Classifier failed: {reason}")]
    ClassifierFailure { reason: String },

    // Configuration Errors
    #[error("Model not found: {path}")]
    ModelNotFound { path: String },

    #[error("Invalid model: {reason}")]
    InvalidModel { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScreenError {
    /// Convenience constructor for an undefined measurement
    pub fn undefined(measure: &'static str, reason: impl Into<String>) -> Self {
        ScreenError::MeasurementUndefined {
            measure,
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ScreenError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            ScreenError::FileNotFound { .. } => "FILE_NOT_FOUND",
            ScreenError::InvalidAudio { .. } => "INVALID_AUDIO",
            ScreenError::EmptyAudio => "EMPTY_AUDIO",
            ScreenError::SilentAudio { .. } => "SILENT_AUDIO",
            ScreenError::MeasurementUndefined { .. } => "MEASUREMENT_UNDEFINED",
            ScreenError::HarmonicityZero => "HARMONICITY_ZERO",
            ScreenError::MissingField { .. } => "MISSING_FIELD",
            ScreenError::InvalidField { .. } => "INVALID_FIELD",
            ScreenError::NonFiniteFeature { .. } => "NON_FINITE_FEATURE",
            ScreenError::ClassifierFailure { .. } => "CLASSIFIER_FAILURE",
            ScreenError::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            ScreenError::InvalidModel { .. } => "INVALID_MODEL",
            ScreenError::InvalidConfig { .. } => "INVALID_CONFIG",
            ScreenError::Io(_) => "IO_ERROR",
            ScreenError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Classify this error into one of the request-level kinds
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScreenError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ScreenError::FileNotFound { .. }
            | ScreenError::InvalidAudio { .. }
            | ScreenError::EmptyAudio
            | ScreenError::SilentAudio { .. }
            | ScreenError::MeasurementUndefined { .. }
            | ScreenError::HarmonicityZero
            | ScreenError::Io(_) => ErrorKind::Extraction,
            ScreenError::MissingField { .. }
            | ScreenError::InvalidField { .. }
            | ScreenError::NonFiniteFeature { .. } => ErrorKind::InvalidInput,
            ScreenError::ClassifierFailure { .. } => ErrorKind::Classifier,
            ScreenError::ModelNotFound { .. }
            | ScreenError::InvalidModel { .. }
            | ScreenError::InvalidConfig { .. }
            | ScreenError::Serialization(_) => ErrorKind::Configuration,
        }
    }

    /// Check if the user can fix this by resubmitting different input
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Configuration)
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ScreenError::UnsupportedFormat { .. } => vec![
                "Upload a WAV or MP3 recording",
                "Check the file extension matches its contents",
            ],
            ScreenError::InvalidAudio { .. } | ScreenError::EmptyAudio => vec![
                "Check if the file plays in another application",
                "Try converting the file to WAV format first",
            ],
            ScreenError::SilentAudio { .. } => vec![
                "Check the microphone was unmuted while recording",
                "Record a sustained vowel such as 'aaah' for a few seconds",
            ],
            ScreenError::MeasurementUndefined { .. } | ScreenError::HarmonicityZero => vec![
                "Record a steady sustained vowel with little background noise",
                "Make sure the recording is at least one second long",
            ],
            ScreenError::MissingField { .. }
            | ScreenError::InvalidField { .. }
            | ScreenError::NonFiniteFeature { .. } => vec![
                "Fill in all 22 measurements",
                "Use plain decimal numbers such as 119.992 or 0.00784",
            ],
            ScreenError::ModelNotFound { .. } => vec![
                "Pass --model with the path to a trained model file",
                "Set model_path in the configuration file",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ScreenError::MissingField {
            field: "PPE".to_string(),
        };
        assert_eq!(err.error_code(), "MISSING_FIELD");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_harmonicity_zero_is_extraction() {
        let err = ScreenError::HarmonicityZero;
        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(err.is_recoverable());
        assert!(!err.recovery_suggestions().is_empty());
    }

    #[test]
    fn test_configuration_not_recoverable() {
        let err = ScreenError::ModelNotFound {
            path: "model.json".to_string(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_undefined_message() {
        let err = ScreenError::undefined("Jitter (rap)", "fewer than 3 valid periods");
        assert_eq!(
            err.to_string(),
            "Jitter (rap) is undefined: fewer than 3 valid periods"
        );
    }
}
