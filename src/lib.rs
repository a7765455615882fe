//! Voicescreen - Parkinson's disease voice screening
//!
//! Voicescreen accepts either a voice recording or 22 hand-entered voice
//! measures and screens them with a pre-trained binary classifier.
//!
//! # Architecture
//!
//! A request runs two components synchronously:
//! - Feature extraction: audio to a fixed-order vector of 22 measures
//!   (pitch, jitter, shimmer, harmonicity, spectral descriptors)
//! - Prediction: the vector to a binary label through an injected classifier
//!
//! [`service::ScreeningService`] ties them together behind a single
//! `handle` call that always produces a user-facing message.

pub mod analysis;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod service;
pub mod upload;

pub use analysis::FeatureExtractor;
pub use classifier::{Classifier, Label, PersistedModel, Predictor};
pub use error::{ErrorKind, Result, ScreenError};
pub use features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use service::{Outcome, ScreeningService, Submission};
