//! Acoustic feature extraction
//!
//! Turns a recording into the 22-measure [`FeatureVector`]. All analysis
//! parameters are fixed; the same input always yields the same vector.
//!
//! The pipeline runs in this order:
//! 1. decode and reject empty, too-short or silent input
//! 2. mix down to mono
//! 3. track pitch and summarise F0
//! 4. mark glottal pulses and measure jitter and shimmer
//! 5. measure harmonicity
//! 6. resample to 22 050 Hz and summarise the spectral descriptors

pub mod harmonicity;
pub mod perturbation;
pub mod pitch;
pub mod pulses;
pub mod spectral;

use std::path::Path;

use log::{debug, info};

use crate::engine::buffer::linear_to_db;
use crate::engine::{import_audio, resample, AudioBuffer};
use crate::error::{Result, ScreenError};
use crate::features::{FeatureVector, VoiceMeasurements};

pub use harmonicity::HarmonicitySettings;
pub use perturbation::{Jitter, PerturbationSettings, Shimmer};
pub use pitch::{PitchContour, PitchSettings};
pub use pulses::PointProcess;
pub use spectral::{SpectralSummary, SPECTRAL_SAMPLE_RATE};

/// Fixed-parameter extractor from audio to [`FeatureVector`]
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    pitch: PitchSettings,
    perturbation: PerturbationSettings,
    harmonicity: HarmonicitySettings,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the file at `path` and extract its features
    pub fn extract(&self, path: &Path) -> Result<FeatureVector> {
        info!("Extracting features from {}", path.display());
        let buffer = import_audio(path)?;
        self.extract_buffer(&buffer)
    }

    /// Extract features from an already decoded buffer
    ///
    /// # Errors
    /// * `EmptyAudio`, `InvalidAudio`, `SilentAudio` - unusable input
    /// * `MeasurementUndefined` - no voicing, too few periods or frames
    /// * `HarmonicityZero` - mean HNR is exactly zero
    pub fn extract_buffer(&self, buffer: &AudioBuffer) -> Result<FeatureVector> {
        buffer.validate_for_analysis()?;

        let sample_rate = buffer.sample_rate as f64;
        let signal = buffer.to_mono();
        debug!(
            "Analysing {:.2}s of audio at {} Hz ({} channel(s), peak {:.1} dBFS)",
            buffer.duration_secs(),
            buffer.sample_rate,
            buffer.channels(),
            linear_to_db(buffer.peak())
        );

        let contour = pitch::track(&signal, sample_rate, &self.pitch)?;
        let (f0_mean, f0_max, f0_min) = contour.summary()?;
        debug!(
            "Pitch: {} of {} frames voiced, mean {:.2} Hz",
            contour.voiced_count(),
            contour.frames.len(),
            f0_mean
        );

        let pulses = pulses::mark_pulses(&signal, sample_rate, &contour);
        debug!("Marked {} glottal pulses", pulses.len());

        let jitter = perturbation::jitter(&pulses, &self.perturbation)?;
        let shimmer = perturbation::shimmer(&signal, sample_rate, &pulses, &self.perturbation)?;
        let hnr = harmonicity::mean_hnr(&signal, sample_rate, &self.harmonicity)?;

        let spectral = spectral_summary(&signal, buffer.sample_rate)?;

        let measurements = VoiceMeasurements {
            f0_mean,
            f0_max,
            f0_min,
            jitter_local: jitter.local,
            jitter_local_absolute: jitter.local_absolute,
            jitter_rap: jitter.rap,
            jitter_ppq5: jitter.ppq5,
            shimmer_local: shimmer.local,
            shimmer_local_db: shimmer.local_db,
            shimmer_apq3: shimmer.apq3,
            shimmer_apq5: shimmer.apq5,
            hnr,
            rms_mean: spectral.rms_mean,
            zero_crossing_rate_mean: spectral.zero_crossing_rate_mean,
            spectral_centroid_std: spectral.centroid_std,
            spectral_bandwidth_std: spectral.bandwidth_std,
            spectral_rolloff_mean: spectral.rolloff_mean,
            spectral_flatness_mean: spectral.flatness_mean,
        };

        let features = assemble(&measurements)?;

        info!(
            "Extracted features: F0 {:.1} Hz, jitter {:.5}, shimmer {:.5}, HNR {:.2} dB",
            features.mdvp_fo_hz, features.mdvp_jitter_percent, features.mdvp_shimmer, features.hnr
        );

        Ok(features)
    }
}

/// Spectral descriptors of a mono signal after resampling it to the analysis rate
fn spectral_summary(signal: &[f64], sample_rate: u32) -> Result<SpectralSummary> {
    let resampled = resample(signal, sample_rate, SPECTRAL_SAMPLE_RATE)?;
    spectral::summarize(&resampled, SPECTRAL_SAMPLE_RATE)
}

/// Fill in the derived fields and check every value is finite
///
/// A non-finite value here comes from the measurements themselves (an HNR so
/// small its reciprocal overflows, say), so it is reported as an undefined
/// measurement of the recording rather than bad caller input.
fn assemble(measurements: &VoiceMeasurements) -> Result<FeatureVector> {
    let features = FeatureVector::from_measurements(measurements)?;
    features.validate().map_err(|e| match e {
        ScreenError::NonFiniteFeature { field, value } => {
            ScreenError::undefined(field, format!("measured value is {}", value))
        }
        other => other,
    })?;
    Ok(features)
}
