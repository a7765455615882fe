//! The 22-measure voice feature vector
//!
//! Field order is a positional contract with the classifier: models were
//! trained on columns in exactly [`FEATURE_NAMES`] order, so nothing here may
//! reorder, drop or add a field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScreenError};

/// Number of measures in a [`FeatureVector`]
pub const FEATURE_COUNT: usize = 22;

/// Canonical field names, in classifier input order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "MDVP_Fo_Hz",
    "MDVP_Fhi_Hz",
    "MDVP_Flo_Hz",
    "MDVP_Jitter_percent",
    "MDVP_Jitter_Abs",
    "MDVP_RAP",
    "MDVP_PPQ",
    "Jitter_DDP",
    "MDVP_Shimmer",
    "MDVP_Shimmer_dB",
    "Shimmer_APQ3",
    "Shimmer_APQ5",
    "MDVP_APQ",
    "Shimmer_DDA",
    "NHR",
    "HNR",
    "RPDE",
    "DFA",
    "spread1",
    "spread2",
    "D2",
    "PPE",
];

/// Independently measured quantities, before the derived fields are filled in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceMeasurements {
    pub f0_mean: f64,
    pub f0_max: f64,
    pub f0_min: f64,
    pub jitter_local: f64,
    pub jitter_local_absolute: f64,
    pub jitter_rap: f64,
    pub jitter_ppq5: f64,
    pub shimmer_local: f64,
    pub shimmer_local_db: f64,
    pub shimmer_apq3: f64,
    pub shimmer_apq5: f64,
    pub hnr: f64,
    pub rms_mean: f64,
    pub zero_crossing_rate_mean: f64,
    pub spectral_centroid_std: f64,
    pub spectral_bandwidth_std: f64,
    pub spectral_rolloff_mean: f64,
    pub spectral_flatness_mean: f64,
}

/// Ordered record of the 22 voice measures consumed by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "MDVP_Fo_Hz")]
    pub mdvp_fo_hz: f64,
    #[serde(rename = "MDVP_Fhi_Hz")]
    pub mdvp_fhi_hz: f64,
    #[serde(rename = "MDVP_Flo_Hz")]
    pub mdvp_flo_hz: f64,
    #[serde(rename = "MDVP_Jitter_percent")]
    pub mdvp_jitter_percent: f64,
    #[serde(rename = "MDVP_Jitter_Abs")]
    pub mdvp_jitter_abs: f64,
    #[serde(rename = "MDVP_RAP")]
    pub mdvp_rap: f64,
    #[serde(rename = "MDVP_PPQ")]
    pub mdvp_ppq: f64,
    #[serde(rename = "Jitter_DDP")]
    pub jitter_ddp: f64,
    #[serde(rename = "MDVP_Shimmer")]
    pub mdvp_shimmer: f64,
    #[serde(rename = "MDVP_Shimmer_dB")]
    pub mdvp_shimmer_db: f64,
    #[serde(rename = "Shimmer_APQ3")]
    pub shimmer_apq3: f64,
    #[serde(rename = "Shimmer_APQ5")]
    pub shimmer_apq5: f64,
    #[serde(rename = "MDVP_APQ")]
    pub mdvp_apq: f64,
    #[serde(rename = "Shimmer_DDA")]
    pub shimmer_dda: f64,
    #[serde(rename = "NHR")]
    pub nhr: f64,
    #[serde(rename = "HNR")]
    pub hnr: f64,
    /// Mean short-time RMS energy. Stands in for recurrence period density
    /// entropy; not a nonlinear-dynamics measure.
    #[serde(rename = "RPDE")]
    pub rpde: f64,
    /// Mean zero-crossing rate. Stands in for detrended fluctuation analysis.
    #[serde(rename = "DFA")]
    pub dfa: f64,
    #[serde(rename = "spread1")]
    pub spread1: f64,
    #[serde(rename = "spread2")]
    pub spread2: f64,
    /// Mean spectral roll-off in Hz. Stands in for correlation dimension.
    #[serde(rename = "D2")]
    pub d2: f64,
    /// Mean spectral flatness. Stands in for pitch period entropy.
    #[serde(rename = "PPE")]
    pub ppe: f64,
}

impl FeatureVector {
    /// Assemble a vector from measurements, filling in the derived fields
    ///
    /// # Errors
    /// * `HarmonicityZero` - when `hnr` is exactly zero, since NHR = 1/HNR
    pub fn from_measurements(m: &VoiceMeasurements) -> Result<Self> {
        if m.hnr == 0.0 {
            return Err(ScreenError::HarmonicityZero);
        }

        Ok(Self {
            mdvp_fo_hz: m.f0_mean,
            mdvp_fhi_hz: m.f0_max,
            mdvp_flo_hz: m.f0_min,
            mdvp_jitter_percent: m.jitter_local,
            mdvp_jitter_abs: m.jitter_local_absolute,
            mdvp_rap: m.jitter_rap,
            mdvp_ppq: m.jitter_ppq5,
            jitter_ddp: 3.0 * m.jitter_rap,
            mdvp_shimmer: m.shimmer_local,
            mdvp_shimmer_db: m.shimmer_local_db,
            shimmer_apq3: m.shimmer_apq3,
            shimmer_apq5: m.shimmer_apq5,
            mdvp_apq: m.shimmer_apq5,
            shimmer_dda: 3.0 * m.shimmer_apq3,
            nhr: 1.0 / m.hnr,
            hnr: m.hnr,
            rpde: m.rms_mean,
            dfa: m.zero_crossing_rate_mean,
            spread1: m.spectral_centroid_std,
            spread2: m.spectral_bandwidth_std,
            d2: m.spectral_rolloff_mean,
            ppe: m.spectral_flatness_mean,
        })
    }

    /// Build a vector from values already in canonical order
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [mdvp_fo_hz, mdvp_fhi_hz, mdvp_flo_hz, mdvp_jitter_percent, mdvp_jitter_abs, mdvp_rap, mdvp_ppq, jitter_ddp, mdvp_shimmer, mdvp_shimmer_db, shimmer_apq3, shimmer_apq5, mdvp_apq, shimmer_dda, nhr, hnr, rpde, dfa, spread1, spread2, d2, ppe] =
            values;

        Self {
            mdvp_fo_hz,
            mdvp_fhi_hz,
            mdvp_flo_hz,
            mdvp_jitter_percent,
            mdvp_jitter_abs,
            mdvp_rap,
            mdvp_ppq,
            jitter_ddp,
            mdvp_shimmer,
            mdvp_shimmer_db,
            shimmer_apq3,
            shimmer_apq5,
            mdvp_apq,
            shimmer_dda,
            nhr,
            hnr,
            rpde,
            dfa,
            spread1,
            spread2,
            d2,
            ppe,
        }
    }

    /// Values in canonical order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.mdvp_fo_hz,
            self.mdvp_fhi_hz,
            self.mdvp_flo_hz,
            self.mdvp_jitter_percent,
            self.mdvp_jitter_abs,
            self.mdvp_rap,
            self.mdvp_ppq,
            self.jitter_ddp,
            self.mdvp_shimmer,
            self.mdvp_shimmer_db,
            self.shimmer_apq3,
            self.shimmer_apq5,
            self.mdvp_apq,
            self.shimmer_dda,
            self.nhr,
            self.hnr,
            self.rpde,
            self.dfa,
            self.spread1,
            self.spread2,
            self.d2,
            self.ppe,
        ]
    }

    /// Pairs of (canonical name, value) in order
    pub fn named_values(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }

    /// Parse a manual submission of all 22 fields
    ///
    /// Every canonical name must be present and hold a finite decimal number.
    /// Surrounding whitespace is ignored. Extra keys are ignored.
    ///
    /// # Errors
    /// * `MissingField` - a canonical name is absent or blank
    /// * `InvalidField` - the value does not parse as a number
    /// * `NonFiniteFeature` - the value parses to NaN or infinity
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self> {
        let mut values = [0.0_f64; FEATURE_COUNT];

        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            let raw = fields
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ScreenError::MissingField {
                    field: name.to_string(),
                })?;

            let value: f64 = raw.parse().map_err(|_| ScreenError::InvalidField {
                field: name.to_string(),
                value: raw.to_string(),
            })?;

            if !value.is_finite() {
                return Err(ScreenError::NonFiniteFeature { field: name, value });
            }

            *slot = value;
        }

        Ok(Self::from_array(values))
    }

    /// Check every field is finite
    pub fn validate(&self) -> Result<()> {
        match self.named_values().find(|(_, v)| !v.is_finite()) {
            Some((field, value)) => Err(ScreenError::NonFiniteFeature { field, value }),
            None => Ok(()),
        }
    }
}
