//! Harmonics-to-noise ratio (cross-correlation method)
//!
//! For every frame the normalised cross-correlation between a one-period
//! window and its lagged copy is maximised over lags up to one period of the
//! minimum pitch. A peak correlation `r` gives `10·log10(r / (1 - r))` dB.
//! Frames quieter than the silence threshold are left out of the mean.

use crate::error::{Result, ScreenError};

/// Correlations are kept inside this margin of 0 and 1 (±150 dB)
const CORRELATION_MARGIN: f64 = 1e-15;

/// Fixed harmonicity parameters
#[derive(Debug, Clone)]
pub struct HarmonicitySettings {
    /// Hop between frames, seconds
    pub time_step: f64,
    /// Lowest pitch whose period fits the lag range, Hz
    pub min_pitch: f64,
    /// Frames whose peak is below this fraction of the global peak are skipped
    pub silence_threshold: f64,
    /// Window length in periods of `min_pitch`
    pub periods_per_window: f64,
}

impl Default for HarmonicitySettings {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            min_pitch: 75.0,
            silence_threshold: 0.1,
            periods_per_window: 1.0,
        }
    }
}

/// HNR of a single correlation value, in dB
pub fn hnr_from_correlation(r: f64) -> f64 {
    let r = r.clamp(CORRELATION_MARGIN, 1.0 - CORRELATION_MARGIN);
    10.0 * (r / (1.0 - r)).log10()
}

/// Mean HNR over all sounding frames, in dB
///
/// # Errors
/// * `MeasurementUndefined` - the signal is too short for one frame, or every
///   frame is below the silence threshold
pub fn mean_hnr(signal: &[f64], sample_rate: f64, settings: &HarmonicitySettings) -> Result<f64> {
    let frame_values = frame_hnr(signal, sample_rate, settings)?;
    let sounding: Vec<f64> = frame_values.into_iter().flatten().collect();

    if sounding.is_empty() {
        return Err(ScreenError::undefined(
            "Harmonicity",
            "no frame rises above the silence threshold",
        ));
    }

    Ok(sounding.iter().sum::<f64>() / sounding.len() as f64)
}

/// Per-frame HNR, `None` for frames below the silence threshold
pub fn frame_hnr(
    signal: &[f64],
    sample_rate: f64,
    settings: &HarmonicitySettings,
) -> Result<Vec<Option<f64>>> {
    let window = ((settings.periods_per_window / settings.min_pitch) * sample_rate).round() as usize;
    let max_lag = (sample_rate / settings.min_pitch).ceil() as usize;
    let span = window + max_lag + 1;

    if window < 2 || signal.len() < span {
        return Err(ScreenError::undefined(
            "Harmonicity",
            "recording is shorter than one analysis frame",
        ));
    }

    let global_peak = signal.iter().fold(0.0_f64, |acc, &s| acc.max(s.abs()));
    let hop = ((settings.time_step * sample_rate).round() as usize).max(1);
    let frame_count = (signal.len() - span) / hop + 1;
    let offset = (signal.len() - span - (frame_count - 1) * hop) / 2;

    let mut values = Vec::with_capacity(frame_count);
    let mut correlations = vec![0.0_f64; max_lag + 2];

    for index in 0..frame_count {
        let start = offset + index * hop;
        let frame = &signal[start..start + span];

        let local_peak = frame.iter().fold(0.0_f64, |acc, &s| acc.max(s.abs()));
        if local_peak < settings.silence_threshold * global_peak || local_peak == 0.0 {
            values.push(None);
            continue;
        }

        for (lag, slot) in correlations.iter_mut().enumerate() {
            *slot = if lag <= max_lag {
                normalised_cross_correlation(frame, window, lag)
            } else {
                f64::MIN
            };
        }

        // Only true peaks count, which skips the lobe around lag 0
        let best = (2..=max_lag)
            .filter(|&lag| {
                correlations[lag] > correlations[lag - 1]
                    && correlations[lag] >= correlations[lag + 1]
            })
            .map(|lag| correlations[lag])
            .fold(f64::MIN, f64::max);

        let r = if best == f64::MIN { 0.0 } else { best };
        values.push(Some(hnr_from_correlation(r)));
    }

    Ok(values)
}

fn normalised_cross_correlation(frame: &[f64], window: usize, lag: usize) -> f64 {
    let a = &frame[..window];
    let b = &frame[lag..lag + window];

    let (mut cross, mut ea, mut eb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        cross += x * y;
        ea += x * x;
        eb += y * y;
    }

    let norm = (ea * eb).sqrt();
    if norm > 0.0 {
        cross / norm
    } else {
        0.0
    }
}
