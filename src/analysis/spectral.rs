//! Short-time spectral descriptors
//!
//! Frame-level energy, zero-crossing and spectral shape statistics reduced
//! to one scalar each. Framing follows the common librosa conventions so
//! values line up with models trained on librosa output: 22 050 Hz mono,
//! 2048-sample frames, 512-sample hop, centred frames, periodic Hann window.
//!
//! Four of these scalars fill feature slots named after nonlinear dynamics
//! measures (RPDE, DFA, D2, PPE). They are approximations kept for
//! compatibility with existing models, not validated acoustic equivalents.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::analysis::pitch::hann_window;
use crate::error::{Result, ScreenError};

/// Rate the signal is resampled to before spectral analysis
pub const SPECTRAL_SAMPLE_RATE: u32 = 22050;

/// FFT and frame length in samples
pub const FRAME_LENGTH: usize = 2048;

/// Hop between frames in samples
pub const HOP_LENGTH: usize = 512;

/// Fraction of spectral magnitude below the roll-off frequency
pub const ROLL_PERCENT: f64 = 0.85;

/// Power floor used by spectral flatness
const FLATNESS_AMIN: f64 = 1e-10;

/// Magnitudes this close to zero count as zero for zero-crossings
const ZERO_CROSSING_THRESHOLD: f64 = 1e-10;

/// Per-recording reductions of the frame-level descriptors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralSummary {
    /// Mean frame RMS
    pub rms_mean: f64,
    /// Mean zero-crossing rate (crossings per sample)
    pub zero_crossing_rate_mean: f64,
    /// Population standard deviation of the spectral centroid, Hz
    pub centroid_std: f64,
    /// Population standard deviation of the spectral bandwidth, Hz
    pub bandwidth_std: f64,
    /// Mean 85 % roll-off frequency, Hz
    pub rolloff_mean: f64,
    /// Mean spectral flatness (0..1)
    pub flatness_mean: f64,
}

/// Frame-level descriptors for one STFT frame
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameShape {
    centroid: f64,
    bandwidth: f64,
    rolloff: f64,
    flatness: f64,
}

/// Compute all spectral descriptors of `signal` (mono, at `sample_rate`)
///
/// # Errors
/// * `MeasurementUndefined` - the signal is empty
pub fn summarize(signal: &[f64], sample_rate: u32) -> Result<SpectralSummary> {
    if signal.is_empty() {
        return Err(ScreenError::undefined("Spectral descriptors", "no samples"));
    }

    let rms = frame_rms(signal);
    let zcr = frame_zero_crossing_rate(signal);
    let shapes = frame_shapes(signal, sample_rate as f64);

    let centroids: Vec<f64> = shapes.iter().map(|s| s.centroid).collect();
    let bandwidths: Vec<f64> = shapes.iter().map(|s| s.bandwidth).collect();

    Ok(SpectralSummary {
        rms_mean: mean(&rms),
        zero_crossing_rate_mean: mean(&zcr),
        centroid_std: population_std(&centroids),
        bandwidth_std: population_std(&bandwidths),
        rolloff_mean: mean(&shapes.iter().map(|s| s.rolloff).collect::<Vec<_>>()),
        flatness_mean: mean(&shapes.iter().map(|s| s.flatness).collect::<Vec<_>>()),
    })
}

/// Number of centred frames covering `len` samples
fn frame_count(len: usize) -> usize {
    1 + len / HOP_LENGTH
}

/// Zero-padded centred frames
fn padded_frame(signal: &[f64], index: usize, out: &mut [f64]) {
    let half = FRAME_LENGTH as isize / 2;
    let start = (index * HOP_LENGTH) as isize - half;
    for (k, slot) in out.iter_mut().enumerate() {
        let pos = start + k as isize;
        *slot = if pos >= 0 && (pos as usize) < signal.len() {
            signal[pos as usize]
        } else {
            0.0
        };
    }
}

/// Edge-padded centred frames (first/last sample repeated)
fn edge_padded_frame(signal: &[f64], index: usize, out: &mut [f64]) {
    let half = FRAME_LENGTH as isize / 2;
    let start = (index * HOP_LENGTH) as isize - half;
    let last = signal.len() as isize - 1;
    for (k, slot) in out.iter_mut().enumerate() {
        let pos = (start + k as isize).clamp(0, last);
        *slot = signal[pos as usize];
    }
}

fn frame_rms(signal: &[f64]) -> Vec<f64> {
    let mut frame = vec![0.0; FRAME_LENGTH];
    (0..frame_count(signal.len()))
        .map(|i| {
            padded_frame(signal, i, &mut frame);
            (frame.iter().map(|s| s * s).sum::<f64>() / FRAME_LENGTH as f64).sqrt()
        })
        .collect()
}

fn frame_zero_crossing_rate(signal: &[f64]) -> Vec<f64> {
    let mut frame = vec![0.0; FRAME_LENGTH];
    (0..frame_count(signal.len()))
        .map(|i| {
            edge_padded_frame(signal, i, &mut frame);
            let negative = |s: f64| s.abs() > ZERO_CROSSING_THRESHOLD && s < 0.0;
            let crossings = frame
                .windows(2)
                .filter(|w| negative(w[0]) != negative(w[1]))
                .count();
            crossings as f64 / FRAME_LENGTH as f64
        })
        .collect()
}

fn frame_shapes(signal: &[f64], sample_rate: f64) -> Vec<FrameShape> {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(FRAME_LENGTH);
    let window = hann_window(FRAME_LENGTH);

    let bins = FRAME_LENGTH / 2 + 1;
    let freqs: Vec<f64> = (0..bins)
        .map(|k| k as f64 * sample_rate / FRAME_LENGTH as f64)
        .collect();

    let mut frame = vec![0.0; FRAME_LENGTH];
    let mut buffer = vec![Complex::new(0.0, 0.0); FRAME_LENGTH];
    let mut magnitudes = vec![0.0; bins];

    (0..frame_count(signal.len()))
        .map(|i| {
            padded_frame(signal, i, &mut frame);
            for ((dst, &s), &w) in buffer.iter_mut().zip(&frame).zip(&window) {
                *dst = Complex::new(s * w, 0.0);
            }
            fft.process(&mut buffer);
            for (m, c) in magnitudes.iter_mut().zip(&buffer) {
                *m = c.norm();
            }
            frame_shape(&magnitudes, &freqs)
        })
        .collect()
}

fn frame_shape(magnitudes: &[f64], freqs: &[f64]) -> FrameShape {
    let total: f64 = magnitudes.iter().sum();

    let (centroid, bandwidth) = if total > 0.0 {
        let centroid = magnitudes
            .iter()
            .zip(freqs)
            .map(|(m, f)| m * f)
            .sum::<f64>()
            / total;
        let variance = magnitudes
            .iter()
            .zip(freqs)
            .map(|(m, f)| (m / total) * (f - centroid).powi(2))
            .sum::<f64>();
        (centroid, variance.sqrt())
    } else {
        (0.0, 0.0)
    };

    let threshold = ROLL_PERCENT * total;
    let mut cumulative = 0.0;
    let mut rolloff = freqs[freqs.len() - 1];
    for (m, f) in magnitudes.iter().zip(freqs) {
        cumulative += m;
        if cumulative >= threshold {
            rolloff = *f;
            break;
        }
    }

    let powers: Vec<f64> = magnitudes
        .iter()
        .map(|m| (m * m).max(FLATNESS_AMIN))
        .collect();
    let log_mean = powers.iter().map(|p| p.ln()).sum::<f64>() / powers.len() as f64;
    let arithmetic_mean = powers.iter().sum::<f64>() / powers.len() as f64;
    let flatness = log_mean.exp() / arithmetic_mean;

    FrameShape {
        centroid,
        bandwidth,
        rolloff,
        flatness,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    mean(&values.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>()).sqrt()
}
