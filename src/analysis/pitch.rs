//! Autocorrelation pitch tracking
//!
//! Frame-wise F0 estimation in the style of Boersma's autocorrelation method:
//! each Hann-windowed frame's autocorrelation is divided by the window's own
//! autocorrelation, and the strongest lag peak (with a small bias toward
//! higher candidates) decides the frame's pitch. There is no Viterbi path
//! smoothing across frames.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{Result, ScreenError};

/// Fixed pitch analysis parameters
#[derive(Debug, Clone)]
pub struct PitchSettings {
    /// Lowest F0 considered, Hz
    pub floor: f64,
    /// Highest F0 considered, Hz
    pub ceiling: f64,
    /// Window length expressed in periods of `floor`
    pub periods_per_window: f64,
    /// Minimum normalised autocorrelation for a voiced frame
    pub voicing_threshold: f64,
    /// Frames quieter than this fraction of the global peak are unvoiced
    pub silence_threshold: f64,
    /// Per-octave bias toward higher-frequency candidates
    pub octave_cost: f64,
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            floor: 75.0,
            ceiling: 600.0,
            periods_per_window: 3.0,
            voicing_threshold: 0.45,
            silence_threshold: 0.03,
            octave_cost: 0.01,
        }
    }
}

impl PitchSettings {
    /// Hop between frame centres, seconds
    pub fn time_step(&self) -> f64 {
        0.75 / self.floor
    }

    /// Analysis window length, seconds
    pub fn window_secs(&self) -> f64 {
        self.periods_per_window / self.floor
    }
}

/// One analysis frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    /// Frame centre, seconds from the start of the signal
    pub time: f64,
    /// Estimated F0, or `None` when unvoiced
    pub frequency: Option<f64>,
}

/// Frame-wise pitch track over a whole recording
#[derive(Debug, Clone)]
pub struct PitchContour {
    pub time_step: f64,
    pub frames: Vec<PitchFrame>,
}

impl PitchContour {
    /// F0 values of all voiced frames, in time order
    pub fn voiced_frequencies(&self) -> impl Iterator<Item = f64> + '_ {
        self.frames.iter().filter_map(|f| f.frequency)
    }

    pub fn voiced_count(&self) -> usize {
        self.voiced_frequencies().count()
    }

    /// Mean, maximum and minimum F0 over voiced frames
    ///
    /// # Errors
    /// * `MeasurementUndefined` - no frame was voiced
    pub fn summary(&self) -> Result<(f64, f64, f64)> {
        let count = self.voiced_count();
        if count == 0 {
            return Err(ScreenError::undefined(
                "Pitch",
                "no voiced frames between 75 and 600 Hz",
            ));
        }

        let mean = self.voiced_frequencies().sum::<f64>() / count as f64;
        let max = self.voiced_frequencies().fold(f64::MIN, f64::max);
        let min = self.voiced_frequencies().fold(f64::MAX, f64::min);

        Ok((mean, max, min))
    }

    /// F0 of the frame nearest to `time`, if that frame is voiced
    pub fn frequency_at(&self, time: f64) -> Option<f64> {
        let first = self.frames.first()?;
        let offset = (time - first.time) / self.time_step;
        if offset < -0.5 - 1e-9 {
            return None;
        }
        let index = offset.round().max(0.0) as usize;
        self.frames.get(index).and_then(|f| f.frequency)
    }
}

/// Track F0 across `signal`
///
/// # Errors
/// * `MeasurementUndefined` - the signal is shorter than one analysis window
pub fn track(signal: &[f64], sample_rate: f64, settings: &PitchSettings) -> Result<PitchContour> {
    let window_len = (settings.window_secs() * sample_rate).round() as usize;
    if window_len < 4 || signal.len() < window_len {
        return Err(ScreenError::undefined(
            "Pitch",
            format!(
                "recording is shorter than one {:.0} ms analysis window",
                settings.window_secs() * 1000.0
            ),
        ));
    }

    let time_step = settings.time_step();
    let duration = signal.len() as f64 / sample_rate;
    let window_secs = window_len as f64 / sample_rate;
    let frame_count = ((duration - window_secs) / time_step).floor() as usize + 1;
    let first_centre =
        window_secs / 2.0 + ((duration - window_secs) - (frame_count - 1) as f64 * time_step) / 2.0;

    let min_lag = ((sample_rate / settings.ceiling).floor() as usize).max(2);
    let max_lag = ((sample_rate / settings.floor).ceil() as usize).min(window_len / 2 - 1);

    let global_peak = signal.iter().fold(0.0_f64, |acc, &s| acc.max(s.abs()));

    let mut autocorrelator = Autocorrelator::new(window_len);
    let window = hann_window(window_len);
    let window_ac = autocorrelator.normalised(&window);

    let mut frames = Vec::with_capacity(frame_count);
    let mut segment = vec![0.0_f64; window_len];

    for index in 0..frame_count {
        let time = first_centre + index as f64 * time_step;
        let start = ((time - window_secs / 2.0) * sample_rate).round().max(0.0) as usize;
        let start = start.min(signal.len() - window_len);
        let frame = &signal[start..start + window_len];

        let mean = frame.iter().sum::<f64>() / window_len as f64;
        let local_peak = frame.iter().fold(0.0_f64, |acc, &s| acc.max((s - mean).abs()));

        let frequency = if local_peak <= settings.silence_threshold * global_peak {
            None
        } else {
            for ((dst, &s), &w) in segment.iter_mut().zip(frame).zip(&window) {
                *dst = (s - mean) * w;
            }
            let ac = autocorrelator.normalised(&segment);
            best_candidate(&ac, &window_ac, min_lag, max_lag, sample_rate, settings)
        };

        frames.push(PitchFrame { time, frequency });
    }

    Ok(PitchContour { time_step, frames })
}

/// Strongest lag peak in `[min_lag, max_lag]`, as a frequency
fn best_candidate(
    ac: &[f64],
    window_ac: &[f64],
    min_lag: usize,
    max_lag: usize,
    sample_rate: f64,
    settings: &PitchSettings,
) -> Option<f64> {
    let r = |lag: usize| {
        if window_ac[lag] > 1e-9 {
            ac[lag] / window_ac[lag]
        } else {
            0.0
        }
    };

    let mut best: Option<(f64, f64, f64)> = None; // (strength, r, lag)

    for lag in min_lag.max(1)..=max_lag {
        let (y0, y1, y2) = (r(lag - 1), r(lag), r(lag + 1));
        if !(y1 > y0 && y1 >= y2) || y1 < settings.voicing_threshold {
            continue;
        }

        let (offset, peak) = parabolic_peak(y0, y1, y2);
        let refined_lag = lag as f64 + offset;
        let peak = peak.min(1.0);
        let strength = peak - settings.octave_cost * (settings.floor * refined_lag / sample_rate).log2();

        if best.map(|(s, _, _)| strength > s).unwrap_or(true) {
            best = Some((strength, peak, refined_lag));
        }
    }

    best.and_then(|(_, peak, lag)| {
        let frequency = sample_rate / lag;
        let in_range = frequency >= settings.floor && frequency <= settings.ceiling;
        (peak >= settings.voicing_threshold && in_range).then_some(frequency)
    })
}

/// Vertex of the parabola through three equally spaced points
///
/// Returns `(offset from the middle point, interpolated value)`.
pub(crate) fn parabolic_peak(y0: f64, y1: f64, y2: f64) -> (f64, f64) {
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < 1e-12 {
        return (0.0, y1);
    }
    let offset = (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5);
    (offset, y1 - 0.25 * (y0 - y2) * offset)
}

/// Periodic Hann window
pub(crate) fn hann_window(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / len as f64).cos())
        .collect()
}

/// FFT-based autocorrelation for a fixed frame length
struct Autocorrelator {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl Autocorrelator {
    fn new(len: usize) -> Self {
        let fft_len = (2 * len).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        Self {
            len,
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
            scratch: vec![Complex::new(0.0, 0.0); fft_len],
        }
    }

    /// Autocorrelation divided by its zero-lag value; all zeros for silence
    fn normalised(&mut self, frame: &[f64]) -> Vec<f64> {
        for (dst, &s) in self.scratch.iter_mut().zip(frame) {
            *dst = Complex::new(s, 0.0);
        }
        for dst in self.scratch.iter_mut().skip(frame.len()) {
            *dst = Complex::new(0.0, 0.0);
        }

        self.forward.process(&mut self.scratch);
        for c in self.scratch.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut self.scratch);

        let zero_lag = self.scratch[0].re;
        if zero_lag <= 0.0 {
            return vec![0.0; self.len];
        }
        self.scratch[..self.len]
            .iter()
            .map(|c| c.re / zero_lag)
            .collect()
    }
}
