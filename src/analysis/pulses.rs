//! Glottal pulse marking (periodic, cross-correlation)
//!
//! Pulses are placed one local period apart through every voiced stretch of
//! the pitch contour. Each new pulse is the position, within ±20 % of the
//! expected period, whose surrounding waveform best cross-correlates with
//! the waveform around the previous pulse.

use crate::analysis::pitch::{parabolic_peak, PitchContour};

/// Fraction of a period searched either side of the expected pulse position
const SEARCH_FRACTION: f64 = 0.2;

/// Pulse instants in seconds, strictly increasing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointProcess {
    pub times: Vec<f64>,
}

impl PointProcess {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Intervals between successive pulses, seconds
    pub fn periods(&self) -> Vec<f64> {
        self.times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

/// Mark pulses in every voiced stretch of `contour`
pub fn mark_pulses(signal: &[f64], sample_rate: f64, contour: &PitchContour) -> PointProcess {
    let mut times = Vec::new();

    for (start, end) in voiced_intervals(contour) {
        let first = ((start * sample_rate).round().max(0.0)) as usize;
        let last = ((end * sample_rate).round() as usize).min(signal.len());
        if first >= last {
            continue;
        }
        mark_interval(signal, sample_rate, contour, first, last, &mut times);
    }

    PointProcess { times }
}

/// `(start, end)` seconds of each run of consecutive voiced frames
fn voiced_intervals(contour: &PitchContour) -> Vec<(f64, f64)> {
    let half_step = contour.time_step / 2.0;
    let mut intervals = Vec::new();
    let mut run_start: Option<f64> = None;
    let mut run_end = 0.0;

    for frame in &contour.frames {
        match (frame.frequency.is_some(), run_start) {
            (true, None) => {
                run_start = Some(frame.time - half_step);
                run_end = frame.time + half_step;
            }
            (true, Some(_)) => run_end = frame.time + half_step,
            (false, Some(s)) => {
                intervals.push((s, run_end));
                run_start = None;
            }
            (false, None) => {}
        }
    }
    if let Some(s) = run_start {
        intervals.push((s, run_end));
    }

    intervals
}

fn mark_interval(
    signal: &[f64],
    sample_rate: f64,
    contour: &PitchContour,
    first: usize,
    last: usize,
    times: &mut Vec<f64>,
) {
    let period_at = |pos: f64| {
        contour
            .frequency_at(pos / sample_rate)
            .map(|f| sample_rate / f)
    };

    let Some(initial_period) = period_at(first as f64) else {
        return;
    };

    // Anchor on the largest excursion within the first period
    let anchor_end = (first + initial_period.ceil() as usize).min(last);
    let anchor = (first..anchor_end)
        .max_by(|&a, &b| signal[a].abs().total_cmp(&signal[b].abs()))
        .unwrap_or(first);

    let mut position = anchor as f64;
    times.push(position / sample_rate);

    loop {
        let Some(period) = period_at(position) else {
            break;
        };
        let expected = position + period;
        let half = (period / 2.0).round() as isize;
        if expected + half as f64 >= last as f64 {
            break;
        }

        let reach = (period * SEARCH_FRACTION).ceil() as isize;
        let reference = position.round() as isize;
        let centre = expected.round() as isize;

        let score = |candidate: isize| correlation(signal, reference, candidate, half);

        let mut best = (f64::MIN, centre);
        for candidate in (centre - reach)..=(centre + reach) {
            let c = score(candidate);
            if c > best.0 {
                best = (c, candidate);
            }
        }

        let (offset, _) = parabolic_peak(score(best.1 - 1), best.0, score(best.1 + 1));
        // The reference window sits on the rounded pulse; keep the fraction
        let next = position + (best.1 - reference) as f64 + offset;
        if next <= position {
            break;
        }

        position = next;
        times.push(position / sample_rate);
    }
}

/// Normalised cross-correlation of the windows `[a - half, a + half)` and
/// `[b - half, b + half)`; windows reaching outside the signal score -1
fn correlation(signal: &[f64], a: isize, b: isize, half: isize) -> f64 {
    let len = signal.len() as isize;
    if a - half < 0 || b - half < 0 || a + half > len || b + half > len || half <= 0 {
        return -1.0;
    }

    let wa = &signal[(a - half) as usize..(a + half) as usize];
    let wb = &signal[(b - half) as usize..(b + half) as usize];

    let (mut cross, mut ea, mut eb) = (0.0, 0.0, 0.0);
    for (&x, &y) in wa.iter().zip(wb) {
        cross += x * y;
        ea += x * x;
        eb += y * y;
    }

    let norm = (ea * eb).sqrt();
    if norm > 0.0 {
        cross / norm
    } else {
        -1.0
    }
}
