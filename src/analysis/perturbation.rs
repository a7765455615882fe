//! Jitter and shimmer
//!
//! Cycle-to-cycle perturbation of period length (jitter) and of peak
//! amplitude (shimmer), measured over the pulses from
//! [`mark_pulses`](crate::analysis::pulses::mark_pulses).
//!
//! A period only takes part when it lies within the period floor/ceiling.
//! Neighbouring periods only form a pair (or a 3/5-point window) when their
//! lengths differ by at most `max_period_factor`, and for shimmer their
//! amplitudes by at most `max_amplitude_factor`. Anything else breaks the
//! run, which is how gaps between voiced stretches drop out.

use crate::analysis::pulses::PointProcess;
use crate::error::{Result, ScreenError};

/// Fixed perturbation parameters
#[derive(Debug, Clone)]
pub struct PerturbationSettings {
    /// Shortest period taken into account, seconds
    pub period_floor: f64,
    /// Longest period taken into account, seconds
    pub period_ceiling: f64,
    /// Largest allowed ratio between consecutive periods
    pub max_period_factor: f64,
    /// Largest allowed ratio between consecutive amplitudes
    pub max_amplitude_factor: f64,
}

impl Default for PerturbationSettings {
    fn default() -> Self {
        Self {
            period_floor: 0.0001,
            period_ceiling: 0.02,
            max_period_factor: 1.3,
            max_amplitude_factor: 1.6,
        }
    }
}

/// Period perturbation measures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    /// Mean absolute difference of consecutive periods over the mean period
    pub local: f64,
    /// Mean absolute difference of consecutive periods, seconds
    pub local_absolute: f64,
    /// Relative average perturbation (3-point)
    pub rap: f64,
    /// Five-point period perturbation quotient
    pub ppq5: f64,
}

/// Amplitude perturbation measures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shimmer {
    pub local: f64,
    /// Mean absolute base-10 log ratio of consecutive amplitudes, in dB
    pub local_db: f64,
    pub apq3: f64,
    pub apq5: f64,
}

/// Measure jitter over the pulse train
///
/// # Errors
/// * `MeasurementUndefined` - too few valid periods for a measure
pub fn jitter(pulses: &PointProcess, settings: &PerturbationSettings) -> Result<Jitter> {
    let periods: Vec<Option<f64>> = pulses
        .periods()
        .into_iter()
        .map(|p| settings.period_in_range(p).then_some(p))
        .collect();

    let runs = split_runs(&periods, |a, b| {
        ratio_within(*a, *b, settings.max_period_factor)
    });

    let mean_period = mean(periods.iter().flatten().copied())
        .ok_or_else(|| ScreenError::undefined("Jitter", "no valid glottal periods"))?;

    let local_absolute = mean_abs_difference(&runs)
        .ok_or_else(|| ScreenError::undefined("Jitter (local)", "fewer than 2 consecutive valid periods"))?;
    let rap = mean_abs_deviation(&runs, 3)
        .ok_or_else(|| ScreenError::undefined("Jitter (rap)", "fewer than 3 consecutive valid periods"))?;
    let ppq5 = mean_abs_deviation(&runs, 5)
        .ok_or_else(|| ScreenError::undefined("Jitter (ppq5)", "fewer than 5 consecutive valid periods"))?;

    Ok(Jitter {
        local: local_absolute / mean_period,
        local_absolute,
        rap: rap / mean_period,
        ppq5: ppq5 / mean_period,
    })
}

/// Measure shimmer over the pulse train
///
/// Each period's amplitude is the largest absolute sample between its two
/// bounding pulses.
///
/// # Errors
/// * `MeasurementUndefined` - too few valid periods for a measure
pub fn shimmer(
    signal: &[f64],
    sample_rate: f64,
    pulses: &PointProcess,
    settings: &PerturbationSettings,
) -> Result<Shimmer> {
    let cycles: Vec<Option<(f64, f64)>> = pulses
        .times
        .windows(2)
        .map(|w| {
            let period = w[1] - w[0];
            if !settings.period_in_range(period) {
                return None;
            }
            let amplitude = peak_between(signal, w[0] * sample_rate, w[1] * sample_rate);
            (amplitude > 0.0).then_some((period, amplitude))
        })
        .collect();

    let runs: Vec<Vec<f64>> = split_runs(&cycles, |a, b| {
        ratio_within(a.0, b.0, settings.max_period_factor)
            && ratio_within(a.1, b.1, settings.max_amplitude_factor)
    })
    .into_iter()
    .map(|run| run.into_iter().map(|(_, amplitude)| amplitude).collect())
    .collect();

    let mean_amplitude = mean(cycles.iter().flatten().map(|&(_, a)| a))
        .ok_or_else(|| ScreenError::undefined("Shimmer", "no valid glottal periods"))?;

    let local = mean_abs_difference(&runs)
        .ok_or_else(|| ScreenError::undefined("Shimmer (local)", "fewer than 2 consecutive valid periods"))?;
    let local_db = mean(runs.iter().flat_map(|run| {
        run.windows(2).map(|w| (20.0 * (w[1] / w[0]).log10()).abs())
    }))
    .ok_or_else(|| ScreenError::undefined("Shimmer (local_dB)", "fewer than 2 consecutive valid periods"))?;
    let apq3 = mean_abs_deviation(&runs, 3)
        .ok_or_else(|| ScreenError::undefined("Shimmer (apq3)", "fewer than 3 consecutive valid periods"))?;
    let apq5 = mean_abs_deviation(&runs, 5)
        .ok_or_else(|| ScreenError::undefined("Shimmer (apq5)", "fewer than 5 consecutive valid periods"))?;

    Ok(Shimmer {
        local: local / mean_amplitude,
        local_db,
        apq3: apq3 / mean_amplitude,
        apq5: apq5 / mean_amplitude,
    })
}

impl PerturbationSettings {
    fn period_in_range(&self, period: f64) -> bool {
        period >= self.period_floor && period <= self.period_ceiling
    }
}

fn ratio_within(a: f64, b: f64, factor: f64) -> bool {
    a > 0.0 && b > 0.0 && a.max(b) / a.min(b) <= factor
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Split on `None` and wherever `continues(previous, current)` is false
fn split_runs<T: Copy>(items: &[Option<T>], continues: impl Fn(&T, &T) -> bool) -> Vec<Vec<T>> {
    let mut runs = Vec::new();
    let mut current: Vec<T> = Vec::new();

    for item in items {
        match item {
            Some(value) => {
                if let Some(previous) = current.last() {
                    if !continues(previous, value) {
                        runs.push(std::mem::take(&mut current));
                    }
                }
                current.push(*value);
            }
            None => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    runs
}

/// Mean |v[i] - v[i-1]| over all runs
fn mean_abs_difference(runs: &[Vec<f64>]) -> Option<f64> {
    mean(
        runs.iter()
            .flat_map(|run| run.windows(2).map(|w| (w[1] - w[0]).abs())),
    )
}

/// Mean |middle - window mean| over every `points`-wide window (odd `points`)
fn mean_abs_deviation(runs: &[Vec<f64>], points: usize) -> Option<f64> {
    mean(runs.iter().flat_map(|run| {
        run.windows(points).map(|w| {
            let average = w.iter().sum::<f64>() / points as f64;
            (w[points / 2] - average).abs()
        })
    }))
}

fn peak_between(signal: &[f64], from: f64, to: f64) -> f64 {
    let start = (from.round().max(0.0) as usize).min(signal.len());
    let end = (to.round().max(0.0) as usize).min(signal.len());
    signal[start..end.max(start)]
        .iter()
        .fold(0.0_f64, |acc, &s| acc.max(s.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pulses_from_periods(periods: &[f64]) -> PointProcess {
        let mut t = 0.0;
        let mut times = vec![t];
        for p in periods {
            t += p;
            times.push(t);
        }
        PointProcess { times }
    }

    #[test]
    fn test_constant_periods_have_zero_jitter() {
        let pulses = pulses_from_periods(&[0.008; 20]);
        let j = jitter(&pulses, &PerturbationSettings::default()).unwrap();
        assert!(j.local.abs() < 1e-12);
        assert!(j.rap.abs() < 1e-12);
        assert!(j.ppq5.abs() < 1e-12);
    }

    #[test]
    fn test_alternating_periods() {
        // 8 ms / 9 ms alternation: every difference is 1 ms
        let periods: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 0.008 } else { 0.009 }).collect();
        let j = jitter(&pulses_from_periods(&periods), &PerturbationSettings::default()).unwrap();

        assert_relative_eq!(j.local_absolute, 0.001, epsilon = 1e-12);
        assert_relative_eq!(j.local, 0.001 / 0.0085, epsilon = 1e-9);
        // middle deviates from the 3-point mean by 2/3 ms
        assert_relative_eq!(j.rap, (0.002 / 3.0) / 0.0085, epsilon = 1e-9);
    }

    #[test]
    fn test_out_of_range_periods_break_runs() {
        // a 50 ms gap exceeds the 20 ms ceiling
        let periods = [0.008, 0.008, 0.05, 0.008, 0.008];
        let pulses = pulses_from_periods(&periods);
        let settings = PerturbationSettings::default();

        let j = jitter(&pulses, &settings).unwrap_err();
        assert!(matches!(
            j,
            ScreenError::MeasurementUndefined { measure: "Jitter (rap)", .. }
        ));
    }

    #[test]
    fn test_period_factor_breaks_runs() {
        let periods = [0.004, 0.004, 0.008, 0.008];
        let runs = split_runs(
            &periods.iter().map(|&p| Some(p)).collect::<Vec<_>>(),
            |a, b| ratio_within(*a, *b, 1.3),
        );
        assert_eq!(runs, vec![vec![0.004, 0.004], vec![0.008, 0.008]]);
    }

    #[test]
    fn test_no_pulses_is_undefined() {
        let pulses = PointProcess::default();
        assert!(jitter(&pulses, &PerturbationSettings::default()).is_err());
        assert!(shimmer(&[], 16000.0, &pulses, &PerturbationSettings::default()).is_err());
    }

    #[test]
    fn test_shimmer_of_alternating_amplitudes() {
        // 100-sample periods at 10 kHz, peak alternating 0.5 / 0.6
        let sample_rate = 10000.0;
        let cycles = 12;
        let mut signal = vec![0.0; cycles * 100 + 1];
        for c in 0..cycles {
            signal[c * 100 + 50] = if c % 2 == 0 { 0.5 } else { 0.6 };
        }
        let pulses = PointProcess {
            times: (0..=cycles).map(|c| c as f64 * 0.01).collect(),
        };

        let s = shimmer(&signal, sample_rate, &pulses, &PerturbationSettings::default()).unwrap();
        assert_relative_eq!(s.local, 0.1 / 0.55, epsilon = 1e-9);
        assert_relative_eq!(s.local_db, 20.0 * (0.6_f64 / 0.5).log10(), epsilon = 1e-9);
        assert_relative_eq!(s.apq3, (0.2 / 3.0) / 0.55, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_amplitude_has_zero_shimmer() {
        let sample_rate = 10000.0;
        let signal: Vec<f64> = (0..2000)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 100.0).sin())
            .collect();
        let pulses = PointProcess {
            times: (0..20).map(|c| c as f64 * 0.01).collect(),
        };

        let s = shimmer(&signal, sample_rate, &pulses, &PerturbationSettings::default()).unwrap();
        assert!(s.local < 1e-9);
        assert!(s.local_db < 1e-6);
    }
}
