//! Audio Buffer Management
//!
//! Provides the decoded audio buffer type and the validation applied before
//! any acoustic analysis runs.

use crate::error::{Result, ScreenError};

// ============================================================================
// Constants
// ============================================================================

/// Peak amplitude at or below which a recording is treated as silent
pub const SILENCE_PEAK_THRESHOLD: f64 = 1e-7;

/// Minimum duration that still allows pitch and spectral analysis (100ms)
pub const MIN_DURATION_SECS: f64 = 0.1;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f64::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    #[default]
    Mono,
    /// Two channels (stereo: left, right)
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio at its native sample rate
///
/// Stores audio as non-interleaved 32-bit floating point samples.
/// Each channel is a separate Vec<f32>.
///
/// # Example
/// ```
/// use voicescreen::engine::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(44100, ChannelLayout::Stereo, 44100);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// ```
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer with the given length, layout and rate
    pub fn new(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Create a mono buffer from existing samples
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: vec![samples],
            sample_rate,
        }
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// Returns an error if the data length doesn't divide evenly into the
    /// layout's channel count.
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(ScreenError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get the channel layout
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(self.channels())
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Average all channels into one double-precision signal
    pub fn to_mono(&self) -> Vec<f64> {
        let channels = self.channels();
        if channels == 0 {
            return Vec::new();
        }

        (0..self.len())
            .map(|i| {
                let sum: f64 = self.samples.iter().map(|ch| ch[i] as f64).sum();
                sum / channels as f64
            })
            .collect()
    }

    /// Largest absolute sample value across all channels
    pub fn peak(&self) -> f64 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| (s as f64).abs())
            .fold(0.0_f64, f64::max)
    }

    /// Check the buffer is fit for acoustic analysis
    ///
    /// # Errors
    /// * `EmptyAudio` - no samples at all
    /// * `InvalidAudio` - shorter than [`MIN_DURATION_SECS`]
    /// * `SilentAudio` - peak at or below [`SILENCE_PEAK_THRESHOLD`]
    pub fn validate_for_analysis(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ScreenError::EmptyAudio);
        }

        let duration = self.duration_secs();
        if duration < MIN_DURATION_SECS {
            return Err(ScreenError::InvalidAudio {
                reason: format!("recording is {:.3}s long (minimum 0.1s)", duration),
                source: None,
            });
        }

        let peak = self.peak();
        if peak <= SILENCE_PEAK_THRESHOLD || !peak.is_finite() {
            return Err(ScreenError::SilentAudio { peak });
        }

        Ok(())
    }
}
