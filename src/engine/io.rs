//! Audio file I/O for Voicescreen
//!
//! Decodes WAV (via hound) and MP3 (via symphonia) recordings into an
//! [`AudioBuffer`] at the file's native sample rate. Writing is limited to
//! WAV and exists so fixtures can be produced without external tools.
//!
//! Sample rate conversion is band-limited sinc interpolation (rubato).

use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{Result, ScreenError};

/// Import an audio file at its native sample rate
///
/// The decoder is chosen from the file extension: `wav` goes through hound,
/// everything else through the symphonia probe.
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file cannot be decoded or has more than 2 channels
/// * `EmptyAudio` - If decoding produced no samples
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(ScreenError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    let buffer = if is_wav {
        import_wav(path)?
    } else {
        import_with_symphonia(path)?
    };

    if buffer.is_empty() {
        return Err(ScreenError::EmptyAudio);
    }

    debug!(
        "Decoded {}: {} ch @ {} Hz, {:.2}s",
        path.display(),
        buffer.channels(),
        buffer.sample_rate,
        buffer.duration_secs()
    );

    Ok(buffer)
}

/// Write a buffer as a 16-bit PCM WAV file at its own sample rate
pub fn export_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_write_error)?;

    for frame in 0..buffer.len() {
        for channel in &buffer.samples {
            let scaled = (channel[frame] * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(scaled).map_err(wav_write_error)?;
        }
    }

    writer.finalize().map_err(wav_write_error)?;

    Ok(())
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    generate_harmonic_tone(frequency, 1, duration_secs, sample_rate)
}

/// Generate a mono tone with `harmonics` partials of falling amplitude
///
/// Partial `k` has amplitude `1/k`, normalised so the peak stays below 1.0.
/// A handful of harmonics gives a waveform with one clear peak per period,
/// which is closer to a sustained vowel than a pure sine.
pub fn generate_harmonic_tone(
    frequency: f32,
    harmonics: usize,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::new(num_samples, ChannelLayout::Mono, sample_rate);

    let harmonics = harmonics.max(1);
    let norm: f32 = (1..=harmonics).map(|k| 1.0 / k as f32).sum();
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        let phase = angular_freq * i as f32;
        let value: f32 = (1..=harmonics)
            .map(|k| (phase * k as f32).sin() / k as f32)
            .sum();
        *sample = 0.8 * value / norm;
    }

    buffer
}

/// Frames fed to the sinc resampler per call
const RESAMPLE_CHUNK: usize = 1024;

/// Band-limited resampling of a mono signal
///
/// Windowed-sinc interpolation with the cutoff at 95 % of the lower Nyquist
/// frequency, so content above the target Nyquist is filtered out instead of
/// folding back into the band. The filter delay is trimmed and the output has
/// `ceil(len * target / source)` samples.
///
/// # Errors
/// * `InvalidAudio` - If the rates cannot be converted (zero rate)
pub fn resample(samples: &[f64], source_rate: u32, target_rate: u32) -> Result<Vec<f64>> {
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(ScreenError::InvalidAudio {
            reason: format!("cannot resample {} Hz to {} Hz", source_rate, target_rate),
            source: None,
        });
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f64>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| resample_error(source_rate, target_rate, e))?;

    let delay = resampler.output_delay();
    let target_len =
        (samples.len() as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;
    let mut output = Vec::with_capacity(target_len + delay + RESAMPLE_CHUNK);

    for chunk in samples.chunks(RESAMPLE_CHUNK) {
        let input = [chunk];
        let frames = if chunk.len() == RESAMPLE_CHUNK {
            resampler.process(&input[..], None)
        } else {
            resampler.process_partial(Some(&input[..]), None)
        }
        .map_err(|e| resample_error(source_rate, target_rate, e))?;
        output.extend_from_slice(&frames[0]);
    }

    // Flush the filter tail with silence
    while output.len() < delay + target_len {
        let frames = resampler
            .process_partial(None::<&[&[f64]]>, None)
            .map_err(|e| resample_error(source_rate, target_rate, e))?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(target_len, 0.0);

    debug!(
        "Resampled {} samples ({} Hz) to {} samples ({} Hz)",
        samples.len(),
        source_rate,
        output.len(),
        target_rate
    );

    Ok(output)
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn wav_write_error(e: hound::Error) -> ScreenError {
    ScreenError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        e.to_string(),
    ))
}

fn resample_error<E>(source_rate: u32, target_rate: u32, e: E) -> ScreenError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ScreenError::InvalidAudio {
        reason: format!("resampling {} Hz to {} Hz failed", source_rate, target_rate),
        source: Some(Box::new(e)),
    }
}

fn layout_for(channels: usize) -> Result<ChannelLayout> {
    ChannelLayout::from_count(channels).ok_or_else(|| ScreenError::InvalidAudio {
        reason: format!("{}-channel audio (only mono/stereo supported)", channels),
        source: None,
    })
}

fn import_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path).map_err(|e| ScreenError::InvalidAudio {
        reason: format!("Failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let layout = layout_for(spec.channels as usize)?;
    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

    AudioBuffer::from_interleaved(&samples, layout, spec.sample_rate)
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |e: hound::Error| ScreenError::InvalidAudio {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(ScreenError::InvalidAudio {
                        reason: format!("{}-bit integer audio", bits_per_sample),
                        source: None,
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid)
        }
    }
}

fn import_with_symphonia(path: &Path) -> Result<AudioBuffer> {
    let decode_error = |context: &str, e: SymphoniaError| ScreenError::InvalidAudio {
        reason: format!("{}: {}", context, e),
        source: Some(Box::new(e)),
    };

    let file = File::open(path).map_err(|e| ScreenError::FileNotFound {
        path: path.display().to_string(),
        source: Some(e),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error("Unrecognised audio container", e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| ScreenError::InvalidAudio {
            reason: "No audio track found".to_string(),
            source: None,
        })?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error("Unsupported codec", e))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(decode_error("Read error", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
            // Corrupt frames are skipped, matching common decoder behaviour
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet in {}: {}", path.display(), e);
            }
            Err(e) => return Err(decode_error("Decode error", e)),
        }
    }

    if interleaved.is_empty() || sample_rate == 0 {
        return Err(ScreenError::EmptyAudio);
    }

    let layout = layout_for(channels)?;
    AudioBuffer::from_interleaved(&interleaved, layout, sample_rate)
}

// ============================================================================
// Tests
// ============================================================================
