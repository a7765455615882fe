//! Integration tests for the screening pipeline
//!
//! Runs full requests through `ScreeningService` over WAV fixtures written
//! into temporary directories.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use test_case::test_case;

use voicescreen::classifier::{
    Classifier, FailingClassifier, FixedClassifier, ModelKind, ThresholdClassifier,
};
use voicescreen::engine::{
    export_wav, generate_harmonic_tone, import_audio, AudioBuffer, ChannelLayout,
};
use voicescreen::error::ErrorKind;
use voicescreen::upload::UploadStore;
use voicescreen::{
    FeatureExtractor, FeatureVector, Label, PersistedModel, Predictor, ScreenError,
    ScreeningService, Submission, FEATURE_COUNT, FEATURE_NAMES,
};

// ============================================================================
// Fixtures
// ============================================================================

fn service_with(classifier: Arc<dyn Classifier>, upload_dir: &Path) -> ScreeningService {
    ScreeningService::new(
        Predictor::new(classifier),
        UploadStore::new(upload_dir).unwrap(),
    )
}

fn write_wav(dir: &Path, name: &str, buffer: &AudioBuffer) -> PathBuf {
    let path = dir.join(name);
    export_wav(buffer, &path).unwrap();
    path
}

fn voiced_wav_bytes(dir: &Path, frequency: f32) -> Vec<u8> {
    let path = write_wav(dir, "voice.wav", &generate_harmonic_tone(frequency, 5, 1.0, 16000));
    fs::read(path).unwrap()
}

fn staged_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// MPEG-1 Layer III mono stream at 128 kb/s, 44.1 kHz, of digital silence
///
/// Each frame is a bare header followed by zeroed side info and main data:
/// no scale factors and no Huffman-coded values, so every granule decodes
/// to zeros.
fn mpeg_silence(frames: usize) -> Vec<u8> {
    const HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0xC0];
    // 144 * 128000 / 44100, no padding
    const FRAME_BYTES: usize = 417;

    let mut stream = Vec::with_capacity(frames * FRAME_BYTES);
    for _ in 0..frames {
        stream.extend_from_slice(&HEADER);
        stream.resize(stream.len() + FRAME_BYTES - HEADER.len(), 0);
    }
    stream
}

fn manual_form() -> HashMap<String, String> {
    let values = [
        119.992, 157.302, 74.997, 0.00784, 0.00007, 0.0037, 0.00554, 0.01109, 0.04374, 0.426,
        0.02182, 0.0313, 0.02971, 0.06545, 0.02211, 21.033, 0.414783, 0.815285, -4.813031,
        0.266482, 2.301442, 0.284654,
    ];
    FEATURE_NAMES
        .iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

// ============================================================================
// Audio path
// ============================================================================

#[test]
fn test_audio_request_end_to_end() {
    let work = TempDir::new().unwrap();
    let uploads = work.path().join("uploads");
    let service = service_with(Arc::new(FixedClassifier::new(1)), &uploads);

    let outcome = service.handle(Submission::Audio {
        filename: "Recording 01.WAV".to_string(),
        bytes: voiced_wav_bytes(work.path(), 150.0),
    });

    assert_eq!(outcome.message, "Person Has No Parkinson Disease", "{:?}", outcome);
    assert_eq!(outcome.label, Some(Label::Negative));

    let features = outcome.features.unwrap();
    assert!((features.mdvp_fo_hz - 150.0).abs() < 3.0, "F0 {}", features.mdvp_fo_hz);
    assert_eq!(staged_files(&uploads), 0);
}

#[test]
fn test_extracted_vector_identities() {
    let work = TempDir::new().unwrap();
    let path = write_wav(work.path(), "tone.wav", &generate_harmonic_tone(210.0, 4, 1.0, 22050));

    let f = FeatureExtractor::new().extract(&path).unwrap();
    assert_relative_eq!(f.jitter_ddp, 3.0 * f.mdvp_rap);
    assert_relative_eq!(f.shimmer_dda, 3.0 * f.shimmer_apq3);
    assert_eq!(f.mdvp_apq, f.shimmer_apq5);
    assert_relative_eq!(f.nhr, 1.0 / f.hnr);
    assert!(f.to_array().iter().all(|v| v.is_finite()));
}

#[test]
fn test_periodic_tone_has_near_zero_jitter() {
    let work = TempDir::new().unwrap();
    let path = write_wav(work.path(), "tone.wav", &generate_harmonic_tone(125.0, 5, 1.0, 16000));

    let f = FeatureExtractor::new().extract(&path).unwrap();
    assert!(f.mdvp_jitter_percent < 0.005, "jitter {}", f.mdvp_jitter_percent);
    assert!(f.mdvp_rap < 0.005, "rap {}", f.mdvp_rap);
}

#[test]
fn test_stereo_recording_is_mixed_down() {
    let work = TempDir::new().unwrap();
    let mono = generate_harmonic_tone(160.0, 5, 1.0, 16000);
    let mut stereo = AudioBuffer::new(mono.len(), ChannelLayout::Stereo, 16000);
    stereo.channel_mut(0).copy_from_slice(mono.channel(0));
    stereo.channel_mut(1).copy_from_slice(mono.channel(0));
    let path = write_wav(work.path(), "stereo.wav", &stereo);

    let f = FeatureExtractor::new().extract(&path).unwrap();
    assert!((f.mdvp_fo_hz - 160.0).abs() < 3.0, "F0 {}", f.mdvp_fo_hz);
}

#[test]
fn test_text_upload_never_reaches_extraction() {
    let work = TempDir::new().unwrap();
    let uploads = work.path().join("uploads");
    let service = service_with(Arc::new(FixedClassifier::new(1)), &uploads);

    let outcome = service.handle(Submission::Audio {
        filename: "voice.txt".to_string(),
        bytes: voiced_wav_bytes(work.path(), 150.0),
    });

    assert_eq!(
        outcome.message,
        "Invalid file format. Please upload a WAV or MP3 file."
    );
    assert!(outcome.features.is_none());
    assert_eq!(staged_files(&uploads), 0);
}

#[test]
fn test_missing_filename_is_unsupported() {
    let work = TempDir::new().unwrap();
    let service = service_with(Arc::new(FixedClassifier::new(1)), work.path());

    let outcome = service.handle(Submission::Audio {
        filename: String::new(),
        bytes: vec![0; 16],
    });
    assert_eq!(outcome.error_code, Some("UNSUPPORTED_FORMAT"));
}

#[test]
fn test_silent_recording_is_rejected_consistently() {
    let work = TempDir::new().unwrap();
    let uploads = work.path().join("uploads");
    let service = service_with(Arc::new(FixedClassifier::new(1)), &uploads);

    let silent = write_wav(work.path(), "silence.wav", &AudioBuffer::from_mono(vec![0.0; 16000], 16000));
    let bytes = fs::read(&silent).unwrap();

    for _ in 0..3 {
        let outcome = service.handle(Submission::Audio {
            filename: "silence.wav".to_string(),
            bytes: bytes.clone(),
        });
        assert_eq!(outcome.error_code, Some("SILENT_AUDIO"));
        assert!(outcome.message.starts_with("Error processing audio file: "));
        assert_eq!(staged_files(&uploads), 0);
    }

    let err = FeatureExtractor::new().extract(&silent).unwrap_err();
    assert!(matches!(err, ScreenError::SilentAudio { .. }));
    assert_eq!(err.kind(), ErrorKind::Extraction);
}

#[test]
fn test_classifier_failure_on_audio_path_cleans_up() {
    let work = TempDir::new().unwrap();
    let uploads = work.path().join("uploads");
    let service = service_with(Arc::new(FailingClassifier::new("weights corrupted")), &uploads);

    let outcome = service.handle(Submission::Audio {
        filename: "voice.wav".to_string(),
        bytes: voiced_wav_bytes(work.path(), 150.0),
    });

    assert_eq!(
        outcome.message,
        "Error processing audio file: Classifier failed: weights corrupted"
    );
    assert_eq!(staged_files(&uploads), 0);
}

#[test]
fn test_corrupt_mp3_is_extraction_error() {
    let work = TempDir::new().unwrap();
    let uploads = work.path().join("uploads");
    let service = service_with(Arc::new(FixedClassifier::new(1)), &uploads);

    let outcome = service.handle(Submission::Audio {
        filename: "voice.mp3".to_string(),
        bytes: b"plain text pretending to be an mp3 stream".to_vec(),
    });

    assert!(outcome.message.starts_with("Error processing audio file: "));
    assert!(outcome.label.is_none());
    assert_eq!(staged_files(&uploads), 0);
}

#[test]
fn test_valid_mp3_is_decoded() {
    let work = TempDir::new().unwrap();
    let path = work.path().join("stream.mp3");
    fs::write(&path, mpeg_silence(40)).unwrap();

    let buffer = import_audio(&path).unwrap();
    assert_eq!(buffer.sample_rate, 44100);
    assert_eq!(buffer.channels(), 1);
    // 1152 samples per frame; allow for decoder priming
    assert!(buffer.len() >= 30 * 1152 && buffer.len() <= 40 * 1152, "{}", buffer.len());
}

#[test]
fn test_mp3_upload_reaches_analysis() {
    let work = TempDir::new().unwrap();
    let uploads = work.path().join("uploads");
    let service = service_with(Arc::new(FixedClassifier::new(1)), &uploads);

    let outcome = service.handle(Submission::Audio {
        filename: "silence.MP3".to_string(),
        bytes: mpeg_silence(40),
    });

    // decoded fine; rejected only because the content is silent
    assert_eq!(outcome.error_code, Some("SILENT_AUDIO"));
    assert_eq!(staged_files(&uploads), 0);
}

// ============================================================================
// Manual path
// ============================================================================

#[test]
fn test_manual_prediction_is_deterministic() {
    let work = TempDir::new().unwrap();
    let classifier = ThresholdClassifier::new("HNR", 20.0, 1, 0).unwrap();
    let service = service_with(Arc::new(classifier), work.path());

    let first = service.handle(Submission::Manual(manual_form()));
    for _ in 0..5 {
        let again = service.handle(Submission::Manual(manual_form()));
        assert_eq!(again.message, first.message);
        assert_eq!(again.label, first.label);
    }
    assert_eq!(first.label, Some(Label::Negative));
}

#[test]
fn test_manual_without_ppe_is_invalid_input() {
    let work = TempDir::new().unwrap();
    let service = service_with(Arc::new(FixedClassifier::new(1)), work.path());

    let mut form = manual_form();
    form.remove("PPE");
    let outcome = service.handle(Submission::Manual(form.clone()));

    assert!(outcome.message.starts_with("Error processing form data: "));
    assert!(outcome.message.contains("PPE"));

    let err = service.screen_manual(&form).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_manual_non_numeric_and_non_finite() {
    let work = TempDir::new().unwrap();
    let service = service_with(Arc::new(FixedClassifier::new(1)), work.path());

    let mut form = manual_form();
    form.insert("HNR".to_string(), "loud".to_string());
    assert_eq!(
        service.handle(Submission::Manual(form)).error_code,
        Some("INVALID_FIELD")
    );

    let mut form = manual_form();
    form.insert("NHR".to_string(), "inf".to_string());
    assert_eq!(
        service.handle(Submission::Manual(form)).error_code,
        Some("NON_FINITE_FEATURE")
    );
}

#[test_case(1, "Person Has No Parkinson Disease" ; "class one is negative")]
#[test_case(0, "Person Has Parkinson Disease" ; "class zero is positive")]
#[test_case(-1, "Person Has Parkinson Disease" ; "negative class is positive")]
#[test_case(2, "Person Has Parkinson Disease" ; "class two is positive")]
fn test_label_boundaries(class: i64, expected: &str) {
    let work = TempDir::new().unwrap();
    let service = service_with(Arc::new(FixedClassifier::new(class)), work.path());

    let outcome = service.handle(Submission::Manual(manual_form()));
    assert_eq!(outcome.message, expected);
}

// ============================================================================
// Shared service
// ============================================================================

#[test]
fn test_concurrent_requests_share_one_service() {
    let work = TempDir::new().unwrap();
    let uploads = work.path().join("uploads");
    let classifier = ThresholdClassifier::new("HNR", 20.0, 1, 0).unwrap();
    let service = service_with(Arc::new(classifier), &uploads);

    let audio = voiced_wav_bytes(work.path(), 150.0);
    let expected_audio = service.handle(Submission::Audio {
        filename: "voice.wav".to_string(),
        bytes: audio.clone(),
    });
    let expected_manual = service.handle(Submission::Manual(manual_form()));
    assert!(expected_audio.is_success());
    assert!(expected_manual.is_success());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = &service;
                let audio = audio.clone();
                scope.spawn(move || {
                    if i % 2 == 0 {
                        service.handle(Submission::Audio {
                            filename: "voice.wav".to_string(),
                            bytes: audio,
                        })
                    } else {
                        service.handle(Submission::Manual(manual_form()))
                    }
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let outcome = handle.join().unwrap();
            let expected = if i % 2 == 0 { &expected_audio } else { &expected_manual };
            assert_eq!(outcome.message, expected.message);
            assert_eq!(outcome.label, expected.label);
            assert_eq!(outcome.features, expected.features);
        }
    });

    assert_eq!(staged_files(&uploads), 0);
}

// ============================================================================
// Persisted model
// ============================================================================

#[test]
fn test_persisted_model_drives_service() {
    let work = TempDir::new().unwrap();

    let mut coefficients = vec![0.0; FEATURE_COUNT];
    coefficients[15] = 1.0;
    let model = PersistedModel {
        name: "hnr-gate".to_string(),
        version: "2.1".to_string(),
        feature_names: Some(FEATURE_NAMES.iter().map(|s| s.to_string()).collect()),
        scaler: None,
        classes: [0, 1],
        model: ModelKind::Logistic {
            coefficients,
            intercept: -25.0,
        },
        checksum: None,
    };
    let model_path = work.path().join("model.json");
    fs::write(&model_path, model.to_json().unwrap()).unwrap();

    let loaded = PersistedModel::load(&model_path).unwrap();
    assert_eq!(loaded.info().version, "2.1");
    assert_eq!(loaded.checksum.as_ref().map(|c| c.len()), Some(64));

    let service = service_with(Arc::new(loaded), &work.path().join("uploads"));
    // HNR 21.033 < 25: decision is classes[0]
    let outcome = service.handle(Submission::Manual(manual_form()));
    assert_eq!(outcome.label, Some(Label::Positive));
}

#[test]
fn test_manual_vector_matches_canonical_order() {
    let parsed = FeatureVector::from_form(&manual_form()).unwrap();
    let json = serde_json::to_value(parsed).unwrap();
    let keys: Vec<&str> = json
        .as_object()
        .unwrap()
        .keys()
        .map(|k| k.as_str())
        .collect();

    let mut canonical = FEATURE_NAMES.to_vec();
    canonical.sort_unstable();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, canonical);
    assert_eq!(parsed.to_array()[0], 119.992);
    assert_eq!(parsed.to_array()[21], 0.284654);
}
