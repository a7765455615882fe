//! Audio Engine Module
//!
//! Core audio handling shared by the analysis pipeline:
//! - Audio buffer type and pre-analysis validation
//! - File decoding (WAV, MP3) and resampling

pub mod buffer;
pub mod io;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use io::{
    export_wav, generate_harmonic_tone, generate_test_tone, import_audio, resample,
};
