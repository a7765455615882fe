//! Upload staging
//!
//! Uploaded bytes are written under the upload directory with a sanitised,
//! uuid-prefixed name. The returned [`StagedUpload`] owns that file and
//! removes it when dropped, so every exit path of a request cleans up.

use std::fs::{self, File};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, ScreenError};

/// Extensions accepted for upload, compared case-insensitively
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Whether `filename` carries an allowed extension
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Reduce a client-supplied name to a safe single path component
///
/// Directory parts are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9._-]` is removed and leading dots are stripped. Returns `None`
/// when nothing usable is left.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').trim_matches('_').to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Directory that holds staged uploads
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Use `dir` for staged files, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write uploaded bytes to a fresh staged file
    ///
    /// # Errors
    /// * `UnsupportedFormat` - missing name or disallowed extension; nothing
    ///   is written
    pub fn stage(&self, filename: &str, bytes: &[u8]) -> Result<StagedUpload> {
        self.stage_with(filename, |file| file.write_all(bytes))
    }

    /// Stage `filename`, filling the file with `write`
    ///
    /// The guard exists before the first byte is written, so a failed or
    /// partial write leaves nothing behind.
    fn stage_with<F>(&self, filename: &str, write: F) -> Result<StagedUpload>
    where
        F: FnOnce(&mut File) -> std::io::Result<()>,
    {
        let unsupported = || ScreenError::UnsupportedFormat {
            filename: filename.to_string(),
        };

        if !allowed_file(filename) {
            return Err(unsupported());
        }
        let safe = sanitize_filename(filename)
            .filter(|name| allowed_file(name))
            .ok_or_else(unsupported)?;

        let staged = StagedUpload {
            path: self.dir.join(format!("{}_{}", Uuid::new_v4().simple(), safe)),
        };
        let mut file = File::create(&staged.path)?;
        write(&mut file)?;
        file.sync_all()?;
        debug!("Staged upload {}", staged.path.display());

        Ok(staged)
    }
}

/// A staged upload file, deleted on drop
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged upload {}", self.path.display()),
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged upload {}: {}", self.path.display(), e),
        }
    }
}
