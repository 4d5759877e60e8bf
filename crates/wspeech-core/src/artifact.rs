//! Single-owner temporary audio clips.

use crate::error::{SpeechError, SpeechResult};
use std::fmt;
use std::path::Path;
use tempfile::TempPath;
use tracing::debug;

/// A synthesized audio clip on disk, deleted when dropped.
///
/// Exactly one handle owns each file. Moving the handle transfers ownership
/// (producer to tempo adjuster to player); dropping it on any path, including
/// an early stop, removes the file.
pub struct AudioArtifact {
    path: TempPath,
}

impl AudioArtifact {
    /// Reserve a new empty temporary file with the given extension (without the dot)
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created
    pub fn create(extension: &str) -> SpeechResult<Self> {
        let suffix = format!(".{extension}");
        let file = tempfile::Builder::new()
            .prefix("wspeech-")
            .suffix(&suffix)
            .tempfile()?;
        let path = file.into_temp_path();
        debug!("Created audio artifact {}", path.display());
        Ok(Self { path })
    }

    /// Take ownership of an existing file; it is deleted when the artifact drops
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be made absolute
    pub fn adopt(path: impl AsRef<Path>) -> SpeechResult<Self> {
        let path = path.as_ref();
        let path = TempPath::try_from_path(path)
            .map_err(|e| SpeechError::file(format!("Failed to adopt {}: {e}", path.display())))?;
        Ok(Self { path })
    }

    /// Location of the clip
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension of the clip, if any
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

impl fmt::Debug for AudioArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArtifact")
            .field("path", &self.path())
            .finish()
    }
}
