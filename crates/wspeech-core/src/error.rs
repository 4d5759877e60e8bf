//! Error types for the wspeech playback pipeline.

/// Result type alias for wspeech operations
pub type SpeechResult<T> = Result<T, SpeechError>;

/// Main error type for speech pipeline operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// Speech synthesis failed for a chunk
    #[error("Speech synthesis failed: {message}")]
    SynthesisError {
        /// Error message describing the failure
        message: String,
    },

    /// Network or quota error from the synthesis service
    #[error("Network error: {message}")]
    NetworkError {
        /// Error message describing the network issue
        message: String,
    },

    /// Audio sink error
    #[error("Audio sink error: {message}")]
    AudioSinkError {
        /// Error message describing the sink issue
        message: String,
    },

    /// External tempo filter failed
    #[error("Tempo filter error: {message}")]
    TempoFilterError {
        /// Error message describing the filter failure
        message: String,
    },

    /// Spawning or signalling an external process failed
    #[error("Process control error: {message}")]
    ProcessError {
        /// Error message describing the process issue
        message: String,
    },

    /// In-process speech engine error
    #[error("Speech engine error: {message}")]
    EngineError {
        /// Error message describing the engine issue
        message: String,
    },

    /// File I/O error
    #[error("File I/O error: {message}")]
    FileError {
        /// Error message describing the file operation failure
        message: String,
    },

    /// Voice not found error
    #[error("Voice '{voice_id}' not found")]
    VoiceNotFound {
        /// The voice tag that could not be matched
        voice_id: String,
    },

    /// Invalid input error
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration error, including "no backend available"
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Timeout error
    #[error("Operation timed out: {message}")]
    TimeoutError {
        /// Error message describing the timeout
        message: String,
    },

    /// Thread or concurrency error
    #[error("Concurrency error: {message}")]
    ConcurrencyError {
        /// Error message describing the concurrency issue
        message: String,
    },
}

impl SpeechError {
    /// Create a new synthesis error
    #[must_use]
    pub fn synthesis<S: Into<String>>(message: S) -> Self {
        Self::SynthesisError {
            message: message.into(),
        }
    }

    /// Create a new network error
    #[must_use]
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Create a new audio sink error
    #[must_use]
    pub fn audio_sink<S: Into<String>>(message: S) -> Self {
        Self::AudioSinkError {
            message: message.into(),
        }
    }

    /// Create a new tempo filter error
    #[must_use]
    pub fn tempo_filter<S: Into<String>>(message: S) -> Self {
        Self::TempoFilterError {
            message: message.into(),
        }
    }

    /// Create a new process control error
    #[must_use]
    pub fn process<S: Into<String>>(message: S) -> Self {
        Self::ProcessError {
            message: message.into(),
        }
    }

    /// Create a new engine error
    #[must_use]
    pub fn engine<S: Into<String>>(message: S) -> Self {
        Self::EngineError {
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new voice not found error
    #[must_use]
    pub fn voice_not_found<S: Into<String>>(voice_id: S) -> Self {
        Self::VoiceNotFound {
            voice_id: voice_id.into(),
        }
    }

    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    #[must_use]
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::TimeoutError {
            message: message.into(),
        }
    }

    /// Create a new concurrency error
    #[must_use]
    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        Self::ConcurrencyError {
            message: message.into(),
        }
    }

    /// Check if the session can continue past this error.
    ///
    /// Configuration and concurrency failures end the session; everything
    /// else skips the chunk.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::ConfigurationError { .. } | Self::ConcurrencyError { .. }
        )
    }

    /// Get the error category for logging
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::SynthesisError { .. } => "synthesis",
            Self::NetworkError { .. } => "network",
            Self::AudioSinkError { .. } => "audio_sink",
            Self::TempoFilterError { .. } => "tempo_filter",
            Self::ProcessError { .. } => "process",
            Self::EngineError { .. } => "engine",
            Self::FileError { .. } => "file",
            Self::VoiceNotFound { .. } => "voice",
            Self::InvalidInput { .. } => "input",
            Self::ConfigurationError { .. } => "configuration",
            Self::TimeoutError { .. } => "timeout",
            Self::ConcurrencyError { .. } => "concurrency",
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for SpeechError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<toml::de::Error> for SpeechError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("Invalid settings file: {err}"))
    }
}

#[cfg(unix)]
impl From<nix::errno::Errno> for SpeechError {
    fn from(err: nix::errno::Errno) -> Self {
        Self::process(format!("Signal delivery failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SpeechError::synthesis("Test synthesis error");
        assert_eq!(err.category(), "synthesis");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = SpeechError::voice_not_found("female");
        assert_eq!(err.to_string(), "Voice 'female' not found");

        let err = SpeechError::configuration("No TTS backend available");
        assert_eq!(
            err.to_string(),
            "Configuration error: No TTS backend available"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(SpeechError::synthesis("test").category(), "synthesis");
        assert_eq!(SpeechError::network("test").category(), "network");
        assert_eq!(SpeechError::audio_sink("test").category(), "audio_sink");
        assert_eq!(SpeechError::tempo_filter("test").category(), "tempo_filter");
        assert_eq!(SpeechError::process("test").category(), "process");
        assert_eq!(SpeechError::engine("test").category(), "engine");
        assert_eq!(SpeechError::file("test").category(), "file");
        assert_eq!(SpeechError::voice_not_found("test").category(), "voice");
        assert_eq!(SpeechError::invalid_input("test").category(), "input");
        assert_eq!(SpeechError::configuration("test").category(), "configuration");
        assert_eq!(SpeechError::timeout("test").category(), "timeout");
        assert_eq!(SpeechError::concurrency("test").category(), "concurrency");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(SpeechError::network("quota").is_recoverable());
        assert!(SpeechError::tempo_filter("exit 1").is_recoverable());
        assert!(SpeechError::process("ESRCH").is_recoverable());
        assert!(!SpeechError::configuration("no backend").is_recoverable());
        assert!(!SpeechError::concurrency("spawn").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err = SpeechError::from(io_err);
        assert!(matches!(err, SpeechError::FileError { .. }));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("chunk_size = [").unwrap_err();
        let err = SpeechError::from(toml_err);
        assert!(matches!(err, SpeechError::ConfigurationError { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = SpeechError::synthesis("test message");
        let err2 = SpeechError::synthesis("test message");
        let err3 = SpeechError::synthesis("different message");

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
