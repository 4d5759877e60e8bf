//! Audio sink abstraction for file playback.

use crate::error::{SpeechError, SpeechResult};
use crate::process::ControlledProcess;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Playback state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing loaded
    Empty,
    /// A clip is loaded but not playing
    Stopped,
    /// Audio is currently playing
    Playing,
    /// Audio is paused
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Playing => write!(f, "Playing"),
            Self::Paused => write!(f, "Paused"),
        }
    }
}

/// Device that plays one audio file at a time.
///
/// `is_busy` stays true while a loaded clip is playing or paused, and turns
/// false once it finishes or is stopped.
pub trait AudioSink: Send {
    /// Load a clip, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the clip cannot be loaded
    fn load(&mut self, path: &Path) -> SpeechResult<()>;

    /// Start playing the loaded clip from the beginning
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is loaded or playback cannot start
    fn play(&mut self) -> SpeechResult<()>;

    /// Pause playback in place
    ///
    /// # Errors
    ///
    /// Returns an error if playback cannot be paused
    fn pause(&mut self) -> SpeechResult<()>;

    /// Continue paused playback from where it stopped
    ///
    /// # Errors
    ///
    /// Returns an error if playback cannot be resumed
    fn unpause(&mut self) -> SpeechResult<()>;

    /// Stop playback
    ///
    /// # Errors
    ///
    /// Returns an error if playback cannot be stopped
    fn stop(&mut self) -> SpeechResult<()>;

    /// Release the loaded clip
    ///
    /// # Errors
    ///
    /// Returns an error if the clip cannot be released
    fn unload(&mut self) -> SpeechResult<()>;

    /// Whether a clip is currently playing or paused
    fn is_busy(&mut self) -> bool;
}

/// Sink that plays clips through an external command-line player.
///
/// The default player is `ffplay -nodisp -autoexit -loglevel quiet <file>`.
/// Pause suspends the player process; on platforms without suspend, pause
/// stops the player and unpause restarts the clip.
#[derive(Debug)]
pub struct PlayerSink {
    program: String,
    args: Vec<String>,
    loaded: Option<PathBuf>,
    process: Option<ControlledProcess>,
    state: PlaybackState,
}

impl PlayerSink {
    /// Create a sink that runs `program` with `args` followed by the clip path
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            loaded: None,
            process: None,
            state: PlaybackState::Empty,
        }
    }

    /// Player program
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get current playback state
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    fn spawn_player(&mut self) -> SpeechResult<()> {
        let Some(path) = self.loaded.as_ref() else {
            return Err(SpeechError::audio_sink("Cannot play: no clip loaded"));
        };
        let mut args: Vec<&OsStr> = self.args.iter().map(OsStr::new).collect();
        args.push(path.as_os_str());
        let process = ControlledProcess::spawn(&self.program, args)
            .map_err(|e| SpeechError::audio_sink(e.to_string()))?;
        self.process = Some(process);
        Ok(())
    }

    fn kill_player(&mut self) -> SpeechResult<()> {
        if let Some(mut process) = self.process.take() {
            process
                .terminate()
                .map_err(|e| SpeechError::audio_sink(e.to_string()))?;
        }
        Ok(())
    }
}

impl Default for PlayerSink {
    fn default() -> Self {
        Self::new(
            "ffplay",
            vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
            ],
        )
    }
}

impl AudioSink for PlayerSink {
    fn load(&mut self, path: &Path) -> SpeechResult<()> {
        self.kill_player()?;
        if !path.exists() {
            return Err(SpeechError::audio_sink(format!(
                "Cannot load {}: file not found",
                path.display()
            )));
        }
        debug!("Loaded {}", path.display());
        self.loaded = Some(path.to_path_buf());
        self.state = PlaybackState::Stopped;
        Ok(())
    }

    fn play(&mut self) -> SpeechResult<()> {
        self.kill_player()?;
        self.spawn_player()?;
        self.state = PlaybackState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> SpeechResult<()> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        if ControlledProcess::can_suspend() {
            if let Some(process) = self.process.as_mut() {
                process
                    .suspend()
                    .map_err(|e| SpeechError::audio_sink(e.to_string()))?;
            }
        } else {
            info!("Player cannot be suspended; clip will restart on resume");
            self.kill_player()?;
        }
        self.state = PlaybackState::Paused;
        Ok(())
    }

    fn unpause(&mut self) -> SpeechResult<()> {
        if self.state != PlaybackState::Paused {
            return Ok(());
        }
        match self.process.as_mut() {
            Some(process) => process
                .resume()
                .map_err(|e| SpeechError::audio_sink(e.to_string()))?,
            None => self.spawn_player()?,
        }
        self.state = PlaybackState::Playing;
        Ok(())
    }

    fn stop(&mut self) -> SpeechResult<()> {
        self.kill_player()?;
        if self.state != PlaybackState::Empty {
            self.state = PlaybackState::Stopped;
        }
        Ok(())
    }

    fn unload(&mut self) -> SpeechResult<()> {
        self.kill_player()?;
        self.loaded = None;
        self.state = PlaybackState::Empty;
        Ok(())
    }

    fn is_busy(&mut self) -> bool {
        match self.state {
            PlaybackState::Paused => true,
            PlaybackState::Playing => {
                let running = self.process.as_mut().is_some_and(ControlledProcess::is_running);
                if !running {
                    self.process = None;
                    self.state = PlaybackState::Stopped;
                }
                running
            }
            PlaybackState::Empty | PlaybackState::Stopped => false,
        }
    }
}
