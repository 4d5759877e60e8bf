//! External speech program adapter.

use super::{BackendKind, PauseMode, Rendered, SpeechBackend};
use crate::chunker::Chunk;
use crate::config::{CommandSettings, SpeechConfig};
use crate::error::{SpeechError, SpeechResult};
use crate::process::ControlledProcess;
use crate::session::SessionSignals;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Backend that runs one speech program invocation per chunk.
///
/// Arguments may contain `{voice}`, `{rate}`, `{pitch}` and `{text}`
/// placeholders. Pause suspends the running program where the platform
/// allows it; elsewhere the program is killed and the chunk restarts from
/// its beginning on resume.
#[derive(Debug)]
pub struct ProcessBackend {
    command: CommandSettings,
    current: Mutex<Option<ControlledProcess>>,
    restart_pending: AtomicBool,
}

impl ProcessBackend {
    /// Create a backend running `command`
    #[must_use]
    pub fn new(command: CommandSettings) -> Self {
        Self {
            command,
            current: Mutex::new(None),
            restart_pending: AtomicBool::new(false),
        }
    }

    /// Program this backend runs
    #[must_use]
    pub fn program(&self) -> &str {
        &self.command.program
    }

    /// Pid of the program speaking right now
    #[must_use]
    pub fn current_pid(&self) -> Option<u32> {
        self.current.lock().as_ref().map(ControlledProcess::id)
    }

    /// Arguments for speaking `chunk`, placeholders substituted
    #[must_use]
    pub fn arguments(&self, chunk: &Chunk, config: &SpeechConfig) -> Vec<String> {
        self.command
            .args
            .iter()
            .map(|arg| {
                arg.replace("{voice}", config.voice.espeak_variant())
                    .replace("{rate}", &config.rate.to_string())
                    .replace("{pitch}", &config.pitch.to_string())
                    .replace("{text}", &chunk.text)
            })
            .collect()
    }

    fn start(&self, chunk: &Chunk, config: &SpeechConfig, signals: &SessionSignals) -> SpeechResult<()> {
        let process = ControlledProcess::spawn(&self.command.program, self.arguments(chunk, config))?;
        let mut current = self.current.lock();
        *current = Some(process);
        // Commands that arrived before the process was visible are applied here.
        if signals.is_stopped() {
            Self::halt(&mut current)?;
        } else if signals.is_paused() {
            self.suspend(&mut current)?;
        }
        Ok(())
    }

    /// Poll the running program until it exits. Returns its exit status, or
    /// `None` if it was killed by stop or pause.
    fn wait(&self, signals: &SessionSignals) -> Option<std::process::ExitStatus> {
        loop {
            if signals.is_stopped() {
                break;
            }
            let running = self
                .current
                .lock()
                .as_mut()
                .is_some_and(ControlledProcess::is_running);
            if !running {
                break;
            }
            if signals.is_paused() {
                signals.wait_while_paused();
            } else {
                signals.tick();
            }
        }

        let finished = self.current.lock().take();
        if signals.is_stopped() || self.restart_pending.load(Ordering::SeqCst) {
            return None;
        }
        finished.and_then(|process| process.exit_status())
    }

    fn suspend(&self, current: &mut Option<ControlledProcess>) -> SpeechResult<()> {
        let Some(process) = current.as_mut() else {
            return Ok(());
        };
        if ControlledProcess::can_suspend() {
            process.suspend()
        } else {
            info!("{} cannot be suspended; chunk restarts on resume", process.program());
            self.restart_pending.store(true, Ordering::SeqCst);
            process.terminate()
        }
    }

    fn halt(current: &mut Option<ControlledProcess>) -> SpeechResult<()> {
        match current.as_mut() {
            Some(process) => process.terminate(),
            None => Ok(()),
        }
    }
}

impl SpeechBackend for ProcessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Process
    }

    fn pause_mode(&self) -> PauseMode {
        if ControlledProcess::can_suspend() {
            PauseMode::InPlace
        } else {
            PauseMode::RestartChunk
        }
    }

    fn render(
        &self,
        chunk: &Chunk,
        config: &SpeechConfig,
        signals: &SessionSignals,
    ) -> SpeechResult<Rendered> {
        loop {
            if !signals.wait_while_paused() {
                return Ok(Rendered::Spoken);
            }
            self.start(chunk, config, signals)?;
            debug!("{} speaking chunk {}", self.command.program, chunk.index);

            let status = self.wait(signals);
            if self.restart_pending.swap(false, Ordering::SeqCst) && !signals.is_stopped() {
                debug!("Restarting chunk {} after pause", chunk.index);
                continue;
            }
            return match status {
                Some(status) if !status.success() => Err(SpeechError::process(format!(
                    "{} exited with {status}",
                    self.command.program
                ))),
                _ => Ok(Rendered::Spoken),
            };
        }
    }

    fn pause(&self) -> SpeechResult<()> {
        self.suspend(&mut self.current.lock())
    }

    fn resume(&self) -> SpeechResult<()> {
        match self.current.lock().as_mut() {
            Some(process) => process.resume(),
            None => Ok(()),
        }
    }

    fn stop(&self) -> SpeechResult<()> {
        Self::halt(&mut self.current.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceTag;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn signals() -> SessionSignals {
        SessionSignals::new(Duration::from_millis(10))
    }

    #[test]
    fn test_argument_substitution() {
        let backend = ProcessBackend::new(CommandSettings::new(
            "espeak-ng",
            &["-v", "{voice}", "-s", "{rate}", "-p", "{pitch}", "{text}"],
        ));
        let config = SpeechConfig::default()
            .with_rate(220)
            .unwrap()
            .with_pitch(40)
            .unwrap()
            .with_voice(VoiceTag::Male);
        let args = backend.arguments(&Chunk::new(0, "Say {rate} literally."), &config);
        assert_eq!(
            args,
            vec!["-v", "en-us+m3", "-s", "220", "-p", "40", "Say {rate} literally."]
        );
    }

    #[test]
    fn test_spawn_failure_is_process_error() {
        let backend = ProcessBackend::new(CommandSettings::new("/nonexistent/espeak", &[]));
        let result = backend.render(&Chunk::new(0, "Hi."), &SpeechConfig::default(), &signals());
        assert!(matches!(result, Err(SpeechError::ProcessError { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_render_waits_for_program() {
        let backend = ProcessBackend::new(CommandSettings::new("true", &[]));
        let rendered = backend
            .render(&Chunk::new(0, "Hi."), &SpeechConfig::default(), &signals())
            .expect("Should speak");
        assert!(matches!(rendered, Rendered::Spoken));
        assert!(backend.current_pid().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_program_is_reported() {
        let backend = ProcessBackend::new(CommandSettings::new("false", &[]));
        let result = backend.render(&Chunk::new(0, "Hi."), &SpeechConfig::default(), &signals());
        assert!(matches!(result, Err(SpeechError::ProcessError { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_terminates_program() {
        let backend = Arc::new(ProcessBackend::new(CommandSettings::new("sleep", &["5"])));
        let signals = Arc::new(signals());

        let worker = {
            let backend = Arc::clone(&backend);
            let signals = Arc::clone(&signals);
            std::thread::spawn(move || {
                backend.render(&Chunk::new(0, "Hi."), &SpeechConfig::default(), &signals)
            })
        };

        let start = Instant::now();
        let pid = loop {
            if let Some(pid) = backend.current_pid() {
                break pid;
            }
            assert!(start.elapsed() < Duration::from_secs(5), "program never started");
            std::thread::sleep(Duration::from_millis(5));
        };

        signals.request_stop();
        backend.stop().expect("Should stop");
        worker.join().expect("worker panicked").expect("Stop is not an error");
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_pause_suspends_program() {
        let backend = Arc::new(ProcessBackend::new(CommandSettings::new("sleep", &["0.3"])));
        let signals = Arc::new(signals());

        let worker = {
            let backend = Arc::clone(&backend);
            let signals = Arc::clone(&signals);
            std::thread::spawn(move || {
                backend.render(&Chunk::new(0, "Hi."), &SpeechConfig::default(), &signals)
            })
        };

        while backend.current_pid().is_none() {
            std::thread::sleep(Duration::from_millis(5));
        }
        signals.pause();
        backend.pause().expect("Should pause");

        // A suspended `sleep 0.3` does not finish while paused.
        std::thread::sleep(Duration::from_millis(600));
        assert!(!worker.is_finished());
        assert!(backend.current_pid().is_some());

        signals.resume();
        backend.resume().expect("Should resume");
        worker.join().expect("worker panicked").expect("Should finish");
    }
}
