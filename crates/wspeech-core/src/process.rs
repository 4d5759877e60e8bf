//! Child processes that can be suspended, resumed and terminated.
//!
//! Both the external-process backend and the player sink drive an external
//! program per chunk. On unix, pause and resume map to `SIGSTOP`/`SIGCONT`.
//! Other platforms have no suspend signal; [`ControlledProcess::can_suspend`]
//! reports that so callers can fall back to restarting the chunk.

use crate::error::{SpeechError, SpeechResult};
use std::ffi::OsStr;
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// Handle to a spawned child process
#[derive(Debug)]
pub struct ControlledProcess {
    child: Child,
    program: String,
    suspended: bool,
    exit: Option<ExitStatus>,
}

impl ControlledProcess {
    /// Spawn `program` with `args`, discarding its stdio
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started
    pub fn spawn<I, S>(program: &str, args: I) -> SpeechResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SpeechError::process(format!("Failed to spawn {program}: {e}")))?;

        debug!("Spawned {program} (pid {})", child.id());
        Ok(Self {
            child,
            program: program.to_string(),
            suspended: false,
            exit: None,
        })
    }

    /// Whether this platform can suspend a process in place
    #[must_use]
    pub const fn can_suspend() -> bool {
        cfg!(unix)
    }

    /// OS process id
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Program name the process was spawned from
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the process has been suspended and not resumed
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Poll liveness without blocking
    pub fn is_running(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("{} (pid {}) exited with {status}", self.program, self.child.id());
                self.exit = Some(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll {} (pid {}): {e}", self.program, self.child.id());
                false
            }
        }
    }

    /// Exit status, once the process has been observed to exit
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// Suspend the process
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered or the platform has no suspend primitive
    pub fn suspend(&mut self) -> SpeechResult<()> {
        if !self.is_running() || self.suspended {
            return Ok(());
        }
        self.signal_stop()?;
        self.suspended = true;
        debug!("Suspended {} (pid {})", self.program, self.child.id());
        Ok(())
    }

    /// Resume a suspended process
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered
    pub fn resume(&mut self) -> SpeechResult<()> {
        if !self.suspended {
            return Ok(());
        }
        self.suspended = false;
        if !self.is_running() {
            return Ok(());
        }
        self.signal_continue()?;
        debug!("Resumed {} (pid {})", self.program, self.child.id());
        Ok(())
    }

    /// Kill the process and reap it
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be killed or waited on
    pub fn terminate(&mut self) -> SpeechResult<()> {
        if !self.is_running() {
            return Ok(());
        }
        // SIGKILL is delivered even to a stopped process.
        self.child
            .kill()
            .map_err(|e| SpeechError::process(format!("Failed to kill {}: {e}", self.program)))?;
        let status = self
            .child
            .wait()
            .map_err(|e| SpeechError::process(format!("Failed to reap {}: {e}", self.program)))?;
        self.exit = Some(status);
        self.suspended = false;
        debug!("Terminated {} (pid {})", self.program, self.child.id());
        Ok(())
    }

    #[cfg(unix)]
    fn signal_stop(&self) -> SpeechResult<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        kill(Pid::from_raw(self.pid_raw()), Signal::SIGSTOP)?;
        Ok(())
    }

    #[cfg(unix)]
    fn signal_continue(&self) -> SpeechResult<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        kill(Pid::from_raw(self.pid_raw()), Signal::SIGCONT)?;
        Ok(())
    }

    #[cfg(unix)]
    fn pid_raw(&self) -> i32 {
        i32::try_from(self.child.id()).unwrap_or(i32::MAX)
    }

    #[cfg(not(unix))]
    fn signal_stop(&self) -> SpeechResult<()> {
        Err(SpeechError::process("Process suspension is not supported on this platform"))
    }

    #[cfg(not(unix))]
    fn signal_continue(&self) -> SpeechResult<()> {
        Err(SpeechError::process("Process suspension is not supported on this platform"))
    }
}

impl Drop for ControlledProcess {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!("{e}");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_until_exit(process: &mut ControlledProcess, limit: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < limit {
            if !process.is_running() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_spawn_and_exit() {
        let mut process = ControlledProcess::spawn("true", std::iter::empty::<&str>())
            .expect("Should spawn true");
        assert!(wait_until_exit(&mut process, Duration::from_secs(5)));
        assert!(process.exit_status().is_some_and(|s| s.success()));
    }

    #[test]
    fn test_spawn_missing_program() {
        let err = ControlledProcess::spawn("/nonexistent/wspeech-tool", ["x"]).unwrap_err();
        assert_eq!(err.category(), "process");
    }

    #[test]
    fn test_suspended_process_does_not_finish() {
        let mut process = ControlledProcess::spawn("sleep", ["0.3"]).expect("Should spawn sleep");
        process.suspend().expect("Should suspend");
        assert!(process.is_suspended());

        std::thread::sleep(Duration::from_millis(600));
        assert!(process.is_running(), "suspended process should still be alive");

        process.resume().expect("Should resume");
        assert!(!process.is_suspended());
        assert!(wait_until_exit(&mut process, Duration::from_secs(5)));
    }

    #[test]
    fn test_terminate_suspended_process() {
        let mut process = ControlledProcess::spawn("sleep", ["30"]).expect("Should spawn sleep");
        let pid = process.id();
        process.suspend().expect("Should suspend");
        process.terminate().expect("Should terminate");

        assert!(!process.is_running());
        #[cfg(target_os = "linux")]
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
        let _ = pid;
    }

    #[test]
    fn test_drop_kills_process() {
        let process = ControlledProcess::spawn("sleep", ["30"]).expect("Should spawn sleep");
        let pid = process.id();
        drop(process);
        #[cfg(target_os = "linux")]
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
        let _ = pid;
    }
}
