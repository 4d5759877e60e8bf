//! `wspeech`: read text aloud in chunks from the command line.

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wspeech_core::{
    build_backend, BackendChoice, Chunker, Settings, StatusReporter, TransportController,
    TransportState, VoiceTag,
};

#[derive(Parser, Debug)]
#[command(name = "wspeech")]
#[command(about = "Read text aloud in chunks with pause, resume and stop")]
#[command(version)]
struct Args {
    /// Text to speak
    text: Option<String>,

    /// Read the text from a file
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Speaking rate in words per minute
    #[arg(short, long)]
    rate: Option<u32>,

    /// Pitch, 0 to 100
    #[arg(short, long)]
    pitch: Option<u8>,

    /// Voice: female or male
    #[arg(short, long)]
    voice: Option<VoiceTag>,

    /// Backend to speak with
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// Maximum chunk length in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the chunks the text splits into and exit
    #[arg(long)]
    list_chunks: bool,
}

/// Backends the binary can drive. The in-process engine is supplied by
/// applications embedding the library, so it is not offered here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    /// First available of streaming and process
    Auto,
    /// Network synthesis played through a local player
    Streaming,
    /// External speech program such as espeak-ng
    Process,
}

impl From<BackendArg> for BackendChoice {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Self::Auto,
            BackendArg::Streaming => Self::Streaming,
            BackendArg::Process => Self::Process,
        }
    }
}

impl Args {
    /// Apply command-line overrides on top of loaded settings
    fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(backend) = self.backend {
            settings.backend = backend.into();
        }
        if settings.backend == BackendChoice::Engine {
            bail!("The engine backend needs an in-process engine; use auto, streaming or process");
        }
        if let Some(chunk_size) = self.chunk_size {
            settings.chunk_size = chunk_size;
        }
        if let Some(rate) = self.rate {
            settings.speech = settings.speech.with_rate(rate)?;
        }
        if let Some(pitch) = self.pitch {
            settings.speech = settings.speech.with_pitch(pitch)?;
        }
        if let Some(voice) = self.voice {
            settings.speech = settings.speech.with_voice(voice);
        }
        settings.validate()?;
        Ok(())
    }

    /// Text to speak, and whether stdin is free for commands
    fn read_text(&self) -> Result<Option<(String, bool)>> {
        let interactive = std::io::stdin().is_terminal();
        if let Some(text) = &self.text {
            return Ok(Some((text.clone(), interactive)));
        }
        if let Some(path) = &self.file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(Some((text, interactive)));
        }
        if interactive {
            return Ok(None);
        }
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read text from stdin")?;
        Ok(Some((text, false)))
    }
}

/// Single-line command typed while speaking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    TogglePause,
    Stop,
    Replay,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "p" | "pause" | "resume" => Some(Self::TogglePause),
            "s" | "stop" => Some(Self::Stop),
            "r" | "replay" | "speak" => Some(Self::Replay),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

const COMMAND_HELP: &str = "Commands: p = pause/resume, s = stop, r = read again, q = quit";

fn main() -> Result<()> {
    // Setup logging; stdout carries status lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    args.apply(&mut settings)?;

    let Some((text, interactive)) = args.read_text()? else {
        Args::command().print_long_help()?;
        return Ok(());
    };
    if text.trim().is_empty() {
        bail!("No text to speak");
    }

    if args.list_chunks {
        let chunker = Chunker::new(settings.chunk_size)?;
        for chunk in chunker.chunks(&text) {
            println!("{:>4}  {}", chunk.index + 1, chunk.text);
        }
        return Ok(());
    }

    let backend = build_backend(&settings, None)?;
    let reporter: Arc<dyn StatusReporter> = Arc::new(|status: &str| println!("{status}"));
    let controller = Arc::new(TransportController::from_settings(
        &settings,
        Some(backend),
        reporter,
    )?);
    info!("Backend: {}", controller.backend_label().unwrap_or("none"));

    controller.speak(&text, settings.speech)?;
    if interactive {
        eprintln!("{COMMAND_HELP}");
    }

    let session = Session {
        controller,
        text: Arc::from(text),
        settings,
    };
    // Only the command loop is async. The synthesis client blocks, so it is
    // created and dropped outside the runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(session.command_loop(interactive));
    // A pending stdin read never finishes on its own.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

struct Session {
    controller: Arc<TransportController>,
    text: Arc<str>,
    settings: Settings,
}

impl Session {
    async fn command_loop(&self, interactive: bool) -> Result<()> {
        let mut lines = interactive.then(|| BufReader::new(tokio::io::stdin()).lines());
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        // Set after `s` so the program waits for `r` or `q` instead of exiting.
        let mut held = false;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    debug!("Interrupted");
                    self.stop().await?;
                    break;
                }
                line = next_line(&mut lines) => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match Command::parse(&line) {
                        Some(Command::TogglePause) => {
                            self.controller.toggle_pause();
                        }
                        Some(Command::Stop) => {
                            self.stop().await?;
                            held = true;
                        }
                        Some(Command::Replay) => {
                            self.replay().await?;
                            held = false;
                        }
                        Some(Command::Quit) => {
                            self.stop().await?;
                            break;
                        }
                        None => eprintln!("{COMMAND_HELP}"),
                    },
                    None => lines = None,
                },
                _ = ticker.tick() => {
                    if !held && self.controller.state() == TransportState::Idle {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Stop on a blocking thread; stop waits for the worker to exit
    async fn stop(&self) -> Result<()> {
        let controller = Arc::clone(&self.controller);
        tokio::task::spawn_blocking(move || controller.stop()).await?;
        Ok(())
    }

    async fn replay(&self) -> Result<()> {
        let controller = Arc::clone(&self.controller);
        let text = Arc::clone(&self.text);
        let config = self.settings.speech;
        tokio::task::spawn_blocking(move || controller.speak(&text, config)).await??;
        Ok(())
    }
}

async fn next_line(lines: &mut Option<Lines<BufReader<Stdin>>>) -> std::io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("p", Some(Command::TogglePause))]
    #[case(" resume ", Some(Command::TogglePause))]
    #[case("S", Some(Command::Stop))]
    #[case("r", Some(Command::Replay))]
    #[case("q", Some(Command::Quit))]
    #[case("exit", Some(Command::Quit))]
    #[case("x", None)]
    fn test_command_parse(#[case] line: &str, #[case] expected: Option<Command>) {
        assert_eq!(Command::parse(line), expected);
    }

    #[test]
    fn test_args_override_settings() {
        let args = Args::parse_from([
            "wspeech",
            "--rate",
            "240",
            "--pitch",
            "30",
            "--voice",
            "male",
            "--backend",
            "process",
            "--chunk-size",
            "90",
            "Hello there.",
        ]);
        let mut settings = Settings::default();
        args.apply(&mut settings).expect("Should apply");

        assert_eq!(settings.speech.rate, 240);
        assert_eq!(settings.speech.pitch, 30);
        assert_eq!(settings.speech.voice, VoiceTag::Male);
        assert_eq!(settings.backend, BackendChoice::Process);
        assert_eq!(settings.chunk_size, 90);
        assert_eq!(args.text.as_deref(), Some("Hello there."));
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let args = Args::parse_from(["wspeech", "--rate", "0", "Hi."]);
        let mut settings = Settings::default();
        assert!(args.apply(&mut settings).is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let args = Args::parse_from(["wspeech", "--chunk-size", "0", "Hi."]);
        let mut settings = Settings::default();
        assert!(args.apply(&mut settings).is_err());
    }

    #[test]
    fn test_unknown_voice_rejected() {
        assert!(Args::try_parse_from(["wspeech", "--voice", "robot", "Hi."]).is_err());
    }

    #[test]
    fn test_engine_backend_not_offered() {
        assert!(Args::try_parse_from(["wspeech", "--backend", "engine", "Hi."]).is_err());

        let args = Args::parse_from(["wspeech", "Hi."]);
        let mut settings = Settings {
            backend: BackendChoice::Engine,
            ..Settings::default()
        };
        let err = args.apply(&mut settings).unwrap_err();
        assert!(err.to_string().contains("engine backend"));
    }

    #[test]
    fn test_backend_arg_maps_to_choice() {
        assert_eq!(BackendChoice::from(BackendArg::Auto), BackendChoice::Auto);
        assert_eq!(BackendChoice::from(BackendArg::Streaming), BackendChoice::Streaming);
        assert_eq!(BackendChoice::from(BackendArg::Process), BackendChoice::Process);
    }

    #[test]
    fn test_text_and_file_conflict() {
        assert!(Args::try_parse_from(["wspeech", "--file", "a.txt", "Hi."]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }
}
