//! Playback-speed adjustment of synthesized clips through an external filter.
//!
//! The synthesis service only produces audio at its natural speed, so the
//! requested words-per-minute rate is applied afterwards as a tempo ratio. The
//! `atempo` filter accepts 0.5–2.0 per stage; larger changes are expressed as
//! a chain of clamped stages whose product is the requested ratio.

use crate::artifact::AudioArtifact;
use crate::error::{SpeechError, SpeechResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Smallest ratio a single filter stage accepts
pub const MIN_STAGE_RATIO: f64 = 0.5;

/// Largest ratio a single filter stage accepts
pub const MAX_STAGE_RATIO: f64 = 2.0;

/// External tool that rewrites an audio file through a filter chain
pub trait TempoFilter: Send + Sync {
    /// Read `input`, apply `chain`, write `output`
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot run or exits unsuccessfully
    fn apply(&self, input: &Path, chain: &str, output: &Path) -> SpeechResult<()>;
}

/// `ffmpeg` invoked as `ffmpeg -y -i <in> -filter:a <chain> -q:a 2 <out>`
#[derive(Debug, Clone)]
pub struct FfmpegFilter {
    program: PathBuf,
}

impl FfmpegFilter {
    /// Use the given ffmpeg executable
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegFilter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl TempoFilter for FfmpegFilter {
    fn apply(&self, input: &Path, chain: &str, output: &Path) -> SpeechResult<()> {
        let result = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-filter:a", chain, "-q:a", "2"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                SpeechError::tempo_filter(format!(
                    "Failed to run {}: {e}",
                    self.program.display()
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim();
            return Err(SpeechError::tempo_filter(format!(
                "{} exited with {}: {last_line}",
                self.program.display(),
                result.status
            )));
        }
        Ok(())
    }
}

/// Split `ratio` into filter stages, each within the accepted range.
///
/// Non-positive or non-finite ratios produce no stages.
#[must_use]
pub fn tempo_stages(ratio: f64) -> Vec<f64> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Vec::new();
    }

    let mut stages = Vec::new();
    let mut remaining = ratio;
    while remaining > MAX_STAGE_RATIO {
        stages.push(MAX_STAGE_RATIO);
        remaining /= MAX_STAGE_RATIO;
    }
    while remaining < MIN_STAGE_RATIO {
        stages.push(MIN_STAGE_RATIO);
        remaining /= MIN_STAGE_RATIO;
    }
    stages.push(remaining);
    stages
}

/// Render stages as an `atempo` filter chain, e.g. `atempo=2.0,atempo=1.5000`
#[must_use]
pub fn format_chain(stages: &[f64]) -> String {
    let last = stages.len().saturating_sub(1);
    stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            if i == last {
                format!("atempo={stage:.4}")
            } else {
                format!("atempo={stage:.1}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Applies tempo ratios to audio artifacts
#[derive(Debug, Clone)]
pub struct TempoAdjuster<F> {
    filter: F,
    tolerance: f64,
}

impl<F: TempoFilter> TempoAdjuster<F> {
    /// Create an adjuster using the default ±4% no-op tolerance
    #[must_use]
    pub fn new(filter: F) -> Self {
        Self::with_tolerance(filter, crate::TEMPO_TOLERANCE)
    }

    /// Create an adjuster that skips ratios within `tolerance` of 1.0
    #[must_use]
    pub fn with_tolerance(filter: F, tolerance: f64) -> Self {
        Self { filter, tolerance }
    }

    /// Underlying filter
    #[must_use]
    pub const fn filter(&self) -> &F {
        &self.filter
    }

    /// Whether `ratio` would leave a clip untouched
    #[must_use]
    pub fn is_noop(&self, ratio: f64) -> bool {
        !ratio.is_finite() || ratio <= 0.0 || (ratio - 1.0).abs() < self.tolerance
    }

    /// Filter chain for `ratio`, or `None` when no processing is needed
    #[must_use]
    pub fn filter_chain(&self, ratio: f64) -> Option<String> {
        if self.is_noop(ratio) {
            return None;
        }
        Some(format_chain(&tempo_stages(ratio)))
    }

    /// Return `source` played at `ratio`.
    ///
    /// On success the source file is deleted and the adjusted clip returned.
    /// On failure the partial output is deleted and `source` is returned
    /// unchanged.
    #[must_use]
    pub fn adjust(&self, source: AudioArtifact, ratio: f64) -> AudioArtifact {
        let Some(chain) = self.filter_chain(ratio) else {
            return source;
        };

        let extension = source.extension().unwrap_or("mp3").to_string();
        let output = match AudioArtifact::create(&extension) {
            Ok(output) => output,
            Err(e) => {
                warn!("Cannot create tempo output file, keeping original clip: {e}");
                return source;
            }
        };

        match self.filter.apply(source.path(), &chain, output.path()) {
            Ok(()) => {
                debug!(
                    "Applied {chain} to {} -> {}",
                    source.path().display(),
                    output.path().display()
                );
                output
            }
            Err(e) => {
                warn!("Tempo adjustment failed, keeping original clip: {e}");
                source
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rstest::rstest;

    /// Copies input to output, standing in for a successful tool run
    struct CopyFilter {
        chains: Mutex<Vec<String>>,
    }

    impl TempoFilter for CopyFilter {
        fn apply(&self, input: &Path, chain: &str, output: &Path) -> SpeechResult<()> {
            self.chains.lock().push(chain.to_string());
            std::fs::copy(input, output)?;
            Ok(())
        }
    }

    /// Writes partial output, then fails
    struct FailingFilter {
        outputs: Mutex<Vec<PathBuf>>,
    }

    impl TempoFilter for FailingFilter {
        fn apply(&self, _input: &Path, _chain: &str, output: &Path) -> SpeechResult<()> {
            self.outputs.lock().push(output.to_path_buf());
            std::fs::write(output, b"partial")?;
            Err(SpeechError::tempo_filter("exit status: 1"))
        }
    }

    fn clip() -> AudioArtifact {
        let artifact = AudioArtifact::create("mp3").expect("Should create artifact");
        std::fs::write(artifact.path(), b"ID3 audio").expect("Should write clip");
        artifact
    }

    #[rstest]
    #[case(1.875, &[1.875])]
    #[case(4.0, &[2.0, 2.0])]
    #[case(0.5, &[0.5])]
    #[case(2.0, &[2.0])]
    #[case(0.2, &[0.5, 0.5, 0.8])]
    #[case(5.0, &[2.0, 2.0, 1.25])]
    fn test_tempo_stages(#[case] ratio: f64, #[case] expected: &[f64]) {
        let stages = tempo_stages(ratio);
        assert_eq!(stages.len(), expected.len());
        for (stage, want) in stages.iter().zip(expected) {
            assert!((stage - want).abs() < 1e-9, "{stages:?} != {expected:?}");
        }
    }

    #[rstest]
    #[case(0.1)]
    #[case(0.3)]
    #[case(2.5)]
    #[case(4.0)]
    #[case(7.3)]
    #[case(16.0)]
    fn test_stage_product_matches_ratio(#[case] ratio: f64) {
        let stages = tempo_stages(ratio);
        assert!(stages.len() > 1);
        assert!(stages
            .iter()
            .all(|s| (MIN_STAGE_RATIO..=MAX_STAGE_RATIO).contains(s)));
        let product: f64 = stages.iter().product();
        assert!((product - ratio).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_ratios_have_no_stages() {
        assert!(tempo_stages(0.0).is_empty());
        assert!(tempo_stages(-1.0).is_empty());
        assert!(tempo_stages(f64::NAN).is_empty());
        assert!(tempo_stages(f64::INFINITY).is_empty());
    }

    #[test]
    fn test_filter_chain_formatting() {
        let adjuster = TempoAdjuster::new(FfmpegFilter::default());
        assert_eq!(
            adjuster.filter_chain(300.0 / 160.0).as_deref(),
            Some("atempo=1.8750")
        );
        assert_eq!(
            adjuster.filter_chain(640.0 / 160.0).as_deref(),
            Some("atempo=2.0,atempo=2.0000")
        );
        assert_eq!(
            adjuster.filter_chain(0.2).as_deref(),
            Some("atempo=0.5,atempo=0.5,atempo=0.8000")
        );
    }

    #[rstest]
    #[case(1.0)]
    #[case(1.039)]
    #[case(0.961)]
    #[case(0.0)]
    #[case(-2.0)]
    fn test_noop_ratios_return_source(#[case] ratio: f64) {
        let filter = CopyFilter {
            chains: Mutex::new(Vec::new()),
        };
        let adjuster = TempoAdjuster::new(filter);
        let source = clip();
        let original = source.path().to_path_buf();

        let result = adjuster.adjust(source, ratio);
        assert_eq!(result.path(), original.as_path());
        assert!(adjuster.filter.chains.lock().is_empty());
    }

    #[test]
    fn test_tolerance_boundary_is_processed() {
        let adjuster = TempoAdjuster::new(FfmpegFilter::default());
        assert!(!adjuster.is_noop(1.05));
        assert!(!adjuster.is_noop(0.95));
    }

    #[test]
    fn test_successful_adjustment_replaces_source() {
        let filter = CopyFilter {
            chains: Mutex::new(Vec::new()),
        };
        let adjuster = TempoAdjuster::new(filter);
        let source = clip();
        let original = source.path().to_path_buf();

        let result = adjuster.adjust(source, 1.5);
        assert_ne!(result.path(), original.as_path());
        assert!(result.path().exists());
        assert!(!original.exists(), "source clip should be deleted");
        assert_eq!(result.extension(), Some("mp3"));
        assert_eq!(*adjuster.filter.chains.lock(), vec!["atempo=1.5000"]);
    }

    #[test]
    fn test_failed_adjustment_falls_back_and_cleans_up() {
        let filter = FailingFilter {
            outputs: Mutex::new(Vec::new()),
        };
        let adjuster = TempoAdjuster::new(filter);
        let source = clip();
        let original = source.path().to_path_buf();

        let result = adjuster.adjust(source, 3.0);
        assert_eq!(result.path(), original.as_path());
        assert!(result.path().exists());

        let outputs = adjuster.filter.outputs.lock();
        assert_eq!(outputs.len(), 1);
        assert!(!outputs[0].exists(), "partial output should be removed");
    }

    #[test]
    fn test_missing_ffmpeg_reports_error() {
        let filter = FfmpegFilter::new("/nonexistent/wspeech-ffmpeg");
        let err = filter
            .apply(Path::new("in.mp3"), "atempo=1.5000", Path::new("out.mp3"))
            .unwrap_err();
        assert_eq!(err.category(), "tempo_filter");
    }
}
