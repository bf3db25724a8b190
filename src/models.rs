//! External model seams.
//!
//! The speaker separator and the gender segmenter are black boxes behind
//! traits. Handles are built once by the application and passed into every
//! pipeline run through a [`ModelContext`].

use crate::analysis::{FormantExtractor, LpcFormantExtractor};
use crate::core::{GenderLabel, Segment};
use crate::error::{AudioError, AudioResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

/// Splits a 16 kHz mono WAV into one WAV per speaker inside `output_dir`.
///
/// Stem files must be named `*_s<k>.wav`; they may be nested below
/// `output_dir`.
pub trait SpeakerSeparator: Send + Sync {
    fn separate(&self, input: &Path, output_dir: &Path) -> AudioResult<()>;
}

/// Labels a whole audio file as contiguous `(label, start, end)` segments.
pub trait GenderSegmenter: Send + Sync {
    fn segment(&self, audio_path: &Path) -> AudioResult<Vec<Segment>>;
}

/// Model handles shared by pipeline runs
#[derive(Clone)]
pub struct ModelContext {
    separator: Option<Arc<dyn SpeakerSeparator>>,
    segmenter: Option<Arc<dyn GenderSegmenter>>,
    formants: Arc<dyn FormantExtractor>,
}

impl ModelContext {
    /// No external models; formants come from the built-in LPC extractor
    pub fn new() -> Self {
        ModelContext {
            separator: None,
            segmenter: None,
            formants: Arc::new(LpcFormantExtractor::default()),
        }
    }

    pub fn with_separator(mut self, separator: Arc<dyn SpeakerSeparator>) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_segmenter(mut self, segmenter: Arc<dyn GenderSegmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    pub fn with_formants(mut self, formants: Arc<dyn FormantExtractor>) -> Self {
        self.formants = formants;
        self
    }

    pub fn separator(&self) -> AudioResult<&dyn SpeakerSeparator> {
        self.separator
            .as_deref()
            .ok_or_else(|| AudioError::ModelUnavailable("no speaker separator configured".into()))
    }

    pub fn segmenter(&self) -> AudioResult<&dyn GenderSegmenter> {
        self.segmenter
            .as_deref()
            .ok_or_else(|| AudioError::ModelUnavailable("no gender segmenter configured".into()))
    }

    pub fn formants(&self) -> &dyn FormantExtractor {
        self.formants.as_ref()
    }
}

impl Default for ModelContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An external program invoked with `{input}` and `{output}` placeholders
#[derive(Debug, Clone)]
pub struct ModelCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl ModelCommand {
    /// Resolve `program` on `PATH` (or take it as a path)
    pub fn new(program: impl AsRef<Path>, args: Vec<String>) -> AudioResult<Self> {
        let program = program.as_ref();
        let resolved = which::which(program).map_err(|_| {
            AudioError::ModelUnavailable(format!("{} not found", program.display()))
        })?;
        Ok(ModelCommand {
            program: resolved,
            args,
        })
    }

    /// Arguments with placeholders substituted
    pub fn build_args(&self, input: &Path, output: Option<&Path>) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }

    fn run(&self, input: &Path, output: Option<&Path>) -> AudioResult<Output> {
        let args = self.build_args(input, output);
        log::debug!("running {} {}", self.program.display(), args.join(" "));
        let result = Command::new(&self.program).args(&args).output()?;
        Ok(result)
    }
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().rev().take(5).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join("\n")
}

/// Separator backed by an external command
#[derive(Debug, Clone)]
pub struct CommandSeparator {
    command: ModelCommand,
}

impl CommandSeparator {
    pub fn new(command: ModelCommand) -> Self {
        CommandSeparator { command }
    }
}

impl SpeakerSeparator for CommandSeparator {
    fn separate(&self, input: &Path, output_dir: &Path) -> AudioResult<()> {
        let output = self.command.run(input, Some(output_dir))?;
        if !output.status.success() {
            return Err(AudioError::SeparationFailed(format!(
                "separator exited with {}: {}",
                output.status,
                stderr_tail(&output)
            )));
        }
        Ok(())
    }
}

/// Segmenter backed by an external command printing one segment per line
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    command: ModelCommand,
}

impl CommandSegmenter {
    pub fn new(command: ModelCommand) -> Self {
        CommandSegmenter { command }
    }
}

impl GenderSegmenter for CommandSegmenter {
    fn segment(&self, audio_path: &Path) -> AudioResult<Vec<Segment>> {
        let output = self.command.run(audio_path, None)?;
        if !output.status.success() {
            return Err(AudioError::ModelUnavailable(format!(
                "segmenter exited with {}: {}",
                output.status,
                stderr_tail(&output)
            )));
        }
        parse_segments(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse `label<TAB|,>start<TAB|,>end` lines; blank lines and `#` comments
/// are ignored
pub fn parse_segments(text: &str) -> AudioResult<Vec<Segment>> {
    let mut segments = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(['\t', ',']).map(str::trim).collect();
        let malformed = || AudioError::AnalysisError(format!("segmenter line {}: '{}'", n + 1, line));
        if fields.len() != 3 {
            return Err(malformed());
        }

        let label: GenderLabel = fields[0].parse()?;
        let start: f64 = fields[1].parse().map_err(|_| malformed())?;
        let end: f64 = fields[2].parse().map_err(|_| malformed())?;
        segments.push(Segment::new(label, start, end));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Segment>);

    impl GenderSegmenter for Fixed {
        fn segment(&self, _audio_path: &Path) -> AudioResult<Vec<Segment>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_missing_models_are_unavailable() {
        let ctx = ModelContext::new();
        assert!(matches!(ctx.separator(), Err(AudioError::ModelUnavailable(_))));
        assert!(matches!(ctx.segmenter(), Err(AudioError::ModelUnavailable(_))));
    }

    #[test]
    fn test_injected_segmenter() {
        let seg = Segment::new(GenderLabel::Male, 0.0, 1.0);
        let ctx = ModelContext::new().with_segmenter(Arc::new(Fixed(vec![seg])));
        let out = ctx.segmenter().unwrap().segment(Path::new("x.wav")).unwrap();
        assert_eq!(out, vec![seg]);
    }

    #[test]
    fn test_parse_segments() {
        let text = "# label start end\nmale\t0.0\t1.5\n\nfemale,1.5,2.25\nnoEnergy\t2.25\t3.0\n";
        let segments = parse_segments(text).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1], Segment::new(GenderLabel::Female, 1.5, 2.25));
        assert_eq!(segments[2].label, GenderLabel::NoEnergy);
    }

    #[test]
    fn test_parse_segments_rejects_garbage() {
        assert!(parse_segments("male\t0.0").is_err());
        assert!(parse_segments("male\tzero\t1.0").is_err());
        assert!(parse_segments("robot\t0.0\t1.0").is_err());
    }

    #[test]
    fn test_missing_program() {
        let err = ModelCommand::new("definitely-not-a-real-separator", vec![]).unwrap_err();
        assert!(matches!(err, AudioError::ModelUnavailable(_)));
    }

    #[test]
    fn test_placeholders() {
        let command = ModelCommand {
            program: PathBuf::from("sep"),
            args: vec!["--in={input}".into(), "{output}".into(), "-q".into()],
        };
        let args = command.build_args(Path::new("/tmp/a.wav"), Some(Path::new("/tmp/out")));
        assert_eq!(args, vec!["--in=/tmp/a.wav", "/tmp/out", "-q"]);
    }
}
