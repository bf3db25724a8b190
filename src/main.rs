//! voxshift command line interface

use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use voxshift::config::load_regions;
use voxshift::media::{Ffmpeg, MediaTool};
use voxshift::models::{CommandSegmenter, CommandSeparator, ModelCommand};
use voxshift::{AudioError, AudioResult, LogSink, ModelContext, Pipeline, PipelineConfig, Strategy};

#[derive(Parser)]
#[command(name = "voxshift")]
#[command(about = "Lower the pitch of male speech, leave female speech untouched", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a video and remux it with the processed audio
    Process {
        /// Input video
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output video
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        options: ProcessOptions,
    },

    /// Process an audio file into a WAV
    Audio {
        /// Input audio file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        options: ProcessOptions,
    },

    /// Shift only the regions listed in a JSON file
    Regions {
        /// Input video
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output video
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// JSON array of {"start", "end", "semitones"?}
        #[arg(short, long, value_name = "FILE")]
        regions: PathBuf,

        #[command(flatten)]
        options: ProcessOptions,
    },

    /// Print the pitch distribution of a file as JSON
    Analyze {
        /// Input video or audio file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Separate speakers into a directory for preview
    Separate {
        /// Input video or audio file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Directory for original.wav and speaker_<i>.wav
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,

        #[command(flatten)]
        options: ProcessOptions,
    },

    /// Re-mix separated speakers, shifting the selected ones
    Mix {
        /// Input video
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output video
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Directory written by `separate`
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,

        /// Speaker ids to shift (e.g. 0,2)
        #[arg(short, long, value_delimiter = ',')]
        male: Vec<usize>,

        #[command(flatten)]
        options: ProcessOptions,
    },
}

#[derive(Args)]
struct ProcessOptions {
    /// JSON config file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Segmentation strategy
    #[arg(short, long, value_enum)]
    strategy: Option<Strategy>,

    /// Pitch shift in semitones (negative lowers)
    #[arg(short = 'p', long, allow_hyphen_values = true)]
    semitones: Option<f64>,

    /// Male pitch threshold in Hz
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Segment length in seconds (simple strategy)
    #[arg(long)]
    segment: Option<f64>,

    /// Adaptive threshold window in seconds (0 disables)
    #[arg(long)]
    adaptive_window: Option<f64>,

    /// Speaker separator command, with {input} and {output} placeholders
    #[arg(long, value_name = "CMD")]
    separator: Option<String>,

    /// Gender segmenter command, with an {input} placeholder
    #[arg(long, value_name = "CMD")]
    segmenter: Option<String>,
}

impl ProcessOptions {
    fn pipeline(&self) -> AudioResult<Pipeline> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(semitones) = self.semitones {
            config.pitch_shift_semitones = semitones;
        }
        if let Some(threshold) = self.threshold {
            config.male_threshold_hz = threshold;
        }
        if let Some(segment) = self.segment {
            config.segment_duration_secs = segment;
        }
        if let Some(window) = self.adaptive_window {
            config.adaptive_window_secs = window;
        }

        let mut models = ModelContext::new();
        if let Some(cmd) = &self.separator {
            models = models.with_separator(Arc::new(CommandSeparator::new(model_command(cmd)?)));
        }
        if let Some(cmd) = &self.segmenter {
            models = models.with_segmenter(Arc::new(CommandSegmenter::new(model_command(cmd)?)));
        }

        Pipeline::new(config, models)
    }
}

fn model_command(line: &str) -> AudioResult<ModelCommand> {
    let mut parts = line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| AudioError::ConfigError("empty model command".into()))?;
    ModelCommand::new(program, parts.map(String::from).collect())
}

fn print_json<T: serde::Serialize>(value: &T) -> AudioResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: Commands) -> AudioResult<()> {
    let sink = LogSink;

    match command {
        Commands::Process {
            input,
            output,
            options,
        } => {
            let pipeline = options.pipeline()?;
            let report = pipeline.process_video(&input, &output, &Ffmpeg::locate()?, &sink)?;
            print_json(&report)
        }
        Commands::Audio {
            input,
            output,
            options,
        } => {
            let report = options.pipeline()?.process_audio_file(&input, &output, &sink)?;
            print_json(&report)
        }
        Commands::Regions {
            input,
            output,
            regions,
            options,
        } => {
            let regions = load_regions(&regions)?;
            let pipeline = options.pipeline()?;
            let stats = pipeline.override_regions(&input, &output, &regions, &Ffmpeg::locate()?, &sink)?;
            print_json(&stats)
        }
        Commands::Analyze { input } => {
            let pipeline = Pipeline::new(PipelineConfig::default(), ModelContext::new())?;
            let media = Ffmpeg::locate().ok();
            let report = pipeline.analyze(&input, media.as_ref().map(|m| m as &dyn MediaTool), &sink)?;
            print_json(&report)
        }
        Commands::Separate {
            input,
            dir,
            options,
        } => {
            let pipeline = options.pipeline()?;
            let speakers = pipeline.separate_speakers_to_dir(&input, &dir, &Ffmpeg::locate()?, &sink)?;
            print_json(&speakers)
        }
        Commands::Mix {
            input,
            output,
            dir,
            male,
            options,
        } => {
            let pipeline = options.pipeline()?;
            let report = pipeline.process_with_selected_speakers(
                &input,
                &output,
                &dir,
                &male,
                &Ffmpeg::locate()?,
                &sink,
            )?;
            print_json(&report)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    info!("voxshift {}", voxshift::VERSION);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
