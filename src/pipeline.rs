//! End-to-end runs: decode, segment, composite, write, remux.

use crate::analysis::{DistributionReport, analyze_pitch_distribution};
use crate::config::{PipelineConfig, Strategy};
use crate::core::{AudioBuffer, BitDepth, Channels, ProgressSink, Region, Step};
use crate::decoder::load_audio;
use crate::encoder::{write_wav, write_wav_as};
use crate::error::{AudioError, AudioResult};
use crate::filter::{Filter, Resample};
use crate::media::MediaTool;
use crate::models::ModelContext;
use crate::processor::separation::{
    self, MixTarget, SpeakerSummary, load_stems, rank_hybrid, rank_speakers, stem_files,
};
use crate::processor::simple::segment_by_pitch;
use crate::processor::timbre::segment_by_timbre;
use crate::processor::{CompositeStats, Compositor, ProcessingReport, apply_regions};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Extracted original audio kept next to separated stems
pub const ORIGINAL_AUDIO: &str = "original.wav";

/// Slice length used by `analyze`
const ANALYSIS_SEGMENT_SECS: f64 = 0.3;

/// One configured pipeline; cheap to share between runs
pub struct Pipeline {
    config: PipelineConfig,
    models: ModelContext,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, models: ModelContext) -> AudioResult<Self> {
        config.validate()?;
        Ok(Pipeline { config, models })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fail early when the configured strategy needs a model that is missing
    pub fn check_models(&self) -> AudioResult<()> {
        let strategy = self.config.strategy;
        if strategy.uses_separation() {
            self.models.separator()?;
        }
        if strategy == Strategy::Timbre {
            self.models.segmenter()?;
        }
        Ok(())
    }

    pub fn models(&self) -> &ModelContext {
        &self.models
    }

    /// Process a decoded buffer with the configured strategy.
    ///
    /// `audio_path` is where the same audio lives on disk, for models that
    /// read files; without it a temporary WAV is written when needed.
    pub fn process_buffer(
        &self,
        audio: &AudioBuffer,
        audio_path: Option<&Path>,
        sink: &dyn ProgressSink,
    ) -> AudioResult<(AudioBuffer, ProcessingReport)> {
        let config = &self.config;
        let strategy = config.strategy;
        let mut report = ProcessingReport::new(Some(strategy));
        sink.report(
            Step::Analyze,
            &format!(
                "Strategy {}, shift {:+} semitones, threshold {} Hz",
                strategy, config.pitch_shift_semitones, config.male_threshold_hz
            ),
        );

        if audio.is_empty() {
            return Err(AudioError::BufferError("input contains no audio".into()));
        }

        let segments = match strategy {
            Strategy::Simple => {
                let outcome = segment_by_pitch(audio, config, sink)?;
                report.thresholds_hz = outcome.thresholds.thresholds().to_vec();
                outcome.segments
            }
            Strategy::Timbre => {
                let segmenter = self.models.segmenter()?;
                let scratch;
                let written;
                let path = match audio_path {
                    Some(path) => path,
                    None => {
                        scratch = TempDir::new()?;
                        written = scratch.path().join("input.wav");
                        write_wav(&written, audio)?;
                        written.as_path()
                    }
                };
                let outcome = segment_by_timbre(
                    audio,
                    path,
                    segmenter,
                    self.models.formants(),
                    config,
                    sink,
                )?;
                report.smoothed = outcome.smoothed;
                report.double_check_rejections = outcome.rejected;
                outcome.segments
            }
            Strategy::Hybrid | Strategy::Separation => {
                let (mixed, speakers, gain) = self.separate_and_mix(audio, sink)?;
                report.speakers = speakers;
                report.shifted_spans = report.speakers.iter().filter(|s| s.is_male).count();
                report.clip_gain = gain;
                log::info!("{}", report.summary());
                return Ok((mixed, report));
            }
        };

        report.count_segments(&segments);
        sink.report(Step::Analyze, &report.summary());

        sink.report(Step::Pitch, "Shifting male segments");
        let outcome = Compositor::from_config(config).apply(
            audio,
            &segments,
            config.pitch_shift_semitones,
        )?;
        report.record_composite(&outcome.stats);
        sink.report(
            Step::Pitch,
            &format!("Shifted {} spans", outcome.stats.shifted_spans),
        );
        Ok((outcome.audio, report))
    }

    fn separate_and_mix(
        &self,
        audio: &AudioBuffer,
        sink: &dyn ProgressSink,
    ) -> AudioResult<(AudioBuffer, Vec<SpeakerSummary>, Option<f32>)> {
        let config = &self.config;
        let separator = self.models.separator()?;
        let scratch = TempDir::new()?;

        let files = separation::separate_to_dir(
            audio,
            scratch.path(),
            separator,
            config.separation_sample_rate,
            sink,
        )?;
        let mut stems = load_stems(&files, config, sink)?;

        let speakers = if config.strategy == Strategy::Hybrid {
            rank_hybrid(&mut stems, config, self.models.formants(), sink)
        } else {
            rank_speakers(&mut stems, config.male_threshold_hz);
            stems.iter().map(SpeakerSummary::of).collect()
        };

        let (mixed, gain) = separation::mix_stems(
            &stems,
            config.pitch_shift_semitones,
            MixTarget::like(audio),
            sink,
        )?;
        Ok((mixed, speakers, gain))
    }

    /// Decode `path` and bring it to the working sample rate
    pub fn load_working_audio(&self, path: &Path) -> AudioResult<AudioBuffer> {
        let audio = load_audio(path)?;
        Resample::new(audio.sample_rate(), self.config.sample_rate)?.process(&audio)
    }

    /// Process an audio file into a 16-bit WAV
    pub fn process_audio_file(
        &self,
        input: &Path,
        output: &Path,
        sink: &dyn ProgressSink,
    ) -> AudioResult<ProcessingReport> {
        report_failure(sink, || {
            self.check_models()?;
            sink.report(Step::Extract, &format!("Loading {}", input.display()));
            let audio = self.load_working_audio(input)?;
            let (processed, report) = self.process_buffer(&audio, Some(input), sink)?;

            sink.report(Step::Merge, &format!("Writing {}", output.display()));
            write_wav_as(output, &processed, BitDepth::I16)?;
            Ok(report)
        })
    }

    /// Extract, process and remux a video. Nothing is written to
    /// `output_video` unless every stage succeeds.
    pub fn process_video(
        &self,
        input_video: &Path,
        output_video: &Path,
        media: &dyn MediaTool,
        sink: &dyn ProgressSink,
    ) -> AudioResult<ProcessingReport> {
        report_failure(sink, || {
            self.check_models()?;
            let scratch = TempDir::new()?;
            let (extracted, audio) = self.extract(input_video, scratch.path(), media, sink)?;

            let (processed, report) = self.process_buffer(&audio, Some(&extracted), sink)?;
            self.combine(input_video, &processed, output_video, scratch.path(), media, sink)?;
            log::info!("{}", report.summary());
            Ok(report)
        })
    }

    /// Shift only the caller's regions of a video's audio
    pub fn override_regions(
        &self,
        input_video: &Path,
        output_video: &Path,
        regions: &[Region],
        media: &dyn MediaTool,
        sink: &dyn ProgressSink,
    ) -> AudioResult<CompositeStats> {
        report_failure(sink, || {
            for region in regions {
                region.validate()?;
            }

            let scratch = TempDir::new()?;
            let (_, audio) = self.extract(input_video, scratch.path(), media, sink)?;

            sink.report(Step::Pitch, &format!("Shifting {} regions", regions.len()));
            let outcome = apply_regions(
                &audio,
                regions,
                self.config.pitch_shift_semitones,
                &Compositor::unfloored(&self.config),
            )?;

            self.combine(input_video, &outcome.audio, output_video, scratch.path(), media, sink)?;
            Ok(outcome.stats)
        })
    }

    /// Extract a video's audio into `dir` as `original.wav`, separate it into
    /// `speaker_<i>.wav` stems, and return each speaker's pitch.
    ///
    /// `is_male` in the result is the relative-ranking suggestion; callers
    /// pick the speakers to shift with
    /// [`process_with_selected_speakers`](Self::process_with_selected_speakers).
    pub fn separate_speakers_to_dir(
        &self,
        input_video: &Path,
        dir: &Path,
        media: &dyn MediaTool,
        sink: &dyn ProgressSink,
    ) -> AudioResult<Vec<SpeakerSummary>> {
        report_failure(sink, || {
            let separator = self.models.separator()?;
            fs::create_dir_all(dir)?;

            let original = dir.join(ORIGINAL_AUDIO);
            if !original.exists() {
                sink.report(Step::Extract, "Extracting audio");
                media.extract_audio(input_video, &original, self.config.sample_rate, Channels::Stereo)?;
            }
            let audio = self.load_working_audio(&original)?;

            let files = separation::separate_to_dir(
                &audio,
                dir,
                separator,
                self.config.separation_sample_rate,
                sink,
            )?;
            let mut stems = load_stems(&files, &self.config, sink)?;
            rank_speakers(&mut stems, self.config.male_threshold_hz);

            sink.report(Step::Separate, &format!("Found {} speakers", stems.len()));
            Ok(stems.iter().map(SpeakerSummary::of).collect())
        })
    }

    /// Re-mix the stems in `dir`, shifting exactly the speakers in
    /// `male_ids`, and remux with `input_video`
    pub fn process_with_selected_speakers(
        &self,
        input_video: &Path,
        output_video: &Path,
        dir: &Path,
        male_ids: &[usize],
        media: &dyn MediaTool,
        sink: &dyn ProgressSink,
    ) -> AudioResult<ProcessingReport> {
        report_failure(sink, || {
            let files = stem_files(dir)?;
            if files.is_empty() {
                return Err(AudioError::SeparationFailed(format!(
                    "no speaker files in {}",
                    dir.display()
                )));
            }
            for id in male_ids {
                if !files.iter().any(|(f, _)| f == id) {
                    log::warn!("speaker {} was selected but has no stem", id);
                }
            }

            let original = self.load_working_audio(&dir.join(ORIGINAL_AUDIO))?;
            let mut stems = load_stems(&files, &self.config, sink)?;
            for stem in &mut stems {
                stem.is_male = male_ids.contains(&stem.id);
            }

            let target = MixTarget {
                frames: original.frames(),
                sample_rate: self.config.sample_rate,
                channels: Channels::Stereo,
            };
            let (mixed, gain) =
                separation::mix_stems(&stems, self.config.pitch_shift_semitones, target, sink)?;

            let scratch = TempDir::new()?;
            self.combine(input_video, &mixed, output_video, scratch.path(), media, sink)?;

            let mut report = ProcessingReport::new(None);
            report.speakers = stems.iter().map(SpeakerSummary::of).collect();
            report.shifted_spans = stems.iter().filter(|s| s.is_male).count();
            report.clip_gain = gain;
            Ok(report)
        })
    }

    /// Pitch distribution of a media file, for picking a threshold and
    /// segment length before processing
    pub fn analyze(
        &self,
        input: &Path,
        media: Option<&dyn MediaTool>,
        sink: &dyn ProgressSink,
    ) -> AudioResult<DistributionReport> {
        let audio = match (self.load_working_audio(input), media) {
            (Ok(audio), _) => audio,
            (Err(e), Some(media)) => {
                log::debug!("direct decode failed ({}), extracting with media tool", e);
                let scratch = TempDir::new()?;
                self.extract(input, scratch.path(), media, sink)?.1
            }
            (Err(e), None) => return Err(e),
        };

        Ok(analyze_pitch_distribution(
            &audio,
            ANALYSIS_SEGMENT_SECS,
            self.config.silence_peak,
            sink,
        ))
    }

    fn extract(
        &self,
        input_video: &Path,
        scratch: &Path,
        media: &dyn MediaTool,
        sink: &dyn ProgressSink,
    ) -> AudioResult<(PathBuf, AudioBuffer)> {
        sink.report(Step::Extract, &format!("Extracting audio from {}", input_video.display()));
        let extracted = scratch.join("extracted.wav");
        media.extract_audio(input_video, &extracted, self.config.sample_rate, Channels::Stereo)?;
        let audio = self.load_working_audio(&extracted)?;
        sink.report(
            Step::Extract,
            &format!("Extracted {:.1}s of audio", audio.duration_secs()),
        );
        Ok((extracted, audio))
    }

    fn combine(
        &self,
        input_video: &Path,
        audio: &AudioBuffer,
        output_video: &Path,
        scratch: &Path,
        media: &dyn MediaTool,
        sink: &dyn ProgressSink,
    ) -> AudioResult<()> {
        let processed = scratch.join("processed.wav");
        write_wav_as(&processed, audio, BitDepth::I16)?;

        sink.report(Step::Combine, "Combining audio with video");
        if let Err(e) = media.remux(input_video, &processed, output_video) {
            if output_video.exists() {
                let _ = fs::remove_file(output_video);
            }
            return Err(e);
        }
        sink.report(
            Step::Combine,
            &format!("Done: {}", output_video.display()),
        );
        Ok(())
    }
}

/// Forward a terminal error to the sink before returning it
fn report_failure<T>(
    sink: &dyn ProgressSink,
    run: impl FnOnce() -> AudioResult<T>,
) -> AudioResult<T> {
    run().inspect_err(|e| sink.report(Step::Error, &e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GenderLabel, NoopSink, Segment};
    use crate::models::{GenderSegmenter, SpeakerSeparator};
    use std::cell::RefCell;
    use std::f32::consts::PI;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn tone(freq: f32, secs: f32, sr: u32, amp: f32) -> Vec<f32> {
        (0..(secs * sr as f32) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin() * amp)
            .collect()
    }

    fn low_then_high(secs_each: f32, sr: u32) -> Vec<f32> {
        let mut samples = tone(110.0, secs_each, sr, 0.3);
        samples.extend(tone(220.0, secs_each, sr, 0.3));
        samples
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples.windows(2).filter(|w| (w[0] < 0.0) != (w[1] < 0.0)).count()
    }

    fn simple_pipeline() -> Pipeline {
        let config = PipelineConfig {
            strategy: Strategy::Simple,
            male_threshold_hz: 165.0,
            segment_duration_secs: 0.5,
            ..PipelineConfig::default()
        };
        Pipeline::new(config, ModelContext::new()).unwrap()
    }

    /// Extraction writes a fixed stereo recording; remux copies the audio
    struct FakeMedia {
        audio: AudioBuffer,
        fail_remux: bool,
    }

    impl MediaTool for FakeMedia {
        fn extract_audio(&self, _video: &Path, wav: &Path, sample_rate: u32, channels: Channels) -> AudioResult<()> {
            let audio = Resample::new(self.audio.sample_rate(), sample_rate)?
                .process(&self.audio.with_channels(channels))?;
            write_wav_as(wav, &audio, BitDepth::I16)
        }

        fn remux(&self, _video: &Path, audio: &Path, output: &Path) -> AudioResult<()> {
            fs::copy(audio, output)?;
            if self.fail_remux {
                return Err(AudioError::media_failed("remux failed", None, Some(1)));
            }
            Ok(())
        }
    }

    struct ToneSeparator;

    impl SpeakerSeparator for ToneSeparator {
        fn separate(&self, _input: &Path, output_dir: &Path) -> AudioResult<()> {
            for (k, freq) in [(1, 120.0), (2, 220.0)] {
                let audio = AudioBuffer::mono(tone(freq, 1.0, 16000, 0.3), 16000)?;
                write_wav(output_dir.join(format!("temp_16k_s{}.wav", k)), &audio)?;
            }
            Ok(())
        }
    }

    struct HalfSegmenter;

    impl GenderSegmenter for HalfSegmenter {
        fn segment(&self, audio_path: &Path) -> AudioResult<Vec<Segment>> {
            assert!(audio_path.exists());
            Ok(vec![
                Segment::new(GenderLabel::Male, 0.0, 1.0),
                Segment::new(GenderLabel::Female, 1.0, 2.0),
            ])
        }
    }

    #[test]
    fn test_end_to_end_simple() {
        let sr = 44100;
        let audio = AudioBuffer::mono(low_then_high(5.0, sr), sr).unwrap();
        let (out, report) = simple_pipeline().process_buffer(&audio, None, &NoopSink).unwrap();

        assert_eq!(out.frames(), audio.frames());
        assert_eq!(report.male_segments, 10);
        assert_eq!(report.female_segments, 10);
        assert_eq!(report.shifted_spans, 10);
        assert_eq!(report.thresholds_hz, vec![165.0]);

        // Female half is untouched
        let half = 5 * sr as usize;
        assert_eq!(&out.channel(0)[half..], &audio.channel(0)[half..]);

        // Male half is lowered by three semitones (110 Hz -> ~92.5 Hz)
        let lowered = &out.channel(0)[(1.1 * sr as f32) as usize..(1.4 * sr as f32) as usize];
        let crossings = zero_crossings(lowered);
        assert!((48..=62).contains(&crossings), "{} crossings", crossings);
    }

    #[test]
    fn test_short_simple_windows_are_shifted() {
        let sr = 16000;
        let audio = AudioBuffer::mono(tone(110.0, 2.0, sr, 0.3), sr).unwrap();
        let config = PipelineConfig {
            strategy: Strategy::Simple,
            segment_duration_secs: 0.08,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config, ModelContext::new()).unwrap();
        let (out, report) = pipeline.process_buffer(&audio, None, &NoopSink).unwrap();

        assert!(report.male_segments > 0);
        assert_eq!(report.shifted_spans, report.male_segments);
        assert_eq!(out.frames(), audio.frames());
        assert_ne!(out.channel(0), audio.channel(0));
    }

    #[test]
    fn test_stereo_length_invariance() {
        let sr = 16000;
        let left = low_then_high(1.3, sr);
        let right: Vec<f32> = left.iter().map(|s| s * 0.5).collect();
        let audio = AudioBuffer::new(vec![left, right], sr).unwrap();

        let (out, _) = simple_pipeline().process_buffer(&audio, None, &NoopSink).unwrap();
        assert_eq!(out.channel_count(), 2);
        assert_eq!(out.frames(), audio.frames());
        assert!(out.peak() <= 1.0);
    }

    #[test]
    fn test_silence_is_never_shifted() {
        let sr = 16000;
        let mut samples: Vec<f32> = (0..2 * sr as usize)
            .map(|i| if i % 2 == 0 { 0.004 } else { -0.004 })
            .collect();
        samples.extend(tone(110.0, 1.0, sr, 0.3));
        let audio = AudioBuffer::mono(samples, sr).unwrap();

        let (out, report) = simple_pipeline().process_buffer(&audio, None, &NoopSink).unwrap();
        assert_eq!(report.silent_segments, 4);
        assert_eq!(&out.channel(0)[..2 * sr as usize], &audio.channel(0)[..2 * sr as usize]);
    }

    #[test]
    fn test_zero_shift_without_males_is_identity() {
        let sr = 16000;
        let audio = AudioBuffer::mono(tone(220.0, 2.0, sr, 0.3), sr).unwrap();
        let config = PipelineConfig {
            strategy: Strategy::Simple,
            pitch_shift_semitones: 0.0,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config, ModelContext::new()).unwrap();
        let (out, report) = pipeline.process_buffer(&audio, None, &NoopSink).unwrap();
        assert_eq!(report.male_segments, 0);
        assert_eq!(out, audio);
    }

    #[test]
    fn test_sink_does_not_change_output() {
        let sr = 16000;
        let audio = AudioBuffer::mono(low_then_high(1.0, sr), sr).unwrap();
        let messages = RefCell::new(Vec::new());
        let sink = |step: Step, msg: &str| messages.borrow_mut().push((step, msg.to_string()));

        let pipeline = simple_pipeline();
        let (quiet, _) = pipeline.process_buffer(&audio, None, &NoopSink).unwrap();
        let (loud, _) = pipeline.process_buffer(&audio, None, &sink).unwrap();
        assert_eq!(quiet, loud);
        assert!(messages.borrow().iter().any(|(step, _)| *step == Step::Pitch));
    }

    #[test]
    fn test_timbre_strategy_uses_segmenter() {
        let sr = 16000;
        let audio = AudioBuffer::mono(low_then_high(1.0, sr), sr).unwrap();
        let config = PipelineConfig {
            strategy: Strategy::Timbre,
            double_check_min_secs: 10.0,
            ..PipelineConfig::default()
        };
        let models = ModelContext::new().with_segmenter(Arc::new(HalfSegmenter));
        let pipeline = Pipeline::new(config, models).unwrap();

        let (out, report) = pipeline.process_buffer(&audio, None, &NoopSink).unwrap();
        assert_eq!(report.male_segments, 1);
        assert_eq!(report.shifted_spans, 1);
        assert_eq!(&out.channel(0)[sr as usize..], &audio.channel(0)[sr as usize..]);
    }

    #[test]
    fn test_separation_strategy_ranks_relatively() {
        let sr = 44100;
        let audio = AudioBuffer::mono(low_then_high(1.0, sr), sr).unwrap();
        let config = PipelineConfig {
            strategy: Strategy::Separation,
            ..PipelineConfig::default()
        };
        let models = ModelContext::new().with_separator(Arc::new(ToneSeparator));
        let pipeline = Pipeline::new(config, models).unwrap();

        let (out, report) = pipeline.process_buffer(&audio, None, &NoopSink).unwrap();
        assert_eq!(out.frames(), audio.frames());
        assert_eq!(report.speakers.len(), 2);
        assert!(!report.speakers[0].is_male);
        assert!(report.speakers[1].is_male);
        assert_eq!(report.shifted_spans, 1);
    }

    #[test]
    fn test_hybrid_needs_both_verdicts() {
        let sr = 16000;
        let audio = AudioBuffer::mono(low_then_high(1.0, sr), sr).unwrap();
        let config = PipelineConfig {
            strategy: Strategy::Hybrid,
            ..PipelineConfig::default()
        };
        let models = ModelContext::new().with_separator(Arc::new(ToneSeparator));
        let pipeline = Pipeline::new(config, models).unwrap();

        let (_, report) = pipeline.process_buffer(&audio, None, &NoopSink).unwrap();
        assert!(report.speakers.iter().all(|s| s.voice.is_some()));
        // 220 Hz is above the pitch threshold whatever the voice says
        assert!(!report.speakers[1].is_male);
    }

    #[test]
    fn test_missing_models_are_fatal() {
        let audio = AudioBuffer::mono(tone(120.0, 1.0, 16000, 0.3), 16000).unwrap();
        for strategy in [Strategy::Timbre, Strategy::Hybrid, Strategy::Separation] {
            let config = PipelineConfig {
                strategy,
                ..PipelineConfig::default()
            };
            let pipeline = Pipeline::new(config, ModelContext::new()).unwrap();
            let err = pipeline.process_buffer(&audio, None, &NoopSink).unwrap_err();
            assert!(matches!(err, AudioError::ModelUnavailable(_)));
        }
    }

    #[test]
    fn test_missing_models_fail_before_loading() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.wav");
        let output = dir.path().join("out.wav");

        for strategy in [Strategy::Timbre, Strategy::Hybrid, Strategy::Separation] {
            let config = PipelineConfig {
                strategy,
                ..PipelineConfig::default()
            };
            let pipeline = Pipeline::new(config, ModelContext::new()).unwrap();
            assert!(pipeline.check_models().is_err());
            let err = pipeline.process_audio_file(&missing, &output, &NoopSink).unwrap_err();
            assert!(matches!(err, AudioError::ModelUnavailable(_)));
        }

        let separation = Pipeline::new(
            PipelineConfig {
                strategy: Strategy::Separation,
                ..PipelineConfig::default()
            },
            ModelContext::new().with_separator(Arc::new(ToneSeparator)),
        )
        .unwrap();
        assert!(separation.check_models().is_ok());
        assert!(simple_pipeline().check_models().is_ok());
        assert!(!output.exists());
    }

    #[test]
    fn test_process_audio_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        let audio = AudioBuffer::mono(low_then_high(1.0, 22050), 22050).unwrap();
        write_wav(&input, &audio).unwrap();

        let report = simple_pipeline().process_audio_file(&input, &output, &NoopSink).unwrap();
        assert_eq!(report.male_segments, 2);

        let written = load_audio(&output).unwrap();
        assert_eq!(written.sample_rate(), 44100);
        assert_eq!(written.frames(), 88200);
    }

    #[test]
    fn test_process_video_round_trip() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let media = FakeMedia {
            audio: AudioBuffer::mono(low_then_high(1.0, 44100), 44100).unwrap(),
            fail_remux: false,
        };

        let report = simple_pipeline()
            .process_video(Path::new("in.mp4"), &output, &media, &NoopSink)
            .unwrap();
        assert_eq!(report.male_segments, 2);

        let remuxed = load_audio(&output).unwrap();
        assert_eq!(remuxed.channels(), Channels::Stereo);
        assert_eq!(remuxed.frames(), 88200);
    }

    #[test]
    fn test_failed_remux_leaves_no_output() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let media = FakeMedia {
            audio: AudioBuffer::mono(tone(220.0, 1.0, 44100, 0.3), 44100).unwrap(),
            fail_remux: true,
        };
        let errors = RefCell::new(Vec::new());
        let sink = |step: Step, msg: &str| {
            if step == Step::Error {
                errors.borrow_mut().push(msg.to_string());
            }
        };

        let result = simple_pipeline().process_video(Path::new("in.mp4"), &output, &media, &sink);
        assert!(result.is_err());
        assert!(!output.exists());
        assert_eq!(errors.borrow().len(), 1);
    }

    #[test]
    fn test_override_regions() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let media = FakeMedia {
            audio: AudioBuffer::mono(tone(150.0, 3.0, 44100, 0.3), 44100).unwrap(),
            fail_remux: false,
        };
        let regions = vec![Region::new(1.0, 2.0), Region::new(5.0, 6.0)];

        let stats = simple_pipeline()
            .override_regions(Path::new("in.mp4"), &output, &regions, &media, &NoopSink)
            .unwrap();
        assert_eq!(stats.shifted_spans, 1);
        assert_eq!(load_audio(&output).unwrap().frames(), 3 * 44100);

        let bad = vec![Region::new(2.0, 1.0)];
        let result = simple_pipeline().override_regions(Path::new("in.mp4"), &output, &bad, &media, &NoopSink);
        assert!(matches!(result, Err(AudioError::InvalidRegion { .. })));
    }

    #[test]
    fn test_preview_then_selected_speakers() {
        let dir = tempdir().unwrap();
        let speakers_dir = dir.path().join("speakers");
        let output = dir.path().join("out.mp4");
        let media = FakeMedia {
            audio: AudioBuffer::mono(low_then_high(1.0, 44100), 44100).unwrap(),
            fail_remux: false,
        };
        let models = ModelContext::new().with_separator(Arc::new(ToneSeparator));
        let pipeline = Pipeline::new(PipelineConfig::default(), models).unwrap();

        let speakers = pipeline
            .separate_speakers_to_dir(Path::new("in.mp4"), &speakers_dir, &media, &NoopSink)
            .unwrap();
        assert_eq!(speakers.len(), 2);
        assert!(speakers[0].pitch_hz < speakers[1].pitch_hz);
        assert!(speakers_dir.join(ORIGINAL_AUDIO).exists());
        assert!(speakers_dir.join("speaker_1.wav").exists());

        let report = pipeline
            .process_with_selected_speakers(Path::new("in.mp4"), &output, &speakers_dir, &[0], &media, &NoopSink)
            .unwrap();
        assert!(report.speakers[0].is_male);
        assert!(!report.speakers[1].is_male);

        let mixed = load_audio(&output).unwrap();
        assert_eq!(mixed.frames(), 88200);
        assert_eq!(mixed.channels(), Channels::Stereo);
    }

    #[test]
    fn test_selected_speakers_without_stems() {
        let dir = tempdir().unwrap();
        let media = FakeMedia {
            audio: AudioBuffer::mono(vec![0.0; 100], 44100).unwrap(),
            fail_remux: false,
        };
        let result = simple_pipeline().process_with_selected_speakers(
            Path::new("in.mp4"),
            &dir.path().join("out.mp4"),
            dir.path(),
            &[0],
            &media,
            &NoopSink,
        );
        assert!(matches!(result, Err(AudioError::SeparationFailed(_))));
    }

    #[test]
    fn test_analyze_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        write_wav(&input, &AudioBuffer::mono(low_then_high(3.0, 16000), 16000).unwrap()).unwrap();

        let report = simple_pipeline().analyze(&input, None, &NoopSink).unwrap();
        assert_eq!(report.pitches.len(), 20);
        assert!(report.stats.is_some());
        assert_eq!(report.male_pitches.len(), 10);
    }
}
