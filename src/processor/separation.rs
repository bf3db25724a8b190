//! Speaker separation: stem cache, speaker ranking and re-mixing.

use super::compositor;
use crate::analysis::{FormantExtractor, estimate_pitch_for_long_signal};
use crate::classify::{TimbreVerdict, is_male, score_stem};
use crate::config::PipelineConfig;
use crate::core::{AudioBuffer, Channels, ProgressSink, SpeakerStem, Step};
use crate::decoder::load_audio_as;
use crate::encoder::write_wav;
use crate::error::{AudioError, AudioResult};
use crate::filter::{Filter, PitchShift, Resample};
use crate::models::SpeakerSeparator;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const STEM_PREFIX: &str = "speaker_";
const SEPARATOR_INPUT: &str = "temp_16k.wav";

/// Per-speaker line of a processing report
#[derive(Debug, Clone, Serialize)]
pub struct SpeakerSummary {
    pub id: usize,
    pub pitch_hz: f64,
    pub is_male: bool,
    /// Voice verdict, for strategies that score timbre
    pub voice: Option<TimbreVerdict>,
}

impl SpeakerSummary {
    pub fn of(stem: &SpeakerStem) -> Self {
        SpeakerSummary {
            id: stem.id,
            pitch_hz: stem.estimated_pitch_hz,
            is_male: stem.is_male,
            voice: None,
        }
    }
}

/// `speaker_<id>.wav` files in `dir`, ordered by id
pub fn stem_files(dir: &Path) -> AudioResult<Vec<(usize, PathBuf)>> {
    let mut stems = Vec::new();
    if !dir.is_dir() {
        return Ok(stems);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(STEM_PREFIX))
            .and_then(|n| n.strip_suffix(".wav"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(id) = id {
            stems.push((id, path));
        }
    }
    stems.sort_by_key(|(id, _)| *id);
    Ok(stems)
}

/// Run the separator over `audio` and store its stems as `speaker_<i>.wav`
/// in `dir`.
///
/// Stems already present in `dir` are reused and the separator is not run.
pub fn separate_to_dir(
    audio: &AudioBuffer,
    dir: &Path,
    separator: &dyn SpeakerSeparator,
    separation_rate: u32,
    sink: &dyn ProgressSink,
) -> AudioResult<Vec<(usize, PathBuf)>> {
    fs::create_dir_all(dir)?;

    let cached = stem_files(dir)?;
    if !cached.is_empty() {
        sink.report(
            Step::Separate,
            &format!("Reusing {} separated tracks", cached.len()),
        );
        return Ok(cached);
    }

    sink.report(Step::Separate, &format!("Resampling to {} Hz", separation_rate));
    let mono = AudioBuffer::mono(audio.to_mono(), audio.sample_rate())?;
    let input = Resample::new(mono.sample_rate(), separation_rate)?.process(&mono)?;
    let input_path = dir.join(SEPARATOR_INPUT);
    write_wav(&input_path, &input)?;

    sink.report(Step::Separate, "Running speaker separation");
    let result = separator.separate(&input_path, dir);
    let found = result.and_then(|_| find_separated(dir, &input_path));
    if let Err(e) = fs::remove_file(&input_path) {
        log::debug!("could not remove {}: {}", input_path.display(), e);
    }
    let found = found?;

    if found.is_empty() {
        return Err(AudioError::SeparationFailed(format!(
            "no separated tracks found in {}",
            dir.display()
        )));
    }

    let mut stems = Vec::with_capacity(found.len());
    for (i, path) in found.iter().enumerate() {
        let clean = dir.join(format!("{}{}.wav", STEM_PREFIX, i));
        if *path != clean {
            fs::copy(path, &clean)?;
        }
        log::debug!("stem {}: {}", i, path.display());
        stems.push((i, clean));
    }

    sink.report(Step::Separate, &format!("Separated {} tracks", stems.len()));
    Ok(stems)
}

/// Files named `*_s*.wav` anywhere below `dir`, sorted, excluding `input`
fn find_separated(dir: &Path, input: &Path) -> AudioResult<Vec<PathBuf>> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> AudioResult<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                walk(&path, out)?;
                continue;
            }
            let separated = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".wav"))
                .is_some_and(|stem| stem.contains("_s"));
            if separated {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut found = Vec::new();
    walk(dir, &mut found)?;
    found.retain(|p| p != input);
    found.sort();
    Ok(found)
}

/// Load stems at `sample_rate` and estimate each one's pitch
pub fn load_stems(
    files: &[(usize, PathBuf)],
    config: &PipelineConfig,
    sink: &dyn ProgressSink,
) -> AudioResult<Vec<SpeakerStem>> {
    let rate = config.separation_sample_rate;
    let mut stems = Vec::with_capacity(files.len());

    for (id, path) in files {
        sink.report(Step::Analyze, &format!("Estimating pitch of speaker {}", id + 1));
        let audio = load_audio_as(path, rate, Channels::Mono)?;
        let pitch = estimate_pitch_for_long_signal(audio.channel(0), rate, config.long_signal_samples);
        sink.report(Step::Analyze, &format!("  speaker {}: {:.1} Hz", id + 1, pitch));

        stems.push(SpeakerStem {
            id: *id,
            audio,
            estimated_pitch_hz: pitch as f64,
            is_male: false,
        });
    }
    Ok(stems)
}

/// Decide which stems are male by comparing their pitches.
///
/// With two or more valid pitches the lowest-pitched stem is female and every
/// other valid stem male. A single valid pitch is compared against
/// `threshold_hz`. Stems without a pitch are never male.
pub fn rank_speakers(stems: &mut [SpeakerStem], threshold_hz: f32) {
    for stem in stems.iter_mut() {
        stem.is_male = false;
    }

    let valid: Vec<usize> = (0..stems.len()).filter(|&i| stems[i].has_pitch()).collect();
    match valid.len() {
        0 => log::warn!("no speaker has a usable pitch, nothing will be shifted"),
        1 => {
            let stem = &mut stems[valid[0]];
            stem.is_male = is_male(stem.estimated_pitch_hz as f32, threshold_hz);
        }
        n => {
            if n > 2 {
                log::warn!(
                    "{} speakers with pitch; only the lowest is treated as female",
                    n
                );
            }
            let lowest = valid.iter().copied().min_by(|&a, &b| {
                stems[a]
                    .estimated_pitch_hz
                    .total_cmp(&stems[b].estimated_pitch_hz)
            });
            for &i in &valid {
                stems[i].is_male = Some(i) != lowest;
            }
        }
    }

    for stem in stems.iter() {
        log::info!(
            "speaker {}: {:.1} Hz -> {}",
            stem.id + 1,
            stem.estimated_pitch_hz,
            if stem.is_male { "male" } else { "female" }
        );
    }
}

/// Decide each stem independently: male only when both its voice verdict and
/// its pitch say male
pub fn rank_hybrid(
    stems: &mut [SpeakerStem],
    config: &PipelineConfig,
    formants: &dyn FormantExtractor,
    sink: &dyn ProgressSink,
) -> Vec<SpeakerSummary> {
    stems
        .iter_mut()
        .map(|stem| {
            let verdict = score_stem(
                stem.audio.channel(0),
                stem.audio.sample_rate(),
                config.stem_score_threshold,
                Some(formants),
            );
            let pitch_male = is_male(stem.estimated_pitch_hz as f32, config.male_threshold_hz);
            stem.is_male = verdict.is_male() && pitch_male;

            sink.report(
                Step::Analyze,
                &format!(
                    "speaker {}: voice={} ({:.2}), pitch={:.1} Hz -> {}",
                    stem.id + 1,
                    verdict.label,
                    verdict.score,
                    stem.estimated_pitch_hz,
                    if stem.is_male { "male" } else { "female" }
                ),
            );

            SpeakerSummary {
                voice: Some(verdict),
                ..SpeakerSummary::of(stem)
            }
        })
        .collect()
}

/// Output layout of [`mix_stems`]
#[derive(Debug, Clone, Copy)]
pub struct MixTarget {
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: Channels,
}

impl MixTarget {
    pub fn like(audio: &AudioBuffer) -> Self {
        MixTarget {
            frames: audio.frames(),
            sample_rate: audio.sample_rate(),
            channels: audio.channels(),
        }
    }
}

/// Re-mix stems, shifting the male ones.
///
/// Each stem is resampled to the target rate and padded or truncated to the
/// target length. The sum is divided by the stem count, clip-guarded, and
/// copied to every target channel. Returns the mix and the clip-guard gain.
pub fn mix_stems(
    stems: &[SpeakerStem],
    semitones: f64,
    target: MixTarget,
    sink: &dyn ProgressSink,
) -> AudioResult<(AudioBuffer, Option<f32>)> {
    if stems.is_empty() {
        return Err(AudioError::SeparationFailed("no stems to mix".into()));
    }

    let shifter = PitchShift::new(semitones)?;
    let mut mixed = vec![0.0f32; target.frames];

    for stem in stems {
        let mono = AudioBuffer::mono(stem.audio.to_mono(), stem.audio.sample_rate())?;
        let resampled = Resample::new(mono.sample_rate(), target.sample_rate)?.process(&mono)?;

        let samples = if stem.is_male {
            sink.report(Step::Pitch, &format!("Shifting speaker {}", stem.id + 1));
            shifter.shift(resampled.channel(0))
        } else {
            sink.report(Step::Pitch, &format!("Keeping speaker {}", stem.id + 1));
            resampled.channel(0).to_vec()
        };

        for (out, s) in mixed.iter_mut().zip(samples) {
            *out += s;
        }
    }

    if stems.len() > 1 {
        let scale = 1.0 / stems.len() as f32;
        for s in &mut mixed {
            *s *= scale;
        }
    }

    let mut audio = AudioBuffer::mono(mixed, target.sample_rate)?.with_channels(target.channels);
    let gain = compositor::finish(&mut audio);
    sink.report(Step::Merge, &format!("Mixed {} tracks", stems.len()));
    Ok((audio, gain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NoopSink;
    use std::f32::consts::PI;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn tone(freq: f32, secs: f32, sr: u32, amp: f32) -> Vec<f32> {
        (0..(secs * sr as f32) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin() * amp)
            .collect()
    }

    fn stem(id: usize, pitch: f64) -> SpeakerStem {
        SpeakerStem {
            id,
            audio: AudioBuffer::mono(vec![0.0; 16], 16000).unwrap(),
            estimated_pitch_hz: pitch,
            is_male: false,
        }
    }

    /// Writes two tones as nested `*_s1.wav` / `*_s2.wav` files
    struct ToneSeparator {
        calls: AtomicUsize,
    }

    impl SpeakerSeparator for ToneSeparator {
        fn separate(&self, input: &Path, output_dir: &Path) -> AudioResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(input.exists());
            let nested = output_dir.join("Model_16K");
            fs::create_dir_all(&nested)?;
            for (k, freq) in [(1, 120.0), (2, 220.0)] {
                let audio = AudioBuffer::mono(tone(freq, 1.0, 16000, 0.3), 16000)?;
                write_wav(nested.join(format!("temp_16k_s{}.wav", k)), &audio)?;
            }
            Ok(())
        }
    }

    struct EmptySeparator;

    impl SpeakerSeparator for EmptySeparator {
        fn separate(&self, _input: &Path, _output_dir: &Path) -> AudioResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_relative_ranking() {
        let mut stems = vec![stem(0, 120.0), stem(1, 220.0)];
        rank_speakers(&mut stems, 165.0);
        assert!(!stems[0].is_male);
        assert!(stems[1].is_male);

        // Both above the absolute threshold
        let mut stems = vec![stem(0, 230.0), stem(1, 180.0)];
        rank_speakers(&mut stems, 165.0);
        assert!(stems[0].is_male);
        assert!(!stems[1].is_male);
    }

    #[test]
    fn test_ranking_ignores_missing_pitch() {
        let mut stems = vec![stem(0, 0.0), stem(1, 130.0), stem(2, 210.0)];
        rank_speakers(&mut stems, 165.0);
        assert!(!stems[0].is_male);
        assert!(!stems[1].is_male);
        assert!(stems[2].is_male);
    }

    #[test]
    fn test_single_valid_stem_uses_threshold() {
        let mut stems = vec![stem(0, 120.0)];
        rank_speakers(&mut stems, 165.0);
        assert!(stems[0].is_male);

        let mut stems = vec![stem(0, 0.0), stem(1, 200.0)];
        rank_speakers(&mut stems, 165.0);
        assert!(!stems[1].is_male);
    }

    #[test]
    fn test_three_stems_keep_one_female() {
        let mut stems = vec![stem(0, 200.0), stem(1, 110.0), stem(2, 150.0)];
        rank_speakers(&mut stems, 165.0);
        let flags: Vec<bool> = stems.iter().map(|s| s.is_male).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn test_separation_is_cached() {
        let dir = tempdir().unwrap();
        let audio = AudioBuffer::mono(tone(150.0, 1.0, 44100, 0.3), 44100).unwrap();
        let separator = ToneSeparator {
            calls: AtomicUsize::new(0),
        };

        let stems = separate_to_dir(&audio, dir.path(), &separator, 16000, &NoopSink).unwrap();
        assert_eq!(stems.len(), 2);
        assert_eq!(stems[0].1, dir.path().join("speaker_0.wav"));
        assert!(stems[1].1.exists());
        assert!(!dir.path().join(SEPARATOR_INPUT).exists());

        let again = separate_to_dir(&audio, dir.path(), &separator, 16000, &NoopSink).unwrap();
        assert_eq!(again, stems);
        assert_eq!(separator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_stems_is_an_error() {
        let dir = tempdir().unwrap();
        let audio = AudioBuffer::mono(tone(150.0, 0.5, 16000, 0.3), 16000).unwrap();
        let err = separate_to_dir(&audio, dir.path(), &EmptySeparator, 16000, &NoopSink).unwrap_err();
        assert!(matches!(err, AudioError::SeparationFailed(_)));
        assert!(!dir.path().join(SEPARATOR_INPUT).exists());
    }

    #[test]
    fn test_load_and_rank_separated_tones() {
        let dir = tempdir().unwrap();
        let audio = AudioBuffer::mono(tone(150.0, 1.0, 16000, 0.3), 16000).unwrap();
        let separator = ToneSeparator {
            calls: AtomicUsize::new(0),
        };
        let files = separate_to_dir(&audio, dir.path(), &separator, 16000, &NoopSink).unwrap();

        let config = PipelineConfig::default();
        let mut stems = load_stems(&files, &config, &NoopSink).unwrap();
        assert!((stems[0].estimated_pitch_hz - 120.0).abs() < 5.0);
        assert!((stems[1].estimated_pitch_hz - 220.0).abs() < 8.0);

        rank_speakers(&mut stems, config.male_threshold_hz);
        assert!(!stems[0].is_male);
        assert!(stems[1].is_male);
    }

    #[test]
    fn test_mix_stems() {
        let a = SpeakerStem {
            id: 0,
            audio: AudioBuffer::mono(vec![0.4; 1600], 16000).unwrap(),
            estimated_pitch_hz: 120.0,
            is_male: false,
        };
        let b = SpeakerStem {
            id: 1,
            audio: AudioBuffer::mono(vec![0.2; 1000], 16000).unwrap(),
            estimated_pitch_hz: 0.0,
            is_male: false,
        };
        let target = MixTarget {
            frames: 1200,
            sample_rate: 16000,
            channels: Channels::Stereo,
        };

        let (mix, gain) = mix_stems(&[a, b], -3.0, target, &NoopSink).unwrap();
        assert_eq!(mix.frames(), 1200);
        assert_eq!(mix.channel(0), mix.channel(1));
        assert!((mix.channel(0)[10] - 0.3).abs() < 1e-6);
        // Past the end of the shorter stem
        assert!((mix.channel(0)[1100] - 0.2).abs() < 1e-6);
        assert_eq!(gain, None);
    }

    #[test]
    fn test_mix_clip_guard() {
        let loud = SpeakerStem {
            id: 0,
            audio: AudioBuffer::mono(vec![1.5; 100], 8000).unwrap(),
            estimated_pitch_hz: 0.0,
            is_male: false,
        };
        let target = MixTarget {
            frames: 100,
            sample_rate: 8000,
            channels: Channels::Mono,
        };
        let (mix, gain) = mix_stems(&[loud], -3.0, target, &NoopSink).unwrap();
        assert!(mix.peak() <= 1.0);
        assert!(gain.is_some());
    }

    #[test]
    fn test_stem_files_ordering() {
        let dir = tempdir().unwrap();
        let audio = AudioBuffer::mono(vec![0.0; 10], 16000).unwrap();
        for name in ["speaker_10.wav", "speaker_2.wav", "original.wav", "speaker_x.wav"] {
            write_wav(dir.path().join(name), &audio).unwrap();
        }
        let ids: Vec<usize> = stem_files(dir.path()).unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![2, 10]);
    }
}
