use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::assets::media::{AudioPcm, MIX_SAMPLE_RATE};
use crate::audio::mix::{AudioManifest, AudioSegment, secs_to_sample};
use crate::config::EngineConfig;
use crate::foundation::core::{Fps, FrameRGBA, Resolution};
use crate::foundation::error::{ReelError, ReelResult};

/// Settings fixed for the lifetime of one artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct MuxConfig {
    pub resolution: Resolution,
    pub fps: Fps,
    /// Output audio rate; narration and music are resampled to it.
    pub sample_rate: u32,
    /// Music gain relative to narration (which plays at 1.0).
    pub music_gain: f32,
    pub music_fade_out_secs: f64,
    pub suggested_filename: String,
}

impl MuxConfig {
    pub fn from_engine(cfg: &EngineConfig, suggested_filename: impl Into<String>) -> ReelResult<Self> {
        Ok(Self {
            resolution: cfg.resolution()?,
            fps: cfg.frame_rate()?,
            sample_rate: MIX_SAMPLE_RATE,
            music_gain: cfg.music_gain,
            music_fade_out_secs: cfg.music_fade_out_secs,
            suggested_filename: suggested_filename.into(),
        })
    }
}

/// A finished, playable video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub location: PathBuf,
    pub suggested_filename: String,
    pub duration: Duration,
    pub frame_count: u64,
}

/// Accumulates held frames plus narration and music into one artifact.
///
/// Call order: `begin`, then any number of `submit_frame` (each optionally followed by
/// `place_narration` for the same scene), optional `mix_audio`, then `finish` or `abort`.
/// Audio and video share time zero.
///
/// `submit_frame` and `finish` never block the executor. A `submit_frame` future dropped before
/// it completes leaves the muxer fit only for `abort`.
#[async_trait]
pub trait StreamMuxer: Send {
    fn begin(&mut self, cfg: MuxConfig) -> ReelResult<()>;
    /// Hold `frame` for `hold`. Returns the number of video frames this produced.
    async fn submit_frame(&mut self, frame: &FrameRGBA, hold: Duration) -> ReelResult<u64>;
    /// Place a narration clip at the start of the last submitted frame.
    fn place_narration(&mut self, clip: AudioPcm) -> ReelResult<()>;
    /// Background music, looped under the whole artifact.
    fn mix_audio(&mut self, track: AudioPcm) -> ReelResult<()>;
    /// Fails with `EmptySequence` when no frames were produced.
    async fn finish(&mut self) -> ReelResult<Artifact>;
    /// Discard everything. Idempotent; nothing partial is left behind.
    fn abort(&mut self);
}

/// Frame and audio bookkeeping shared by muxer implementations.
#[derive(Clone, Debug)]
pub(crate) struct MuxTimeline {
    cfg: MuxConfig,
    held: Duration,
    frames: u64,
    last_frame_start: Option<u64>,
    narration: Vec<AudioSegment>,
    music: Option<AudioPcm>,
}

impl MuxTimeline {
    pub(crate) fn new(cfg: MuxConfig) -> ReelResult<Self> {
        if cfg.sample_rate == 0 {
            return Err(ReelError::validation("mux sample_rate must be non-zero"));
        }
        Ok(Self {
            cfg,
            held: Duration::ZERO,
            frames: 0,
            last_frame_start: None,
            narration: Vec::new(),
            music: None,
        })
    }

    pub(crate) fn config(&self) -> &MuxConfig {
        &self.cfg
    }

    pub(crate) fn check_frame(&self, frame: &FrameRGBA) -> ReelResult<()> {
        let res = self.cfg.resolution;
        if frame.width != res.width || frame.height != res.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, res.width, res.height
            )));
        }
        if frame.data.len() != res.rgba_len() {
            return Err(ReelError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }
        Ok(())
    }

    /// Advance by `hold`, returning how many frames to emit.
    ///
    /// Frame counts follow the cumulative held time (rounded once), so per-scene rounding never
    /// accumulates into drift.
    pub(crate) fn hold(&mut self, hold: Duration) -> u64 {
        self.held += hold;
        let target = self.cfg.fps.secs_to_frames_round(self.held.as_secs_f64());
        let n = target.saturating_sub(self.frames);
        self.last_frame_start = Some(self.frames);
        self.frames += n;
        n
    }

    pub(crate) fn place_narration(&mut self, clip: AudioPcm) -> ReelResult<()> {
        let start_frame = self.last_frame_start.ok_or_else(|| {
            ReelError::invalid_state("narration placed before any frame was submitted")
        })?;
        if clip.is_empty() {
            return Ok(());
        }
        let start_sample = secs_to_sample(
            self.cfg.fps.frames_to_secs(start_frame),
            self.cfg.sample_rate,
        );
        self.narration
            .push(AudioSegment::once(clip, start_sample, self.cfg.sample_rate));
        Ok(())
    }

    pub(crate) fn set_music(&mut self, track: AudioPcm) {
        self.music = (!track.is_empty()).then_some(track);
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frames
    }

    pub(crate) fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.cfg.fps.frames_to_secs(self.frames))
    }

    pub(crate) fn narration_starts(&self) -> Vec<u64> {
        self.narration
            .iter()
            .map(|s| s.timeline_start_sample)
            .collect()
    }

    /// Stereo audio timeline covering exactly the emitted video.
    pub(crate) fn manifest(&self) -> AudioManifest {
        let total_samples = secs_to_sample(
            self.cfg.fps.frames_to_secs(self.frames),
            self.cfg.sample_rate,
        );
        let mut segments = self.narration.clone();
        if let Some(music) = &self.music {
            segments.push(AudioSegment {
                timeline_start_sample: 0,
                timeline_end_sample: total_samples,
                volume: self.cfg.music_gain,
                fade_in_sec: 0.0,
                fade_out_sec: self.cfg.music_fade_out_secs,
                looped: true,
                source: music.clone(),
            });
        }
        AudioManifest {
            sample_rate: self.cfg.sample_rate,
            channels: 2,
            total_samples,
            segments,
        }
    }

    pub(crate) fn artifact(&self, location: PathBuf) -> Artifact {
        Artifact {
            location,
            suggested_filename: self.cfg.suggested_filename.clone(),
            duration: self.duration(),
            frame_count: self.frames,
        }
    }
}

/// Muxer that keeps everything in memory. Each distinct submitted frame is stored once with
/// its repeat count.
#[derive(Debug, Default)]
pub struct InMemoryMuxer {
    timeline: Option<MuxTimeline>,
    frames: Vec<(FrameRGBA, u64)>,
    mixed: Option<Vec<f32>>,
    aborted: bool,
}

impl InMemoryMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&MuxConfig> {
        self.timeline.as_ref().map(MuxTimeline::config)
    }

    /// Submitted frames with the number of video frames each produced.
    pub fn frames(&self) -> &[(FrameRGBA, u64)] {
        &self.frames
    }

    pub fn total_frames(&self) -> u64 {
        self.frames.iter().map(|(_, n)| n).sum()
    }

    /// Timeline sample at which each narration clip starts.
    pub fn narration_starts(&self) -> Vec<u64> {
        self.timeline
            .as_ref()
            .map(MuxTimeline::narration_starts)
            .unwrap_or_default()
    }

    /// Interleaved stereo mix produced by `finish`.
    pub fn mixed_audio(&self) -> Option<&[f32]> {
        self.mixed.as_deref()
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    fn timeline_mut(&mut self) -> ReelResult<&mut MuxTimeline> {
        self.timeline
            .as_mut()
            .ok_or_else(|| ReelError::invalid_state("muxer not started"))
    }
}

#[async_trait]
impl StreamMuxer for InMemoryMuxer {
    fn begin(&mut self, cfg: MuxConfig) -> ReelResult<()> {
        self.timeline = Some(MuxTimeline::new(cfg)?);
        self.frames.clear();
        self.mixed = None;
        self.aborted = false;
        Ok(())
    }

    async fn submit_frame(&mut self, frame: &FrameRGBA, hold: Duration) -> ReelResult<u64> {
        let timeline = self.timeline_mut()?;
        timeline.check_frame(frame)?;
        let n = timeline.hold(hold);
        self.frames.push((frame.clone(), n));
        Ok(n)
    }

    fn place_narration(&mut self, clip: AudioPcm) -> ReelResult<()> {
        self.timeline_mut()?.place_narration(clip)
    }

    fn mix_audio(&mut self, track: AudioPcm) -> ReelResult<()> {
        self.timeline_mut()?.set_music(track);
        Ok(())
    }

    async fn finish(&mut self) -> ReelResult<Artifact> {
        let timeline = self.timeline_mut()?;
        if timeline.frame_count() == 0 {
            return Err(ReelError::empty_sequence("no frames were submitted"));
        }
        let mixed = crate::audio::mix::mix_manifest(&timeline.manifest());
        let artifact = timeline.artifact(PathBuf::from("memory").join(&timeline.config().suggested_filename));
        self.mixed = Some(mixed);
        Ok(artifact)
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.mixed = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/muxer.rs"]
mod tests;
