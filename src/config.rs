//! Engine configuration.
//!
//! All fields have defaults, so an empty JSON object (`{}`) is a valid configuration file. The CLI
//! layers its flags over whatever [`EngineConfig::from_json_file`] returns.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{Fps, Resolution};
use crate::foundation::error::{ReelError, ReelResult};

/// Settings shared by preview, compositing, and muxing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Base caption size; long captions shrink from here before they are truncated.
    pub caption_font_size_px: f32,
    /// Background music gain relative to narration (which plays at 1.0).
    pub music_gain: f32,
    pub music_fade_out_secs: f64,
    /// Root directory of the fixed music catalog.
    pub music_dir: PathBuf,
    /// Where rendered artifacts are written.
    pub output_dir: PathBuf,
    pub speech: SpeechConfig,
}

/// Programs used by the command-line narration synthesizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeechConfig {
    /// Text-to-speech program (`espeak-ng` compatible flags).
    pub synth_program: String,
    /// Audio player used for audible preview (`ffplay` compatible flags).
    pub player_program: String,
    pub words_per_minute: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            synth_program: "espeak-ng".to_string(),
            player_program: "ffplay".to_string(),
            words_per_minute: 165,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: Resolution::HD_720.width,
            height: Resolution::HD_720.height,
            fps: 30,
            caption_font_size_px: 40.0,
            music_gain: 0.18,
            music_fade_out_secs: 1.5,
            music_dir: PathBuf::from("music"),
            output_dir: PathBuf::from("renders"),
            speech: SpeechConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> ReelResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read engine config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ReelResult<()> {
        let res = self.resolution()?;
        if !res.width.is_multiple_of(2) || !res.height.is_multiple_of(2) {
            // Output targets yuv420p.
            return Err(ReelError::validation(
                "width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        self.frame_rate()?;
        if !self.caption_font_size_px.is_finite() || self.caption_font_size_px <= 0.0 {
            return Err(ReelError::validation(
                "caption_font_size_px must be finite and > 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.music_gain) {
            return Err(ReelError::validation("music_gain must be within [0, 1]"));
        }
        if !self.music_fade_out_secs.is_finite() || self.music_fade_out_secs < 0.0 {
            return Err(ReelError::validation(
                "music_fade_out_secs must be finite and >= 0",
            ));
        }
        if self.speech.words_per_minute == 0 {
            return Err(ReelError::validation("speech.words_per_minute must be > 0"));
        }
        Ok(())
    }

    pub fn resolution(&self) -> ReelResult<Resolution> {
        Resolution::new(self.width, self.height)
    }

    pub fn frame_rate(&self) -> ReelResult<Fps> {
        Fps::new(self.fps)
    }
}
