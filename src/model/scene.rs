use serde::{Deserialize, Serialize};

use crate::foundation::error::{ReelError, ReelResult};

/// Shortest authored dwell time for a scene, in seconds.
pub const SCENE_MIN_SECS: f64 = 2.0;
/// Longest authored dwell time for a scene, in seconds.
pub const SCENE_MAX_SECS: f64 = 15.0;

/// Clamp an authored duration into `[SCENE_MIN_SECS, SCENE_MAX_SECS]`.
///
/// Non-finite input collapses to the minimum.
pub fn clamp_scene_duration(secs: f64) -> f64 {
    if !secs.is_finite() {
        return SCENE_MIN_SECS;
    }
    secs.clamp(SCENE_MIN_SECS, SCENE_MAX_SECS)
}

/// Opaque scene identifier, unique within a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub uuid::Uuid);

impl SceneId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One narration-text + still-image + duration unit on the timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: SceneId,
    /// Narration text, also used as the caption.
    pub text: String,
    /// Rendered still image reference. `None` while generation is pending or after it failed.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Authored minimum dwell time in seconds.
    pub duration_seconds: f64,
    /// Cached narration audio reference, if one was produced earlier.
    #[serde(default)]
    pub narration_audio: Option<String>,
}

impl Scene {
    /// New scene with a fresh id; `duration_seconds` is clamped at this editing boundary.
    pub fn new(text: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            id: SceneId::new(),
            text: text.into(),
            image_url: None,
            duration_seconds: clamp_scene_duration(duration_seconds),
            narration_audio: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Authored duration as a [`std::time::Duration`].
    pub fn min_dwell(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(clamp_scene_duration(self.duration_seconds))
    }

    pub fn has_narration_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn validate(&self) -> ReelResult<()> {
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(ReelError::validation(format!(
                "scene {} duration must be finite and > 0",
                self.id
            )));
        }
        Ok(())
    }
}
