use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{ReelError, ReelResult};
use crate::model::scene::{Scene, SceneId, clamp_scene_duration};
use crate::narration::voice::VoiceType;
use crate::script::parse::SceneDraft;

/// Render lifecycle of a project.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Ready,
    Rendering,
    Complete,
}

/// Visual style tag chosen for a project (e.g. `cinematic`, `watercolor`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleTag(pub String);

impl StyleTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StyleTag {
    fn default() -> Self {
        Self::new("cinematic")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: uuid::Uuid,
    pub title: String,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub style: StyleTag,
    #[serde(default)]
    scenes: Vec<Scene>,
    #[serde(default)]
    pub voice_type: VoiceType,
    /// Identifier into the fixed music catalog.
    #[serde(default)]
    pub music_track: Option<String>,
    /// Reference to the last rendered artifact.
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    status: ProjectStatus,
}

impl Project {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            title: title.into(),
            script: None,
            style: StyleTag::default(),
            scenes: Vec::new(),
            voice_type: VoiceType::default(),
            music_track: None,
            video_url: None,
            status: ProjectStatus::Draft,
        }
    }

    pub fn from_json(bytes: &[u8]) -> ReelResult<Self> {
        let mut project: Self = serde_json::from_slice(bytes)?;
        project.validate()?;
        // A persisted "rendering" status is stale; no render survives the process.
        if project.status == ProjectStatus::Rendering {
            project.status = ProjectStatus::Ready;
        }
        project.refresh_status();
        Ok(project)
    }

    pub fn to_json_pretty(&self) -> ReelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ReelResult<()> {
        let mut seen = std::collections::HashSet::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            scene.validate()?;
            if !seen.insert(scene.id) {
                return Err(ReelError::validation(format!(
                    "duplicate scene id {}",
                    scene.id
                )));
            }
        }
        Ok(())
    }

    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn add_scene(&mut self, scene: Scene) -> ReelResult<SceneId> {
        self.ensure_editable()?;
        scene.validate()?;
        if self.scene(scene.id).is_some() {
            return Err(ReelError::validation(format!(
                "scene id {} already exists in project",
                scene.id
            )));
        }
        let id = scene.id;
        self.scenes.push(scene);
        self.mark_edited();
        Ok(id)
    }

    pub fn update_scene_text(&mut self, id: SceneId, text: impl Into<String>) -> ReelResult<()> {
        let scene = self.scene_mut(id)?;
        scene.text = text.into();
        // Cached narration no longer matches the text.
        scene.narration_audio = None;
        self.mark_edited();
        Ok(())
    }

    /// Set the authored duration, clamped into the allowed range.
    pub fn set_scene_duration(&mut self, id: SceneId, secs: f64) -> ReelResult<f64> {
        let scene = self.scene_mut(id)?;
        scene.duration_seconds = clamp_scene_duration(secs);
        let clamped = scene.duration_seconds;
        self.mark_edited();
        Ok(clamped)
    }

    pub fn set_scene_image(&mut self, id: SceneId, url: Option<String>) -> ReelResult<()> {
        let scene = self.scene_mut(id)?;
        scene.image_url = url;
        self.mark_edited();
        Ok(())
    }

    pub fn remove_scene(&mut self, id: SceneId) -> ReelResult<Scene> {
        self.ensure_editable()?;
        let idx = self
            .scenes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ReelError::validation(format!("unknown scene id {id}")))?;
        let removed = self.scenes.remove(idx);
        self.mark_edited();
        Ok(removed)
    }

    /// Replace all scenes with freshly parsed drafts, in draft order.
    pub fn replace_scenes_from_drafts(&mut self, drafts: Vec<SceneDraft>) -> ReelResult<()> {
        self.ensure_editable()?;
        self.scenes = drafts
            .into_iter()
            .map(|d| Scene::new(d.text, d.duration_seconds))
            .collect();
        self.mark_edited();
        Ok(())
    }

    /// `<slug-of-title>.mp4`.
    pub fn suggested_filename(&self) -> String {
        suggested_filename(&self.title)
    }

    /// Immutable view of everything a render or preview needs.
    ///
    /// Authored durations are re-validated here: out-of-range values (for example from a
    /// hand-edited project file) are clamped and logged rather than trusted.
    pub fn snapshot(&self) -> ProjectSnapshot {
        let scenes: Vec<Scene> = self
            .scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| {
                let clamped = clamp_scene_duration(scene.duration_seconds);
                if clamped != scene.duration_seconds {
                    tracing::warn!(
                        scene = index,
                        authored = scene.duration_seconds,
                        clamped,
                        "scene duration out of range; clamping"
                    );
                }
                Scene {
                    duration_seconds: clamped,
                    ..scene.clone()
                }
            })
            .collect();

        ProjectSnapshot {
            project_id: self.id,
            title: self.title.clone(),
            style: self.style.clone(),
            voice_type: self.voice_type,
            music_track: self.music_track.clone(),
            suggested_filename: self.suggested_filename(),
            scenes: scenes.into(),
        }
    }

    pub(crate) fn begin_render(&mut self) -> ReelResult<(ProjectSnapshot, ProjectStatus)> {
        if self.status == ProjectStatus::Rendering {
            return Err(ReelError::invalid_state(format!(
                "project '{}' is already rendering",
                self.title
            )));
        }
        if self.scenes.is_empty() {
            return Err(ReelError::empty_sequence(format!(
                "project '{}' has no scenes to render",
                self.title
            )));
        }
        let prior = self.status;
        self.status = ProjectStatus::Rendering;
        Ok((self.snapshot(), prior))
    }

    /// Undo `begin_render` when the render could not actually start.
    pub(crate) fn revert_render(&mut self, prior: ProjectStatus) {
        if self.status == ProjectStatus::Rendering {
            self.status = prior;
        }
    }

    pub(crate) fn complete_render(&mut self, video_url: String) {
        self.video_url = Some(video_url);
        self.status = ProjectStatus::Complete;
    }

    pub(crate) fn abandon_render(&mut self) {
        self.status = ProjectStatus::Ready;
        self.refresh_status();
    }

    fn scene_mut(&mut self, id: SceneId) -> ReelResult<&mut Scene> {
        self.ensure_editable()?;
        self.scenes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ReelError::validation(format!("unknown scene id {id}")))
    }

    fn ensure_editable(&self) -> ReelResult<()> {
        if self.status == ProjectStatus::Rendering {
            return Err(ReelError::invalid_state(
                "scenes cannot be edited while the project is rendering",
            ));
        }
        Ok(())
    }

    fn mark_edited(&mut self) {
        if self.status == ProjectStatus::Complete {
            self.status = ProjectStatus::Ready;
        }
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        self.status = match (self.status, self.scenes.is_empty()) {
            (ProjectStatus::Rendering, _) => ProjectStatus::Rendering,
            (ProjectStatus::Complete, false) => ProjectStatus::Complete,
            (_, true) => ProjectStatus::Draft,
            (_, false) => ProjectStatus::Ready,
        };
    }
}

/// Read-only copy of a project taken when a render or preview starts.
///
/// Mutating the live project afterwards does not affect the snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectSnapshot {
    pub project_id: uuid::Uuid,
    pub title: String,
    pub style: StyleTag,
    pub voice_type: VoiceType,
    pub music_track: Option<String>,
    pub suggested_filename: String,
    pub scenes: Arc<[Scene]>,
}

pub(crate) fn suggested_filename(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("video");
    }
    format!("{slug}.mp4")
}

#[cfg(test)]
#[path = "../../tests/unit/model/project.rs"]
mod tests;
