use async_trait::async_trait;

use crate::foundation::error::ReelResult;
use crate::model::project::StyleTag;
use crate::model::scene::SceneId;
use crate::model::workspace::ProjectHandle;

/// Produces narration script text. Consumed once, before scenes exist.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Failures are [`crate::ReelError::Generation`].
    async fn generate_script(
        &self,
        topic: &str,
        script_type: &str,
        duration_secs: u32,
    ) -> ReelResult<String>;
}

/// Produces a still image for a prompt and returns a reference usable as `image_url`.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Failures are [`crate::ReelError::Generation`].
    async fn generate_image(&self, prompt: &str, style: &StyleTag) -> ReelResult<String>;
}

/// Outcome of [`populate_scene_images`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageFill {
    pub generated: Vec<SceneId>,
    pub failed: Vec<SceneId>,
}

/// Generate images for scenes that have none, one scene at a time.
///
/// Generation failures leave the image absent (the compositor falls back to a placeholder) and
/// are only logged. Scenes removed or locked by a render in the meantime are skipped.
pub async fn populate_scene_images(
    handle: &ProjectHandle,
    generator: &dyn ImageGenerator,
) -> ImageFill {
    let (style, pending): (StyleTag, Vec<(SceneId, String)>) = handle.read(|p| {
        let pending = p
            .scenes()
            .iter()
            .filter(|s| s.image_url.is_none())
            .map(|s| (s.id, s.text.clone()))
            .collect();
        (p.style.clone(), pending)
    });

    let mut fill = ImageFill::default();
    for (id, prompt) in pending {
        match generator.generate_image(&prompt, &style).await {
            Ok(url) => match handle.edit(|p| p.set_scene_image(id, Some(url))) {
                Ok(()) => fill.generated.push(id),
                Err(err) => {
                    tracing::debug!(scene = %id, error = %err, "generated image discarded");
                }
            },
            Err(err) => {
                tracing::warn!(scene = %id, error = %err, "image generation failed; scene keeps a placeholder");
                fill.failed.push(id);
            }
        }
    }
    fill
}
