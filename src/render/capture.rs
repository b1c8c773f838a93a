use std::time::Duration;

use async_trait::async_trait;

use crate::assets::decode::PreparedImage;
use crate::assets::source::ImageSource;
use crate::compose::compositor::FrameCompositor;
use crate::encode::muxer::StreamMuxer;
use crate::foundation::core::ProgressUpdate;
use crate::foundation::error::ReelResult;
use crate::model::project::StyleTag;
use crate::model::scene::Scene;
use crate::narration::voice::VoiceType;
use crate::sequence::sequencer::{SceneVisitor, Visit, VisitContext};

/// Share of the progress range spent capturing scenes; the rest covers audio and finishing.
pub const CAPTURE_PROGRESS_SPAN: f32 = 90.0;

/// Counters for degraded scenes in one render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Scenes drawn on the style gradient because their image was absent or unusable.
    pub placeholders: usize,
    /// Scenes rendered without narration audio.
    pub silent_scenes: usize,
}

/// Render capture: composite each scene, synthesize its narration, and hold the frame for
/// `max(authored duration, narration length)`. Runs as fast as the work allows.
pub struct CaptureVisitor<'a> {
    compositor: &'a FrameCompositor,
    images: &'a dyn ImageSource,
    muxer: &'a mut dyn StreamMuxer,
    style: StyleTag,
    voice: VoiceType,
    progress: &'a mut (dyn FnMut(ProgressUpdate) + Send),
    last_percent: f32,
    stats: CaptureStats,
}

impl<'a> CaptureVisitor<'a> {
    pub fn new(
        compositor: &'a FrameCompositor,
        images: &'a dyn ImageSource,
        muxer: &'a mut dyn StreamMuxer,
        style: StyleTag,
        voice: VoiceType,
        progress: &'a mut (dyn FnMut(ProgressUpdate) + Send),
    ) -> Self {
        Self {
            compositor,
            images,
            muxer,
            style,
            voice,
            progress,
            last_percent: 0.0,
            stats: CaptureStats::default(),
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn last_percent(&self) -> f32 {
        self.last_percent
    }
}

async fn background(
    images: &dyn ImageSource,
    compositor: &FrameCompositor,
    index: usize,
    scene: &Scene,
) -> Option<PreparedImage> {
    let url = scene.image_url.as_deref()?;
    let prepared = match images.fetch(url).await {
        Ok(bytes) => compositor.prepare_background(&bytes),
        Err(err) => Err(err),
    };
    match prepared {
        Ok(img) => Some(img),
        Err(err) => {
            tracing::warn!(scene = index, url, error = %err, "scene image unavailable; using placeholder");
            None
        }
    }
}

#[async_trait]
impl SceneVisitor for CaptureVisitor<'_> {
    async fn visit(&mut self, cx: VisitContext<'_>) -> ReelResult<Visit> {
        let VisitContext {
            index,
            total,
            scene,
            narrator,
            cancel,
            ..
        } = cx;

        let image = tokio::select! {
            _ = cancel.cancelled() => return Ok(Visit::Cancelled),
            img = background(self.images, self.compositor, index, scene) => img,
        };
        let frame = match self.compositor.compose(scene, &self.style, image.as_ref()) {
            Ok(frame) => {
                if image.is_none() {
                    self.stats.placeholders += 1;
                }
                frame
            }
            Err(err) => {
                tracing::warn!(scene = index, error = %err, "compositing failed; using placeholder frame");
                self.stats.placeholders += 1;
                self.compositor.placeholder(scene, &self.style)
            }
        };

        let clip = if scene.has_narration_text() {
            let synthesized = tokio::select! {
                _ = cancel.cancelled() => return Ok(Visit::Cancelled),
                r = narrator.synthesize(&scene.text, self.voice) => r,
            };
            match synthesized {
                Ok(clip) => Some(clip),
                Err(err) => {
                    tracing::warn!(scene = index, error = %err, "narration synthesis failed; scene will be silent");
                    None
                }
            }
        } else {
            None
        };
        if clip.is_none() {
            self.stats.silent_scenes += 1;
        }

        if cancel.is_cancelled() {
            return Ok(Visit::Cancelled);
        }

        let spoken = clip.as_ref().map_or(Duration::ZERO, |c| c.duration());
        let dwell = scene.min_dwell().max(spoken);
        let frames = tokio::select! {
            _ = cancel.cancelled() => return Ok(Visit::Cancelled),
            r = self.muxer.submit_frame(&frame, dwell) => r?,
        };
        if let Some(clip) = clip {
            self.muxer.place_narration(clip)?;
        }

        let percent = CAPTURE_PROGRESS_SPAN * (index + 1) as f32 / total.max(1) as f32;
        self.last_percent = percent;
        (self.progress)(ProgressUpdate::new(
            percent,
            format!("composited scene {}/{}", index + 1, total),
        ));
        tracing::debug!(
            scene = index,
            frames,
            dwell_ms = dwell.as_millis() as u64,
            "scene captured"
        );
        Ok(Visit::Dwelled(dwell))
    }
}
