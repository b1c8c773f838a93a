use std::sync::Arc;

use crate::assets::media::{AudioPcm, MIX_SAMPLE_RATE};
use crate::assets::music::MusicCatalog;
use crate::assets::source::{ImageSource, RoutingImageSource};
use crate::compose::compositor::FrameCompositor;
use crate::config::EngineConfig;
use crate::encode::ffmpeg::{FfmpegMuxer, FfmpegMuxerOpts};
use crate::encode::muxer::{Artifact, MuxConfig, StreamMuxer};
use crate::foundation::core::ProgressUpdate;
use crate::foundation::error::ReelResult;
use crate::model::project::ProjectSnapshot;
use crate::model::workspace::ProjectHandle;
use crate::render::capture::CaptureVisitor;
use crate::sequence::sequencer::{Traversal, TraversalOutcome};

const MIXED_PERCENT: f32 = 95.0;

/// Turns a project's scenes into a finished video.
///
/// A render claims the project's sequencer, so it is mutually exclusive with previews and with
/// other renders of the same project.
#[derive(Clone)]
pub struct RenderOrchestrator {
    cfg: EngineConfig,
    compositor: FrameCompositor,
    images: Arc<dyn ImageSource>,
    music: MusicCatalog,
}

impl RenderOrchestrator {
    pub fn new(
        cfg: EngineConfig,
        compositor: FrameCompositor,
        images: Arc<dyn ImageSource>,
        music: MusicCatalog,
    ) -> Self {
        Self {
            cfg,
            compositor,
            images,
            music,
        }
    }

    /// Orchestrator wired from config: system fonts, filesystem + HTTP images, `music_dir`.
    pub fn from_config(cfg: EngineConfig) -> ReelResult<Self> {
        cfg.validate()?;
        let compositor = FrameCompositor::from_config(&cfg)?;
        let images = Arc::new(RoutingImageSource::with_defaults("."));
        let music = MusicCatalog::new(cfg.music_dir.clone());
        Ok(Self::new(cfg, compositor, images, music))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    /// Render to an MP4 under `output_dir`.
    ///
    /// `Ok(None)` means the render was cancelled; no artifact exists in that case.
    pub async fn render(
        &self,
        handle: &ProjectHandle,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
    ) -> ReelResult<Option<Artifact>> {
        let mut muxer = FfmpegMuxer::new(FfmpegMuxerOpts::new(self.cfg.output_dir.clone()));
        self.render_with(handle, &mut muxer, on_progress).await
    }

    /// Render through an explicit muxer.
    ///
    /// Fails synchronously (before any work and without touching the project) with
    /// `InvalidState` when the project is rendering or previewing, and with `EmptySequence` when
    /// it has no scenes. Any later failure aborts the muxer, returns the project to `Ready`, and
    /// reports a `failed` phase.
    #[tracing::instrument(skip_all, fields(project = %handle.read(|p| p.id)))]
    pub async fn render_with(
        &self,
        handle: &ProjectHandle,
        muxer: &mut dyn StreamMuxer,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
    ) -> ReelResult<Option<Artifact>> {
        let (snapshot, traversal) = {
            let mut project = handle.lock();
            let (snapshot, prior) = project.begin_render()?;
            match handle.sequencer().begin() {
                Ok(traversal) => (snapshot, traversal),
                Err(err) => {
                    project.revert_render(prior);
                    return Err(err);
                }
            }
        };
        tracing::info!(
            scenes = snapshot.scenes.len(),
            style = snapshot.style.as_str(),
            "render started"
        );
        on_progress(ProgressUpdate::new(0.0, "starting"));

        let mut last_percent = 0.0;
        let result = self
            .capture(&snapshot, traversal, muxer, on_progress, &mut last_percent)
            .await;

        match result {
            Ok(Some(artifact)) => {
                handle
                    .lock()
                    .complete_render(artifact.location.display().to_string());
                on_progress(ProgressUpdate::new(100.0, "complete"));
                tracing::info!(
                    location = %artifact.location.display(),
                    frames = artifact.frame_count,
                    duration_ms = artifact.duration.as_millis() as u64,
                    "render complete"
                );
                Ok(Some(artifact))
            }
            Ok(None) => {
                muxer.abort();
                handle.lock().abandon_render();
                tracing::info!("render cancelled");
                Ok(None)
            }
            Err(err) => {
                muxer.abort();
                handle.lock().abandon_render();
                on_progress(ProgressUpdate::new(last_percent, "failed"));
                tracing::warn!(error = %err, "render failed");
                Err(err)
            }
        }
    }

    /// Cancel the project's in-flight render (or preview). Returns `false` when nothing runs.
    pub fn cancel_render(&self, handle: &ProjectHandle) -> bool {
        handle.sequencer().cancel()
    }

    async fn capture(
        &self,
        snapshot: &ProjectSnapshot,
        traversal: Traversal,
        muxer: &mut dyn StreamMuxer,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
        last_percent: &mut f32,
    ) -> ReelResult<Option<Artifact>> {
        muxer.begin(MuxConfig::from_engine(
            &self.cfg,
            snapshot.suggested_filename.clone(),
        )?)?;

        let report = {
            let mut visitor = CaptureVisitor::new(
                &self.compositor,
                self.images.as_ref(),
                &mut *muxer,
                snapshot.style.clone(),
                snapshot.voice_type,
                &mut *on_progress,
            );
            let report = traversal.run(&snapshot.scenes, &mut visitor).await;
            *last_percent = visitor.last_percent();
            let stats = visitor.stats();
            if stats.placeholders > 0 || stats.silent_scenes > 0 {
                tracing::info!(
                    placeholders = stats.placeholders,
                    silent_scenes = stats.silent_scenes,
                    "render used fallbacks"
                );
            }
            report?
        };
        if report.outcome == TraversalOutcome::Cancelled {
            return Ok(None);
        }

        if let Some(track) = self.load_music(snapshot).await {
            muxer.mix_audio(track)?;
        }
        on_progress(ProgressUpdate::new(MIXED_PERCENT, "mixing audio"));
        *last_percent = MIXED_PERCENT;

        muxer.finish().await.map(Some)
    }

    async fn load_music(&self, snapshot: &ProjectSnapshot) -> Option<AudioPcm> {
        let id = snapshot.music_track.clone()?;
        let catalog = self.music.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            let pcm = catalog.load(&id, MIX_SAMPLE_RATE);
            (id, pcm)
        })
        .await;
        match loaded {
            Ok((_, Ok(pcm))) => Some(pcm),
            Ok((id, Err(err))) => {
                tracing::warn!(track = %id, error = %err, "background music unavailable; rendering without it");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "music decode task failed; rendering without music");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/orchestrator.rs"]
mod tests;
