use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::*;
use crate::assets::media::write_wav;
use crate::compose::caption::CaptionRenderer;
use crate::encode::muxer::InMemoryMuxer;
use crate::foundation::core::{FrameRGBA, Resolution};
use crate::foundation::error::ReelError;
use crate::model::project::{Project, ProjectStatus, StyleTag};
use crate::model::scene::Scene;
use crate::narration::scripted::ScriptedSynthesizer;
use crate::sequence::clock::TokioClock;
use crate::sequence::sequencer::SceneSequencer;

struct MapImages(HashMap<String, Vec<u8>>);

#[async_trait]
impl ImageSource for MapImages {
    async fn fetch(&self, url: &str) -> ReelResult<Vec<u8>> {
        self.0
            .get(url)
            .cloned()
            .ok_or_else(|| ReelError::generation(format!("no image at {url}")))
    }
}

/// Blocks every fetch until the gate is opened.
struct GatedImages(Arc<Notify>);

#[async_trait]
impl ImageSource for GatedImages {
    async fn fetch(&self, _url: &str) -> ReelResult<Vec<u8>> {
        self.0.notified().await;
        Err(ReelError::generation("gate opened without an image"))
    }
}

struct BrokenMuxer {
    aborted: bool,
}

#[async_trait]
impl StreamMuxer for BrokenMuxer {
    fn begin(&mut self, _cfg: MuxConfig) -> ReelResult<()> {
        Ok(())
    }

    async fn submit_frame(&mut self, _frame: &FrameRGBA, _hold: Duration) -> ReelResult<u64> {
        Err(ReelError::encode("encoder pipe closed"))
    }

    fn place_narration(&mut self, _clip: AudioPcm) -> ReelResult<()> {
        Ok(())
    }

    fn mix_audio(&mut self, _track: AudioPcm) -> ReelResult<()> {
        Ok(())
    }

    async fn finish(&mut self) -> ReelResult<Artifact> {
        Err(ReelError::encode("unreachable"))
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

/// An encoder whose pipe never drains: every frame write waits forever.
struct StalledMuxer {
    writing: Arc<Notify>,
    aborted: bool,
}

#[async_trait]
impl StreamMuxer for StalledMuxer {
    fn begin(&mut self, _cfg: MuxConfig) -> ReelResult<()> {
        Ok(())
    }

    async fn submit_frame(&mut self, _frame: &FrameRGBA, _hold: Duration) -> ReelResult<u64> {
        self.writing.notify_one();
        std::future::pending().await
    }

    fn place_narration(&mut self, _clip: AudioPcm) -> ReelResult<()> {
        Ok(())
    }

    fn mix_audio(&mut self, _track: AudioPcm) -> ReelResult<()> {
        Ok(())
    }

    async fn finish(&mut self) -> ReelResult<Artifact> {
        Err(ReelError::encode("unreachable"))
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(16, 9, image::Rgba([10, 200, 30, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn test_config() -> EngineConfig {
    EngineConfig {
        width: 64,
        height: 36,
        ..EngineConfig::default()
    }
}

fn orchestrator_with(images: Arc<dyn ImageSource>, music_dir: &std::path::Path) -> RenderOrchestrator {
    let cfg = test_config();
    let compositor = FrameCompositor::new(
        Resolution::new(cfg.width, cfg.height).unwrap(),
        12.0,
        Arc::new(CaptionRenderer::with_fontdb(
            usvg::fontdb::Database::new(),
        )),
    );
    RenderOrchestrator::new(cfg, compositor, images, MusicCatalog::new(music_dir))
}

fn orchestrator(images: Arc<dyn ImageSource>) -> RenderOrchestrator {
    orchestrator_with(images, std::path::Path::new("/nonexistent-music"))
}

fn handle(synth: &ScriptedSynthesizer, scenes: Vec<Scene>) -> Arc<ProjectHandle> {
    let mut project = Project::new("Ocean Story");
    for scene in scenes {
        project.add_scene(scene).unwrap();
    }
    ProjectHandle::new(
        project,
        SceneSequencer::new(Arc::new(synth.clone()), Arc::new(TokioClock)),
    )
}

#[tokio::test]
async fn artifact_duration_is_the_sum_of_effective_dwells() {
    let synth = ScriptedSynthesizer::new().with_duration("one", Duration::from_secs(5));
    let h = handle(&synth, vec![Scene::new("one", 3.0), Scene::new("two", 4.0)]);
    let orch = orchestrator(Arc::new(MapImages(HashMap::new())));
    let mut muxer = InMemoryMuxer::new();
    let mut updates = Vec::new();
    let mut on_progress = |u: ProgressUpdate| updates.push(u);

    let artifact = orch
        .render_with(&h, &mut muxer, &mut on_progress)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(artifact.frame_count, 270);
    assert_eq!(artifact.duration, Duration::from_secs(9));
    assert_eq!(artifact.suggested_filename, "ocean-story.mp4");
    assert_eq!(muxer.total_frames(), 270);
    assert_eq!(muxer.narration_starts(), vec![0, u64::from(MIX_SAMPLE_RATE) * 5]);
    assert!(muxer.mixed_audio().is_some());

    assert_eq!(h.status(), ProjectStatus::Complete);
    assert_eq!(
        h.read(|p| p.video_url.clone()).as_deref(),
        Some(artifact.location.display().to_string().as_str())
    );

    let percents: Vec<f32> = updates.iter().map(|u| u.percent).collect();
    assert_eq!(percents, vec![0.0, 45.0, 90.0, 95.0, 100.0]);
    assert_eq!(updates.last().unwrap().phase, "complete");
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn missing_images_fall_back_to_placeholders() {
    let synth = ScriptedSynthesizer::new();
    let scenes = vec![
        Scene::new("a", 2.0).with_image("gone-1.png"),
        Scene::new("b", 2.0),
        Scene::new("c", 2.0).with_image("ok.png"),
    ];
    let style = StyleTag::default();
    let h = handle(&synth, scenes.clone());
    let images = MapImages(HashMap::from([("ok.png".to_string(), png_bytes())]));
    let orch = orchestrator(Arc::new(images));
    let mut muxer = InMemoryMuxer::new();

    let artifact = orch
        .render_with(&h, &mut muxer, &mut |_| {})
        .await
        .unwrap();

    assert!(artifact.is_some());
    let frames = muxer.frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].0, orch.compositor().placeholder(&scenes[0], &style));
    assert_eq!(frames[1].0, orch.compositor().placeholder(&scenes[1], &style));
    assert_ne!(frames[2].0, orch.compositor().placeholder(&scenes[2], &style));
    assert!(frames.iter().all(|(f, _)| f.resolution() == frames[0].0.resolution()));
}

#[tokio::test]
async fn narration_failure_keeps_the_authored_duration() {
    let synth = ScriptedSynthesizer::new()
        .with_duration("loud", Duration::from_secs(6))
        .failing("loud");
    let h = handle(&synth, vec![Scene::new("loud", 3.0)]);
    let orch = orchestrator(Arc::new(MapImages(HashMap::new())));
    let mut muxer = InMemoryMuxer::new();

    let artifact = orch
        .render_with(&h, &mut muxer, &mut |_| {})
        .await
        .unwrap()
        .unwrap();

    assert_eq!(artifact.duration, Duration::from_secs(3));
    assert!(muxer.narration_starts().is_empty());
}

#[tokio::test]
async fn empty_project_fails_without_changing_status() {
    let synth = ScriptedSynthesizer::new();
    let h = handle(&synth, Vec::new());
    let orch = orchestrator(Arc::new(MapImages(HashMap::new())));
    let mut muxer = InMemoryMuxer::new();
    let mut called = false;

    let err = orch
        .render_with(&h, &mut muxer, &mut |_| called = true)
        .await
        .unwrap_err();

    assert!(matches!(err, ReelError::EmptySequence(_)));
    assert_eq!(h.status(), ProjectStatus::Draft);
    assert!(muxer.config().is_none());
    assert!(!called);
}

#[tokio::test]
async fn rendering_during_preview_is_rejected_and_status_restored() {
    let synth = ScriptedSynthesizer::new();
    let h = handle(&synth, vec![Scene::new("a", 2.0)]);
    let orch = orchestrator(Arc::new(MapImages(HashMap::new())));
    let preview = h.sequencer().begin().unwrap();

    let err = orch
        .render_with(&h, &mut InMemoryMuxer::new(), &mut |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, ReelError::InvalidState(_)));
    assert_eq!(h.status(), ProjectStatus::Ready);
    drop(preview);
}

#[tokio::test(start_paused = true)]
async fn concurrent_render_is_rejected_while_first_proceeds() {
    let synth = ScriptedSynthesizer::new();
    let h = handle(&synth, vec![Scene::new("a", 2.0).with_image("slow.png")]);
    let gate = Arc::new(Notify::new());
    let orch = orchestrator(Arc::new(GatedImages(Arc::clone(&gate))));
    let mut first_muxer = InMemoryMuxer::new();
    let mut first_progress = |_: ProgressUpdate| {};

    let (first, second) = tokio::join!(
        orch.render_with(&h, &mut first_muxer, &mut first_progress),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut muxer = InMemoryMuxer::new();
            let second = orch.render_with(&h, &mut muxer, &mut |_| {}).await;
            assert_eq!(h.status(), ProjectStatus::Rendering);
            gate.notify_one();
            second
        }
    );

    assert!(matches!(second.unwrap_err(), ReelError::InvalidState(_)));
    assert!(first.unwrap().is_some());
    assert_eq!(h.status(), ProjectStatus::Complete);
    assert_eq!(first_muxer.frames().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_render_yields_no_artifact() {
    let synth = ScriptedSynthesizer::new();
    let h = handle(
        &synth,
        vec![Scene::new("a", 2.0), Scene::new("b", 2.0).with_image("never.png")],
    );
    let orch = orchestrator(Arc::new(GatedImages(Arc::new(Notify::new()))));
    let mut muxer = InMemoryMuxer::new();
    let mut updates = Vec::new();
    let mut on_progress = |u: ProgressUpdate| updates.push(u);

    let (result, cancelled) = tokio::join!(
        orch.render_with(&h, &mut muxer, &mut on_progress),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            orch.cancel_render(&h)
        }
    );

    assert!(cancelled);
    assert!(result.unwrap().is_none());
    assert!(muxer.was_aborted());
    assert_eq!(h.status(), ProjectStatus::Ready);
    assert!(h.read(|p| p.video_url.is_none()));
    assert!(updates.iter().all(|u| u.percent < 100.0));
    assert!(!h.sequencer().state().is_playing());
    assert!(!orch.cancel_render(&h));
}

#[tokio::test]
async fn cancel_lands_while_a_frame_is_being_written() {
    let synth = ScriptedSynthesizer::new();
    let h = handle(&synth, vec![Scene::new("a", 15.0), Scene::new("b", 2.0)]);
    let orch = orchestrator(Arc::new(MapImages(HashMap::new())));
    let writing = Arc::new(Notify::new());
    let mut muxer = StalledMuxer {
        writing: Arc::clone(&writing),
        aborted: false,
    };
    let mut on_progress = |_: ProgressUpdate| {};

    let (result, cancelled) = tokio::join!(
        orch.render_with(&h, &mut muxer, &mut on_progress),
        async {
            writing.notified().await;
            orch.cancel_render(&h)
        }
    );

    assert!(cancelled);
    assert!(result.unwrap().is_none());
    assert!(muxer.aborted);
    assert_eq!(h.status(), ProjectStatus::Ready);
    assert!(!h.sequencer().state().is_playing());
}

#[tokio::test]
async fn muxing_failure_reverts_to_ready_and_reports_failed_phase() {
    let synth = ScriptedSynthesizer::new();
    let h = handle(&synth, vec![Scene::new("a", 2.0)]);
    let orch = orchestrator(Arc::new(MapImages(HashMap::new())));
    let mut muxer = BrokenMuxer { aborted: false };
    let mut updates = Vec::new();
    let mut on_progress = |u: ProgressUpdate| updates.push(u);

    let err = orch
        .render_with(&h, &mut muxer, &mut on_progress)
        .await
        .unwrap_err();

    assert!(matches!(err, ReelError::Encode(_)));
    assert!(muxer.aborted);
    assert_eq!(h.status(), ProjectStatus::Ready);
    assert_eq!(updates.last().unwrap().phase, "failed");
    assert!(!h.sequencer().state().is_playing());
}

#[tokio::test]
async fn edits_after_render_start_do_not_reach_the_artifact() {
    let synth = ScriptedSynthesizer::new();
    let h = handle(&synth, vec![Scene::new("a", 2.0)]);
    let orch = orchestrator(Arc::new(MapImages(HashMap::new())));
    let mut muxer = InMemoryMuxer::new();
    let h2 = Arc::clone(&h);
    let mut rejected = None;
    let mut on_progress = |u: ProgressUpdate| {
        if u.percent == 0.0 {
            rejected = Some(h2.edit(|p| p.add_scene(Scene::new("late", 2.0))).is_err());
        }
    };

    let artifact = orch
        .render_with(&h, &mut muxer, &mut on_progress)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(rejected, Some(true));
    assert_eq!(artifact.duration, Duration::from_secs(2));
    assert_eq!(h.read(|p| p.scenes().len()), 1);
}

#[tokio::test]
async fn background_music_is_mixed_under_the_whole_render() {
    let dir = tempfile::tempdir().unwrap();
    let music = AudioPcm::new(MIX_SAMPLE_RATE, 2, vec![0.5; MIX_SAMPLE_RATE as usize * 2]).unwrap();
    write_wav(&music, &dir.path().join("calm-piano.wav")).unwrap();

    let synth = ScriptedSynthesizer::new();
    let h = handle(&synth, vec![Scene::new("", 4.0)]);
    h.edit(|p| {
        p.music_track = Some("calm-piano".to_string());
        Ok(())
    })
    .unwrap();
    let orch = orchestrator_with(Arc::new(MapImages(HashMap::new())), dir.path());
    let mut muxer = InMemoryMuxer::new();

    orch.render_with(&h, &mut muxer, &mut |_| {})
        .await
        .unwrap()
        .unwrap();

    let mixed = muxer.mixed_audio().unwrap();
    assert_eq!(mixed.len(), MIX_SAMPLE_RATE as usize * 4 * 2);
    // Looped past the one-second source, before the fade-out.
    let at = MIX_SAMPLE_RATE as usize * 2 * 2 + 10;
    assert!((mixed[at] - 0.5 * 0.18).abs() < 1e-3);
}

#[tokio::test]
async fn unavailable_music_does_not_fail_the_render() {
    let synth = ScriptedSynthesizer::new();
    let h = handle(&synth, vec![Scene::new("a", 2.0)]);
    h.edit(|p| {
        p.music_track = Some("calm-piano".to_string());
        Ok(())
    })
    .unwrap();
    let orch = orchestrator(Arc::new(MapImages(HashMap::new())));
    let mut muxer = InMemoryMuxer::new();

    let artifact = orch.render_with(&h, &mut muxer, &mut |_| {}).await.unwrap();
    assert!(artifact.is_some());
    assert_eq!(h.status(), ProjectStatus::Complete);
}
