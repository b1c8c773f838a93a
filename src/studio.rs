use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::encode::muxer::Artifact;
use crate::foundation::core::ProgressUpdate;
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::project::{Project, ProjectSnapshot, ProjectStatus};
use crate::model::workspace::{ProjectHandle, Workspace};
use crate::narration::command::CommandSynthesizer;
use crate::narration::synth::NarrationSynthesizer;
use crate::render::orchestrator::RenderOrchestrator;
use crate::sequence::clock::{Clock, TokioClock};
use crate::sequence::preview::{PreviewEvent, PreviewVisitor};
use crate::sequence::sequencer::{Traversal, TraversalReport};

/// Entry point tying the current project to preview and render.
pub struct Studio {
    workspace: Workspace,
    narrator: Arc<dyn NarrationSynthesizer>,
    orchestrator: RenderOrchestrator,
}

impl Studio {
    pub fn new(
        project: Project,
        narrator: Arc<dyn NarrationSynthesizer>,
        clock: Arc<dyn Clock>,
        orchestrator: RenderOrchestrator,
    ) -> Self {
        Self {
            workspace: Workspace::new(project, Arc::clone(&narrator), clock),
            narrator,
            orchestrator,
        }
    }

    /// Studio backed by `espeak-ng`/`ffplay` narration and the system `ffmpeg`.
    pub async fn from_config(cfg: EngineConfig, project: Project) -> ReelResult<Self> {
        let narrator = Arc::new(CommandSynthesizer::detect(cfg.speech.clone()).await);
        let orchestrator = RenderOrchestrator::from_config(cfg)?;
        Ok(Self::new(project, narrator, Arc::new(TokioClock), orchestrator))
    }

    pub fn config(&self) -> &EngineConfig {
        self.orchestrator.config()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn narrator(&self) -> &Arc<dyn NarrationSynthesizer> {
        &self.narrator
    }

    pub fn orchestrator(&self) -> &RenderOrchestrator {
        &self.orchestrator
    }

    /// Start an audible preview of the current project in the background.
    ///
    /// Fails with `InvalidState` while the project is rendering or already previewing.
    pub fn start_preview(&self) -> ReelResult<JoinHandle<ReelResult<TraversalReport>>> {
        self.spawn_preview(None)
    }

    /// Like [`Studio::start_preview`], also reporting scene transitions on the returned channel.
    pub fn start_preview_with_events(
        &self,
    ) -> ReelResult<(
        JoinHandle<ReelResult<TraversalReport>>,
        mpsc::UnboundedReceiver<PreviewEvent>,
    )> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((self.spawn_preview(Some(tx))?, rx))
    }

    fn spawn_preview(
        &self,
        events: Option<mpsc::UnboundedSender<PreviewEvent>>,
    ) -> ReelResult<JoinHandle<ReelResult<TraversalReport>>> {
        let handle = self.workspace.current();
        let (snapshot, traversal) = {
            let project = handle.lock();
            if project.status() == ProjectStatus::Rendering {
                return Err(ReelError::invalid_state(
                    "cannot preview while the project is rendering",
                ));
            }
            (project.snapshot(), handle.sequencer().begin()?)
        };
        let mut visitor = PreviewVisitor::new(snapshot.voice_type);
        if let Some(tx) = events {
            visitor = visitor.with_events(tx);
        }
        Ok(tokio::spawn(run_preview(snapshot, traversal, visitor)))
    }

    /// Stop the current project's preview. A running render is left alone; use
    /// [`Studio::cancel_render`] for that.
    pub fn stop_preview(&self) -> bool {
        let handle = self.workspace.current();
        if handle.status() == ProjectStatus::Rendering {
            return false;
        }
        handle.sequencer().cancel()
    }

    /// Render the current project to an MP4 under `output_dir`.
    pub async fn render(
        &self,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
    ) -> ReelResult<Option<Artifact>> {
        let handle = self.workspace.current();
        self.orchestrator.render(&handle, on_progress).await
    }

    pub fn cancel_render(&self) -> bool {
        let handle = self.workspace.current();
        if handle.status() != ProjectStatus::Rendering {
            return false;
        }
        self.orchestrator.cancel_render(&handle)
    }

    pub fn current(&self) -> Arc<ProjectHandle> {
        self.workspace.current()
    }
}

#[tracing::instrument(skip_all, fields(project = %snapshot.project_id, scenes = snapshot.scenes.len()))]
async fn run_preview(
    snapshot: ProjectSnapshot,
    traversal: Traversal,
    mut visitor: PreviewVisitor,
) -> ReelResult<TraversalReport> {
    tracing::info!("preview started");
    let report = traversal.run(&snapshot.scenes, &mut visitor).await?;
    tracing::info!(
        outcome = ?report.outcome,
        total_ms = report.total().as_millis() as u64,
        "preview finished"
    );
    Ok(report)
}
