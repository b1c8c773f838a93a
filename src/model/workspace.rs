use std::sync::{Arc, Mutex, MutexGuard};

use crate::foundation::error::ReelResult;
use crate::model::project::{Project, ProjectSnapshot, ProjectStatus};
use crate::narration::synth::{NarrationSynthesizer, lock};
use crate::sequence::clock::Clock;
use crate::sequence::sequencer::SceneSequencer;

/// Shared handle to one project and the sequencer that plays it.
pub struct ProjectHandle {
    project: Mutex<Project>,
    sequencer: SceneSequencer,
}

impl ProjectHandle {
    pub fn new(project: Project, sequencer: SceneSequencer) -> Arc<Self> {
        Arc::new(Self {
            project: Mutex::new(project),
            sequencer,
        })
    }

    pub fn sequencer(&self) -> &SceneSequencer {
        &self.sequencer
    }

    /// Run `f` against the project under its lock.
    pub fn read<R>(&self, f: impl FnOnce(&Project) -> R) -> R {
        f(&self.lock())
    }

    /// Mutate the project under its lock. Edits are rejected while rendering.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Project) -> ReelResult<R>) -> ReelResult<R> {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        self.lock().snapshot()
    }

    pub fn status(&self) -> ProjectStatus {
        self.lock().status()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Project> {
        lock(&self.project)
    }
}

/// Owns exactly one current project.
pub struct Workspace {
    current: Mutex<Arc<ProjectHandle>>,
    narrator: Arc<dyn NarrationSynthesizer>,
    clock: Arc<dyn Clock>,
}

impl Workspace {
    pub fn new(
        project: Project,
        narrator: Arc<dyn NarrationSynthesizer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let handle = ProjectHandle::new(
            project,
            SceneSequencer::new(Arc::clone(&narrator), Arc::clone(&clock)),
        );
        Self {
            current: Mutex::new(handle),
            narrator,
            clock,
        }
    }

    pub fn current(&self) -> Arc<ProjectHandle> {
        Arc::clone(&lock(&self.current))
    }

    /// Replace the current project with a fresh empty one. Any preview of the old project is
    /// cancelled; an in-flight render keeps its snapshot and finishes against the old handle.
    pub fn create_new(&self, title: impl Into<String>) -> Arc<ProjectHandle> {
        self.replace(Project::new(title))
    }

    /// Make `project` current (for example one loaded from disk).
    pub fn replace(&self, project: Project) -> Arc<ProjectHandle> {
        let handle = ProjectHandle::new(
            project,
            SceneSequencer::new(Arc::clone(&self.narrator), Arc::clone(&self.clock)),
        );
        let old = std::mem::replace(&mut *lock(&self.current), Arc::clone(&handle));
        if old.status() != ProjectStatus::Rendering {
            old.sequencer().cancel();
        }
        tracing::info!(project = %handle.read(|p| p.id), "current project replaced");
        handle
    }
}
