use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::foundation::error::{ReelError, ReelResult};
use crate::model::scene::Scene;
use crate::narration::synth::{NarrationSynthesizer, lock};
use crate::sequence::clock::Clock;

/// Playback state of a project's sequencer. `Idle` always means index 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequencerState {
    #[default]
    Idle,
    Playing {
        index: usize,
    },
}

impl SequencerState {
    pub fn index(self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Playing { index } => index,
        }
    }

    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing { .. })
    }
}

/// How a traversal ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalOutcome {
    Completed,
    Cancelled,
}

/// Result of one traversal: its outcome and the dwell of every scene that finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraversalReport {
    pub outcome: TraversalOutcome,
    pub dwells: Vec<Duration>,
}

impl TraversalReport {
    fn new(outcome: TraversalOutcome, dwells: Vec<Duration>) -> Self {
        Self { outcome, dwells }
    }

    pub fn total(&self) -> Duration {
        self.dwells.iter().sum()
    }
}

/// What a visitor did with one scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    /// The scene was current for this long.
    Dwelled(Duration),
    /// Cancellation was observed mid-scene.
    Cancelled,
}

/// Everything a visitor may touch while its scene is current.
pub struct VisitContext<'a> {
    pub index: usize,
    pub total: usize,
    pub scene: &'a Scene,
    pub narrator: &'a dyn NarrationSynthesizer,
    pub clock: &'a dyn Clock,
    /// Checked at every suspension point.
    pub cancel: &'a CancellationToken,
}

/// Per-scene work of a traversal (audible preview, render capture).
#[async_trait]
pub trait SceneVisitor: Send {
    async fn visit(&mut self, cx: VisitContext<'_>) -> ReelResult<Visit>;
}

/// Drives ordered, one-at-a-time advancement through scenes.
///
/// Owns the single authoritative index for its project and enforces single-flight: one
/// traversal at a time, whether preview or render.
#[derive(Clone)]
pub struct SceneSequencer {
    shared: Arc<Shared>,
}

struct Shared {
    narrator: Arc<dyn NarrationSynthesizer>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: SequencerState,
    active: Option<ActiveTraversal>,
    next_generation: u64,
}

struct ActiveTraversal {
    generation: u64,
    cancel: CancellationToken,
}

impl SceneSequencer {
    pub fn new(narrator: Arc<dyn NarrationSynthesizer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                narrator,
                clock,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    pub fn narrator(&self) -> &Arc<dyn NarrationSynthesizer> {
        &self.shared.narrator
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    pub fn state(&self) -> SequencerState {
        lock(&self.shared.inner).state
    }

    /// Claim the sequencer for a new traversal. Fails with `InvalidState` while another
    /// traversal holds it.
    pub fn begin(&self) -> ReelResult<Traversal> {
        let mut inner = lock(&self.shared.inner);
        if inner.active.is_some() {
            return Err(ReelError::invalid_state(
                "a preview or render is already in progress for this project",
            ));
        }
        let generation = inner.next_generation;
        inner.next_generation += 1;
        let cancel = CancellationToken::new();
        inner.active = Some(ActiveTraversal {
            generation,
            cancel: cancel.clone(),
        });
        inner.state = SequencerState::Playing { index: 0 };
        Ok(Traversal {
            seq: self.clone(),
            generation,
            cancel,
        })
    }

    /// Stop the active traversal, silence narration, and reset to `Idle`.
    ///
    /// Returns `false` (and does nothing) when idle.
    pub fn cancel(&self) -> bool {
        // The old traversal is cancelled and silenced before `begin` can hand out a new one.
        let mut inner = lock(&self.shared.inner);
        let Some(active) = inner.active.take() else {
            inner.state = SequencerState::Idle;
            return false;
        };
        active.cancel.cancel();
        self.shared.narrator.cancel();
        inner.state = SequencerState::Idle;
        drop(inner);
        tracing::info!("traversal cancelled");
        true
    }

    fn set_index(&self, generation: u64, index: usize) -> bool {
        let mut inner = lock(&self.shared.inner);
        let current = inner
            .active
            .as_ref()
            .is_some_and(|a| a.generation == generation);
        if current {
            inner.state = SequencerState::Playing { index };
        }
        current
    }

    fn release(&self, generation: u64) {
        let mut inner = lock(&self.shared.inner);
        if inner
            .active
            .as_ref()
            .is_some_and(|a| a.generation == generation)
        {
            inner.active = None;
            inner.state = SequencerState::Idle;
        }
    }
}

/// A claimed traversal. Dropping it without running releases the sequencer.
pub struct Traversal {
    seq: SceneSequencer,
    generation: u64,
    cancel: CancellationToken,
}

impl Traversal {
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Visit `scenes` strictly in order, one at a time.
    ///
    /// An empty list completes immediately. Cancellation is observed before each scene and by
    /// the visitor at its suspension points.
    pub async fn run<V>(self, scenes: &[Scene], visitor: &mut V) -> ReelResult<TraversalReport>
    where
        V: SceneVisitor + ?Sized,
    {
        let shared = Arc::clone(&self.seq.shared);
        let mut dwells = Vec::with_capacity(scenes.len());
        let total = scenes.len();

        for (index, scene) in scenes.iter().enumerate() {
            if self.cancel.is_cancelled() || !self.seq.set_index(self.generation, index) {
                return Ok(TraversalReport::new(TraversalOutcome::Cancelled, dwells));
            }
            tracing::debug!(scene = index, total, "scene current");

            let cx = VisitContext {
                index,
                total,
                scene,
                narrator: shared.narrator.as_ref(),
                clock: shared.clock.as_ref(),
                cancel: &self.cancel,
            };
            match visitor.visit(cx).await? {
                Visit::Dwelled(dwell) => {
                    tracing::debug!(scene = index, dwell_ms = dwell.as_millis() as u64, "scene done");
                    dwells.push(dwell);
                }
                Visit::Cancelled => return Ok(TraversalReport::new(TraversalOutcome::Cancelled, dwells)),
            }
        }

        let outcome = if self.cancel.is_cancelled() {
            TraversalOutcome::Cancelled
        } else {
            TraversalOutcome::Completed
        };
        Ok(TraversalReport::new(outcome, dwells))
    }
}

impl Drop for Traversal {
    fn drop(&mut self) {
        self.seq.release(self.generation);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/sequencer.rs"]
mod tests;
