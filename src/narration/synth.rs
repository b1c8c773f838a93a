use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::assets::media::AudioPcm;
use crate::foundation::error::ReelResult;
use crate::narration::voice::VoiceType;

/// How an utterance ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechEnd {
    /// The engine finished speaking.
    Finished,
    /// Silenced by `cancel` or by a newer utterance.
    Interrupted,
    /// The engine dropped the utterance without ever signalling.
    Lost,
}

/// Handle to one audible utterance.
#[derive(Debug)]
pub struct Utterance {
    /// Engine's estimate of the speaking time, when it can provide one. `None` means the engine
    /// cannot promise a completion signal, so callers should not wait past their own dwell time.
    pub expected: Option<Duration>,
    done: oneshot::Receiver<SpeechEnd>,
    silencer: Silencer,
}

impl Utterance {
    /// Resolves when the utterance finishes, is interrupted, or is lost.
    pub async fn finished(self) -> SpeechEnd {
        self.done.await.unwrap_or(SpeechEnd::Lost)
    }

    /// Handle that silences this utterance and nothing newer.
    pub fn silencer(&self) -> Silencer {
        self.silencer.clone()
    }
}

/// Silences one specific utterance. A no-op once a newer utterance has taken over.
#[derive(Clone, Debug)]
pub struct Silencer {
    slot: Weak<UtteranceSlot>,
    generation: u64,
}

impl Silencer {
    /// Returns whether the utterance was still audible.
    pub fn silence(&self) -> bool {
        self.slot
            .upgrade()
            .is_some_and(|slot| slot.interrupt_generation(self.generation))
    }
}

/// Converts narration text into speech.
///
/// Implementations keep at most one utterance audible: `speak` silences whatever was in flight
/// before starting, and `cancel` silences it immediately and resolves its completion.
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Start speaking `text` audibly.
    async fn speak(&self, text: &str, voice: VoiceType) -> ReelResult<Utterance>;

    /// Produce narration PCM without playing it (render path).
    async fn synthesize(&self, text: &str, voice: VoiceType) -> ReelResult<AudioPcm>;

    /// Silence any in-flight utterance. Idempotent.
    fn cancel(&self);
}

/// The single "now playing" slot shared by a synthesizer and its playback watchers.
#[derive(Debug, Default)]
pub(crate) struct UtteranceSlot {
    inner: Mutex<SlotInner>,
}

#[derive(Debug, Default)]
struct SlotInner {
    next_generation: u64,
    active: Option<ActiveUtterance>,
}

#[derive(Debug)]
struct ActiveUtterance {
    generation: u64,
    stop: CancellationToken,
    done: oneshot::Sender<SpeechEnd>,
}

/// Playback-side half of a claimed utterance.
#[derive(Debug)]
pub(crate) struct UtteranceTicket {
    slot: Arc<UtteranceSlot>,
    generation: u64,
    stop: CancellationToken,
}

impl UtteranceSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Interrupt whatever is active, then register a new utterance.
    pub(crate) fn claim(self: &Arc<Self>, expected: Option<Duration>) -> (Utterance, UtteranceTicket) {
        let (tx, rx) = oneshot::channel();
        let stop = CancellationToken::new();
        let mut inner = lock(&self.inner);
        if let Some(prev) = inner.active.take() {
            prev.stop.cancel();
            let _ = prev.done.send(SpeechEnd::Interrupted);
        }
        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.active = Some(ActiveUtterance {
            generation,
            stop: stop.clone(),
            done: tx,
        });
        drop(inner);

        (
            Utterance {
                expected,
                done: rx,
                silencer: Silencer {
                    slot: Arc::downgrade(self),
                    generation,
                },
            },
            UtteranceTicket {
                slot: Arc::clone(self),
                generation,
                stop,
            },
        )
    }

    /// Interrupt the active utterance, if any. Returns whether one was active.
    pub(crate) fn interrupt(&self) -> bool {
        let active = lock(&self.inner).active.take();
        Self::stop(active)
    }

    /// Interrupt the active utterance only if it is `generation`.
    pub(crate) fn interrupt_generation(&self, generation: u64) -> bool {
        let active = {
            let mut inner = lock(&self.inner);
            inner
                .active
                .take_if(|a| a.generation == generation)
        };
        Self::stop(active)
    }

    fn stop(active: Option<ActiveUtterance>) -> bool {
        match active {
            Some(active) => {
                active.stop.cancel();
                let _ = active.done.send(SpeechEnd::Interrupted);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        lock(&self.inner).active.is_some()
    }
}

impl UtteranceTicket {
    /// Cancelled when this utterance is silenced.
    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    /// Resolve the utterance if it is still the active one.
    pub(crate) fn complete(self, end: SpeechEnd) {
        let mut inner = lock(&self.slot.inner);
        let is_current = inner
            .active
            .as_ref()
            .is_some_and(|a| a.generation == self.generation);
        if is_current && let Some(active) = inner.active.take() {
            let _ = active.done.send(end);
        }
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[path = "../../tests/unit/narration/synth.rs"]
mod tests;
