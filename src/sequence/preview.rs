use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::foundation::error::ReelResult;
use crate::model::scene::SceneId;
use crate::narration::synth::SpeechEnd;
use crate::narration::voice::VoiceType;
use crate::sequence::sequencer::{SceneVisitor, Visit, VisitContext};

/// Extra time allowed past the engine's own length estimate before giving up on its
/// completion signal.
pub const SPEECH_GRACE: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreviewEvent {
    SceneShown { index: usize, scene: SceneId },
    SceneFinished { index: usize, dwell: Duration },
}

/// Audible preview: speak each scene and hold it until both the narration and the authored
/// duration are done.
///
/// Dwell is `max(floor, min(speech, ceiling))` where `floor` is the authored duration and
/// `ceiling` is `max(floor, expected) + SPEECH_GRACE` when the engine reports an expected
/// length, else `floor`. The ceiling runs from the moment `speak` returns, so synthesis latency
/// never shortens audible speech. A narration failure counts as zero speech.
pub struct PreviewVisitor {
    voice: VoiceType,
    events: Option<mpsc::UnboundedSender<PreviewEvent>>,
}

impl PreviewVisitor {
    pub fn new(voice: VoiceType) -> Self {
        Self {
            voice,
            events: None,
        }
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PreviewEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn emit(&self, event: PreviewEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl SceneVisitor for PreviewVisitor {
    async fn visit(&mut self, cx: VisitContext<'_>) -> ReelResult<Visit> {
        let VisitContext {
            index,
            scene,
            narrator,
            clock,
            cancel,
            ..
        } = cx;

        self.emit(PreviewEvent::SceneShown {
            index,
            scene: scene.id,
        });
        let started = clock.now();
        let floor = scene.min_dwell();

        if scene.has_narration_text() {
            let spoken = tokio::select! {
                _ = cancel.cancelled() => return Ok(Visit::Cancelled),
                r = narrator.speak(&scene.text, self.voice) => r,
            };
            match spoken {
                Ok(utterance) => {
                    // Synthesis latency before playback does not count against the speech.
                    let audible_since = clock.now();
                    let silencer = utterance.silencer();
                    let ceiling = match utterance.expected {
                        Some(expected) => floor.max(expected) + SPEECH_GRACE,
                        None => floor,
                    };
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(Visit::Cancelled),
                        end = utterance.finished() => {
                            if end == SpeechEnd::Lost {
                                tracing::warn!(scene = index, "narration ended without a completion signal");
                            }
                        }
                        _ = clock.sleep_until(audible_since + ceiling) => {
                            tracing::warn!(
                                scene = index,
                                ceiling_ms = ceiling.as_millis() as u64,
                                "narration did not signal completion; advancing"
                            );
                            silencer.silence();
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(scene = index, error = %err, "narration failed; dwelling for authored duration");
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(Visit::Cancelled),
            _ = clock.sleep_until(started + floor) => {}
        }

        let dwell = clock.now().saturating_duration_since(started);
        self.emit(PreviewEvent::SceneFinished { index, dwell });
        Ok(Visit::Dwelled(dwell))
    }
}
