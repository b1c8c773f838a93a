use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::assets::media::AudioPcm;
use crate::foundation::error::{ReelError, ReelResult};
use crate::narration::synth::{NarrationSynthesizer, SpeechEnd, Utterance, UtteranceSlot, lock};
use crate::narration::voice::VoiceType;

const WORDS_PER_SEC: f64 = 2.5;
const CLIP_SAMPLE_RATE: u32 = 8_000;

/// Observable side effects of a [`ScriptedSynthesizer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechEvent {
    Spoke { text: String, voice: VoiceType },
    Finished { text: String },
    Interrupted { text: String },
    Synthesized { text: String },
    Cancelled,
}

/// Deterministic synthesizer driven by the tokio clock.
///
/// Speaking time defaults to word count at 2.5 words/s and can be overridden per text. Under a
/// paused test runtime no wall-clock time passes.
#[derive(Clone, Default)]
pub struct ScriptedSynthesizer {
    durations: HashMap<String, Duration>,
    failing: HashSet<String>,
    unresponsive: HashSet<String>,
    hide_expected: bool,
    slot: Arc<UtteranceSlot>,
    events: Arc<Mutex<Vec<SpeechEvent>>>,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speak `text` for exactly `d`.
    pub fn with_duration(mut self, text: impl Into<String>, d: Duration) -> Self {
        self.durations.insert(text.into(), d);
        self
    }

    /// `speak`/`synthesize` of `text` fail with a generation error.
    pub fn failing(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    /// `speak` of `text` never signals completion and reports no expected duration.
    pub fn unresponsive(mut self, text: impl Into<String>) -> Self {
        self.unresponsive.insert(text.into());
        self
    }

    /// Report `expected: None` for every utterance, like an engine without length estimates.
    pub fn without_expected(mut self) -> Self {
        self.hide_expected = true;
        self
    }

    pub fn duration_for(&self, text: &str) -> Duration {
        self.durations.get(text).copied().unwrap_or_else(|| {
            let words = text.split_whitespace().count();
            Duration::from_secs_f64(words as f64 / WORDS_PER_SEC)
        })
    }

    pub fn events(&self) -> Vec<SpeechEvent> {
        lock(&self.events).clone()
    }

    /// Whether an utterance is currently audible.
    pub fn is_speaking(&self) -> bool {
        self.slot.is_active()
    }

    fn record(&self, event: SpeechEvent) {
        lock(&self.events).push(event);
    }

    fn check_failure(&self, text: &str) -> ReelResult<()> {
        if self.failing.contains(text) {
            return Err(ReelError::generation(format!(
                "scripted narration failure for '{text}'"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NarrationSynthesizer for ScriptedSynthesizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn speak(&self, text: &str, voice: VoiceType) -> ReelResult<Utterance> {
        self.check_failure(text)?;
        self.record(SpeechEvent::Spoke {
            text: text.to_string(),
            voice,
        });

        let unresponsive = self.unresponsive.contains(text);
        let d = self.duration_for(text);
        let expected = (!unresponsive && !self.hide_expected).then_some(d);
        let (utterance, ticket) = self.slot.claim(expected);
        if unresponsive {
            // The slot keeps the completion sender; only `cancel` or a newer claim resolves it.
            return Ok(utterance);
        }

        let events = Arc::clone(&self.events);
        let stop = ticket.stop_token().clone();
        let text = text.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = stop.cancelled() => {
                    lock(&events).push(SpeechEvent::Interrupted { text });
                }
                _ = tokio::time::sleep(d) => {
                    lock(&events).push(SpeechEvent::Finished { text });
                    ticket.complete(SpeechEnd::Finished);
                }
            }
        });
        Ok(utterance)
    }

    async fn synthesize(&self, text: &str, _voice: VoiceType) -> ReelResult<AudioPcm> {
        self.check_failure(text)?;
        self.record(SpeechEvent::Synthesized {
            text: text.to_string(),
        });
        let frames = (self.duration_for(text).as_secs_f64() * f64::from(CLIP_SAMPLE_RATE)).round()
            as usize;
        let samples = (0..frames)
            .map(|i| {
                let t = i as f32 / CLIP_SAMPLE_RATE as f32;
                0.1 * (std::f32::consts::TAU * 220.0 * t).sin()
            })
            .collect();
        AudioPcm::new(CLIP_SAMPLE_RATE, 1, samples)
    }

    fn cancel(&self) {
        if self.slot.interrupt() {
            self.record(SpeechEvent::Cancelled);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/narration/scripted.rs"]
mod tests;
