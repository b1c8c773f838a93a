use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt as _;

use crate::assets::media::{AudioPcm, read_wav};
use crate::config::SpeechConfig;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::temp::{TempFileGuard, unique_temp_path};
use crate::narration::synth::{
    NarrationSynthesizer, SpeechEnd, Utterance, UtteranceSlot, UtteranceTicket, lock,
};
use crate::narration::voice::{VoiceCatalog, VoiceInfo, VoiceType};

const PLAYER_POLL: Duration = Duration::from_millis(40);

/// Narration through the system `espeak-ng` (synthesis) and `ffplay` (audible playback).
///
/// Each utterance is synthesized to a temporary WAV first, so its exact length is known before
/// playback starts and is reported as [`Utterance::expected`].
pub struct CommandSynthesizer {
    cfg: SpeechConfig,
    voices: VoiceCatalog,
    slot: Arc<UtteranceSlot>,
    player: Arc<Mutex<Option<Playback>>>,
    next_playback: Mutex<u64>,
}

struct Playback {
    id: u64,
    child: tokio::process::Child,
}

impl CommandSynthesizer {
    pub fn with_catalog(cfg: SpeechConfig, voices: VoiceCatalog) -> Self {
        Self {
            cfg,
            voices,
            slot: UtteranceSlot::new(),
            player: Arc::new(Mutex::new(None)),
            next_playback: Mutex::new(0),
        }
    }

    /// Build a synthesizer, asking the engine for its voice list. An engine that cannot list
    /// voices yields an empty catalog, which means "engine default voice".
    pub async fn detect(cfg: SpeechConfig) -> Self {
        let voices = match list_voices(&cfg.synth_program).await {
            Ok(voices) => voices,
            Err(err) => {
                tracing::warn!(program = %cfg.synth_program, error = %err, "voice listing failed; using engine default voice");
                VoiceCatalog::default()
            }
        };
        tracing::debug!(voices = voices.voices().len(), "speech voices loaded");
        Self::with_catalog(cfg, voices)
    }

    pub fn voices(&self) -> &VoiceCatalog {
        &self.voices
    }

    async fn synthesize_to_wav(&self, text: &str, voice: VoiceType, out: &Path) -> ReelResult<()> {
        let mut cmd = tokio::process::Command::new(&self.cfg.synth_program);
        if let Some(v) = self.voices.best_match(voice) {
            cmd.args(["-v", &v.id]);
        }
        cmd.args(["-s", &self.cfg.words_per_minute.to_string(), "-w"])
            .arg(out)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::generation(format!(
                "failed to spawn '{}' (is it installed and on PATH?): {e}",
                self.cfg.synth_program
            ))
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| ReelError::generation(format!("write narration text: {e}")))?;
        }
        let out = child
            .wait_with_output()
            .await
            .map_err(|e| ReelError::generation(format!("wait for speech synthesis: {e}")))?;
        if !out.status.success() {
            return Err(ReelError::generation(format!(
                "'{}' exited with status {}: {}",
                self.cfg.synth_program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }

    fn stop_player(&self) {
        if let Some(mut playback) = lock(&self.player).take() {
            let _ = playback.child.start_kill();
        }
    }

    fn next_playback_id(&self) -> u64 {
        let mut next = lock(&self.next_playback);
        *next += 1;
        *next
    }
}

#[async_trait]
impl NarrationSynthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    async fn speak(&self, text: &str, voice: VoiceType) -> ReelResult<Utterance> {
        // Silence the previous utterance before doing any work for the new one.
        self.cancel();

        let wav_path = unique_temp_path("narration", "wav");
        let wav = TempFileGuard::new(wav_path.clone());
        self.synthesize_to_wav(text, voice, &wav_path).await?;
        let expected = match read_wav(&wav_path) {
            Ok(pcm) => Some(pcm.duration()),
            Err(err) => {
                tracing::debug!(error = %err, "could not measure narration length");
                None
            }
        };

        let child = tokio::process::Command::new(&self.cfg.player_program)
            .args(["-nodisp", "-autoexit", "-loglevel", "error"])
            .arg(&wav_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ReelError::generation(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.cfg.player_program
                ))
            })?;

        let (utterance, ticket) = self.slot.claim(expected);
        let id = self.next_playback_id();
        {
            let mut player = lock(&self.player);
            if let Some(mut stale) = player.replace(Playback { id, child }) {
                let _ = stale.child.start_kill();
            }
        }
        tokio::spawn(watch_playback(Arc::clone(&self.player), id, ticket, wav));
        Ok(utterance)
    }

    async fn synthesize(&self, text: &str, voice: VoiceType) -> ReelResult<AudioPcm> {
        let wav_path = unique_temp_path("clip", "wav");
        let _wav = TempFileGuard::new(wav_path.clone());
        self.synthesize_to_wav(text, voice, &wav_path).await?;
        read_wav(&wav_path).map_err(|e| ReelError::generation(format!("read narration clip: {e}")))
    }

    fn cancel(&self) {
        self.stop_player();
        self.slot.interrupt();
    }
}

async fn watch_playback(
    player: Arc<Mutex<Option<Playback>>>,
    id: u64,
    ticket: UtteranceTicket,
    _wav: TempFileGuard,
) {
    let stop = ticket.stop_token().clone();
    loop {
        let polled = {
            let mut guard = lock(&player);
            match guard.as_mut() {
                Some(p) if p.id == id => p.child.try_wait(),
                // Replaced or killed by `cancel`.
                _ => return,
            }
        };
        let end = match polled {
            Ok(Some(status)) if status.success() => SpeechEnd::Finished,
            Ok(Some(status)) => {
                tracing::warn!(%status, "narration player exited abnormally");
                SpeechEnd::Lost
            }
            Ok(None) => {
                tokio::select! {
                    _ = stop.cancelled() => {
                        // Silenced on its own, not through `cancel`.
                        if let Some(mut playback) = lock(&player).take_if(|p| p.id == id) {
                            let _ = playback.child.start_kill();
                        }
                        return;
                    }
                    _ = tokio::time::sleep(PLAYER_POLL) => continue,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "lost track of narration player");
                SpeechEnd::Lost
            }
        };
        {
            let mut guard = lock(&player);
            if guard.as_ref().is_some_and(|p| p.id == id) {
                guard.take();
            }
        }
        ticket.complete(end);
        return;
    }
}

async fn list_voices(program: &str) -> ReelResult<VoiceCatalog> {
    let out = tokio::process::Command::new(program)
        .arg("--voices")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ReelError::generation(format!("failed to run '{program} --voices': {e}")))?;
    if !out.status.success() {
        return Err(ReelError::generation(format!(
            "'{program} --voices' exited with status {}",
            out.status
        )));
    }
    Ok(parse_voice_list(&String::from_utf8_lossy(&out.stdout)))
}

/// Parse `espeak-ng --voices` output.
///
/// Columns: `Pty Language Age/Gender VoiceName File Other`. The language column is what `-v`
/// accepts. espeak-ng voices are mostly male, so when no female voice is listed a `+f3` variant
/// of the first voice is offered (and likewise `+m3` for male).
pub(crate) fn parse_voice_list(listing: &str) -> VoiceCatalog {
    let mut voices: Vec<VoiceInfo> = listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _pty = cols.next()?;
            let lang = cols.next()?;
            let age_gender = cols.next()?;
            let register = match age_gender.rsplit('/').next() {
                Some("M") => Some(VoiceType::Male),
                Some("F") => Some(VoiceType::Female),
                _ => None,
            };
            Some(VoiceInfo::new(lang, register))
        })
        .collect();

    let base = voices.first().map(|v| v.id.clone());
    if let Some(base) = base {
        for (register, variant) in [(VoiceType::Female, "f3"), (VoiceType::Male, "m3")] {
            if !voices.iter().any(|v| v.register == Some(register)) {
                voices.push(VoiceInfo::new(format!("{base}+{variant}"), Some(register)));
            }
        }
    }
    VoiceCatalog::new(voices)
}
