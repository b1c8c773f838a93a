use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;

use crate::assets::media::{AudioPcm, is_ffmpeg_on_path};
use crate::audio::mix::{mix_manifest, write_mix_to_f32le_file};
use crate::encode::muxer::{Artifact, MuxConfig, MuxTimeline, StreamMuxer};
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::mul_div255;
use crate::foundation::temp::TempFileGuard;

/// Options for [`FfmpegMuxer`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegMuxerOpts {
    /// Directory the finished artifact is moved into.
    pub out_dir: PathBuf,
    /// Overwrite an existing artifact with the same name.
    pub overwrite: bool,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl FfmpegMuxerOpts {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Encodes H.264/AAC MP4 through the system `ffmpeg`.
///
/// Frames stream into a video-only temporary file while scenes are captured; `finish` mixes the
/// audio timeline, muxes it in a second pass, and only then renames the result into `out_dir`.
/// Until that rename nothing is visible under the artifact's name.
///
/// Pipe writes and the second pass run on tokio's blocking pool.
pub struct FfmpegMuxer {
    opts: FfmpegMuxerOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    timeline: Option<MuxTimeline>,
    video_tmp: TempFileGuard,
}

impl FfmpegMuxer {
    pub fn new(opts: FfmpegMuxerOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            timeline: None,
            video_tmp: TempFileGuard::default(),
        }
    }

    fn staging_path(&self, cfg: &MuxConfig, tag: &str, ext: &str) -> PathBuf {
        let stem = Path::new(&cfg.suggested_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video");
        self.opts
            .out_dir
            .join(format!(".{stem}.{}.{tag}.{ext}", uuid::Uuid::new_v4().simple()))
    }

    fn kill_encoder(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(drain) = self.stderr_drain.take() {
            let _ = drain.join();
        }
    }

    fn finish_video_pass(&mut self) -> ReelResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ReelError::invalid_state("ffmpeg muxer not started"))?;

        let status = child
            .wait()
            .map_err(|e| ReelError::encode(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReelError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReelError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            return Err(ReelError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        Ok(())
    }

    fn finish_blocking(&mut self) -> ReelResult<Artifact> {
        let result = self.finish_inner();
        if result.is_err() {
            self.abort();
        }
        // Staging video is never part of the artifact.
        self.video_tmp = TempFileGuard::default();
        result
    }

    fn finish_inner(&mut self) -> ReelResult<Artifact> {
        let timeline = self
            .timeline
            .take()
            .ok_or_else(|| ReelError::invalid_state("ffmpeg muxer not started"))?;
        if timeline.frame_count() == 0 {
            return Err(ReelError::empty_sequence("no frames were submitted"));
        }
        self.finish_video_pass()?;

        let cfg = timeline.config().clone();
        let manifest = timeline.manifest();
        let audio_path = self.staging_path(&cfg, "audio", "f32le");
        let _audio_tmp = TempFileGuard::new(audio_path.clone());
        write_mix_to_f32le_file(&mix_manifest(&manifest), &audio_path)?;

        let video_path = self
            .video_tmp
            .0
            .clone()
            .ok_or_else(|| ReelError::invalid_state("video pass produced no file"))?;
        let partial_path = self.staging_path(&cfg, "partial", "mp4");
        let partial = TempFileGuard::new(partial_path.clone());

        let out = Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(&video_path)
            .args([
                "-f",
                "f32le",
                "-ar",
                &manifest.sample_rate.to_string(),
                "-ac",
                &manifest.channels.to_string(),
                "-i",
            ])
            .arg(&audio_path)
            .args([
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-c:v",
                "copy",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
            ])
            .arg(&partial_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ReelError::encode(format!("failed to run ffmpeg audio mux: {e}")))?;
        if !out.status.success() {
            return Err(ReelError::encode(format!(
                "ffmpeg audio mux exited with status {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let final_path = self.opts.out_dir.join(&cfg.suggested_filename);
        if !self.opts.overwrite && final_path.exists() {
            return Err(ReelError::validation(format!(
                "output file '{}' already exists",
                final_path.display()
            )));
        }
        std::fs::rename(&partial_path, &final_path).map_err(|e| {
            ReelError::encode(format!(
                "failed to move artifact into '{}': {e}",
                final_path.display()
            ))
        })?;
        let _ = partial.keep();

        tracing::info!(
            path = %final_path.display(),
            frames = timeline.frame_count(),
            duration_ms = timeline.duration().as_millis() as u64,
            "artifact written"
        );
        Ok(timeline.artifact(final_path))
    }
}

#[async_trait]
impl StreamMuxer for FfmpegMuxer {
    fn begin(&mut self, cfg: MuxConfig) -> ReelResult<()> {
        let res = cfg.resolution;
        if !res.width.is_multiple_of(2) || !res.height.is_multiple_of(2) {
            return Err(ReelError::validation(
                "ffmpeg muxer width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.child.is_some() {
            return Err(ReelError::invalid_state("ffmpeg muxer already started"));
        }
        if !is_ffmpeg_on_path() {
            return Err(ReelError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }
        std::fs::create_dir_all(&self.opts.out_dir).map_err(|e| {
            ReelError::encode(format!(
                "failed to create output directory '{}': {e}",
                self.opts.out_dir.display()
            ))
        })?;

        let video_path = self.staging_path(&cfg, "video", "mp4");
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", res.width, res.height),
                "-r",
                &cfg.fps.0.to_string(),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
            ])
            .arg(&video_path);

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            width = res.width,
            height = res.height,
            fps = cfg.fps.0,
            "ffmpeg video pass started"
        );
        self.scratch = vec![0u8; res.rgba_len()];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.video_tmp = TempFileGuard::new(video_path);
        self.timeline = Some(MuxTimeline::new(cfg)?);
        Ok(())
    }

    async fn submit_frame(&mut self, frame: &FrameRGBA, hold: Duration) -> ReelResult<u64> {
        let timeline = self
            .timeline
            .as_mut()
            .ok_or_else(|| ReelError::invalid_state("ffmpeg muxer not started"))?;
        timeline.check_frame(frame)?;
        // Empty after a dropped submit.
        self.scratch.resize(frame.data.len(), 0);
        flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;
        let Some(mut stdin) = self.stdin.take() else {
            return Err(ReelError::invalid_state("ffmpeg muxer is already finalized"));
        };
        let n = timeline.hold(hold);

        let scratch = std::mem::take(&mut self.scratch);
        let (stdin, scratch, written) = tokio::task::spawn_blocking(move || {
            let written = write_held_frame(&mut stdin, &scratch, n);
            (stdin, scratch, written)
        })
        .await
        .map_err(|e| ReelError::encode(format!("ffmpeg frame writer task failed: {e}")))?;
        self.stdin = Some(stdin);
        self.scratch = scratch;
        written.map(|()| n)
    }

    fn place_narration(&mut self, clip: AudioPcm) -> ReelResult<()> {
        self.timeline
            .as_mut()
            .ok_or_else(|| ReelError::invalid_state("ffmpeg muxer not started"))?
            .place_narration(clip)
    }

    fn mix_audio(&mut self, track: AudioPcm) -> ReelResult<()> {
        self.timeline
            .as_mut()
            .ok_or_else(|| ReelError::invalid_state("ffmpeg muxer not started"))?
            .set_music(track);
        Ok(())
    }

    async fn finish(&mut self) -> ReelResult<Artifact> {
        let opts = self.opts.clone();
        let mut muxer = std::mem::replace(self, Self::new(opts));
        let (muxer, result) = tokio::task::spawn_blocking(move || {
            let result = muxer.finish_blocking();
            (muxer, result)
        })
        .await
        .map_err(|e| ReelError::encode(format!("ffmpeg finish task failed: {e}")))?;
        *self = muxer;
        result
    }

    fn abort(&mut self) {
        self.kill_encoder();
        self.timeline = None;
        self.video_tmp = TempFileGuard::default();
    }
}

impl Drop for FfmpegMuxer {
    fn drop(&mut self) {
        self.kill_encoder();
    }
}

fn write_held_frame(stdin: &mut ChildStdin, rgba: &[u8], count: u64) -> ReelResult<()> {
    for _ in 0..count {
        stdin
            .write_all(rgba)
            .map_err(|e| ReelError::encode(format!("failed to write frame to ffmpeg stdin: {e}")))?;
    }
    Ok(())
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> ReelResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (u16::from(s[0]) + mul_div255(bg_r, inv)).min(255) as u8;
        d[1] = (u16::from(s[1]) + mul_div255(bg_g, inv)).min(255) as u8;
        d[2] = (u16::from(s[2]) + mul_div255(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}
