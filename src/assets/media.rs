use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};

/// Audio mixing sample rate used across decode/mix/encode.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

#[derive(Clone, Debug, PartialEq)]
/// Decoded interleaved floating-point PCM (narration clips and music tracks).
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 or 2).
    pub channels: u16,
    /// Interleaved `f32` PCM samples in `[-1, 1]`.
    pub interleaved_f32: Arc<Vec<f32>>,
}

impl AudioPcm {
    pub fn new(sample_rate: u32, channels: u16, interleaved_f32: Vec<f32>) -> ReelResult<Self> {
        if sample_rate == 0 {
            return Err(ReelError::validation("audio sample_rate must be non-zero"));
        }
        if channels == 0 || channels > 2 {
            return Err(ReelError::validation("audio must be mono or stereo"));
        }
        if !interleaved_f32.len().is_multiple_of(usize::from(channels)) {
            return Err(ReelError::validation(
                "interleaved sample count is not a multiple of the channel count",
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
            interleaved_f32: Arc::new(interleaved_f32),
        })
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.interleaved_f32.len() / usize::from(self.channels)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    pub fn is_empty(&self) -> bool {
        self.interleaved_f32.is_empty()
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Decode any ffmpeg-readable audio file to stereo interleaved `f32` PCM at `sample_rate`.
///
/// Blocking: shells out to the system `ffmpeg`.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> ReelResult<AudioPcm> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| ReelError::encode(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        return Err(ReelError::encode(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(ReelError::encode(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let pcm = out
        .stdout
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    AudioPcm::new(sample_rate, 2, pcm)
}

/// Read a PCM WAV file (integer or float samples) at its native rate and channel count.
pub fn read_wav(path: &Path) -> ReelResult<AudioPcm> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("open wav '{}'", path.display()))?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("read float wav samples")?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .context("read integer wav samples")?
        }
    };
    let channels = spec.channels.min(2);
    let samples = if spec.channels > 2 {
        // Keep the first two channels.
        samples
            .chunks_exact(usize::from(spec.channels))
            .flat_map(|f| [f[0], f[1]])
            .collect()
    } else {
        samples
    };
    AudioPcm::new(spec.sample_rate, channels, samples)
}

/// Write mono or stereo PCM as 16-bit WAV.
pub fn write_wav(pcm: &AudioPcm, path: &Path) -> ReelResult<()> {
    let spec = hound::WavSpec {
        channels: pcm.channels,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("create wav '{}'", path.display()))?;
    for &s in pcm.interleaved_f32.iter() {
        let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(v).context("write wav sample")?;
    }
    writer.finalize().context("finalize wav")?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/media.rs"]
mod tests;
