use std::path::Path;

use anyhow::Context as _;

use crate::assets::media::AudioPcm;
use crate::foundation::error::ReelResult;

/// One source placed on the output timeline.
#[derive(Clone, Debug)]
pub struct AudioSegment {
    pub timeline_start_sample: u64,
    /// Exclusive.
    pub timeline_end_sample: u64,
    pub volume: f32,
    pub fade_in_sec: f64,
    pub fade_out_sec: f64,
    /// Restart the source from its beginning until the segment ends.
    pub looped: bool,
    pub source: AudioPcm,
}

impl AudioSegment {
    /// Play `source` once from `start_sample` at unity gain.
    pub fn once(source: AudioPcm, start_sample: u64, out_rate: u32) -> Self {
        let len = secs_to_sample(source.duration().as_secs_f64(), out_rate);
        Self {
            timeline_start_sample: start_sample,
            timeline_end_sample: start_sample + len,
            volume: 1.0,
            fade_in_sec: 0.0,
            fade_out_sec: 0.0,
            looped: false,
            source,
        }
    }
}

/// Everything needed to render the final audio track.
#[derive(Clone, Debug)]
pub struct AudioManifest {
    pub sample_rate: u32,
    pub channels: u16,
    pub total_samples: u64,
    pub segments: Vec<AudioSegment>,
}

/// Mix all segments into interleaved output PCM, clamped to `[-1, 1]`.
pub fn mix_manifest(manifest: &AudioManifest) -> Vec<f32> {
    let frames = manifest.total_samples as usize;
    let mut out = vec![0.0f32; frames * usize::from(manifest.channels)];

    for seg in &manifest.segments {
        mix_segment(&mut out, manifest, seg);
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    out
}

fn mix_segment(out: &mut [f32], manifest: &AudioManifest, seg: &AudioSegment) {
    let end = seg.timeline_end_sample.min(manifest.total_samples);
    let seg_len_samples = end.saturating_sub(seg.timeline_start_sample);
    if seg_len_samples == 0 {
        return;
    }

    let src = seg.source.interleaved_f32.as_ref();
    let src_channels = usize::from(seg.source.channels);
    let src_frames = seg.source.frames();
    if src_frames == 0 {
        return;
    }
    let src_rate = f64::from(seg.source.sample_rate);
    let src_len_sec = src_frames as f64 / src_rate;

    for dst_sample in seg.timeline_start_sample..end {
        let rel_sample = dst_sample - seg.timeline_start_sample;
        let rel_sec = (rel_sample as f64) / f64::from(manifest.sample_rate);

        let src_sec = if seg.looped {
            rel_sec % src_len_sec
        } else {
            rel_sec
        };
        let src_pos = src_sec * src_rate;
        if !src_pos.is_finite() || src_pos < 0.0 {
            break;
        }
        let src_frame0 = src_pos.floor() as usize;
        if src_frame0 >= src_frames {
            break;
        }
        let src_frame1 = if seg.looped {
            (src_frame0 + 1) % src_frames
        } else {
            (src_frame0 + 1).min(src_frames - 1)
        };
        let frac = (src_pos - src_frame0 as f64) as f32;

        let gain = fade_gain(seg, rel_sec, seg_len_samples, manifest.sample_rate) * seg.volume;
        let dst_idx = dst_sample as usize * usize::from(manifest.channels);

        let (l, r) = if src_channels == 1 {
            let v0 = src[src_frame0];
            let v1 = src[src_frame1];
            let v = v0 + ((v1 - v0) * frac);
            (v, v)
        } else {
            let i0 = src_frame0 * src_channels;
            let i1 = src_frame1 * src_channels;
            let (l0, l1) = (src[i0], src[i1]);
            let (r0, r1) = (src[i0 + 1], src[i1 + 1]);
            (l0 + ((l1 - l0) * frac), r0 + ((r1 - r0) * frac))
        };

        out[dst_idx] += l * gain;
        if manifest.channels > 1 {
            out[dst_idx + 1] += r * gain;
        }
    }
}

fn fade_gain(seg: &AudioSegment, rel_sec: f64, seg_len_samples: u64, sample_rate: u32) -> f32 {
    let mut gain = 1.0f32;
    if seg.fade_in_sec > 0.0 {
        gain *= (rel_sec / seg.fade_in_sec).clamp(0.0, 1.0) as f32;
    }
    if seg.fade_out_sec > 0.0 {
        let seg_len_sec = (seg_len_samples as f64) / f64::from(sample_rate);
        let rem = (seg_len_sec - rel_sec).max(0.0);
        gain *= (rem / seg.fade_out_sec).clamp(0.0, 1.0) as f32;
    }
    gain
}

/// Write interleaved `f32` PCM samples to a raw little-endian `.f32le` file.
pub fn write_mix_to_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> ReelResult<()> {
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "create audio mix output directory '{}'",
                parent.display()
            )
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes)
        .with_context(|| format!("write mixed audio file '{}'", out_path.display()))?;
    Ok(())
}

/// Nearest sample index for a time offset.
pub fn secs_to_sample(secs: f64, sample_rate: u32) -> u64 {
    (secs.max(0.0) * f64::from(sample_rate)).round() as u64
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
