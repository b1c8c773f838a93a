use crate::foundation::error::{ReelError, ReelResult};

/// Integer output frame rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps(pub u32);

impl Fps {
    pub fn new(fps: u32) -> ReelResult<Self> {
        if fps == 0 {
            return Err(ReelError::validation("fps must be > 0"));
        }
        Ok(Self(fps))
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    /// Frame boundary at or nearest to `secs` on the output timeline.
    pub fn secs_to_frames_round(self, secs: f64) -> u64 {
        (secs * self.as_f64()).round().max(0.0) as u64
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) / self.as_f64()
    }
}

/// Output frame dimensions. Fixed for the lifetime of one render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD_720: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    pub fn new(width: u32, height: u32) -> ReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelError::validation("resolution width/height must be non-zero"));
        }
        Ok(Self { width, height })
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn rgba_len(self) -> usize {
        self.pixel_count() * 4
    }

    pub fn bounds(self) -> kurbo::Rect {
        kurbo::Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// A composited frame as RGBA8 pixels.
///
/// Frames are **premultiplied alpha**; the `premultiplied` flag keeps that explicit at the
/// muxer boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Opaque frame filled with one straight-alpha color.
    pub fn solid(res: Resolution, rgba: [u8; 4]) -> Self {
        let px = crate::foundation::math::premultiply(rgba);
        let mut data = Vec::with_capacity(res.rgba_len());
        for _ in 0..res.pixel_count() {
            data.extend_from_slice(&px);
        }
        Self {
            width: res.width,
            height: res.height,
            data,
            premultiplied: true,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

/// Coarse render progress, reported to the caller's progress callback.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// Percentage in `[0, 100]`.
    pub percent: f32,
    /// Human-readable phase label.
    pub phase: String,
}

impl ProgressUpdate {
    pub fn new(percent: f32, phase: impl Into<String>) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            phase: phase.into(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
