use crate::foundation::core::{FrameRGBA, Resolution};
use crate::foundation::math::{Fnv1a64, lerp_u8, over, premultiply};
use crate::model::project::StyleTag;

/// Colors derived from a project's style tag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StylePalette {
    /// Placeholder gradient, top row.
    pub top: [u8; 3],
    /// Placeholder gradient, bottom row.
    pub bottom: [u8; 3],
    /// Color wash laid over background images.
    pub tint: Option<Tint>,
    pub caption_text: [u8; 3],
    /// Straight-alpha RGBA of the box behind captions.
    pub caption_box: [u8; 4],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tint {
    pub rgb: [u8; 3],
    pub strength: f32,
}

const DARK_BOX: [u8; 4] = [0, 0, 0, 150];
const WHITE: [u8; 3] = [255, 255, 255];

impl StylePalette {
    pub fn for_style(style: &StyleTag) -> Self {
        let key = style.as_str().trim().to_ascii_lowercase();
        match key.as_str() {
            "cinematic" => Self::preset([24, 38, 64], [6, 8, 14], Some(([20, 40, 70], 0.12))),
            "watercolor" => Self::preset(
                [190, 214, 232],
                [236, 208, 196],
                Some(([250, 235, 215], 0.10)),
            ),
            "anime" => Self::preset([255, 140, 170], [90, 120, 235], None),
            "realistic" => Self::preset([96, 110, 120], [34, 38, 42], None),
            "vintage" => Self::preset([176, 140, 96], [70, 48, 30], Some(([112, 66, 20], 0.18))),
            "minimalist" => Self {
                caption_text: [20, 20, 20],
                caption_box: [255, 255, 255, 190],
                ..Self::preset([236, 236, 236], [200, 200, 204], None)
            },
            _ => Self::hashed(&key),
        }
    }

    fn preset(top: [u8; 3], bottom: [u8; 3], tint: Option<([u8; 3], f32)>) -> Self {
        Self {
            top,
            bottom,
            tint: tint.map(|(rgb, strength)| Tint { rgb, strength }),
            caption_text: WHITE,
            caption_box: DARK_BOX,
        }
    }

    /// Deterministic palette for tags without a preset.
    fn hashed(key: &str) -> Self {
        let mut h = Fnv1a64::new_default();
        h.write_bytes(key.as_bytes());
        let bits = h.finish();
        let hue = (bits % 360) as f32;
        Self::preset(hsv(hue, 0.55, 0.60), hsv((hue + 40.0) % 360.0, 0.65, 0.18), None)
    }

    /// Opaque vertical two-color gradient.
    pub fn gradient(&self, res: Resolution) -> FrameRGBA {
        let mut data = Vec::with_capacity(res.rgba_len());
        let span = res.height.saturating_sub(1).max(1) as f32;
        for y in 0..res.height {
            let t = y as f32 / span;
            let px = [
                lerp_u8(self.top[0], self.bottom[0], t),
                lerp_u8(self.top[1], self.bottom[1], t),
                lerp_u8(self.top[2], self.bottom[2], t),
                255,
            ];
            for _ in 0..res.width {
                data.extend_from_slice(&px);
            }
        }
        FrameRGBA {
            width: res.width,
            height: res.height,
            data,
            premultiplied: true,
        }
    }

    /// Wash the tint color over a premultiplied frame in place.
    pub fn apply_tint(&self, frame: &mut FrameRGBA) {
        let Some(tint) = self.tint else {
            return;
        };
        let src = premultiply([tint.rgb[0], tint.rgb[1], tint.rgb[2], 255]);
        for px in frame.data.chunks_exact_mut(4) {
            let out = over([px[0], px[1], px[2], px[3]], src, tint.strength);
            px.copy_from_slice(&out);
        }
    }
}

fn hsv(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let to_u8 = |f: f32| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

#[cfg(test)]
#[path = "../../tests/unit/compose/style.rs"]
mod tests;
