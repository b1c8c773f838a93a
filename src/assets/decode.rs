use anyhow::Context;

use crate::foundation::core::Resolution;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::premultiply_rgba8_in_place;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Raster image in premultiplied RGBA8 form.
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Vec<u8>,
}

/// Decode image bytes (PNG, JPEG, WebP, ...) into straight RGBA8.
pub fn decode_image(bytes: &[u8]) -> ReelResult<image::RgbaImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(dyn_img.to_rgba8())
}

/// Scale `src` to cover `target` (preserving aspect ratio), center-crop the overflow, and
/// premultiply.
pub fn cover_fit(src: &image::RgbaImage, target: Resolution) -> ReelResult<PreparedImage> {
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 {
        return Err(ReelError::validation("source image has zero size"));
    }

    let scale = f64::max(
        f64::from(target.width) / f64::from(sw),
        f64::from(target.height) / f64::from(sh),
    );
    // Crop window in source pixels that maps onto the full target.
    let crop_w = ((f64::from(target.width) / scale).round() as u32).clamp(1, sw);
    let crop_h = ((f64::from(target.height) / scale).round() as u32).clamp(1, sh);
    let x = (sw - crop_w) / 2;
    let y = (sh - crop_h) / 2;

    let cropped = image::imageops::crop_imm(src, x, y, crop_w, crop_h).to_image();
    let resized = if cropped.dimensions() == (target.width, target.height) {
        cropped
    } else {
        image::imageops::resize(
            &cropped,
            target.width,
            target.height,
            image::imageops::FilterType::Triangle,
        )
    };

    let mut rgba8_premul = resized.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    Ok(PreparedImage {
        width: target.width,
        height: target.height,
        rgba8_premul,
    })
}

/// Decode and cover-fit in one step.
pub fn prepare_image(bytes: &[u8], target: Resolution) -> ReelResult<PreparedImage> {
    cover_fit(&decode_image(bytes)?, target)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
