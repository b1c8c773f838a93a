use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::assets::decode::{PreparedImage, prepare_image};
use crate::compose::caption::{CaptionColors, CaptionRenderer, caption_region};
use crate::compose::style::StylePalette;
use crate::config::EngineConfig;
use crate::foundation::core::{FrameRGBA, Resolution};
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::project::StyleTag;
use crate::model::scene::Scene;

/// Captions never shrink below this fraction of the configured size.
const MIN_CAPTION_SCALE: f32 = 0.5;

/// Renders one scene into a fixed-size premultiplied frame.
///
/// Every frame from one compositor has the same dimensions.
#[derive(Clone, Debug)]
pub struct FrameCompositor {
    res: Resolution,
    caption_size: f32,
    captions: Arc<CaptionRenderer>,
}

impl FrameCompositor {
    pub fn new(res: Resolution, caption_size: f32, captions: Arc<CaptionRenderer>) -> Self {
        Self {
            res,
            caption_size,
            captions,
        }
    }

    /// Compositor at the configured resolution, drawing captions with system fonts.
    pub fn from_config(cfg: &EngineConfig) -> ReelResult<Self> {
        Ok(Self::new(
            cfg.resolution()?,
            cfg.caption_font_size_px,
            Arc::new(CaptionRenderer::with_system_fonts()),
        ))
    }

    pub fn resolution(&self) -> Resolution {
        self.res
    }

    /// Decode and cover-fit encoded image bytes to this compositor's resolution.
    pub fn prepare_background(&self, bytes: &[u8]) -> ReelResult<PreparedImage> {
        prepare_image(bytes, self.res)
    }

    /// Background image (or style gradient when `image` is `None`), style tint, caption.
    pub fn compose(
        &self,
        scene: &Scene,
        style: &StyleTag,
        image: Option<&PreparedImage>,
    ) -> ReelResult<FrameRGBA> {
        let palette = StylePalette::for_style(style);
        let mut frame = match image {
            Some(img) => {
                if img.width != self.res.width || img.height != self.res.height {
                    return Err(ReelError::validation(format!(
                        "background is {}x{}, expected {}x{}",
                        img.width, img.height, self.res.width, self.res.height
                    )));
                }
                let mut frame = FrameRGBA {
                    width: img.width,
                    height: img.height,
                    data: img.rgba8_premul.clone(),
                    premultiplied: true,
                };
                palette.apply_tint(&mut frame);
                frame
            }
            None => palette.gradient(self.res),
        };
        self.draw_caption(&mut frame, &scene.text, &palette)?;
        Ok(frame)
    }

    /// Gradient frame with the scene's caption. Never fails: a caption that cannot be drawn is
    /// logged and left out.
    pub fn placeholder(&self, scene: &Scene, style: &StyleTag) -> FrameRGBA {
        let palette = StylePalette::for_style(style);
        let mut frame = palette.gradient(self.res);
        if let Err(err) = self.draw_caption(&mut frame, &scene.text, &palette) {
            tracing::warn!(scene = %scene.id, error = %err, "caption dropped from placeholder frame");
        }
        frame
    }

    fn draw_caption(&self, frame: &mut FrameRGBA, text: &str, palette: &StylePalette) -> ReelResult<()> {
        let region = caption_region(self.res);
        let layout = self.captions.layout(
            text,
            region,
            self.caption_size,
            self.caption_size * MIN_CAPTION_SCALE,
        );
        if layout.truncated {
            tracing::debug!(font_size = layout.font_size, "caption truncated to fit");
        }
        self.captions.draw(
            frame,
            region,
            &layout,
            CaptionColors {
                text: palette.caption_text,
                background: palette.caption_box,
            },
        )
    }
}

/// Write a frame as an opaque-or-transparent PNG (straight alpha).
pub fn write_png(frame: &FrameRGBA, path: &Path) -> ReelResult<()> {
    let mut data = frame.data.clone();
    if frame.premultiplied {
        for px in data.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
    }
    let img = image::RgbaImage::from_raw(frame.width, frame.height, data)
        .ok_or_else(|| ReelError::validation("frame buffer does not match its dimensions"))?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/compose/compositor.rs"]
mod tests;
