use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context as _;
use usvg::fontdb::{Database, Family, Query, Style, Weight};

use crate::foundation::core::{FrameRGBA, Resolution};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::over;

/// Average sans-serif glyph advance as a fraction of the font size.
const ADVANCE_EM: f64 = 0.55;
const LINE_HEIGHT_EM: f64 = 1.25;
const SHRINK_STEP_PX: f32 = 2.0;
const ELLIPSIS: char = '\u{2026}';

/// Wrapped caption text ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionLayout {
    pub lines: Vec<String>,
    pub font_size: f32,
    pub truncated: bool,
}

/// Fixed caption band along the bottom of the frame.
pub fn caption_region(res: Resolution) -> kurbo::Rect {
    let w = f64::from(res.width);
    let h = f64::from(res.height);
    let margin_x = (w * 0.05).round();
    let margin_bottom = (h * 0.04).round();
    let height = (h * 0.28).round();
    kurbo::Rect::new(margin_x, h - margin_bottom - height, w - margin_x, h - margin_bottom)
}

fn padding(region: kurbo::Rect) -> f64 {
    (region.height() * 0.08).round().max(4.0)
}

/// Fit `text` into `region`: wrap at `base_size`, shrink step by step down to `min_size`, and
/// truncate with an ellipsis if it still does not fit.
///
/// `advance(text, size)` is the horizontal advance of `text` set on one line at `size` px.
pub fn layout_caption(
    text: &str,
    region: kurbo::Rect,
    base_size: f32,
    min_size: f32,
    advance: &mut dyn FnMut(&str, f32) -> f64,
) -> CaptionLayout {
    let inner = region.inset(-padding(region));
    let max_width = inner.width().max(1.0);
    let min_size = min_size.min(base_size);

    let mut size = base_size;
    loop {
        let max_lines = line_capacity(inner, size);
        let lines = wrap_words(text, max_width, &mut |s: &str| advance(s, size));
        if lines.len() <= max_lines {
            return CaptionLayout {
                lines,
                font_size: size,
                truncated: false,
            };
        }
        if size <= min_size {
            return CaptionLayout {
                lines: truncate_lines(lines, max_lines, max_width, &mut |s: &str| {
                    advance(s, size)
                }),
                font_size: size,
                truncated: true,
            };
        }
        size = (size - SHRINK_STEP_PX).max(min_size);
    }
}

fn line_capacity(inner: kurbo::Rect, size: f32) -> usize {
    (inner.height() / (f64::from(size) * LINE_HEIGHT_EM))
        .floor()
        .max(1.0) as usize
}

/// Advance guess for when no font face is available to measure with.
pub fn estimated_advance(text: &str, size: f32) -> f64 {
    text.chars().count() as f64 * f64::from(size) * ADVANCE_EM
}

/// Greedy word wrap on measured advance. Words wider than a line are hard-broken.
pub fn wrap_words(text: &str, max_width: f64, width: &mut dyn FnMut(&str) -> f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if !line.is_empty() {
            let candidate = format!("{line} {word}");
            if width(&candidate) <= max_width {
                line = candidate;
                continue;
            }
            lines.push(std::mem::take(&mut line));
        }

        let mut rest = word;
        while width(rest) > max_width {
            let cut = longest_fitting_prefix(rest, max_width, width);
            lines.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        line.push_str(rest);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Byte length of the longest prefix of `word` that fits, never less than one char.
fn longest_fitting_prefix(word: &str, max_width: f64, width: &mut dyn FnMut(&str) -> f64) -> usize {
    let mut ends = word.char_indices().map(|(i, c)| i + c.len_utf8());
    let first = ends.next().unwrap_or(word.len());
    let mut best = first;
    for end in ends {
        if width(&word[..end]) > max_width {
            break;
        }
        best = end;
    }
    best
}

fn truncate_lines(
    mut lines: Vec<String>,
    max_lines: usize,
    max_width: f64,
    width: &mut dyn FnMut(&str) -> f64,
) -> Vec<String> {
    lines.truncate(max_lines);
    if let Some(last) = lines.last_mut() {
        let mut cut = last.trim_end().to_string();
        loop {
            let candidate = format!("{cut}{ELLIPSIS}");
            if cut.is_empty() || width(&candidate) <= max_width {
                *last = candidate;
                break;
            }
            cut.pop();
            let trimmed = cut.trim_end().len();
            cut.truncate(trimmed);
        }
    }
    lines
}

/// Families tried, in order, when the font database has no face for generic `sans-serif`.
const FALLBACK_SANS: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Arial",
    "Helvetica",
    "Roboto",
    "Open Sans",
    "FreeSans",
];

/// The face captions are both measured and drawn with.
#[derive(Clone)]
struct CaptionFace {
    family: String,
    data: parley::fontique::Blob<u8>,
}

/// Point generic `sans-serif` at a face that is actually installed and return it.
fn resolve_caption_face(db: &mut Database) -> Option<CaptionFace> {
    let sans = Query {
        families: &[Family::SansSerif],
        ..Query::default()
    };
    if db.query(&sans).is_none() {
        let family = fallback_family(db)?;
        tracing::debug!(
            generic = db.family_name(&Family::SansSerif),
            family = %family,
            "generic sans-serif family not installed; substituting"
        );
        db.set_sans_serif_family(family);
    }
    let id = db.query(&sans)?;
    let family = db.face(id)?.families.first()?.0.clone();
    let data = db.with_face_data(id, |bytes, _index| bytes.to_vec())?;
    Some(CaptionFace {
        family,
        data: parley::fontique::Blob::from(data),
    })
}

fn fallback_family(db: &Database) -> Option<String> {
    let family_of = |face: &usvg::fontdb::FaceInfo| face.families.first().map(|(n, _)| n.clone());
    for wanted in FALLBACK_SANS {
        let found = db.faces().find(|face| {
            face.families
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(wanted))
        });
        if let Some(face) = found {
            return family_of(face);
        }
    }
    db.faces()
        .find(|face| face.style == Style::Normal && face.weight == Weight::NORMAL)
        .or_else(|| db.faces().next())
        .and_then(family_of)
}

/// Shapes single lines with parley to get their advance.
struct LineMeasurer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    family: String,
}

impl LineMeasurer {
    fn new(face: &CaptionFace) -> ReelResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let registered = font_ctx
            .collection
            .register_fonts(face.data.clone(), None);
        let mut names = Vec::new();
        for (id, _) in &registered {
            if let Some(name) = font_ctx.collection.family_name(*id) {
                names.push(name.to_string());
            }
        }
        let family = names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(&face.family))
            .or_else(|| names.first())
            .cloned()
            .ok_or_else(|| ReelError::validation("caption font registered no family"))?;
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family,
        })
    }

    fn advance(&mut self, text: &str, size: f32) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(self.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size));
        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);
        layout
            .lines()
            .map(|line| f64::from(line.metrics().advance))
            .fold(0.0, f64::max)
    }
}

/// Draws captions through `usvg`/`resvg`.
pub struct CaptionRenderer {
    fontdb: Arc<Database>,
    face: Option<CaptionFace>,
}

impl std::fmt::Debug for CaptionRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionRenderer")
            .field("font_faces", &self.fontdb.len())
            .field("family", &self.font_family())
            .finish()
    }
}

/// Caption text and box colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptionColors {
    pub text: [u8; 3],
    /// Straight-alpha RGBA.
    pub background: [u8; 4],
}

impl CaptionRenderer {
    /// Renderer using the system fonts.
    pub fn with_system_fonts() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        Self::with_fontdb(db)
    }

    /// Renderer over `db`. Generic `sans-serif` is remapped to an installed face when needed.
    pub fn with_fontdb(mut db: Database) -> Self {
        let face = resolve_caption_face(&mut db);
        match &face {
            Some(face) => {
                tracing::debug!(faces = db.len(), family = %face.family, "caption font selected");
            }
            None => {
                tracing::warn!(faces = db.len(), "no usable caption font; captions draw without text");
            }
        }
        Self {
            fontdb: Arc::new(db),
            face,
        }
    }

    /// Family captions are drawn with, if any font is available.
    pub fn font_family(&self) -> Option<&str> {
        self.face.as_ref().map(|f| f.family.as_str())
    }

    /// [`layout_caption`] measured with this renderer's face.
    pub fn layout(
        &self,
        text: &str,
        region: kurbo::Rect,
        base_size: f32,
        min_size: f32,
    ) -> CaptionLayout {
        let measurer = self.face.as_ref().map(LineMeasurer::new).transpose();
        match measurer {
            Ok(Some(mut m)) => {
                let mut measure = |s: &str, size: f32| m.advance(s, size);
                layout_caption(text, region, base_size, min_size, &mut measure)
            }
            Ok(None) => layout_caption(text, region, base_size, min_size, &mut estimated_advance),
            Err(err) => {
                tracing::warn!(error = %err, "caption font unusable for layout; estimating widths");
                layout_caption(text, region, base_size, min_size, &mut estimated_advance)
            }
        }
    }

    /// Composite `layout` over `frame` inside `region`.
    pub fn draw(
        &self,
        frame: &mut FrameRGBA,
        region: kurbo::Rect,
        layout: &CaptionLayout,
        colors: CaptionColors,
    ) -> ReelResult<()> {
        if layout.lines.is_empty() {
            return Ok(());
        }
        let region = region.intersect(frame.resolution().bounds()).round();
        let w = region.width() as u32;
        let h = region.height() as u32;
        if w == 0 || h == 0 {
            return Ok(());
        }

        let svg = caption_svg(w, h, padding(region), layout, colors);
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &options).context("parse caption svg")?;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(w, h)
            .ok_or_else(|| ReelError::validation("failed to allocate caption pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        let x0 = region.x0 as u32;
        let y0 = region.y0 as u32;
        let src = pixmap.data();
        for row in 0..h {
            let dst_start = ((y0 + row) as usize * frame.width as usize + x0 as usize) * 4;
            let src_start = row as usize * w as usize * 4;
            let dst_row = &mut frame.data[dst_start..dst_start + w as usize * 4];
            let src_row = &src[src_start..src_start + w as usize * 4];
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], 1.0);
                d.copy_from_slice(&out);
            }
        }
        Ok(())
    }
}

fn caption_svg(w: u32, h: u32, pad: f64, layout: &CaptionLayout, colors: CaptionColors) -> String {
    let size = f64::from(layout.font_size);
    let line_h = size * LINE_HEIGHT_EM;
    let block_h = line_h * layout.lines.len() as f64;
    let box_h = (block_h + pad * 2.0).min(f64::from(h));
    let box_y = f64::from(h) - box_h;
    let first_baseline = box_y + pad + size;
    let [br, bg, bb, ba] = colors.background;
    let [tr, tg, tb] = colors.text;

    let mut svg = String::with_capacity(256 + layout.lines.iter().map(|l| l.len() + 48).sum::<usize>());
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    let _ = write!(
        svg,
        r#"<rect x="0" y="{box_y:.1}" width="{w}" height="{box_h:.1}" rx="{rx:.1}" fill="rgb({br},{bg},{bb})" fill-opacity="{op:.3}"/>"#,
        rx = pad,
        op = f64::from(ba) / 255.0,
    );
    let _ = write!(
        svg,
        r#"<text font-family="sans-serif" font-size="{size:.1}" fill="rgb({tr},{tg},{tb})" text-anchor="middle">"#
    );
    for (i, line) in layout.lines.iter().enumerate() {
        let y = first_baseline + line_h * i as f64;
        let _ = write!(
            svg,
            r#"<tspan x="{cx:.1}" y="{y:.1}">{text}</tspan>"#,
            cx = f64::from(w) / 2.0,
            text = xml_escape(line),
        );
    }
    svg.push_str("</text></svg>");
    svg
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            // Not representable in XML 1.0.
            c if c.is_control() && c != '\t' => out.push(' '),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/compose/caption.rs"]
mod tests;
