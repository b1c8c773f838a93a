use super::*;

fn mono(s: &str) -> f64 {
    s.chars().count() as f64
}

/// `W` and `M` twice as wide as everything else.
fn wide_caps(s: &str, size: f32) -> f64 {
    s.chars()
        .map(|c| if matches!(c, 'W' | 'M') { 1.0 } else { 0.5 })
        .sum::<f64>()
        * f64::from(size)
}

fn white_on_black() -> CaptionColors {
    CaptionColors {
        text: [255, 255, 255],
        background: [0, 0, 0, 255],
    }
}

fn lit_pixels(frame: &FrameRGBA, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> usize {
    let mut n = 0;
    for y in ys {
        for x in xs.clone() {
            if frame.pixel(x, y)[0] > 128 {
                n += 1;
            }
        }
    }
    n
}

fn system_renderer() -> Option<CaptionRenderer> {
    let renderer = CaptionRenderer::with_system_fonts();
    if renderer.font_family().is_none() {
        eprintln!("skipping: no system fonts installed");
        return None;
    }
    Some(renderer)
}

#[test]
fn wrap_is_greedy_and_keeps_word_order() {
    let lines = wrap_words("the quick brown fox jumps over the lazy dog", 10.0, &mut mono);
    assert_eq!(lines, vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]);
    assert!(lines.iter().all(|l| l.chars().count() <= 10));
}

#[test]
fn overlong_words_are_hard_broken() {
    let lines = wrap_words("a supercalifragilistic b", 6.0, &mut mono);
    assert_eq!(lines, vec!["a", "superc", "alifra", "gilist", "ic b"]);
}

#[test]
fn empty_text_has_no_lines() {
    assert!(wrap_words("   ", 10.0, &mut mono).is_empty());
}

#[test]
fn wide_glyphs_wrap_sooner_than_narrow_ones() {
    let region = caption_region(Resolution::HD_720);
    let inner = region.inset(-padding(region));
    let wide = "WWWWWW MMMMMM ".repeat(8);
    let narrow = "iiiiii llllll ".repeat(8);

    let wide_layout = layout_caption(&wide, region, 40.0, 20.0, &mut wide_caps);
    let narrow_layout = layout_caption(&narrow, region, 40.0, 20.0, &mut wide_caps);

    assert!(wide_layout.lines.len() > narrow_layout.lines.len());
    for line in &wide_layout.lines {
        assert!(
            wide_caps(line, wide_layout.font_size) <= inner.width(),
            "line {line:?} overflows"
        );
    }
}

#[test]
fn region_sits_inside_the_frame_bottom() {
    let res = Resolution::new(1280, 720).unwrap();
    let r = caption_region(res);
    assert!(r.x0 >= 0.0 && r.x1 <= 1280.0);
    assert!(r.y1 <= 720.0 && r.y0 > 360.0);
}

#[test]
fn short_caption_keeps_base_size() {
    let region = caption_region(Resolution::HD_720);
    let layout = layout_caption("A short line.", region, 40.0, 20.0, &mut estimated_advance);
    assert_eq!(layout.font_size, 40.0);
    assert_eq!(layout.lines, vec!["A short line."]);
    assert!(!layout.truncated);
}

#[test]
fn long_caption_shrinks_before_truncating() {
    let region = caption_region(Resolution::HD_720);
    let text = "word ".repeat(60);
    let layout = layout_caption(&text, region, 40.0, 20.0, &mut estimated_advance);
    assert!(layout.font_size < 40.0);
    assert!(!layout.truncated);

    let huge = "word ".repeat(400);
    let layout = layout_caption(&huge, region, 40.0, 20.0, &mut estimated_advance);
    assert_eq!(layout.font_size, 20.0);
    assert!(layout.truncated);
    assert!(layout.lines.last().unwrap().ends_with(ELLIPSIS));

    // Everything fits the region at the final size.
    let inner = region.inset(-padding(region));
    assert!(layout.lines.len() <= line_capacity(inner, layout.font_size));
    assert!(
        layout
            .lines
            .iter()
            .all(|l| estimated_advance(l, layout.font_size) <= inner.width())
    );
}

#[test]
fn svg_escapes_markup_in_captions() {
    let layout = CaptionLayout {
        lines: vec!["Tom & <Jerry>".into()],
        font_size: 20.0,
        truncated: false,
    };
    let svg = caption_svg(100, 40, 4.0, &layout, white_on_black());
    assert!(svg.contains("Tom &amp; &lt;Jerry&gt;"));
    assert!(!svg.contains("<Jerry>"));
}

#[test]
fn control_characters_do_not_break_the_svg() {
    let layout = CaptionLayout {
        lines: vec!["bell\u{7}and\u{1b}escape\u{0}".into()],
        font_size: 20.0,
        truncated: false,
    };
    let svg = caption_svg(100, 40, 4.0, &layout, white_on_black());
    assert!(!svg.chars().any(|c| c.is_control()));
    assert!(usvg::Tree::from_str(&svg, &usvg::Options::default()).is_ok());
}

#[test]
fn caption_box_darkens_only_the_caption_region() {
    let res = Resolution::new(640, 360).unwrap();
    let mut frame = FrameRGBA::solid(res, [255, 255, 255, 255]);
    let region = caption_region(res);
    let renderer = CaptionRenderer::with_fontdb(Database::new());
    assert!(renderer.font_family().is_none());
    let layout = renderer.layout("hi", region, 24.0, 12.0);
    renderer
        .draw(
            &mut frame,
            region,
            &layout,
            CaptionColors {
                text: [255, 255, 255],
                background: [0, 0, 0, 150],
            },
        )
        .unwrap();

    let inside = frame.pixel(region.x0 as u32 + 3, region.y1 as u32 - 12);
    assert!((100..=110).contains(&inside[0]), "got {inside:?}");
    assert_eq!(inside[3], 255);
    assert_eq!(frame.pixel(10, 10), [255, 255, 255, 255]);
}

#[test]
fn system_fonts_resolve_generic_sans_serif() {
    let Some(renderer) = system_renderer() else {
        return;
    };
    let sans = Query {
        families: &[Family::SansSerif],
        ..Query::default()
    };
    assert!(renderer.fontdb.query(&sans).is_some());
}

#[test]
fn system_font_captions_draw_glyphs() {
    let Some(renderer) = system_renderer() else {
        return;
    };
    let res = Resolution::new(640, 360).unwrap();
    let mut frame = FrameRGBA::solid(res, [0, 0, 0, 255]);
    let region = caption_region(res);
    let layout = renderer.layout("Hello world", region, 24.0, 12.0);
    renderer
        .draw(&mut frame, region, &layout, white_on_black())
        .unwrap();

    let lit = lit_pixels(
        &frame,
        region.x0 as u32..region.x1 as u32,
        region.y0 as u32..region.y1 as u32,
    );
    assert!(lit > 20, "caption text was not drawn ({lit} lit pixels)");
    assert_eq!(lit_pixels(&frame, 0..res.width, 0..region.y0 as u32), 0);
}

#[test]
fn measured_wrap_keeps_wide_glyphs_inside_the_padding() {
    let Some(renderer) = system_renderer() else {
        return;
    };
    let res = Resolution::HD_720;
    let region = caption_region(res);
    let layout = renderer.layout(&"WWWWWW MMMMMM ".repeat(8), region, 40.0, 20.0);
    assert!(layout.lines.len() > 1);

    let mut frame = FrameRGBA::solid(res, [0, 0, 0, 255]);
    renderer
        .draw(&mut frame, region, &layout, white_on_black())
        .unwrap();

    let (x0, x1) = (region.x0 as u32, region.x1 as u32);
    let ys = region.y0 as u32..region.y1 as u32;
    assert!(lit_pixels(&frame, x0..x1, ys.clone()) > 0);
    assert_eq!(lit_pixels(&frame, x0..x0 + 8, ys.clone()), 0, "text overflows left");
    assert_eq!(lit_pixels(&frame, x1 - 8..x1, ys), 0, "text overflows right");
}
