use super::*;

fn compositor(w: u32, h: u32) -> FrameCompositor {
    FrameCompositor::new(
        Resolution::new(w, h).unwrap(),
        24.0,
        Arc::new(CaptionRenderer::with_fontdb(
            usvg::fontdb::Database::new(),
        )),
    )
}

#[test]
fn missing_image_uses_style_gradient() {
    let c = compositor(64, 36);
    let scene = Scene::new("", 3.0);
    let style = StyleTag::new("anime");
    let frame = c.compose(&scene, &style, None).unwrap();
    assert_eq!(frame.resolution(), c.resolution());
    assert_eq!(frame.pixel(0, 0), [255, 140, 170, 255]);
    assert_eq!(frame, c.placeholder(&scene, &style));
}

#[test]
fn frames_share_dimensions_with_or_without_images() {
    let c = compositor(64, 36);
    let style = StyleTag::default();
    let img = PreparedImage {
        width: 64,
        height: 36,
        rgba8_premul: vec![200; 64 * 36 * 4],
    };
    let a = c.compose(&Scene::new("with image", 3.0), &style, Some(&img)).unwrap();
    let b = c.placeholder(&Scene::new("without", 3.0), &style);
    assert_eq!(a.resolution(), b.resolution());
    assert_eq!(a.data.len(), b.data.len());
}

#[test]
fn mismatched_background_is_rejected() {
    let c = compositor(64, 36);
    let img = PreparedImage {
        width: 32,
        height: 18,
        rgba8_premul: vec![0; 32 * 18 * 4],
    };
    let err = c
        .compose(&Scene::new("x", 3.0), &StyleTag::default(), Some(&img))
        .unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));
}

#[test]
fn composition_is_deterministic() {
    let c = compositor(128, 72);
    let scene = Scene::new("Same caption every time", 4.0);
    let style = StyleTag::new("watercolor");
    assert_eq!(
        c.compose(&scene, &style, None).unwrap(),
        c.compose(&scene, &style, None).unwrap()
    );
}

#[test]
fn png_export_unpremultiplies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/frame.png");
    let frame = FrameRGBA {
        width: 1,
        height: 1,
        data: vec![64, 0, 0, 128],
        premultiplied: true,
    };
    write_png(&frame, &path).unwrap();
    let back = image::open(&path).unwrap().to_rgba8();
    assert_eq!(back.get_pixel(0, 0).0, [128, 0, 0, 128]);
}

#[test]
fn placeholder_frames_carry_their_own_captions() {
    let captions = CaptionRenderer::with_system_fonts();
    if captions.font_family().is_none() {
        eprintln!("skipping: no system fonts installed");
        return;
    }
    let res = Resolution::new(320, 180).unwrap();
    let c = FrameCompositor::new(res, 18.0, Arc::new(captions));
    let style = StyleTag::default();
    let region = caption_region(res);

    let frames: Vec<FrameRGBA> = ["Waves roll in.", "Gulls circle overhead.", "Night falls."]
        .into_iter()
        .map(|text| c.placeholder(&Scene::new(text, 3.0), &style))
        .collect();

    let caption_rows = |f: &FrameRGBA| -> Vec<[u8; 4]> {
        let mut px = Vec::new();
        for y in region.y0 as u32..region.y1 as u32 {
            for x in region.x0 as u32..region.x1 as u32 {
                px.push(f.pixel(x, y));
            }
        }
        px
    };
    for f in &frames {
        // Cinematic captions are white over a dark box on a dark gradient.
        let glyph_px = caption_rows(f).iter().filter(|p| p[0] > 200).count();
        assert!(glyph_px > 10, "no caption glyphs in placeholder frame");
    }
    assert_ne!(caption_rows(&frames[0]), caption_rows(&frames[1]));
    assert_ne!(caption_rows(&frames[1]), caption_rows(&frames[2]));
    // Above the caption band the frames are the same gradient.
    let top = (region.y0 as usize) * res.width as usize * 4;
    assert_eq!(frames[0].data[..top], frames[2].data[..top]);
}
