use std::io::Cursor;

use super::*;

fn png_bytes(img: image::RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_png_premultiplies_after_fit() {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([100, 50, 200, 128]));
    let prepared = prepare_image(&png_bytes(img), Resolution::new(2, 2).unwrap()).unwrap();
    assert_eq!(prepared.width, 2);
    assert_eq!(
        &prepared.rgba8_premul[0..4],
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn cover_fit_crops_wide_source_to_center() {
    // 4x1 source: red | green green | blue. Covering a 2x1 target keeps the green middle.
    let mut img = image::RgbaImage::new(4, 1);
    img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
    img.put_pixel(1, 0, image::Rgba([0, 255, 0, 255]));
    img.put_pixel(2, 0, image::Rgba([0, 255, 0, 255]));
    img.put_pixel(3, 0, image::Rgba([0, 0, 255, 255]));

    let fitted = cover_fit(&img, Resolution::new(2, 1).unwrap()).unwrap();
    assert_eq!(fitted.rgba8_premul, vec![0, 255, 0, 255, 0, 255, 0, 255]);
}

#[test]
fn cover_fit_always_matches_target_dimensions() {
    let img = image::RgbaImage::from_pixel(37, 91, image::Rgba([1, 2, 3, 255]));
    let target = Resolution::new(64, 36).unwrap();
    let fitted = cover_fit(&img, target).unwrap();
    assert_eq!((fitted.width, fitted.height), (64, 36));
    assert_eq!(fitted.rgba8_premul.len(), target.rgba_len());
}

#[test]
fn garbage_bytes_fail_to_decode() {
    assert!(decode_image(b"not an image").is_err());
}
