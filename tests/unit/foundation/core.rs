use super::*;

#[test]
fn fps_rejects_zero_and_rounds_frame_boundaries() {
    assert!(Fps::new(0).is_err());
    let fps = Fps::new(30).unwrap();
    assert_eq!(fps.secs_to_frames_round(5.0), 150);
    assert_eq!(fps.secs_to_frames_round(0.0166), 0);
    assert_eq!(fps.secs_to_frames_round(0.0167), 1);
    assert!((fps.frames_to_secs(45) - 1.5).abs() < 1e-9);
}

#[test]
fn solid_frame_is_premultiplied() {
    let res = Resolution::new(4, 2).unwrap();
    let f = FrameRGBA::solid(res, [200, 100, 0, 128]);
    assert_eq!(f.data.len(), res.rgba_len());
    assert_eq!(f.pixel(3, 1), [100, 50, 0, 128]);
    assert!(f.premultiplied);
}

#[test]
fn progress_percent_is_clamped() {
    assert_eq!(ProgressUpdate::new(140.0, "x").percent, 100.0);
    assert_eq!(ProgressUpdate::new(-3.0, "x").percent, 0.0);
}
