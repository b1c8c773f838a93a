use super::*;

#[test]
fn pcm_duration_uses_frames_not_samples() {
    let pcm = AudioPcm::new(4, 2, vec![0.0; 16]).unwrap();
    assert_eq!(pcm.frames(), 8);
    assert_eq!(pcm.duration(), Duration::from_secs(2));
}

#[test]
fn pcm_rejects_misaligned_or_invalid_layouts() {
    assert!(AudioPcm::new(0, 1, vec![]).is_err());
    assert!(AudioPcm::new(8000, 3, vec![]).is_err());
    assert!(AudioPcm::new(8000, 2, vec![0.0; 3]).is_err());
}

#[test]
fn wav_roundtrip_preserves_layout_and_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let samples: Vec<f32> = (0..800).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
    let pcm = AudioPcm::new(8000, 1, samples).unwrap();
    write_wav(&pcm, &path).unwrap();

    let back = read_wav(&path).unwrap();
    assert_eq!(back.sample_rate, 8000);
    assert_eq!(back.channels, 1);
    assert_eq!(back.frames(), 800);
    let max_err = back
        .interleaved_f32
        .iter()
        .zip(pcm.interleaved_f32.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_err < 1e-3);
}
