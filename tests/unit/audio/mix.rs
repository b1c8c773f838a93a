use super::*;

fn constant(rate: u32, channels: u16, frames: usize, value: f32) -> AudioPcm {
    AudioPcm::new(rate, channels, vec![value; frames * usize::from(channels)]).unwrap()
}

fn manifest(total: u64, segments: Vec<AudioSegment>) -> AudioManifest {
    AudioManifest {
        sample_rate: 1_000,
        channels: 2,
        total_samples: total,
        segments,
    }
}

#[test]
fn segments_land_at_their_timeline_offset() {
    let seg = AudioSegment::once(constant(1_000, 1, 100, 0.5), 200, 1_000);
    assert_eq!(seg.timeline_end_sample, 300);
    let out = mix_manifest(&manifest(400, vec![seg]));
    assert_eq!(out.len(), 800);
    assert_eq!(out[2 * 199], 0.0);
    assert_eq!(out[2 * 200], 0.5);
    assert_eq!(out[2 * 200 + 1], 0.5);
    assert_eq!(out[2 * 299], 0.5);
    assert_eq!(out[2 * 300], 0.0);
}

#[test]
fn looped_segment_covers_the_whole_span() {
    let seg = AudioSegment {
        timeline_start_sample: 0,
        timeline_end_sample: 1_000,
        volume: 0.25,
        fade_in_sec: 0.0,
        fade_out_sec: 0.0,
        looped: true,
        source: constant(1_000, 2, 90, 1.0),
    };
    let out = mix_manifest(&manifest(1_000, vec![seg]));
    assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
}

#[test]
fn fade_out_reaches_silence_at_the_end() {
    let seg = AudioSegment {
        timeline_start_sample: 0,
        timeline_end_sample: 1_000,
        volume: 1.0,
        fade_in_sec: 0.0,
        fade_out_sec: 0.5,
        looped: true,
        source: constant(1_000, 1, 10, 1.0),
    };
    let out = mix_manifest(&manifest(1_000, vec![seg]));
    assert!((out[0] - 1.0).abs() < 1e-6);
    assert!(out[2 * 999] < 0.01);
    assert!(out[2 * 750] > 0.4 && out[2 * 750] < 0.6);
}

#[test]
fn overlapping_sources_sum_and_clamp() {
    let a = AudioSegment::once(constant(1_000, 1, 10, 0.8), 0, 1_000);
    let b = AudioSegment::once(constant(1_000, 1, 10, 0.8), 0, 1_000);
    let out = mix_manifest(&manifest(10, vec![a, b]));
    assert_eq!(out[0], 1.0);
}

#[test]
fn segments_past_the_end_are_cut() {
    let seg = AudioSegment::once(constant(1_000, 1, 500, 0.5), 900, 1_000);
    let out = mix_manifest(&manifest(1_000, vec![seg]));
    assert_eq!(out.len(), 2_000);
    assert_eq!(out[2 * 999], 0.5);
}

#[test]
fn resamples_lower_rate_sources() {
    let src = AudioPcm::new(500, 1, vec![0.0, 1.0]).unwrap();
    let seg = AudioSegment {
        timeline_start_sample: 0,
        timeline_end_sample: 4,
        volume: 1.0,
        fade_in_sec: 0.0,
        fade_out_sec: 0.0,
        looped: false,
        source: src,
    };
    let out = mix_manifest(&manifest(4, vec![seg]));
    assert_eq!(out[0], 0.0);
    assert!((out[2] - 0.5).abs() < 1e-6);
    assert_eq!(out[4], 1.0);
}

#[test]
fn f32le_file_has_four_bytes_per_sample() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mix/out.f32le");
    write_mix_to_f32le_file(&[0.5, -0.5, 1.0], &path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 12);
    assert_eq!(&bytes[0..4], &0.5f32.to_le_bytes());
}
