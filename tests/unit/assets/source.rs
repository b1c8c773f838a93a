use super::*;

#[test]
fn remote_urls_are_detected_case_insensitively() {
    assert!(is_remote("https://example.com/a.png"));
    assert!(is_remote("HTTP://example.com/a.png"));
    assert!(!is_remote("file:///tmp/a.png"));
    assert!(!is_remote("images/a.png"));
    assert!(!is_remote(""));
}

#[test]
fn fs_source_resolves_relative_and_file_urls() {
    let src = FsImageSource::new("/assets");
    assert_eq!(src.resolve("a.png"), PathBuf::from("/assets/a.png"));
    assert_eq!(src.resolve("file:///tmp/b.png"), PathBuf::from("/tmp/b.png"));
    assert_eq!(src.resolve("/abs/c.png"), PathBuf::from("/abs/c.png"));
}

#[tokio::test]
async fn fs_source_reads_bytes_and_reports_missing_as_generation_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("x.bin"), b"abc").unwrap();
    let src = RoutingImageSource::new(FsImageSource::new(dir.path()), None);

    assert_eq!(src.fetch("x.bin").await.unwrap(), b"abc".to_vec());

    let err = src.fetch("missing.png").await.unwrap_err();
    assert!(err.is_recoverable());

    let err = src.fetch("https://example.invalid/a.png").await.unwrap_err();
    assert!(matches!(err, ReelError::Generation(_)));
}
