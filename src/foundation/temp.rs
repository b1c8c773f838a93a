use std::path::PathBuf;

/// Removes the file at the wrapped path on drop.
#[derive(Debug, Default)]
pub(crate) struct TempFileGuard(pub(crate) Option<PathBuf>);

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(Some(path))
    }

    /// Stop tracking the file and hand back its path.
    pub(crate) fn keep(mut self) -> Option<PathBuf> {
        self.0.take()
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Unique path in the system temp directory, e.g. `scenecast_narration_<uuid>.wav`.
pub(crate) fn unique_temp_path(stem: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("scenecast_{stem}_{}.{ext}", uuid::Uuid::new_v4()))
}
