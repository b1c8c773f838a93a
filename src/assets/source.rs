use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::foundation::error::{ReelError, ReelResult};

const USER_AGENT: &str = concat!("scenecast/", env!("CARGO_PKG_VERSION"));

/// Resolves a scene's `image_url` to encoded image bytes.
///
/// Failures surface as [`ReelError::Generation`]: an unreachable image is treated the same as an
/// image that was never generated.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> ReelResult<Vec<u8>>;
}

/// Reads local files. Accepts plain paths and `file://` URLs; relative paths resolve against
/// `root`.
#[derive(Clone, Debug)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let raw = url.strip_prefix("file://").unwrap_or(url);
        let p = Path::new(raw);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

#[async_trait]
impl ImageSource for FsImageSource {
    async fn fetch(&self, url: &str) -> ReelResult<Vec<u8>> {
        let path = self.resolve(url);
        tokio::fs::read(&path).await.map_err(|e| {
            ReelError::generation(format!("read image '{}': {e}", path.display()))
        })
    }
}

/// Downloads `http://` and `https://` images.
#[derive(Clone, Debug)]
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new() -> ReelResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReelError::validation(format!("build http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> ReelResult<Vec<u8>> {
        tracing::debug!(url, "downloading scene image");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ReelError::generation(format!("download '{url}': {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReelError::generation(format!(
                "download '{url}': http status {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReelError::generation(format!("download '{url}': {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Dispatches by URL scheme: `http(s)://` to HTTP, everything else to the filesystem.
pub struct RoutingImageSource {
    fs: FsImageSource,
    http: Option<HttpImageSource>,
}

impl RoutingImageSource {
    pub fn new(fs: FsImageSource, http: Option<HttpImageSource>) -> Self {
        Self { fs, http }
    }

    /// Filesystem rooted at `root`, plus HTTP when a client can be built.
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        let http = match HttpImageSource::new() {
            Ok(http) => Some(http),
            Err(err) => {
                tracing::warn!(error = %err, "http image source unavailable; remote images will use placeholders");
                None
            }
        };
        Self::new(FsImageSource::new(root), http)
    }
}

#[async_trait]
impl ImageSource for RoutingImageSource {
    async fn fetch(&self, url: &str) -> ReelResult<Vec<u8>> {
        if is_remote(url) {
            match &self.http {
                Some(http) => http.fetch(url).await,
                None => Err(ReelError::generation(format!(
                    "no http client for remote image '{url}'"
                ))),
            }
        } else {
            self.fs.fetch(url).await
        }
    }
}

fn is_remote(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
