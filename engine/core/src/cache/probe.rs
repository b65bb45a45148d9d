//! Image decode probes
//!
//! A probe answers one question: does this locator point at something the
//! renderer can decode? The cache does not care about the answer beyond
//! logging it; either outcome settles the URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::store::BUNDLED_SPRITE_ROOT;

/// How many leading bytes are inspected for a recognizable header
const HEADER_SCAN_BYTES: usize = 1024;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Why a probe failed
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The asset could not be read
    #[error("failed to read {url}: {source}")]
    Io {
        /// Locator that was probed
        url: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The asset was read but is not an image we know how to decode
    #[error("{url} is not a decodable image: {reason}")]
    Undecodable {
        /// Locator that was probed
        url: String,
        /// What was wrong with it
        reason: String,
    },
}

/// Checks whether an asset locator decodes
#[async_trait]
pub trait ImageProbe: Send + Sync {
    /// Probe one locator
    ///
    /// # Errors
    ///
    /// Returns an error if the asset is missing or does not decode.
    async fn probe(&self, url: &str) -> Result<(), ProbeError>;
}

/// Filesystem probe for bundled and custom sprite directories
///
/// Locators under the bundled root (`/sprites/idle-1.svg`) are resolved inside
/// `asset_dir`; everything else is treated as a literal path.
#[derive(Clone, Debug)]
pub struct FsImageProbe {
    asset_dir: PathBuf,
    bundled_root: String,
}

impl FsImageProbe {
    /// Probe resolving bundled locators under `asset_dir`
    pub fn new(asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            bundled_root: BUNDLED_SPRITE_ROOT.to_string(),
        }
    }

    /// Override the bundled root prefix
    #[must_use]
    pub fn with_bundled_root(mut self, root: impl Into<String>) -> Self {
        self.bundled_root = root.into();
        self
    }

    /// Filesystem path a locator resolves to
    ///
    /// Bundled locators are web paths rooted at `asset_dir`, so
    /// `/sprites/idle-1.svg` becomes `{asset_dir}/sprites/idle-1.svg`.
    #[must_use]
    pub fn resolve(&self, url: &str) -> PathBuf {
        let prefix = self.bundled_root.trim_end_matches('/');
        let bundled = url
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'));
        if bundled {
            self.asset_dir.join(url.trim_start_matches('/'))
        } else {
            PathBuf::from(url)
        }
    }

    /// Directory bundled sprites are served from
    #[must_use]
    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }
}

#[async_trait]
impl ImageProbe for FsImageProbe {
    async fn probe(&self, url: &str) -> Result<(), ProbeError> {
        let path = self.resolve(url);
        let bytes = tokio::fs::read(&path).await.map_err(|source| ProbeError::Io {
            url: url.to_string(),
            source,
        })?;
        sniff_image(&bytes).map_err(|reason| ProbeError::Undecodable {
            url: url.to_string(),
            reason: reason.to_string(),
        })
    }
}

/// Recognize an SVG or PNG document from its leading bytes
fn sniff_image(bytes: &[u8]) -> Result<(), &'static str> {
    if bytes.is_empty() {
        return Err("file is empty");
    }
    if bytes.starts_with(PNG_MAGIC) {
        return Ok(());
    }

    let head = &bytes[..bytes.len().min(HEADER_SCAN_BYTES)];
    let text = String::from_utf8_lossy(head);
    if text.contains("<svg") {
        Ok(())
    } else {
        Err("no PNG signature or <svg> element")
    }
}
