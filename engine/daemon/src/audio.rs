//! Headless audio backend
//!
//! The daemon has no audio device. Clips resolve to files under the asset
//! directory; playing one checks the file is there and logs the cue.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethereal_core::{AudioBackend, AudioClip, SoundError};
use tracing::info;

/// Resolves cue locators against an asset directory
#[derive(Clone, Debug)]
pub struct FsAudioBackend {
    asset_dir: PathBuf,
    sound_root: String,
}

impl FsAudioBackend {
    /// Cues under `sound_root` resolve inside `asset_dir`; others are literal paths
    pub fn new(asset_dir: impl Into<PathBuf>, sound_root: impl Into<String>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            sound_root: sound_root.into(),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let prefix = self.sound_root.trim_end_matches('/');
        let bundled = url
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'));
        if bundled {
            self.asset_dir.join(url.trim_start_matches('/'))
        } else {
            PathBuf::from(url)
        }
    }
}

impl AudioBackend for FsAudioBackend {
    fn open(&self, url: &str) -> Result<Arc<dyn AudioClip>, SoundError> {
        if url.is_empty() {
            return Err(SoundError::Open {
                url: url.to_string(),
                reason: "empty locator".to_string(),
            });
        }
        Ok(Arc::new(LoggedClip {
            url: url.to_string(),
            path: self.resolve(url),
            volume_bits: AtomicU32::new(1.0_f32.to_bits()),
        }))
    }
}

struct LoggedClip {
    url: String,
    path: PathBuf,
    volume_bits: AtomicU32,
}

#[async_trait]
impl AudioClip for LoggedClip {
    fn rewind(&self) {}

    fn set_volume(&self, volume: f32) {
        self.volume_bits.store(volume.to_bits(), Ordering::Relaxed);
    }

    async fn play(&self) -> Result<(), SoundError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| SoundError::Playback {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        let volume = f32::from_bits(self.volume_bits.load(Ordering::Relaxed));
        info!(
            cue = %self.url,
            volume,
            bytes = metadata.len(),
            "Sound cue"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_play_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sounds")).unwrap();
        std::fs::write(dir.path().join("sounds/focus.mp3"), b"ID3").unwrap();

        let backend = FsAudioBackend::new(dir.path(), "/sounds");
        let clip = backend.open("/sounds/focus.mp3").unwrap();
        clip.set_volume(0.3);
        assert!(clip.play().await.is_ok());

        let missing = backend.open("/sounds/alert.mp3").unwrap();
        assert!(matches!(
            missing.play().await,
            Err(SoundError::Playback { .. })
        ));
    }
}
