//! Cue playback with a per-URL clip cache

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{AudioBackend, AudioClip, Cue, DEFAULT_SOUND_ROOT};

/// User-facing sound settings
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundSettings {
    /// Whether cues play at all
    pub enabled: bool,
    /// Playback volume, 0.0-1.0
    pub volume: f32,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.5,
        }
    }
}

impl SoundSettings {
    /// Settings with the volume clamped into range
    #[must_use]
    pub fn new(enabled: bool, volume: f32) -> Self {
        let mut settings = Self {
            enabled,
            volume: 0.0,
        };
        settings.set_volume(volume);
        settings
    }

    /// Flip `enabled`, returning the new value
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    /// Set the volume, clamped to 0.0-1.0 (NaN mutes)
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
    }

    /// Take both values from configuration
    pub fn sync_with_config(&mut self, enabled: bool, volume: f32) {
        self.enabled = enabled;
        self.set_volume(volume);
    }
}

struct PlayerInner {
    backend: Arc<dyn AudioBackend>,
    settings: RwLock<SoundSettings>,
    clips: DashMap<String, Arc<dyn AudioClip>>,
    sound_root: String,
}

/// Plays cues through an [`AudioBackend`]
///
/// Cheap to clone. Clips are opened once per URL and reused; each play
/// rewinds the clip and applies the current volume first.
#[derive(Clone)]
pub struct SoundPlayer {
    inner: Arc<PlayerInner>,
}

impl std::fmt::Debug for SoundPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundPlayer")
            .field("settings", &*self.inner.settings.read())
            .field("clips", &self.inner.clips.len())
            .field("sound_root", &self.inner.sound_root)
            .finish()
    }
}

impl SoundPlayer {
    /// Player with default settings and the bundled sound root
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self::with_settings(backend, SoundSettings::default(), DEFAULT_SOUND_ROOT)
    }

    /// Player with explicit settings and sound root
    pub fn with_settings(
        backend: Arc<dyn AudioBackend>,
        settings: SoundSettings,
        sound_root: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(PlayerInner {
                backend,
                settings: RwLock::new(SoundSettings::new(settings.enabled, settings.volume)),
                clips: DashMap::new(),
                sound_root: sound_root.into(),
            }),
        }
    }

    /// Current settings
    #[must_use]
    pub fn settings(&self) -> SoundSettings {
        *self.inner.settings.read()
    }

    /// Flip sound on or off, returning the new value
    pub fn toggle(&self) -> bool {
        let enabled = self.inner.settings.write().toggle();
        tracing::info!(enabled, "Sound toggled");
        enabled
    }

    /// Set the playback volume (clamped)
    pub fn set_volume(&self, volume: f32) {
        self.inner.settings.write().set_volume(volume);
    }

    /// Take enabled and volume from configuration
    pub fn sync_with_config(&self, enabled: bool, volume: f32) {
        let settings = {
            let mut settings = self.inner.settings.write();
            settings.sync_with_config(enabled, volume);
            *settings
        };
        tracing::debug!(
            enabled = settings.enabled,
            volume = settings.volume,
            "Sound settings synced"
        );
    }

    /// Number of clips opened so far
    #[must_use]
    pub fn cached_clips(&self) -> usize {
        self.inner.clips.len()
    }

    /// Play a cue
    ///
    /// Does nothing while sound is disabled. Open and playback failures are
    /// logged and swallowed.
    pub async fn play(&self, cue: Cue) {
        let settings = self.settings();
        if !settings.enabled {
            tracing::trace!(%cue, "Sound disabled, skipping cue");
            return;
        }

        let url = cue.url(&self.inner.sound_root);
        let Some(clip) = self.clip(&url) else {
            return;
        };

        clip.rewind();
        clip.set_volume(settings.volume);
        tracing::debug!(%cue, volume = settings.volume, "Playing sound cue");
        if let Err(e) = clip.play().await {
            tracing::warn!(%cue, error = %e, "Audio playback failed");
        }
    }

    fn clip(&self, url: &str) -> Option<Arc<dyn AudioClip>> {
        if let Some(existing) = self.inner.clips.get(url) {
            return Some(Arc::clone(existing.value()));
        }

        match self.inner.backend.open(url) {
            Ok(clip) => {
                let clip = self
                    .inner
                    .clips
                    .entry(url.to_string())
                    .or_insert(clip)
                    .value()
                    .clone();
                Some(clip)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Failed to open audio clip");
                None
            }
        }
    }
}
