//! Sound Cues
//!
//! Short audio cues on notable transitions:
//!
//! | Transition                    | Cue            |
//! |-------------------------------|----------------|
//! | any → `overheating`           | alert          |
//! | any → `gaming`                | active         |
//! | `idle` → `working`            | focus          |
//! | chat thinking off → on        | thinking       |
//! | chat thinking on → off        | notification   |
//!
//! [`SoundTriggerEngine`] is the pure edge detector, [`SoundPlayer`] owns the
//! clip cache and the enabled/volume settings, and [`spawn_sound_engine`]
//! wires both to the store's event bus.

mod player;
mod trigger;

pub use player::{SoundPlayer, SoundSettings};
pub use trigger::{spawn_sound_engine, SoundEngineHandle, SoundTriggerEngine};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root of the cue files shipped with the app
pub const DEFAULT_SOUND_ROOT: &str = "/sounds";

/// A sound cue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// Entered `overheating`
    Alert,
    /// Entered `gaming`
    Active,
    /// Went from `idle` to `working`
    Focus,
    /// Chat started thinking
    Thinking,
    /// Chat finished thinking
    Notification,
}

impl Cue {
    /// File name under the sound root
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Alert => "alert.mp3",
            Self::Active => "active.mp3",
            Self::Focus => "focus.mp3",
            Self::Thinking => "thinking.mp3",
            Self::Notification => "notification.mp3",
        }
    }

    /// Locator of this cue under `root`
    #[must_use]
    pub fn url(self, root: &str) -> String {
        format!("{}/{}", root.trim_end_matches('/'), self.file_name())
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Alert => "alert",
            Self::Active => "active",
            Self::Focus => "focus",
            Self::Thinking => "thinking",
            Self::Notification => "notification",
        };
        f.write_str(name)
    }
}

/// Audio failures; logged by the player and never surfaced to engine callers
#[derive(Debug, Error)]
pub enum SoundError {
    /// The clip could not be opened
    #[error("failed to open audio clip {url}: {reason}")]
    Open {
        /// Clip locator
        url: String,
        /// What went wrong
        reason: String,
    },

    /// The clip opened but playback failed
    #[error("playback failed for {url}: {reason}")]
    Playback {
        /// Clip locator
        url: String,
        /// What went wrong
        reason: String,
    },
}

/// A reusable audio clip
#[async_trait]
pub trait AudioClip: Send + Sync {
    /// Seek back to the start
    fn rewind(&self);

    /// Set playback volume (0.0-1.0)
    fn set_volume(&self, volume: f32);

    /// Play from the current position
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses playback.
    async fn play(&self) -> Result<(), SoundError>;
}

/// Opens audio clips
pub trait AudioBackend: Send + Sync {
    /// Open the clip at `url`
    ///
    /// # Errors
    ///
    /// Returns an error if the clip cannot be opened.
    fn open(&self, url: &str) -> Result<Arc<dyn AudioClip>, SoundError>;
}
