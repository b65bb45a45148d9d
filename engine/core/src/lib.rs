//! Ethereal Core - Sprite State & Mood Engine
//!
//! The engine behind the Ethereal desktop companion: it turns telemetry and
//! chat activity into a sprite state and mood, derives which frames to draw
//! and how fast, preloads them, drives a time-based animation cursor, and
//! fires short sound cues on notable transitions. It has no window-system or
//! audio-device dependencies; hosts plug those in through traits.
//!
//! # Architecture
//!
//! ```text
//!   telemetry ─┐                         ┌──► AnimationScheduler ──► renderer
//!   chat ──────┼─► Engine::dispatch ──►  │        │
//!   settings ──┘        │           SpriteStore   └──► ResourceCache ──► ImageProbe
//!                       │                │
//!                       ▼                ▼ EngineEvent (broadcast)
//!                   ChatStatus ──────────┤
//!                                        └──► SoundTriggerEngine ──► SoundPlayer ──► AudioBackend
//! ```
//!
//! # Key Types
//!
//! - [`SpriteStore`]: authoritative state, mood, and derived frame data
//! - [`ResourceCache`]: one probe per asset URL, monotonic loaded set
//! - [`AnimationScheduler`]: preload-gated, fps-timed frame cursor
//! - [`SoundTriggerEngine`] / [`SoundPlayer`]: transition cues
//! - [`ChatStatus`]: speech-bubble thinking/visibility state
//! - [`Engine`]: facade that applies [`InboundEvent`]s in order
//!
//! # Module Overview
//!
//! - [`sprite`]: states, moods, animation profiles
//! - [`telemetry`]: hardware samples and tag mapping
//! - [`events`]: inbound collaborator events and published transitions
//! - [`store`]: the State & Mood Store
//! - [`cache`]: the Resource Cache and image probes
//! - [`animation`]: frame cursor, scheduler, and ticker task
//! - [`sound`]: cue edge detection and playback
//! - [`chat`]: chat bubble status
//! - [`persistence`]: key-value persistence of the click-through flag
//! - [`config`]: TOML + environment configuration
//! - [`engine`]: the facade

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod animation;
pub mod cache;
pub mod chat;
pub mod config;
pub mod engine;
pub mod events;
pub mod persistence;
pub mod sound;
pub mod sprite;
pub mod store;
pub mod telemetry;

// Re-exports for convenience
pub use animation::{
    AnimationScheduler, AnimatorHandle, AnimatorOutput, FrameCursor, FramePlan, FrameView,
    TickOutcome,
};
pub use cache::{FsImageProbe, ImageProbe, ProbeError, ResourceCache};
pub use chat::{ChatEntry, ChatRole, ChatSnapshot, ChatStatus};
pub use engine::Engine;
pub use events::{EngineEvent, InboundEvent};
pub use persistence::{JsonFileStore, KeyValueStore, MemoryStore, PersistenceError};
pub use sound::{
    AudioBackend, AudioClip, Cue, SoundEngineHandle, SoundError, SoundPlayer, SoundSettings,
    SoundTriggerEngine,
};
pub use sprite::{AnimationProfile, MoodState, ProfileTable, SpriteState};
pub use store::{EngineSnapshot, SpriteStore, StoreConfig};
pub use telemetry::HardwareSample;

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, EngineConfig, EngineToml,
};
