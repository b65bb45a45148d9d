//! State & Mood Store
//!
//! The authoritative state machine for the companion. It owns the live
//! [`EngineSnapshot`], exposes pure derivations the renderer consumes
//! (frame list, fps, loop flag), and publishes an [`EngineEvent`] for every
//! change it makes.
//!
//! # Precedence
//!
//! Telemetry and chat both want to drive the sprite state. Chat wins: while
//! the thinking-lock is held, hardware samples only refresh the stored
//! snapshot and their candidate state/mood are discarded. The lock is taken by
//! a non-empty AI message (or `set_state(Thinking)`) and released by clearing
//! the message (or `set_state` to anything else). Releasing does not revert
//! the state by itself; the next sample does.
//!
//! # Ownership
//!
//! There is no global instance. Hosts construct one store and hand
//! `Arc<SpriteStore>` to the scheduler and sound engine.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::events::EngineEvent;
use crate::persistence::{KeyValueStore, MemoryStore, CLICK_THROUGH_KEY};
use crate::sprite::{AnimationProfile, MoodState, ProfileTable, SpriteState};
use crate::telemetry::HardwareSample;

/// Root of the sprites shipped with the app
pub const BUNDLED_SPRITE_ROOT: &str = "/sprites";

/// Capacity of the transition event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The live state of the store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Current sprite state
    pub state: SpriteState,
    /// Current mood
    pub mood: MoodState,
    /// Most recent telemetry sample
    pub hardware: Option<HardwareSample>,
    /// Whether the window passes input through (persisted)
    pub is_click_through: bool,
    /// Custom sprite directory, if any
    pub custom_sprite_path: Option<String>,
    /// Pending assistant message
    pub ai_message: Option<String>,
}

/// Store construction options
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Per-state animation profiles
    pub profiles: ProfileTable,
    /// Root for bundled sprite locators
    pub bundled_root: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            profiles: ProfileTable::default(),
            bundled_root: BUNDLED_SPRITE_ROOT.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    snapshot: EngineSnapshot,
    thinking_lock: bool,
}

/// The State & Mood Store
pub struct SpriteStore {
    inner: RwLock<StoreInner>,
    config: StoreConfig,
    persistence: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<EngineEvent>,
}

impl std::fmt::Debug for SpriteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpriteStore")
            .field("snapshot", &self.inner.read().snapshot)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SpriteStore {
    /// Create a store with default profiles and in-memory persistence
    #[must_use]
    pub fn new() -> Self {
        Self::with_persistence(StoreConfig::default(), Arc::new(MemoryStore::new()))
    }

    /// Create a store, restoring persisted fields from `persistence`
    #[must_use]
    pub fn with_persistence(config: StoreConfig, persistence: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let is_click_through = persistence.get_bool(CLICK_THROUGH_KEY).unwrap_or(false);
        tracing::debug!(is_click_through, "Restored persisted engine state");

        let inner = StoreInner {
            snapshot: EngineSnapshot {
                is_click_through,
                ..EngineSnapshot::default()
            },
            thinking_lock: false,
        };

        Self {
            inner: RwLock::new(inner),
            config,
            persistence,
            events,
        }
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribe to transition events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Sender half of the event bus, shared with the chat status tracker
    pub(crate) fn event_sender(&self) -> broadcast::Sender<EngineEvent> {
        self.events.clone()
    }

    /// Mutate under the write lock; events are sent before it is released
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreInner, &mut Vec<EngineEvent>) -> R) -> R {
        let mut inner = self.inner.write();
        let mut events = Vec::new();
        let result = f(&mut inner, &mut events);
        for event in events {
            tracing::trace!(kind = event.kind(), "Publishing engine event");
            // No receivers is fine; nobody is listening yet.
            let _ = self.events.send(event);
        }
        result
    }

    // =========================================================================
    // Read access
    // =========================================================================

    /// Clone of the current snapshot
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.read().snapshot.clone()
    }

    /// Current sprite state
    #[must_use]
    pub fn state(&self) -> SpriteState {
        self.inner.read().snapshot.state
    }

    /// Current mood
    #[must_use]
    pub fn mood(&self) -> MoodState {
        self.inner.read().snapshot.mood
    }

    /// Whether input pass-through is on
    #[must_use]
    pub fn is_click_through(&self) -> bool {
        self.inner.read().snapshot.is_click_through
    }

    /// Whether hardware samples are currently being held off
    #[must_use]
    pub fn is_thinking_locked(&self) -> bool {
        self.inner.read().thinking_lock
    }

    /// Animation profiles in use
    #[must_use]
    pub fn profiles(&self) -> &ProfileTable {
        &self.config.profiles
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Apply a telemetry sample
    ///
    /// The snapshot's hardware field is always replaced. State and mood only
    /// follow the sample when the thinking-lock is not held.
    pub fn update_hardware(&self, sample: HardwareSample) {
        let candidate_state = sample.sprite_state();
        let candidate_mood = sample.mood_state();

        self.mutate(|inner, events| {
            inner.snapshot.hardware = Some(sample);

            if inner.thinking_lock {
                tracing::trace!(
                    candidate = %candidate_state,
                    "Thinking-lock held, discarding hardware candidate"
                );
                events.push(EngineEvent::HardwareUpdated { suppressed: true });
            } else {
                events.extend(transition(&mut inner.snapshot, candidate_state, candidate_mood));
                events.push(EngineEvent::HardwareUpdated { suppressed: false });
            }
        });
    }

    /// Set or clear the pending assistant message
    ///
    /// A non-empty message switches to `thinking` immediately and takes the
    /// thinking-lock. `None` (or an empty string) releases the lock without
    /// touching the state.
    pub fn set_ai_message(&self, message: Option<String>) {
        let message = message.filter(|m| !m.is_empty());

        self.mutate(|inner, events| {
            let was_present = inner.snapshot.ai_message.is_some();
            let present = message.is_some();
            inner.snapshot.ai_message = message;
            if was_present != present {
                events.push(EngineEvent::AiMessageChanged { present });
            }

            inner.thinking_lock = present;
            if present {
                let mood = inner.snapshot.mood;
                events.extend(transition(&mut inner.snapshot, SpriteState::Thinking, mood));
            }
        });
    }

    /// Force a sprite state (preview tooling)
    pub fn set_state(&self, state: SpriteState) {
        self.mutate(|inner, events| {
            inner.thinking_lock = state == SpriteState::Thinking;
            let mood = inner.snapshot.mood;
            events.extend(transition(&mut inner.snapshot, state, mood));
        });
    }

    /// Force a mood (preview tooling)
    pub fn set_mood(&self, mood: MoodState) {
        self.mutate(|inner, events| {
            let state = inner.snapshot.state;
            events.extend(transition(&mut inner.snapshot, state, mood));
        });
    }

    /// Flip input pass-through and persist it
    ///
    /// Telling the window system about the change is the caller's job.
    /// Returns the new value.
    pub fn toggle_click_through(&self) -> bool {
        self.mutate(|inner, events| {
            let enabled = !inner.snapshot.is_click_through;
            inner.snapshot.is_click_through = enabled;

            if let Err(e) = self
                .persistence
                .set(CLICK_THROUGH_KEY, serde_json::Value::Bool(enabled))
            {
                tracing::warn!(error = %e, enabled, "Failed to persist click-through flag");
            }

            events.push(EngineEvent::ClickThroughChanged { enabled });
            enabled
        })
    }

    /// Switch the sprite asset root; `None` or empty reverts to bundled sprites
    pub fn set_custom_sprite_path(&self, path: Option<String>) {
        let path = path.filter(|p| !p.is_empty());

        self.mutate(|inner, events| {
            if inner.snapshot.custom_sprite_path != path {
                tracing::info!(path = ?path, "Sprite asset root changed");
                inner.snapshot.custom_sprite_path.clone_from(&path);
                events.push(EngineEvent::AssetRootChanged { custom: path });
            }
        });
    }

    // =========================================================================
    // Derivations
    // =========================================================================

    /// Profile for the current state (idle fallback)
    #[must_use]
    pub fn active_profile(&self) -> AnimationProfile {
        self.config.profiles.resolve(self.state())
    }

    /// Ordered asset locators for the current state
    ///
    /// `{root}/{state}-{1..N}.svg`. A custom root containing a backslash is
    /// joined with `\` instead of `/`.
    #[must_use]
    pub fn animation_frames(&self) -> Vec<String> {
        let (state, custom) = {
            let inner = self.inner.read();
            (
                inner.snapshot.state,
                inner.snapshot.custom_sprite_path.clone(),
            )
        };
        let profile = self.config.profiles.resolve(state);

        let (root, separator) = match custom.as_deref() {
            Some(root) => (root, if root.contains('\\') { '\\' } else { '/' }),
            None => (self.config.bundled_root.trim_end_matches('/'), '/'),
        };

        (1..=profile.frame_count)
            .map(|i| format!("{root}{separator}{}-{i}.svg", state.as_str()))
            .collect()
    }

    /// Effective frame rate: base fps times the mood multiplier
    ///
    /// Not clamped.
    #[must_use]
    pub fn current_fps(&self) -> f32 {
        let (state, mood) = {
            let inner = self.inner.read();
            (inner.snapshot.state, inner.snapshot.mood)
        };
        self.config.profiles.resolve(state).base_fps * mood.speed_multiplier()
    }

    /// Whether the current state's animation loops
    #[must_use]
    pub fn should_loop(&self) -> bool {
        self.active_profile().looping
    }

    /// One-line summary passed to the chat backend as context
    #[must_use]
    pub fn system_context(&self) -> String {
        let snapshot = self.snapshot();
        match snapshot.hardware {
            Some(hw) => format!(
                "Current State: {}, Mood: {}, CPU: {}%, Mem: {}/{}MB, Net: {}KB/s down, Bat: {}% ({})",
                snapshot.state,
                snapshot.mood,
                hw.utilization,
                hw.memory_used,
                hw.memory_total,
                hw.network_rx,
                hw.battery_level,
                hw.battery_state,
            ),
            None => format!(
                "Current State: {}, Mood: {}, Hardware: unavailable",
                snapshot.state, snapshot.mood
            ),
        }
    }
}

impl Default for SpriteStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a state/mood pair, returning the events for whatever changed
fn transition(
    snapshot: &mut EngineSnapshot,
    state: SpriteState,
    mood: MoodState,
) -> Vec<EngineEvent> {
    let mut events = Vec::new();

    if snapshot.mood != mood {
        events.push(EngineEvent::MoodChanged {
            from: snapshot.mood,
            to: mood,
        });
        snapshot.mood = mood;
    }

    if snapshot.state != state {
        let from = snapshot.state;
        snapshot.state = state;
        tracing::debug!(%from, to = %state, %mood, "Sprite state transition");
        events.push(EngineEvent::StateChanged {
            from,
            to: state,
            mood,
        });
    }

    events
}
