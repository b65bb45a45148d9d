//! Engine facade
//!
//! Bundles the store, chat status, resource cache, and sound player, and
//! routes [`InboundEvent`]s from collaborators to the right component. Events
//! are applied one at a time, in the order `dispatch` is called.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::animation::{spawn_animator, AnimatorHandle, AnimatorOutput};
use crate::cache::{ImageProbe, ResourceCache};
use crate::chat::ChatStatus;
use crate::config::EngineConfig;
use crate::events::InboundEvent;
use crate::persistence::KeyValueStore;
use crate::sound::{spawn_sound_engine, AudioBackend, SoundEngineHandle, SoundPlayer};
use crate::store::SpriteStore;

/// The assembled sprite engine
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<SpriteStore>,
    chat: Arc<ChatStatus>,
    cache: ResourceCache,
    sound: SoundPlayer,
}

impl Engine {
    /// Assemble an engine from already-built parts
    #[must_use]
    pub fn new(
        store: Arc<SpriteStore>,
        cache: ResourceCache,
        sound: SoundPlayer,
        chat_auto_hide: Duration,
    ) -> Self {
        let chat = Arc::new(ChatStatus::new(&store, chat_auto_hide));
        Self {
            store,
            chat,
            cache,
            sound,
        }
    }

    /// Build every part from configuration
    ///
    /// Restores persisted fields from `persistence` and applies the configured
    /// custom sprite path.
    #[must_use]
    pub fn from_config(
        config: &EngineConfig,
        persistence: Arc<dyn KeyValueStore>,
        probe: Arc<dyn ImageProbe>,
        audio: Arc<dyn AudioBackend>,
    ) -> Self {
        let store = Arc::new(SpriteStore::with_persistence(
            config.store_config(),
            persistence,
        ));
        store.set_custom_sprite_path(config.custom_sprite_path.clone());

        let sound = SoundPlayer::with_settings(audio, config.sound, config.sound_root.clone());
        Self::new(store, ResourceCache::new(probe), sound, config.chat_auto_hide)
    }

    /// The state & mood store
    #[must_use]
    pub fn store(&self) -> &Arc<SpriteStore> {
        &self.store
    }

    /// Chat bubble state
    #[must_use]
    pub fn chat(&self) -> &ChatStatus {
        &self.chat
    }

    /// Shared resource cache
    #[must_use]
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Sound player
    #[must_use]
    pub fn sound(&self) -> &SoundPlayer {
        &self.sound
    }

    /// Apply one collaborator event
    pub fn dispatch(&self, event: InboundEvent) {
        tracing::debug!(kind = event.kind(), "Dispatching inbound event");

        match event {
            InboundEvent::Hardware(sample) => self.store.update_hardware(sample),
            InboundEvent::ChatMessage { text } => self.store.set_ai_message(text),
            InboundEvent::ChatThinking { thinking } => self.chat.set_thinking(thinking),
            InboundEvent::ChatVisible { visible } => self.chat.set_visible(visible),
            InboundEvent::ChatResponse { text } => self.chat.show_response(text),
            InboundEvent::ToggleClickThrough => {
                let enabled = self.store.toggle_click_through();
                tracing::info!(enabled, "Click-through toggled");
            }
            InboundEvent::CustomSpritePath { path } => self.store.set_custom_sprite_path(path),
            InboundEvent::SetState { state } => self.store.set_state(state),
            InboundEvent::SetMood { mood } => self.store.set_mood(mood),
            InboundEvent::Sound { enabled, volume } => self.sound.sync_with_config(enabled, volume),
        }
    }

    /// Fire time-based transitions that are due (chat auto-hide)
    pub fn poll_timers(&self, now: Instant) {
        if self.chat.expire(now) {
            tracing::debug!("Chat bubble auto-hidden");
        }
    }

    /// Start the animation view; updates go to `output`
    #[must_use]
    pub fn mount(
        &self,
        tick_interval: Duration,
        output: mpsc::Sender<AnimatorOutput>,
    ) -> AnimatorHandle {
        spawn_animator(
            Arc::clone(&self.store),
            self.cache.clone(),
            tick_interval,
            output,
        )
    }

    /// Start playing cues for store transitions
    #[must_use]
    pub fn start_sound(&self) -> SoundEngineHandle {
        spawn_sound_engine(&self.store, &self.chat, self.sound.clone())
    }
}
