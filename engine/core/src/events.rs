//! Engine Events
//!
//! Two directions, two types:
//! - [`InboundEvent`]: what collaborators (telemetry producer, chat
//!   subsystem, settings, hotkeys) push into the engine
//! - [`EngineEvent`]: transitions the engine publishes after applying them
//!
//! # Design Philosophy
//!
//! Subscribers never diff ambient state. Every mutator on the store reports
//! exactly what changed as a tagged variant, and subscribers (sound, renderer)
//! react to those variants.

use serde::{Deserialize, Serialize};

use crate::sprite::{MoodState, SpriteState};
use crate::telemetry::HardwareSample;

/// Events from collaborators into the engine
///
/// Serialized with a `type` tag so hosts can stream them as JSON lines:
///
/// ```json
/// {"type": "hardware", "temperature": 82.0, "state": "Working", "mood": "Happy"}
/// {"type": "chat_message", "text": "What's using my GPU?"}
/// {"type": "chat_thinking", "thinking": false}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// New telemetry sample
    Hardware(HardwareSample),

    /// Pending assistant message set or cleared
    ChatMessage {
        /// Message text; `None` clears it
        #[serde(default)]
        text: Option<String>,
    },

    /// Chat request started or finished
    ChatThinking {
        /// Whether a reply is being generated
        thinking: bool,
    },

    /// Speech bubble shown or hidden
    ChatVisible {
        /// Whether the bubble is visible
        visible: bool,
    },

    /// Reply arrived from the chat backend
    ChatResponse {
        /// Reply text
        text: String,
    },

    /// Hotkey / menu request to flip input pass-through
    ToggleClickThrough,

    /// Custom sprite directory chosen (or reset)
    CustomSpritePath {
        /// Directory; `None` reverts to bundled sprites
        #[serde(default)]
        path: Option<String>,
    },

    /// Preview tooling: force a state
    SetState {
        /// State to show
        state: SpriteState,
    },

    /// Preview tooling: force a mood
    SetMood {
        /// Mood to show
        mood: MoodState,
    },

    /// Sound settings synced from configuration
    Sound {
        /// Whether cues play
        enabled: bool,
        /// Playback volume (0.0-1.0)
        volume: f32,
    },
}

impl InboundEvent {
    /// Wire name of the event (`hardware`, `chat_message`, ...)
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hardware(_) => "hardware",
            Self::ChatMessage { .. } => "chat_message",
            Self::ChatThinking { .. } => "chat_thinking",
            Self::ChatVisible { .. } => "chat_visible",
            Self::ChatResponse { .. } => "chat_response",
            Self::ToggleClickThrough => "toggle_click_through",
            Self::CustomSpritePath { .. } => "custom_sprite_path",
            Self::SetState { .. } => "set_state",
            Self::SetMood { .. } => "set_mood",
            Self::Sound { .. } => "sound",
        }
    }
}

/// Transitions published by the engine
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// The sprite state changed
    StateChanged {
        /// Previous state
        from: SpriteState,
        /// New state
        to: SpriteState,
        /// Mood after the change
        mood: MoodState,
    },

    /// The mood changed
    MoodChanged {
        /// Previous mood
        from: MoodState,
        /// New mood
        to: MoodState,
    },

    /// A telemetry sample was stored (published for every sample)
    HardwareUpdated {
        /// Whether the thinking-lock discarded the sample's candidate state
        suppressed: bool,
    },

    /// Chat "thinking" flag flipped
    ThinkingChanged {
        /// New value
        thinking: bool,
    },

    /// Speech bubble visibility flipped
    ChatVisibilityChanged {
        /// New value
        visible: bool,
    },

    /// The pending assistant message changed
    AiMessageChanged {
        /// Whether a message is now pending
        present: bool,
    },

    /// Input pass-through flag flipped
    ClickThroughChanged {
        /// New value
        enabled: bool,
    },

    /// The sprite asset root changed
    AssetRootChanged {
        /// Custom root, or `None` for bundled sprites
        custom: Option<String>,
    },
}

impl EngineEvent {
    /// Whether this event can change the derived frame list, fps, or loop flag
    #[must_use]
    pub fn affects_animation(&self) -> bool {
        matches!(
            self,
            Self::StateChanged { .. } | Self::MoodChanged { .. } | Self::AssetRootChanged { .. }
        )
    }

    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::MoodChanged { .. } => "mood_changed",
            Self::HardwareUpdated { .. } => "hardware_updated",
            Self::ThinkingChanged { .. } => "thinking_changed",
            Self::ChatVisibilityChanged { .. } => "chat_visibility_changed",
            Self::AiMessageChanged { .. } => "ai_message_changed",
            Self::ClickThroughChanged { .. } => "click_through_changed",
            Self::AssetRootChanged { .. } => "asset_root_changed",
        }
    }
}
