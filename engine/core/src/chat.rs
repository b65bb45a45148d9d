//! Chat status
//!
//! Speech-bubble state for the chat subsystem: the message being shown,
//! whether a reply is being generated, bubble visibility, and a short rolling
//! history. Thinking and visibility flips are published on the store's event
//! bus so the sound engine can cue on them.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::events::EngineEvent;
use crate::store::SpriteStore;

/// Entries kept in the rolling history
pub const HISTORY_LIMIT: usize = 10;

/// Default delay before a shown response hides itself
pub const DEFAULT_AUTO_HIDE: Duration = Duration::from_secs(5);

/// Who wrote a history entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person at the keyboard
    User,
    /// The chat backend
    Assistant,
}

/// One history entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Author
    pub role: ChatRole,
    /// Text
    pub content: String,
}

/// Copy of the chat state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatSnapshot {
    /// Message in the bubble
    pub message: Option<String>,
    /// Whether a reply is being generated
    pub thinking: bool,
    /// Whether the bubble is shown
    pub visible: bool,
    /// Oldest first, at most [`HISTORY_LIMIT`] entries
    pub history: Vec<ChatEntry>,
}

#[derive(Debug, Default)]
struct ChatInner {
    message: Option<String>,
    thinking: bool,
    visible: bool,
    history: VecDeque<ChatEntry>,
    hide_at: Option<Instant>,
}

impl ChatInner {
    fn push_history(&mut self, role: ChatRole, content: String) {
        self.history.push_back(ChatEntry { role, content });
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    fn set_thinking(&mut self, thinking: bool, events: &mut Vec<EngineEvent>) {
        if self.thinking != thinking {
            self.thinking = thinking;
            events.push(EngineEvent::ThinkingChanged { thinking });
        }
    }

    fn set_visible(&mut self, visible: bool, events: &mut Vec<EngineEvent>) {
        if self.visible != visible {
            self.visible = visible;
            events.push(EngineEvent::ChatVisibilityChanged { visible });
        }
    }
}

/// Chat bubble state shared with the sprite store's event bus
pub struct ChatStatus {
    inner: Mutex<ChatInner>,
    events: broadcast::Sender<EngineEvent>,
    auto_hide: Duration,
}

impl std::fmt::Debug for ChatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStatus")
            .field("inner", &*self.inner.lock())
            .field("auto_hide", &self.auto_hide)
            .finish_non_exhaustive()
    }
}

impl ChatStatus {
    /// Chat status publishing on `store`'s event bus
    #[must_use]
    pub fn new(store: &SpriteStore, auto_hide: Duration) -> Self {
        Self {
            inner: Mutex::new(ChatInner::default()),
            events: store.event_sender(),
            auto_hide,
        }
    }

    /// Mutate under the lock; events are sent before it is released
    fn update<R>(&self, f: impl FnOnce(&mut ChatInner, &mut Vec<EngineEvent>) -> R) -> R {
        let mut inner = self.inner.lock();
        let mut events = Vec::new();
        let result = f(&mut inner, &mut events);
        for event in events {
            let _ = self.events.send(event);
        }
        result
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        let inner = self.inner.lock();
        ChatSnapshot {
            message: inner.message.clone(),
            thinking: inner.thinking,
            visible: inner.visible,
            history: inner.history.iter().cloned().collect(),
        }
    }

    /// Whether a reply is being generated
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        self.inner.lock().thinking
    }

    /// Whether the bubble is shown
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.inner.lock().visible
    }

    /// When the bubble will hide itself, if a response is showing
    #[must_use]
    pub fn hide_deadline(&self) -> Option<Instant> {
        self.inner.lock().hide_at
    }

    /// Set the thinking flag
    pub fn set_thinking(&self, thinking: bool) {
        self.update(|inner, events| inner.set_thinking(thinking, events));
    }

    /// Show or hide the bubble; cancels a pending auto-hide
    pub fn set_visible(&self, visible: bool) {
        self.update(|inner, events| {
            inner.hide_at = None;
            inner.set_visible(visible, events);
        });
    }

    /// Replace the bubble text
    pub fn set_message(&self, message: Option<String>) {
        self.inner.lock().message = message;
    }

    /// A request was sent: thinking on, bubble shown, user entry recorded
    pub fn begin_request(&self, content: impl Into<String>) {
        let content = content.into();
        self.update(|inner, events| {
            inner.push_history(ChatRole::User, content);
            inner.hide_at = None;
            inner.set_thinking(true, events);
            inner.set_visible(true, events);
        });
    }

    /// A reply arrived: shown now, hidden after the auto-hide delay
    ///
    /// A later response replaces the pending deadline.
    pub fn show_response(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(auto_hide = ?self.auto_hide, "Showing chat response");
        self.update(|inner, events| {
            inner.push_history(ChatRole::Assistant, message.clone());
            inner.message = Some(message);
            inner.set_thinking(false, events);
            inner.set_visible(true, events);
            inner.hide_at = Some(Instant::now() + self.auto_hide);
        });
    }

    /// Hide the bubble if its auto-hide deadline has passed
    ///
    /// Returns whether it was hidden.
    pub fn expire(&self, now: Instant) -> bool {
        self.update(|inner, events| match inner.hide_at {
            Some(deadline) if now >= deadline => {
                inner.hide_at = None;
                inner.set_visible(false, events);
                true
            }
            _ => false,
        })
    }

    /// Drop every history entry
    pub fn clear_history(&self) {
        self.inner.lock().history.clear();
    }
}
