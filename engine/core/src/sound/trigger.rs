//! Edge detection from engine events to sound cues

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use super::{Cue, SoundPlayer};
use crate::chat::ChatStatus;
use crate::events::EngineEvent;
use crate::sprite::SpriteState;
use crate::store::SpriteStore;

/// Remembers the last state and thinking flag and reports cue edges
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SoundTriggerEngine {
    previous_state: SpriteState,
    previous_thinking: bool,
}

impl SoundTriggerEngine {
    /// Start from a known baseline; nothing fires for the baseline itself
    #[must_use]
    pub fn new(state: SpriteState, thinking: bool) -> Self {
        Self {
            previous_state: state,
            previous_thinking: thinking,
        }
    }

    /// Compare against the baseline and return the cues to play
    ///
    /// The baseline is updated on every call, whether or not a cue fires.
    pub fn observe(&mut self, state: SpriteState, thinking: bool) -> Vec<Cue> {
        let mut cues = Vec::new();

        if state != self.previous_state {
            match (self.previous_state, state) {
                (_, SpriteState::Overheating) => cues.push(Cue::Alert),
                (_, SpriteState::Gaming) => cues.push(Cue::Active),
                (SpriteState::Idle, SpriteState::Working) => cues.push(Cue::Focus),
                _ => {}
            }
        }

        match (self.previous_thinking, thinking) {
            (false, true) => cues.push(Cue::Thinking),
            (true, false) => cues.push(Cue::Notification),
            _ => {}
        }

        self.previous_state = state;
        self.previous_thinking = thinking;
        cues
    }

    /// Feed one engine event; events that carry neither field are ignored
    pub fn observe_event(&mut self, event: &EngineEvent) -> Vec<Cue> {
        match *event {
            EngineEvent::StateChanged { to, .. } => self.observe(to, self.previous_thinking),
            EngineEvent::ThinkingChanged { thinking } => {
                self.observe(self.previous_state, thinking)
            }
            _ => Vec::new(),
        }
    }

    /// Last observed state
    #[must_use]
    pub fn previous_state(&self) -> SpriteState {
        self.previous_state
    }

    /// Last observed thinking flag
    #[must_use]
    pub fn previous_thinking(&self) -> bool {
        self.previous_thinking
    }
}

/// Handle to the running sound engine task
#[derive(Debug)]
pub struct SoundEngineHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SoundEngineHandle {
    /// Stop listening and wait for the task to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            tracing::warn!(error = %e, "Sound engine task did not exit cleanly");
        }
    }
}

/// Play cues for transitions published by `store` and `chat`
///
/// The baseline is read from both after subscribing, so an edge already in
/// progress (chat thinking at startup) still cues when it completes. Each
/// cue is played on its own task so a stalled clip never delays the next
/// trigger.
#[must_use]
pub fn spawn_sound_engine(
    store: &Arc<SpriteStore>,
    chat: &Arc<ChatStatus>,
    player: SoundPlayer,
) -> SoundEngineHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let mut events = store.subscribe();
    let mut trigger = SoundTriggerEngine::new(store.state(), chat.is_thinking());
    let store = Arc::downgrade(store);
    let chat = Arc::downgrade(chat);

    let join = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = &mut shutdown_rx => break,
                event = events.recv() => event,
            };

            match event {
                Ok(event) => {
                    for cue in trigger.observe_event(&event) {
                        let player = player.clone();
                        tokio::spawn(async move { player.play(cue).await });
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Re-baseline silently; missed edges are not replayed.
                    let state = store
                        .upgrade()
                        .map_or(trigger.previous_state(), |store| store.state());
                    let thinking = chat
                        .upgrade()
                        .map_or(trigger.previous_thinking(), |chat| chat.is_thinking());
                    trigger = SoundTriggerEngine::new(state, thinking);
                    tracing::warn!(skipped, "Sound engine lagged behind store events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("Sound engine stopped");
    });

    SoundEngineHandle {
        shutdown: Some(shutdown_tx),
        join,
    }
}
