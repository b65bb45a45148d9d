//! Animation Scheduler
//!
//! Drives a [`FrameCursor`] over the frame list the store derives, gated on
//! the resource cache.
//!
//! # Lifecycle
//!
//! ```text
//!   set_plan(new frames) ──► Loading ──(all frames settled)──► Ready ──tick──► advance
//!          ▲                                                     │
//!          └──────────────── frame list changed ◄────────────────┘
//! ```
//!
//! While loading, the view is [`FrameView::Loading`] and the cursor is held
//! at 0. A changed frame list resets the cursor and re-checks readiness. A
//! changed fps or loop flag with the same frames keeps the cursor where it is.
//!
//! [`spawn_animator`] runs the scheduler on a `tokio::time::interval` ticker,
//! reacting to store events and forwarding every visible change to a renderer
//! channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::cursor::{FrameCursor, TickOutcome};
use crate::cache::ResourceCache;
use crate::store::SpriteStore;

/// Default ticker period (~60Hz)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// What to animate: frames, speed, and loop mode
#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    /// Ordered asset locators
    pub frames: Arc<[String]>,
    /// Effective frames per second
    pub fps: f32,
    /// Whether to wrap at the end
    pub looping: bool,
}

impl FramePlan {
    /// Build a plan
    pub fn new(frames: impl Into<Arc<[String]>>, fps: f32, looping: bool) -> Self {
        Self {
            frames: frames.into(),
            fps,
            looping,
        }
    }

    /// Derive the plan from the store's current state and mood
    #[must_use]
    pub fn from_store(store: &SpriteStore) -> Self {
        Self::new(
            store.animation_frames(),
            store.current_fps(),
            store.should_loop(),
        )
    }
}

/// What the renderer should show right now
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameView {
    /// No frames to show
    Empty,
    /// Frames are still loading; show a spinner
    Loading,
    /// Show this frame
    Frame {
        /// Cursor position
        index: usize,
        /// Asset locator
        url: String,
    },
}

/// How [`AnimationScheduler::set_plan`] treated a new plan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanChange {
    /// Identical to the current plan
    Unchanged,
    /// Same frames, new fps or loop mode; cursor kept
    Retimed,
    /// New frame list; cursor reset to 0
    Reset {
        /// Whether frames still need to be preloaded before animating
        needs_preload: bool,
    },
}

/// Cursor + readiness for one mounted animation view
#[derive(Debug)]
pub struct AnimationScheduler {
    cache: ResourceCache,
    plan: Option<FramePlan>,
    cursor: FrameCursor,
    ready: bool,
    generation: u64,
    paused: bool,
}

impl AnimationScheduler {
    /// Scheduler with no plan yet
    #[must_use]
    pub fn new(cache: ResourceCache) -> Self {
        Self {
            cache,
            plan: None,
            cursor: FrameCursor::new(0, 0.0, true),
            ready: false,
            generation: 0,
            paused: false,
        }
    }

    /// Install a plan
    pub fn set_plan(&mut self, plan: FramePlan) -> PlanChange {
        if let Some(current) = &self.plan {
            if current.frames == plan.frames {
                if current.fps == plan.fps && current.looping == plan.looping {
                    return PlanChange::Unchanged;
                }
                self.cursor.set_timing(plan.fps, plan.looping);
                self.plan = Some(plan);
                return PlanChange::Retimed;
            }
        }

        self.generation += 1;
        self.cursor = FrameCursor::new(plan.frames.len(), plan.fps, plan.looping);
        self.ready = !plan.frames.is_empty() && self.cache.all_loaded(&plan.frames);
        let needs_preload = !plan.frames.is_empty() && !self.ready;
        tracing::debug!(
            generation = self.generation,
            frames = plan.frames.len(),
            fps = plan.fps,
            ready = self.ready,
            "Animation plan reset"
        );
        self.plan = Some(plan);

        PlanChange::Reset { needs_preload }
    }

    /// Current plan
    #[must_use]
    pub fn plan(&self) -> Option<&FramePlan> {
        self.plan.as_ref()
    }

    /// Identity of the current frame list; bumps on every reset
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mark the frame list of `generation` as preloaded
    ///
    /// Stale generations (the list changed since the preload started) are
    /// ignored. Returns whether this made the scheduler ready.
    pub fn mark_ready(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.ready {
            return false;
        }
        let has_frames = self.plan.as_ref().is_some_and(|p| !p.frames.is_empty());
        self.ready = has_frames;
        self.ready
    }

    /// Re-check the cache synchronously; returns whether the scheduler is ready
    pub fn refresh_readiness(&mut self) -> bool {
        if !self.ready {
            if let Some(plan) = &self.plan {
                self.ready = !plan.frames.is_empty() && self.cache.all_loaded(&plan.frames);
            }
        }
        self.ready
    }

    /// Whether frames are loaded and animating
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Advance the cursor if due
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.ready || self.paused {
            return TickOutcome::Hold;
        }
        self.cursor.tick(now)
    }

    /// Current cursor position
    #[must_use]
    pub fn frame_index(&self) -> usize {
        self.cursor.index()
    }

    /// What should be on screen
    #[must_use]
    pub fn view(&self) -> FrameView {
        let Some(plan) = &self.plan else {
            return FrameView::Empty;
        };
        if plan.frames.is_empty() {
            return FrameView::Empty;
        }
        if !self.ready {
            return FrameView::Loading;
        }
        let index = self.cursor.index();
        plan.frames
            .get(index)
            .map_or(FrameView::Empty, |url| FrameView::Frame {
                index,
                url: url.clone(),
            })
    }

    /// Stop advancing
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume advancing; the paused time is not counted
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.cursor.rearm();
        }
    }

    /// Whether advancing is paused
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Time until the next advance, if any is scheduled
    #[must_use]
    pub fn time_to_next_frame(&self, now: Instant) -> Option<Duration> {
        if !self.ready || self.paused {
            return None;
        }
        self.cursor.time_to_next_frame(now)
    }
}

// =============================================================================
// Ticker-driven animator task
// =============================================================================

/// Updates sent from the animator task to the renderer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnimatorOutput {
    /// The visible frame (or loading state) changed
    View(FrameView),
    /// A non-looping animation reached its last frame
    Ended,
}

/// Handle to a running animator; dropping it unmounts the view
#[derive(Debug)]
pub struct AnimatorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl AnimatorHandle {
    /// Stop the ticker and wait for the task to exit
    pub async fn unmount(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!(error = %e, "Animator task did not exit cleanly");
            }
        }
    }
}

impl Drop for AnimatorHandle {
    fn drop(&mut self) {
        if let Some(join) = &self.join {
            join.abort();
        }
    }
}

/// Start animating the store's current frames
///
/// The task re-plans whenever the store publishes a state, mood, or asset
/// root change, kicks off preloads for frame lists that are not ready, and
/// sends every visible change to `output`. A full or closed `output`
/// channel drops the update rather than stalling the ticker.
#[must_use]
pub fn spawn_animator(
    store: Arc<SpriteStore>,
    cache: ResourceCache,
    tick_interval: Duration,
    output: mpsc::Sender<AnimatorOutput>,
) -> AnimatorHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let events = store.subscribe();
    let join = tokio::spawn(run_animator(
        store,
        cache,
        tick_interval,
        events,
        output,
        shutdown_rx,
    ));

    AnimatorHandle {
        shutdown: Some(shutdown_tx),
        join: Some(join),
    }
}

async fn run_animator(
    store: Arc<SpriteStore>,
    cache: ResourceCache,
    tick_interval: Duration,
    mut events: broadcast::Receiver<crate::events::EngineEvent>,
    output: mpsc::Sender<AnimatorOutput>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<u64>();
    let mut scheduler = AnimationScheduler::new(cache.clone());

    let replan = |scheduler: &mut AnimationScheduler| {
        let change = scheduler.set_plan(FramePlan::from_store(&store));
        if let PlanChange::Reset {
            needs_preload: true,
        } = change
        {
            spawn_preload(scheduler, &cache, &ready_tx);
        }
        change
    };

    replan(&mut scheduler);
    emit(&output, AnimatorOutput::View(scheduler.view()));

    let mut ticker = tokio::time::interval(tick_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::debug!(?tick_interval, "Animator mounted");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            event = events.recv() => match event {
                Ok(event) if event.affects_animation() => {
                    if let PlanChange::Reset { .. } = replan(&mut scheduler) {
                        emit(&output, AnimatorOutput::View(scheduler.view()));
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Animator lagged behind store events, re-planning");
                    if let PlanChange::Reset { .. } = replan(&mut scheduler) {
                        emit(&output, AnimatorOutput::View(scheduler.view()));
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            Some(generation) = ready_rx.recv() => {
                if scheduler.mark_ready(generation) {
                    emit(&output, AnimatorOutput::View(scheduler.view()));
                }
            }

            _ = ticker.tick() => {
                match scheduler.tick(Instant::now()) {
                    TickOutcome::Hold => {}
                    TickOutcome::Advanced(_) | TickOutcome::Wrapped => {
                        emit(&output, AnimatorOutput::View(scheduler.view()));
                    }
                    TickOutcome::Ended(index) => {
                        tracing::debug!(index, "Animation ended");
                        emit(&output, AnimatorOutput::Ended);
                    }
                }
            }
        }
    }

    tracing::debug!("Animator unmounted");
}

fn spawn_preload(
    scheduler: &AnimationScheduler,
    cache: &ResourceCache,
    ready_tx: &mpsc::UnboundedSender<u64>,
) {
    let Some(plan) = scheduler.plan() else {
        return;
    };
    let frames = Arc::clone(&plan.frames);
    let generation = scheduler.generation();
    let cache = cache.clone();
    let ready_tx = ready_tx.clone();

    // Not cancelled on unmount; a late settle only touches the shared cache.
    tokio::spawn(async move {
        cache.preload(&frames[..]).await;
        let _ = ready_tx.send(generation);
    });
}

fn emit(output: &mpsc::Sender<AnimatorOutput>, update: AnimatorOutput) {
    if let Err(e) = output.try_send(update) {
        tracing::trace!(error = %e, "Renderer not keeping up, dropping animator update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ImageProbe, ProbeError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct InstantProbe;

    #[async_trait]
    impl ImageProbe for InstantProbe {
        async fn probe(&self, _url: &str) -> Result<(), ProbeError> {
            Ok(())
        }
    }

    fn cache() -> ResourceCache {
        ResourceCache::new(Arc::new(InstantProbe))
    }

    fn frames(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test]
    async fn test_loading_until_preloaded() {
        let cache = cache();
        let mut scheduler = AnimationScheduler::new(cache.clone());

        let change = scheduler.set_plan(FramePlan::new(frames(&["a", "b"]), 10.0, true));
        assert_eq!(change, PlanChange::Reset { needs_preload: true });
        assert_eq!(scheduler.view(), FrameView::Loading);

        let start = Instant::now();
        assert_eq!(scheduler.tick(start), TickOutcome::Hold);
        assert_eq!(scheduler.tick(start + ms(500)), TickOutcome::Hold);
        assert_eq!(scheduler.frame_index(), 0);

        cache.preload(&["a", "b"]).await;
        assert!(scheduler.mark_ready(scheduler.generation()));
        assert_eq!(
            scheduler.view(),
            FrameView::Frame {
                index: 0,
                url: "a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_already_loaded_frames_start_ready() {
        let cache = cache();
        cache.preload(&["a", "b"]).await;

        let mut scheduler = AnimationScheduler::new(cache);
        let change = scheduler.set_plan(FramePlan::new(frames(&["a", "b"]), 10.0, true));
        assert_eq!(change, PlanChange::Reset { needs_preload: false });
        assert!(scheduler.is_ready());
    }

    #[tokio::test]
    async fn test_oneshot_freezes_and_ends_once() {
        let cache = cache();
        cache.preload(&["a", "b"]).await;
        let mut scheduler = AnimationScheduler::new(cache);
        scheduler.set_plan(FramePlan::new(frames(&["a", "b"]), 10.0, false));

        let start = Instant::now();
        let mut ended = 0;
        for t in (0..=2000).step_by(16) {
            if let TickOutcome::Ended(_) = scheduler.tick(start + ms(t)) {
                ended += 1;
            }
        }

        assert_eq!(ended, 1);
        assert_eq!(scheduler.frame_index(), 1);
        assert_eq!(
            scheduler.view(),
            FrameView::Frame {
                index: 1,
                url: "b".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_new_frames_reset_cursor() {
        let cache = cache();
        cache.preload(&["a", "b", "c", "x", "y"]).await;
        let mut scheduler = AnimationScheduler::new(cache);
        scheduler.set_plan(FramePlan::new(frames(&["a", "b", "c"]), 10.0, true));

        let start = Instant::now();
        scheduler.tick(start);
        scheduler.tick(start + ms(100));
        assert_eq!(scheduler.frame_index(), 1);

        let before = scheduler.generation();
        let change = scheduler.set_plan(FramePlan::new(frames(&["x", "y"]), 10.0, true));
        assert_eq!(change, PlanChange::Reset { needs_preload: false });
        assert_eq!(scheduler.frame_index(), 0);
        assert_eq!(scheduler.generation(), before + 1);
    }

    #[tokio::test]
    async fn test_fps_change_keeps_cursor() {
        let cache = cache();
        cache.preload(&["a", "b", "c"]).await;
        let mut scheduler = AnimationScheduler::new(cache);
        scheduler.set_plan(FramePlan::new(frames(&["a", "b", "c"]), 10.0, true));

        let start = Instant::now();
        scheduler.tick(start);
        scheduler.tick(start + ms(100));

        let change = scheduler.set_plan(FramePlan::new(frames(&["a", "b", "c"]), 20.0, true));
        assert_eq!(change, PlanChange::Retimed);
        assert_eq!(scheduler.frame_index(), 1);

        let same = scheduler.set_plan(FramePlan::new(frames(&["a", "b", "c"]), 20.0, true));
        assert_eq!(same, PlanChange::Unchanged);
    }

    #[tokio::test]
    async fn test_stale_preload_is_ignored() {
        let cache = cache();
        let mut scheduler = AnimationScheduler::new(cache);
        scheduler.set_plan(FramePlan::new(frames(&["a"]), 10.0, true));
        let stale = scheduler.generation();
        scheduler.set_plan(FramePlan::new(frames(&["b"]), 10.0, true));

        assert!(!scheduler.mark_ready(stale));
        assert_eq!(scheduler.view(), FrameView::Loading);
    }

    #[test]
    fn test_empty_plan_renders_nothing() {
        let mut scheduler = AnimationScheduler::new(cache());
        assert_eq!(scheduler.view(), FrameView::Empty);

        let change = scheduler.set_plan(FramePlan::new(Vec::<String>::new(), 10.0, true));
        assert_eq!(change, PlanChange::Reset { needs_preload: false });
        assert_eq!(scheduler.view(), FrameView::Empty);
        assert!(!scheduler.mark_ready(scheduler.generation()));
    }

    #[tokio::test]
    async fn test_pause_does_not_count_time() {
        let cache = cache();
        cache.preload(&["a", "b"]).await;
        let mut scheduler = AnimationScheduler::new(cache);
        scheduler.set_plan(FramePlan::new(frames(&["a", "b"]), 10.0, true));

        let start = Instant::now();
        scheduler.tick(start);
        scheduler.pause();
        assert_eq!(scheduler.tick(start + ms(500)), TickOutcome::Hold);
        assert_eq!(scheduler.time_to_next_frame(start + ms(500)), None);

        scheduler.resume();
        assert_eq!(scheduler.tick(start + ms(500)), TickOutcome::Hold);
        assert_eq!(scheduler.tick(start + ms(600)), TickOutcome::Advanced(1));
    }

    #[tokio::test]
    async fn test_refresh_readiness_picks_up_cache() {
        let cache = cache();
        let mut scheduler = AnimationScheduler::new(cache.clone());
        scheduler.set_plan(FramePlan::new(frames(&["a"]), 10.0, true));
        assert!(!scheduler.refresh_readiness());

        cache.preload(&["a"]).await;
        assert!(scheduler.refresh_readiness());
    }
}
