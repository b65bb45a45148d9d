//! Animation
//!
//! Frame timing for the sprite view:
//! - [`FrameCursor`]: advances one frame per `1 / fps`, independent of tick rate
//! - [`AnimationScheduler`]: cursor + preload gating over the store's frames
//! - [`spawn_animator`]: runs the scheduler on a steady ticker

mod cursor;
mod scheduler;

pub use cursor::{FrameCursor, TickOutcome};
pub use scheduler::{
    spawn_animator, AnimationScheduler, AnimatorHandle, AnimatorOutput, FramePlan, FrameView,
    PlanChange, DEFAULT_TICK_INTERVAL,
};
