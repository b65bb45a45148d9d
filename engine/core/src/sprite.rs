//! Sprite States, Moods, and Animation Profiles
//!
//! The two independent axes that drive the companion's look:
//! - [`SpriteState`]: what the companion is doing (idle, gaming, thinking...)
//! - [`MoodState`]: how it feels about it (happy, angry, tired...)
//!
//! The state picks the frame set and base frame rate through an
//! [`AnimationProfile`]; the mood scales the frame rate.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete visual/behavioral mode of the companion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpriteState {
    /// Nothing interesting happening
    #[default]
    Idle,
    /// Moderate load, user is working
    Working,
    /// A game is running
    Gaming,
    /// User is in a browser
    Browsing,
    /// Temperature above threshold
    Overheating,
    /// Heavy utilization
    HighLoad,
    /// Waiting on an assistant reply (sticky override)
    Thinking,
    /// Quiet hours / machine asleep
    Sleeping,
}

impl SpriteState {
    /// Every state, in declaration order
    pub const ALL: [SpriteState; 8] = [
        Self::Idle,
        Self::Working,
        Self::Gaming,
        Self::Browsing,
        Self::Overheating,
        Self::HighLoad,
        Self::Thinking,
        Self::Sleeping,
    ];

    /// Asset file prefix for this state (`idle`, `high_load`, ...)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Gaming => "gaming",
            Self::Browsing => "browsing",
            Self::Overheating => "overheating",
            Self::HighLoad => "high_load",
            Self::Thinking => "thinking",
            Self::Sleeping => "sleeping",
        }
    }

    /// Parse the lowercase asset name back into a state
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for SpriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emotional modifier, independent of [`SpriteState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MoodState {
    /// Baseline mood
    #[default]
    Happy,
    /// Lots of activity
    Excited,
    /// Long session, low battery
    Tired,
    /// Nothing to do
    Bored,
    /// Hot and overloaded
    Angry,
    /// Something went wrong
    Sad,
    /// New window or activity
    Curious,
    /// Dozing
    Sleeping,
}

impl MoodState {
    /// Lowercase mood name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Excited => "excited",
            Self::Tired => "tired",
            Self::Bored => "bored",
            Self::Angry => "angry",
            Self::Sad => "sad",
            Self::Curious => "curious",
            Self::Sleeping => "sleeping",
        }
    }

    /// Frame-rate multiplier applied on top of the state's base fps
    #[must_use]
    pub fn speed_multiplier(self) -> f32 {
        match self {
            Self::Excited => 1.5,
            Self::Tired => 0.7,
            Self::Bored => 0.5,
            Self::Angry => 2.0,
            Self::Sad => 0.6,
            Self::Curious => 1.2,
            Self::Sleeping => 0.4,
            Self::Happy => 1.0,
        }
    }
}

impl fmt::Display for MoodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static per-state animation configuration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationProfile {
    /// Number of frames (at least 1)
    pub frame_count: usize,
    /// Base playback rate before the mood multiplier
    pub base_fps: f32,
    /// Whether the animation wraps around
    pub looping: bool,
}

impl AnimationProfile {
    /// Create a looping profile
    #[must_use]
    pub const fn looping(frame_count: usize, base_fps: f32) -> Self {
        Self {
            frame_count,
            base_fps,
            looping: true,
        }
    }

    /// Create a profile that plays once and holds the last frame
    #[must_use]
    pub const fn oneshot(frame_count: usize, base_fps: f32) -> Self {
        Self {
            frame_count,
            base_fps,
            looping: false,
        }
    }

    /// Whether the profile can be animated at all
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.frame_count >= 1 && self.base_fps > 0.0 && self.base_fps.is_finite()
    }
}

impl Default for AnimationProfile {
    fn default() -> Self {
        Self::looping(4, 8.0)
    }
}

/// Profile lookup with idle fallback
///
/// Any state without its own entry resolves to the `idle` profile, and if that
/// is missing too, to [`AnimationProfile::default`].
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileTable {
    profiles: HashMap<SpriteState, AnimationProfile>,
}

impl ProfileTable {
    /// Table with no entries; everything resolves to the default profile
    #[must_use]
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Insert or replace a state's profile
    pub fn set(&mut self, state: SpriteState, profile: AnimationProfile) {
        self.profiles.insert(state, profile);
    }

    /// Builder-style [`ProfileTable::set`]
    #[must_use]
    pub fn with(mut self, state: SpriteState, profile: AnimationProfile) -> Self {
        self.set(state, profile);
        self
    }

    /// Drop a state's own profile so it falls back to idle
    pub fn remove(&mut self, state: SpriteState) -> Option<AnimationProfile> {
        self.profiles.remove(&state)
    }

    /// Profile for `state`, falling back to idle
    #[must_use]
    pub fn resolve(&self, state: SpriteState) -> AnimationProfile {
        self.profiles
            .get(&state)
            .or_else(|| self.profiles.get(&SpriteState::Idle))
            .copied()
            .unwrap_or_default()
    }

    /// Whether `state` has its own entry
    #[must_use]
    pub fn contains(&self, state: SpriteState) -> bool {
        self.profiles.contains_key(&state)
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        use SpriteState::*;

        Self::empty()
            .with(Idle, AnimationProfile::looping(4, 8.0))
            .with(Working, AnimationProfile::looping(4, 12.0))
            .with(Gaming, AnimationProfile::looping(4, 12.0))
            .with(Browsing, AnimationProfile::looping(4, 8.0))
            .with(Overheating, AnimationProfile::looping(4, 24.0))
            .with(HighLoad, AnimationProfile::looping(4, 16.0))
            .with(Thinking, AnimationProfile::looping(4, 12.0))
            .with(Sleeping, AnimationProfile::looping(4, 4.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_round_trip() {
        for state in SpriteState::ALL {
            assert_eq!(SpriteState::from_name(state.as_str()), Some(state));
        }
        assert_eq!(SpriteState::from_name("dancing"), None);
    }

    #[test]
    fn test_state_serde_is_snake_case() {
        let json = serde_json::to_string(&SpriteState::HighLoad).unwrap();
        assert_eq!(json, "\"high_load\"");
        let mood: MoodState = serde_json::from_str("\"curious\"").unwrap();
        assert_eq!(mood, MoodState::Curious);
    }

    #[test]
    fn test_mood_multipliers() {
        assert_eq!(MoodState::Happy.speed_multiplier(), 1.0);
        assert_eq!(MoodState::Angry.speed_multiplier(), 2.0);
        assert_eq!(MoodState::Sleeping.speed_multiplier(), 0.4);
    }

    #[test]
    fn test_default_table_covers_every_state() {
        let table = ProfileTable::default();
        for state in SpriteState::ALL {
            assert!(table.contains(state), "missing profile for {state}");
            assert!(table.resolve(state).is_valid());
        }
        assert_eq!(table.resolve(SpriteState::Overheating).base_fps, 24.0);
        assert_eq!(table.resolve(SpriteState::Sleeping).base_fps, 4.0);
    }

    #[test]
    fn test_missing_profile_falls_back_to_idle() {
        let mut table = ProfileTable::default()
            .with(SpriteState::Idle, AnimationProfile::oneshot(6, 5.0));
        table.remove(SpriteState::Gaming);

        assert_eq!(
            table.resolve(SpriteState::Gaming),
            AnimationProfile::oneshot(6, 5.0)
        );
    }

    #[test]
    fn test_empty_table_uses_default_profile() {
        let table = ProfileTable::empty();
        assert_eq!(table.resolve(SpriteState::Thinking), AnimationProfile::default());
    }

    #[test]
    fn test_profile_validity() {
        assert!(!AnimationProfile::looping(0, 8.0).is_valid());
        assert!(!AnimationProfile::looping(4, 0.0).is_valid());
        assert!(!AnimationProfile::looping(4, f32::NAN).is_valid());
    }
}
