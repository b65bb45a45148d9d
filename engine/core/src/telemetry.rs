//! Hardware Telemetry Samples
//!
//! Samples are produced by the host's telemetry collector at its own cadence
//! and pushed into the engine as-is. The collector already classifies each
//! sample into a backend state/mood tag (`"Overheating"`, `"Angry"`, ...);
//! this module only maps those tags onto the engine's closed enums.
//!
//! Every field is `#[serde(default)]` so a partial payload still produces a
//! usable sample. Text fields also accept `null` or a non-string value and
//! read it as empty, which maps the tags to idle/happy.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::sprite::{MoodState, SpriteState};

/// One telemetry sample, superseded entirely by the next one
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareSample {
    /// Temperature in degrees Celsius
    pub temperature: f32,
    /// Utilization percentage (0-100)
    pub utilization: f32,
    /// Memory in use (MB)
    pub memory_used: u64,
    /// Total memory (MB)
    pub memory_total: u64,
    /// Network receive rate (KB/s)
    pub network_rx: u64,
    /// Network transmit rate (KB/s)
    pub network_tx: u64,
    /// Disk read rate (KB/s)
    pub disk_read: u64,
    /// Disk write rate (KB/s)
    pub disk_write: u64,
    /// Battery charge percentage
    pub battery_level: f32,
    /// Battery state as reported by the OS (`Charging`, `Discharging`, ...)
    #[serde(deserialize_with = "lenient_text")]
    pub battery_state: String,
    /// Title of the focused window
    #[serde(deserialize_with = "lenient_text")]
    pub active_window: String,
    /// Backend state tag
    #[serde(deserialize_with = "lenient_text")]
    pub state: String,
    /// Backend mood tag
    #[serde(deserialize_with = "lenient_text")]
    pub mood: String,
}

impl HardwareSample {
    /// Sample carrying only the two classification tags
    pub fn tagged(state: impl Into<String>, mood: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            mood: mood.into(),
            ..Default::default()
        }
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the utilization percentage
    #[must_use]
    pub fn with_utilization(mut self, utilization: f32) -> Self {
        self.utilization = utilization;
        self
    }

    /// Candidate sprite state for this sample
    #[must_use]
    pub fn sprite_state(&self) -> SpriteState {
        state_from_tag(&self.state)
    }

    /// Candidate mood for this sample
    #[must_use]
    pub fn mood_state(&self) -> MoodState {
        mood_from_tag(&self.mood)
    }
}

/// Read a text field, treating anything that is not a string as empty
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => text,
        _ => String::new(),
    })
}

/// Map a backend state tag onto a [`SpriteState`]
///
/// Unknown tags fall back to [`SpriteState::Idle`]. `Thinking` is never
/// produced from telemetry.
#[must_use]
pub fn state_from_tag(tag: &str) -> SpriteState {
    match tag {
        "Overheating" => SpriteState::Overheating,
        "HighLoad" => SpriteState::HighLoad,
        "Working" => SpriteState::Working,
        "Gaming" => SpriteState::Gaming,
        "Browsing" => SpriteState::Browsing,
        "Sleeping" => SpriteState::Sleeping,
        _ => SpriteState::Idle,
    }
}

/// Map a backend mood tag onto a [`MoodState`]
///
/// Unknown tags fall back to [`MoodState::Happy`].
#[must_use]
pub fn mood_from_tag(tag: &str) -> MoodState {
    match tag {
        "Excited" => MoodState::Excited,
        "Tired" => MoodState::Tired,
        "Bored" => MoodState::Bored,
        "Angry" => MoodState::Angry,
        "Sad" => MoodState::Sad,
        "Curious" => MoodState::Curious,
        "Sleeping" => MoodState::Sleeping,
        _ => MoodState::Happy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_state_tags() {
        assert_eq!(state_from_tag("Overheating"), SpriteState::Overheating);
        assert_eq!(state_from_tag("HighLoad"), SpriteState::HighLoad);
        assert_eq!(state_from_tag("Gaming"), SpriteState::Gaming);
        assert_eq!(state_from_tag("Sleeping"), SpriteState::Sleeping);
    }

    #[test]
    fn test_unknown_tags_fall_back() {
        for tag in ["", "Thinking", "overheating", "Quantum", "IDLE"] {
            assert_eq!(state_from_tag(tag), SpriteState::Idle, "tag {tag:?}");
            assert_eq!(mood_from_tag(tag), MoodState::Happy, "tag {tag:?}");
        }
    }

    #[test]
    fn test_known_mood_tags() {
        assert_eq!(mood_from_tag("Angry"), MoodState::Angry);
        assert_eq!(mood_from_tag("Curious"), MoodState::Curious);
        assert_eq!(mood_from_tag("Sleeping"), MoodState::Sleeping);
    }

    #[test]
    fn test_partial_payload_deserializes() {
        let sample: HardwareSample =
            serde_json::from_str(r#"{"temperature": 91.5, "state": "Overheating"}"#).unwrap();
        assert_eq!(sample.temperature, 91.5);
        assert_eq!(sample.sprite_state(), SpriteState::Overheating);
        assert_eq!(sample.mood_state(), MoodState::Happy);
        assert_eq!(sample.memory_total, 0);
    }

    #[test]
    fn test_non_string_tags_fall_back() {
        let sample: HardwareSample =
            serde_json::from_str(r#"{"temperature": 50.0, "state": null, "mood": 7}"#).unwrap();
        assert_eq!(sample.temperature, 50.0);
        assert_eq!(sample.sprite_state(), SpriteState::Idle);
        assert_eq!(sample.mood_state(), MoodState::Happy);

        let sample: HardwareSample =
            serde_json::from_str(r#"{"state": "Gaming", "mood": ["Angry"], "battery_state": 3}"#)
                .unwrap();
        assert_eq!(sample.sprite_state(), SpriteState::Gaming);
        assert_eq!(sample.mood_state(), MoodState::Happy);
        assert_eq!(sample.battery_state, "");
    }
}
