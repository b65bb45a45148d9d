//! TOML Configuration File Support
//!
//! Loads engine settings from `~/.config/ethereal/engine.toml`.
//!
//! # Configuration Priority
//!
//! Values are applied in this order (highest first):
//! 1. CLI arguments ([`ConfigOverrides`], applied by the daemon)
//! 2. Environment variables (`ETHEREAL_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [sprites]
//! custom_path = "/home/me/skins/pixel-cat"
//! asset_dir = "/usr/share/ethereal/public"
//!
//! [sound]
//! enabled = true
//! volume = 0.4
//!
//! [animation]
//! tick_ms = 16
//!
//! [chat]
//! auto_hide_ms = 5000
//!
//! [profiles.overheating]
//! frame_count = 6
//! fps = 24.0
//! loop = true
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::animation::DEFAULT_TICK_INTERVAL;
use crate::chat::DEFAULT_AUTO_HIDE;
use crate::sound::{SoundSettings, DEFAULT_SOUND_ROOT};
use crate::sprite::{AnimationProfile, ProfileTable, SpriteState};
use crate::store::{StoreConfig, BUNDLED_SPRITE_ROOT};

/// Environment variable: custom sprite directory (empty clears it)
pub const ENV_SPRITE_PATH: &str = "ETHEREAL_SPRITE_PATH";
/// Environment variable: sound on/off (`0`/`false` disable)
pub const ENV_SOUND: &str = "ETHEREAL_SOUND";
/// Environment variable: playback volume
pub const ENV_VOLUME: &str = "ETHEREAL_VOLUME";
/// Environment variable: animation ticker period in milliseconds
pub const ENV_TICK_MS: &str = "ETHEREAL_TICK_MS";
/// Environment variable: directory bundled assets are served from
pub const ENV_ASSET_DIR: &str = "ETHEREAL_ASSET_DIR";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Where the effective configuration last came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line argument
    Cli,
    /// Environment variable
    Env,
    /// TOML configuration file
    File,
    /// Built-in default
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[sprites]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpritesToml {
    /// Custom sprite directory
    pub custom_path: Option<String>,
    /// Directory bundled sprites and sounds are served from
    pub asset_dir: Option<PathBuf>,
    /// Locator prefix of bundled sprites
    pub bundled_root: Option<String>,
}

/// `[sound]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundToml {
    /// Whether cues play
    pub enabled: Option<bool>,
    /// Playback volume (clamped to 0.0-1.0)
    pub volume: Option<f32>,
    /// Locator prefix of cue files
    pub root: Option<String>,
}

/// `[animation]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationToml {
    /// Ticker period in milliseconds
    pub tick_ms: Option<u64>,
}

/// `[chat]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Delay before a shown response hides itself
    pub auto_hide_ms: Option<u64>,
}

/// `[profiles.<state>]` entry; unset fields keep the default profile's value
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileToml {
    /// Number of frames
    pub frame_count: Option<usize>,
    /// Base frames per second
    pub fps: Option<f32>,
    /// Whether the animation wraps
    #[serde(rename = "loop")]
    pub looping: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineToml {
    /// Sprite asset settings
    pub sprites: SpritesToml,
    /// Sound cue settings
    pub sound: SoundToml,
    /// Animation ticker settings
    pub animation: AnimationToml,
    /// Chat bubble settings
    pub chat: ChatToml,
    /// Per-state profile overrides, keyed by state name (`high_load`, ...)
    pub profiles: HashMap<String, ProfileToml>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Effective engine configuration
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Per-state animation profiles
    pub profiles: ProfileTable,
    /// Custom sprite directory applied at startup
    pub custom_sprite_path: Option<String>,
    /// Directory bundled assets are served from
    pub asset_dir: PathBuf,
    /// Locator prefix of bundled sprites
    pub bundled_root: String,
    /// Sound on/off and volume
    pub sound: SoundSettings,
    /// Locator prefix of cue files
    pub sound_root: String,
    /// Animation ticker period
    pub tick_interval: Duration,
    /// Chat bubble auto-hide delay
    pub chat_auto_hide: Duration,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profiles: ProfileTable::default(),
            custom_sprite_path: None,
            asset_dir: PathBuf::from("public"),
            bundled_root: BUNDLED_SPRITE_ROOT.to_string(),
            sound: SoundSettings::default(),
            sound_root: DEFAULT_SOUND_ROOT.to_string(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            chat_auto_hide: DEFAULT_AUTO_HIDE,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl EngineConfig {
    /// Configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Store construction options derived from this configuration
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            profiles: self.profiles.clone(),
            bundled_root: self.bundled_root.clone(),
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/ethereal/engine.toml` or
/// `~/.config/ethereal/engine.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ethereal").join("engine.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed or holds
/// invalid values. A missing file is not an error.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<EngineConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_with(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Defaults overlaid with the file at `path`, without the environment
fn load_file_config(path: Option<PathBuf>) -> Result<EngineConfig, ConfigError> {
    let mut config = EngineConfig::default();

    let Some(config_path) = path else {
        return Ok(config);
    };
    if !config_path.exists() {
        tracing::debug!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return Ok(config);
    }

    let toml_content =
        std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
            path: config_path.clone(),
            source: e,
        })?;
    let toml_config: EngineToml = toml::from_str(&toml_content)?;
    apply_toml_config(&mut config, &toml_config)?;
    config.config_file_path = Some(config_path.clone());
    config.source = ConfigSource::File;

    tracing::info!(
        path = %config_path.display(),
        "Loaded configuration from file"
    );
    Ok(config)
}

/// Apply TOML values over `config`
fn apply_toml_config(config: &mut EngineConfig, toml: &EngineToml) -> Result<(), ConfigError> {
    // Sprites
    if let Some(path) = &toml.sprites.custom_path {
        config.custom_sprite_path = non_empty(path);
    }
    if let Some(dir) = &toml.sprites.asset_dir {
        config.asset_dir.clone_from(dir);
    }
    if let Some(root) = &toml.sprites.bundled_root {
        config.bundled_root.clone_from(root);
    }

    // Sound
    if let Some(enabled) = toml.sound.enabled {
        config.sound.enabled = enabled;
    }
    if let Some(volume) = toml.sound.volume {
        config.sound.set_volume(volume);
    }
    if let Some(root) = &toml.sound.root {
        config.sound_root.clone_from(root);
    }

    // Animation
    if let Some(ms) = toml.animation.tick_ms {
        config.tick_interval = tick_interval(ms)?;
    }

    // Chat
    if let Some(ms) = toml.chat.auto_hide_ms {
        config.chat_auto_hide = Duration::from_millis(ms);
    }

    // Profiles
    for (name, entry) in &toml.profiles {
        let state = SpriteState::from_name(name).ok_or_else(|| {
            ConfigError::ValidationError(format!("unknown sprite state in [profiles]: {name}"))
        })?;

        let base = config.profiles.resolve(state);
        let profile = AnimationProfile {
            frame_count: entry.frame_count.unwrap_or(base.frame_count),
            base_fps: entry.fps.unwrap_or(base.base_fps),
            looping: entry.looping.unwrap_or(base.looping),
        };
        if !profile.is_valid() {
            return Err(ConfigError::ValidationError(format!(
                "profile for {name} needs frame_count >= 1 and a positive fps"
            )));
        }
        config.profiles.set(state, profile);
    }

    Ok(())
}

/// Apply `ETHEREAL_*` overrides read through `lookup`
///
/// Unparseable values are logged and ignored.
pub fn apply_env_with<F>(config: &mut EngineConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(ENV_SPRITE_PATH) {
        config.custom_sprite_path = non_empty(&path);
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = lookup(ENV_ASSET_DIR) {
        config.asset_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
    if let Some(enabled) = lookup(ENV_SOUND) {
        config.sound.enabled = enabled != "0" && enabled.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(volume) = lookup(ENV_VOLUME) {
        match volume.parse::<f32>() {
            Ok(v) => {
                config.sound.set_volume(v);
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(value = %volume, error = %e, "Ignoring {ENV_VOLUME}"),
        }
    }
    if let Some(tick) = lookup(ENV_TICK_MS) {
        match tick.parse::<u64>().ok().map(tick_interval) {
            Some(Ok(interval)) => {
                config.tick_interval = interval;
                config.source = ConfigSource::Env;
            }
            _ => tracing::warn!(value = %tick, "Ignoring {ENV_TICK_MS}"),
        }
    }
}

fn tick_interval(ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::ValidationError(
            "animation tick_ms must be at least 1".to_string(),
        ));
    }
    Ok(Duration::from_millis(ms))
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Custom sprite directory override
    pub sprite_path: Option<String>,
    /// Asset directory override
    pub asset_dir: Option<PathBuf>,
    /// Sound enabled override
    pub sound_enabled: Option<bool>,
    /// Volume override
    pub volume: Option<f32>,
    /// Ticker period override (milliseconds)
    pub tick_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom sprite directory override
    #[must_use]
    pub fn with_sprite_path(mut self, path: String) -> Self {
        self.sprite_path = Some(path);
        self
    }

    /// Set asset directory override
    #[must_use]
    pub fn with_asset_dir(mut self, dir: PathBuf) -> Self {
        self.asset_dir = Some(dir);
        self
    }

    /// Set sound enabled override
    #[must_use]
    pub fn with_sound_enabled(mut self, enabled: bool) -> Self {
        self.sound_enabled = Some(enabled);
        self
    }

    /// Set volume override
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Set ticker period override
    #[must_use]
    pub fn with_tick_ms(mut self, ms: u64) -> Self {
        self.tick_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an override is out of range (`tick_ms` of 0).
    pub fn apply(&self, config: &mut EngineConfig) -> Result<(), ConfigError> {
        if self.sprite_path.is_some()
            || self.asset_dir.is_some()
            || self.sound_enabled.is_some()
            || self.volume.is_some()
            || self.tick_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(path) = &self.sprite_path {
            config.custom_sprite_path = non_empty(path);
        }
        if let Some(dir) = &self.asset_dir {
            config.asset_dir.clone_from(dir);
        }
        if let Some(enabled) = self.sound_enabled {
            config.sound.enabled = enabled;
        }
        if let Some(volume) = self.volume {
            config.sound.set_volume(volume);
        }
        if let Some(ms) = self.tick_ms {
            config.tick_interval = tick_interval(ms)?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.profiles, ProfileTable::default());
        assert_eq!(config.custom_sprite_path, None);
        assert_eq!(config.bundled_root, "/sprites");
        assert_eq!(config.sound, SoundSettings::new(true, 0.5));
        assert_eq!(config.sound_root, "/sounds");
        assert_eq!(config.tick_interval, Duration::from_millis(16));
        assert_eq!(config.chat_auto_hide, Duration::from_secs(5));
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("ethereal/engine.toml"));
        }
    }

    // =========================================================================
    // TOML Parsing
    // =========================================================================

    #[test]
    fn test_parse_valid_toml() {
        let file = write_toml(
            r#"
[sprites]
custom_path = "/home/me/skins"
asset_dir = "/usr/share/ethereal/public"

[sound]
enabled = false
volume = 0.8

[animation]
tick_ms = 33

[chat]
auto_hide_ms = 8000

[profiles.overheating]
frame_count = 6
fps = 30.0

[profiles.sleeping]
loop = false
"#,
        );

        let config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.custom_sprite_path.as_deref(), Some("/home/me/skins"));
        assert_eq!(config.asset_dir, PathBuf::from("/usr/share/ethereal/public"));
        assert_eq!(config.sound, SoundSettings::new(false, 0.8));
        assert_eq!(config.tick_interval, Duration::from_millis(33));
        assert_eq!(config.chat_auto_hide, Duration::from_millis(8000));
        assert_eq!(
            config.profiles.resolve(SpriteState::Overheating),
            AnimationProfile::looping(6, 30.0)
        );
        assert_eq!(
            config.profiles.resolve(SpriteState::Sleeping),
            AnimationProfile::oneshot(4, 4.0)
        );
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path, Some(file.path().to_path_buf()));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_file_config(Some(dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.config_file_path, None);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let file = write_toml("[sound\nenabled = ");
        let err = load_file_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_unknown_profile_state_rejected() {
        let file = write_toml("[profiles.dancing]\nfps = 10.0\n");
        let err = load_file_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("dancing"));
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let file = write_toml("[profiles.idle]\nframe_count = 0\n");
        assert!(matches!(
            load_file_config(Some(file.path().to_path_buf())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_zero_tick_rejected() {
        let file = write_toml("[animation]\ntick_ms = 0\n");
        assert!(load_file_config(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_volume_clamped() {
        let file = write_toml("[sound]\nvolume = 4.0\n");
        let config = load_file_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.sound.volume, 1.0);
    }

    // =========================================================================
    // Environment
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = write_toml("[sound]\nenabled = true\nvolume = 0.2\n");
        let mut config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        apply_env_with(
            &mut config,
            env(&[
                (ENV_SOUND, "false"),
                (ENV_VOLUME, "0.7"),
                (ENV_TICK_MS, "50"),
                (ENV_SPRITE_PATH, r"C:\skins"),
            ]),
        );

        assert_eq!(config.sound, SoundSettings::new(false, 0.7));
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.custom_sprite_path.as_deref(), Some(r"C:\skins"));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let mut config = EngineConfig::default();
        apply_env_with(&mut config, env(&[(ENV_VOLUME, "loud"), (ENV_TICK_MS, "0")]));

        assert_eq!(config.sound.volume, 0.5);
        assert_eq!(config.tick_interval, DEFAULT_TICK_INTERVAL);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_empty_env_sprite_path_clears() {
        let mut config = EngineConfig {
            custom_sprite_path: Some("/a".to_string()),
            ..EngineConfig::default()
        };
        apply_env_with(&mut config, env(&[(ENV_SPRITE_PATH, "")]));
        assert_eq!(config.custom_sprite_path, None);
    }

    // =========================================================================
    // CLI Overrides
    // =========================================================================

    #[test]
    fn test_cli_overrides_win() {
        let mut config = EngineConfig::default();
        apply_env_with(&mut config, env(&[(ENV_VOLUME, "0.1")]));

        ConfigOverrides::new()
            .with_volume(0.9)
            .with_asset_dir(PathBuf::from("/srv/assets"))
            .with_tick_ms(8)
            .apply(&mut config)
            .unwrap();

        assert_eq!(config.sound.volume, 0.9);
        assert_eq!(config.asset_dir, PathBuf::from("/srv/assets"));
        assert_eq!(config.tick_interval, Duration::from_millis(8));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = EngineConfig::default();
        ConfigOverrides::new().apply(&mut config).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_store_config_carries_profiles() {
        let mut config = EngineConfig::default();
        config
            .profiles
            .set(SpriteState::Gaming, AnimationProfile::oneshot(3, 9.0));
        let store_config = config.store_config();
        assert_eq!(
            store_config.profiles.resolve(SpriteState::Gaming),
            AnimationProfile::oneshot(3, 9.0)
        );
        assert_eq!(store_config.bundled_root, "/sprites");
    }
}
