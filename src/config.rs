//! Bridge configuration stored as TOML
//!
//! Missing fields fall back to defaults, so an empty file yields the default
//! configuration. A default file is written on first start.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

use crate::consumers::button::ButtonSettings;
use crate::consumers::joystick::JoystickPins;
use crate::input::debouncer::DEFAULT_PRESS_THRESHOLD;
use crate::input::pin::PinIdentifier;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// One of trace, debug, info, warn, error
    pub log_level: String,
    /// Level in [0, 1] above which a reading counts as pressed
    pub press_threshold: f32,
    pub hold_threshold_ms: u64,
    pub event_channel_capacity: usize,
    pub stats_interval_secs: u64,
    pub buttons: Vec<ButtonBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joystick: Option<JoystickBinding>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ButtonBinding {
    pub name: String,
    pub pin: PinIdentifier,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct JoystickBinding {
    pub name: String,
    #[serde(flatten)]
    pub pins: JoystickPins,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            press_threshold: DEFAULT_PRESS_THRESHOLD,
            hold_threshold_ms: 300,
            event_channel_capacity: 100,
            stats_interval_secs: 30,
            buttons: vec![ButtonBinding {
                name: "button".to_string(),
                pin: PinIdentifier::D2,
            }],
            joystick: None,
        }
    }
}

impl BridgeConfig {
    /// `<config dir>/arduino-bridge/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| eyre!("No config directory on this system"))?;
        Ok(base.join("arduino-bridge").join("config.toml"))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        Ok(())
    }

    /// Writes the default configuration if nothing exists at `path` yet.
    /// Returns whether a file was written.
    pub async fn ensure_default_config(path: &Path) -> Result<bool> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;
        if exists {
            return Ok(false);
        }
        info!("No config found, writing defaults to {}", path.display());
        Self::default().save(path).await?;
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.press_threshold) {
            return Err(eyre!(
                "press_threshold must be within [0, 1], got {}",
                self.press_threshold
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(eyre!("event_channel_capacity must be at least 1"));
        }
        self.level()?;

        let mut used = HashSet::new();
        let button_pins = self.buttons.iter().map(|b| (b.pin, b.name.as_str()));
        let joystick_pins = self.joystick.iter().flat_map(|j| {
            [j.pins.up, j.pins.down, j.pins.left, j.pins.right]
                .into_iter()
                .map(move |pin| (pin, j.name.as_str()))
        });
        for (pin, owner) in button_pins.chain(joystick_pins) {
            if !used.insert(pin) {
                return Err(eyre!("Pin {} is bound more than once (at '{}')", pin, owner));
            }
        }
        Ok(())
    }

    pub fn level(&self) -> Result<Level> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| eyre!("Unknown log level: {}", self.log_level))
    }

    /// Log filter from `RUST_LOG` style directives, falling back to `log_level`
    /// when none are given or they do not parse.
    pub fn log_filter(&self, directives: Option<&str>) -> Result<EnvFilter> {
        if let Some(directives) = directives.filter(|d| !d.trim().is_empty()) {
            match EnvFilter::try_new(directives) {
                Ok(filter) => return Ok(filter),
                Err(e) => eprintln!("Ignoring RUST_LOG {:?}: {}", directives, e),
            }
        }
        Ok(EnvFilter::new(self.level()?.as_str()))
    }

    pub fn button_settings(&self) -> ButtonSettings {
        ButtonSettings {
            press_threshold: self.press_threshold,
            hold_threshold_ms: self.hold_threshold_ms,
        }
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn empty_file_is_default_config() {
        let config = BridgeConfig::from_toml("").unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn parses_bindings_by_pin_name() {
        let config = BridgeConfig::from_toml(
            r#"
            press_threshold = 0.7

            [[buttons]]
            name = "jump"
            pin = "D7"

            [joystick]
            name = "dpad"
            up = "D2"
            down = "D3"
            left = "a0"
            right = "A1"
            "#,
        )
        .unwrap();

        assert_eq!(config.press_threshold, 0.7);
        assert_eq!(config.buttons[0].pin, PinIdentifier::D7);
        let joystick = config.joystick.unwrap();
        assert_eq!(joystick.pins.left, PinIdentifier::A0);
        assert_eq!(joystick.pins.right, PinIdentifier::A1);
    }

    #[test]
    fn rejects_unknown_pins_and_duplicates() {
        assert!(BridgeConfig::from_toml("[[buttons]]\nname = \"x\"\npin = \"D20\"").is_err());

        let duplicate = r#"
            [[buttons]]
            name = "a"
            pin = "D2"

            [joystick]
            name = "dpad"
            up = "D2"
            down = "D3"
            left = "D4"
            right = "D5"
        "#;
        assert!(BridgeConfig::from_toml(duplicate).is_err());
    }

    #[test]
    fn rejects_bad_threshold_and_level() {
        assert!(BridgeConfig::from_toml("press_threshold = 1.5").is_err());
        assert!(BridgeConfig::from_toml("log_level = \"loud\"").is_err());
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        let config = BridgeConfig::default();

        let fallback = config.log_filter(None).unwrap();
        assert_eq!(fallback.max_level_hint(), Some(LevelFilter::INFO));

        let blank = config.log_filter(Some("  ")).unwrap();
        assert_eq!(blank.max_level_hint(), Some(LevelFilter::INFO));

        let overridden = config.log_filter(Some("debug")).unwrap();
        assert_eq!(overridden.max_level_hint(), Some(LevelFilter::DEBUG));

        let quiet = BridgeConfig {
            log_level: "warn".to_string(),
            ..BridgeConfig::default()
        };
        assert_eq!(
            quiet.log_filter(None).unwrap().max_level_hint(),
            Some(LevelFilter::WARN)
        );
    }

    #[tokio::test]
    async fn default_config_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(BridgeConfig::ensure_default_config(&path).await.unwrap());
        assert_eq!(
            BridgeConfig::load(&path).await.unwrap(),
            BridgeConfig::default()
        );

        let mut custom = BridgeConfig::default();
        custom.hold_threshold_ms = 1000;
        custom.save(&path).await.unwrap();
        assert!(!BridgeConfig::ensure_default_config(&path).await.unwrap());
        assert_eq!(BridgeConfig::load(&path).await.unwrap().hold_threshold_ms, 1000);
    }
}
