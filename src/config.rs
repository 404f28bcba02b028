use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::sampler::{to_centi, EnvelopeParams};
use crate::opc::codec::MAX_PIXELS;
use crate::playback::ffplay::PlayerOptions;
use crate::render::frame::RenderParams;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_led_count")]
    pub led_count: usize,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_boost_max")]
    pub boost_max: u8,
    #[serde(default = "default_boost_decay_step")]
    pub boost_decay_step: u8,
    #[serde(default = "default_boost_trigger_delta")]
    pub boost_trigger_delta: f32,
    #[serde(default = "default_dead_zone_threshold")]
    pub dead_zone_threshold: f32,
    #[serde(default = "default_controller_host")]
    pub controller_host: String,
    #[serde(default = "default_controller_port")]
    pub controller_port: u16,
    #[serde(default = "default_channel")]
    pub channel: u8,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_audio_file")]
    pub audio_file: PathBuf,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_player_program")]
    pub program: String,
    #[serde(default = "default_player_volume")]
    pub volume: u8,
    #[serde(default)]
    pub show_window: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            led_count: default_led_count(),
            tick_interval_ms: default_tick_interval_ms(),
            boost_max: default_boost_max(),
            boost_decay_step: default_boost_decay_step(),
            boost_trigger_delta: default_boost_trigger_delta(),
            dead_zone_threshold: default_dead_zone_threshold(),
            controller_host: default_controller_host(),
            controller_port: default_controller_port(),
            channel: default_channel(),
            connect_timeout_ms: default_connect_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            audio_file: default_audio_file(),
            player: PlayerConfig::default(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            program: default_player_program(),
            volume: default_player_volume(),
            show_window: false,
        }
    }
}

fn default_led_count() -> usize { 150 }
fn default_tick_interval_ms() -> u64 { 15 }
fn default_boost_max() -> u8 { 75 }
fn default_boost_decay_step() -> u8 { 3 }
fn default_boost_trigger_delta() -> f32 { 0.2 }
fn default_dead_zone_threshold() -> f32 { 0.1 }
fn default_controller_host() -> String { "127.0.0.1".into() }
fn default_controller_port() -> u16 { 7890 }
fn default_channel() -> u8 { 1 }
fn default_connect_timeout_ms() -> u64 { 5000 }
fn default_write_timeout_ms() -> u64 { 1000 }
fn default_audio_file() -> PathBuf { PathBuf::from("test.mp3") }
fn default_true() -> bool { true }
fn default_player_program() -> String { "ffplay".into() }
fn default_player_volume() -> u8 { 100 }

impl Config {
    /// Rejects values the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.led_count == 0 || self.led_count > MAX_PIXELS {
            anyhow::bail!("led_count must be between 1 and {}, got {}", MAX_PIXELS, self.led_count);
        }
        if self.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be greater than zero");
        }
        // Blended channels reach 2 * boost_max and must fit a byte.
        if self.boost_max > 127 {
            anyhow::bail!("boost_max must be at most 127, got {}", self.boost_max);
        }
        // Peaks are compared in hundredths; a smaller delta would trigger on every tick.
        if !(self.boost_trigger_delta.is_finite() && to_centi(self.boost_trigger_delta) >= 1) {
            anyhow::bail!("boost_trigger_delta must be at least 0.01");
        }
        if !(0.0..=1.0).contains(&self.dead_zone_threshold) {
            anyhow::bail!("dead_zone_threshold must be within 0.0-1.0");
        }
        if self.controller_host.trim().is_empty() {
            anyhow::bail!("controller_host must not be empty");
        }
        if self.connect_timeout_ms == 0 || self.write_timeout_ms == 0 {
            anyhow::bail!("connection timeouts must be greater than zero");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn envelope_params(&self) -> EnvelopeParams {
        EnvelopeParams {
            boost_max: self.boost_max,
            decay_step: self.boost_decay_step,
            trigger_delta: self.boost_trigger_delta,
        }
    }

    pub fn render_params(&self) -> RenderParams {
        RenderParams {
            boost_max: self.boost_max,
            dead_zone: self.dead_zone_threshold,
        }
    }

    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions {
            program: self.player.program.clone(),
            volume: self.player.volume,
            show_window: self.player.show_window,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Looks for `ledpulse.toml` in the working directory, then the user config dirs.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("ledpulse.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("ledpulse").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("ledpulse").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.led_count, 150);
        assert_eq!(config.tick_interval_ms, 15);
        assert_eq!(config.boost_max, 75);
        assert_eq!(config.boost_decay_step, 3);
        assert_eq!(config.controller_port, 7890);
        assert_eq!(config.channel, 1);
        assert!(config.player.enabled);
        assert_eq!(config.player.program, "ffplay");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides() {
        let config: Config = toml::from_str(
            r#"
            led_count = 60
            controller_host = "10.0.0.5"
            audio_file = "song.flac"

            [player]
            enabled = false
            volume = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.led_count, 60);
        assert_eq!(config.controller_host, "10.0.0.5");
        assert_eq!(config.audio_file, PathBuf::from("song.flac"));
        assert!(!config.player.enabled);
        assert_eq!(config.player_options().volume, 40);
        assert_eq!(config.boost_max, 75);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases: [fn(&mut Config); 9] = [
            |c| c.led_count = 0,
            |c| c.led_count = MAX_PIXELS + 1,
            |c| c.tick_interval_ms = 0,
            |c| c.boost_max = 128,
            |c| c.boost_trigger_delta = 0.0,
            |c| c.boost_trigger_delta = 0.004,
            |c| c.dead_zone_threshold = 1.5,
            |c| c.controller_host = " ".into(),
            |c| c.write_timeout_ms = 0,
        ];
        for mutate in cases {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn derived_params() {
        let config = Config {
            boost_max: 100,
            boost_decay_step: 5,
            dead_zone_threshold: 0.3,
            ..Config::default()
        };
        let envelope = config.envelope_params();
        assert_eq!(envelope.boost_max, 100);
        assert_eq!(envelope.decay_step, 5);
        assert_eq!(config.render_params().dead_zone, 0.3);
        assert_eq!(config.tick_interval(), Duration::from_millis(15));
    }

    #[test]
    fn load_reports_parse_errors() {
        let path = std::env::temp_dir().join(format!("ledpulse-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "led_count = \"lots\"").unwrap();
        let result = load_config(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
