//! Tank configuration – reads `tank.toml`.
//!
//! Every table rejects unknown keys.  The motion and behavior numbers have no
//! defaults: a file that omits one is refused rather than guessed at.  The
//! OctoPrint URL and API key can be overridden from the environment so the
//! key does not have to live in the file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tank_hal::{AxisLimits, ConnectionParams};
use tank_perception::PersonFilter;
use tank_runtime::ControllerConfig;
use tank_types::{Axis, TankError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for TankError {
    fn from(e: ConfigError) -> Self {
        TankError::Config(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OctoPrintConfig {
    /// API base, e.g. `http://octopi.local/api`.
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    #[serde(default = "default_printer_profile")]
    pub printer_profile: String,
    #[serde(default = "default_true")]
    pub save: bool,
    #[serde(default = "default_true")]
    pub autoconnect: bool,
    #[serde(default = "default_liveness_interval")]
    pub liveness_interval_secs: f64,
}

impl fmt::Debug for OctoPrintConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OctoPrintConfig")
            .field("url", &self.url)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("port", &self.port)
            .field("baudrate", &self.baudrate)
            .field("printer_profile", &self.printer_profile)
            .field("save", &self.save)
            .field("autoconnect", &self.autoconnect)
            .field("liveness_interval_secs", &self.liveness_interval_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    pub chain_min: i64,
    pub chain_max: i64,
    pub chain_speed: u32,
    /// Seconds per 1000 axis units.
    pub chain_time_per_1000: f64,
    pub gun_min: i64,
    pub gun_max: i64,
    pub gun_max_per_move: i64,
    pub gun_speed: u32,
    pub gun_time_per_1000: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorConfig {
    /// Seconds.
    pub time_scale: f64,
    /// Seconds.
    pub wait_for_camera_time: f64,
    #[serde(default)]
    pub heartbeat_interval_secs: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub person_class: u32,
    #[serde(default)]
    pub camera_url: Option<String>,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    #[serde(default)]
    pub detector_url: Option<String>,
    #[serde(default = "default_save_interval")]
    pub save_interval_secs: f64,
    /// Where detector output is kept; nothing is saved when absent.
    #[serde(default)]
    pub memory_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeechConfig {
    pub phrases_dir: PathBuf,
    /// Audio player argv; the clip path is appended.
    pub player: Vec<String>,
    /// TTS argv; the text is appended.
    #[serde(default)]
    pub tts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub octoprint: OctoPrintConfig,
    pub motion: MotionConfig,
    pub behavior: BehaviorConfig,
    pub detection: DetectionConfig,
    #[serde(default)]
    pub speech: Option<SpeechConfig>,
}

fn default_port() -> String {
    "/dev/ttyACM0".to_string()
}
fn default_baudrate() -> u32 {
    250_000
}
fn default_printer_profile() -> String {
    "_default".to_string()
}
fn default_true() -> bool {
    true
}
fn default_liveness_interval() -> f64 {
    10.0
}
fn default_frame_width() -> u32 {
    640
}
fn default_frame_height() -> u32 {
    480
}
fn default_save_interval() -> f64 {
    60.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Read, parse, apply environment overrides and validate.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg = parse(&raw)?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

pub fn parse(raw: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(raw)?)
}

/// Apply `TANK_*` environment variable overrides.
///
/// | Variable | Config field |
/// |---|---|
/// | `TANK_OCTOPRINT_URL` | `octoprint.url` |
/// | `TANK_API_KEY` | `octoprint.api_key` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |name| std::env::var(name).ok());
}

fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("TANK_OCTOPRINT_URL") {
        cfg.octoprint.url = url;
    }
    if let Some(key) = lookup("TANK_API_KEY") {
        cfg.octoprint.api_key = key;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation & conversion
// ─────────────────────────────────────────────────────────────────────────────

fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigError::Invalid(format!("{name} must be a non-negative number of seconds, got {value}")))
}

fn axis_limits(axis: Axis, min: i64, max: i64, time_per_1000: f64) -> Result<AxisLimits, ConfigError> {
    AxisLimits::new(axis, min, max, time_per_1000).map_err(|e| ConfigError::Invalid(e.to_string()))
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.octoprint.url.trim().is_empty() {
            return Err(ConfigError::Invalid("octoprint.url is empty".into()));
        }
        if !self.octoprint.liveness_interval_secs.is_finite()
            || self.octoprint.liveness_interval_secs <= 0.0
        {
            return Err(ConfigError::Invalid(
                "octoprint.liveness_interval_secs must be positive".into(),
            ));
        }
        let m = &self.motion;
        if m.chain_speed == 0 || m.gun_speed == 0 {
            return Err(ConfigError::Invalid("axis speeds must be positive".into()));
        }
        if m.gun_max_per_move < 0 {
            return Err(ConfigError::Invalid(
                "motion.gun_max_per_move must not be negative".into(),
            ));
        }
        let d = &self.detection;
        if !(0.0..=1.0).contains(&d.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "detection.confidence_threshold must lie in [0, 1]".into(),
            ));
        }
        if d.camera_url.is_some() && d.detector_url.is_none() {
            return Err(ConfigError::Invalid(
                "detection.camera_url is set but detection.detector_url is not".into(),
            ));
        }
        seconds("detection.save_interval_secs", d.save_interval_secs)?;
        if let Some(speech) = &self.speech
            && speech.player.is_empty()
        {
            return Err(ConfigError::Invalid("speech.player is empty".into()));
        }
        self.controller_config().map(|_| ())
    }

    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        let m = &self.motion;
        let b = &self.behavior;
        Ok(ControllerConfig {
            chain: axis_limits(Axis::Chain, m.chain_min, m.chain_max, m.chain_time_per_1000)?,
            gun: axis_limits(Axis::Gun, m.gun_min, m.gun_max, m.gun_time_per_1000)?,
            chain_speed: m.chain_speed,
            gun_speed: m.gun_speed,
            gun_max_per_move: m.gun_max_per_move,
            time_scale: seconds("behavior.time_scale", b.time_scale)?,
            wait_for_camera_time: seconds("behavior.wait_for_camera_time", b.wait_for_camera_time)?,
            heartbeat_interval: b
                .heartbeat_interval_secs
                .map(|s| seconds("behavior.heartbeat_interval_secs", s))
                .transpose()?,
        })
    }

    pub fn connection_params(&self) -> ConnectionParams {
        let o = &self.octoprint;
        ConnectionParams {
            port: o.port.clone(),
            baudrate: o.baudrate,
            printer_profile: o.printer_profile.clone(),
            save: o.save,
            autoconnect: o.autoconnect,
        }
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs_f64(self.octoprint.liveness_interval_secs)
    }

    pub fn person_filter(&self) -> PersonFilter {
        PersonFilter {
            person_class: self.detection.person_class,
            confidence_threshold: self.detection.confidence_threshold,
        }
    }

    pub fn save_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.detection.save_interval_secs).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[octoprint]
url = "http://octopi.local/api"
api_key = "0123456789ABCDEF"

[motion]
chain_min = 0
chain_max = 2000
chain_speed = 6000
chain_time_per_1000 = 1.0
gun_min = 0
gun_max = 2000
gun_max_per_move = 50
gun_speed = 3000
gun_time_per_1000 = 0.5

[behavior]
time_scale = 3.0
wait_for_camera_time = 10.0

[detection]
confidence_threshold = 0.5
person_class = 0
"#;

    fn sample() -> Config {
        parse(SAMPLE).unwrap()
    }

    #[test]
    fn sample_parses_with_octoprint_defaults() {
        let cfg = sample();
        cfg.validate().unwrap();
        assert_eq!(cfg.octoprint.port, "/dev/ttyACM0");
        assert_eq!(cfg.octoprint.baudrate, 250_000);
        assert_eq!(cfg.octoprint.printer_profile, "_default");
        assert!(cfg.octoprint.save && cfg.octoprint.autoconnect);
        assert_eq!(cfg.liveness_interval(), Duration::from_secs(10));
        assert!(cfg.speech.is_none());
        assert!(cfg.detection.camera_url.is_none());
    }

    #[test]
    fn controller_config_carries_motion_numbers() {
        let c = sample().controller_config().unwrap();
        assert_eq!(c.chain.max(), 2000);
        assert_eq!(c.gun.time_per_1000(), 0.5);
        assert_eq!(c.gun_max_per_move, 50);
        assert_eq!(c.time_scale, Duration::from_secs(3));
        assert_eq!(c.wait_for_camera_time, Duration::from_secs(10));
        assert_eq!(c.heartbeat_interval, None);
    }

    #[test]
    fn missing_motion_number_is_refused() {
        let raw = SAMPLE.replace("gun_max_per_move = 50\n", "");
        assert!(matches!(parse(&raw), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn unknown_key_is_refused() {
        let raw = SAMPLE.replace("[behavior]\n", "[behavior]\nturbo = true\n");
        assert!(matches!(parse(&raw), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn inverted_chain_range_is_invalid() {
        let raw = SAMPLE.replace("chain_max = 2000", "chain_max = -5");
        let err = parse(&raw).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn negative_pause_is_invalid() {
        let raw = SAMPLE.replace("time_scale = 3.0", "time_scale = -1.0");
        assert!(parse(&raw).unwrap().validate().is_err());
    }

    #[test]
    fn camera_without_detector_is_invalid() {
        let raw = SAMPLE.replace(
            "person_class = 0\n",
            "person_class = 0\ncamera_url = \"http://cam.local/snapshot\"\n",
        );
        assert!(parse(&raw).unwrap().validate().is_err());
    }

    #[test]
    fn speech_table_parses() {
        let raw = format!(
            "{SAMPLE}\n[speech]\nphrases_dir = \"phrases\"\nplayer = [\"aplay\", \"-q\"]\ntts = [\"espeak\"]\n"
        );
        let cfg = parse(&raw).unwrap();
        cfg.validate().unwrap();
        let speech = cfg.speech.unwrap();
        assert_eq!(speech.player, vec!["aplay", "-q"]);
        assert_eq!(speech.tts, vec!["espeak"]);
    }

    #[test]
    fn debug_redacts_api_key() {
        let shown = format!("{:?}", sample());
        assert!(!shown.contains("0123456789ABCDEF"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn debug_shows_not_set_for_empty_key() {
        let mut cfg = sample();
        cfg.octoprint.api_key.clear();
        assert!(format!("{:?}", cfg).contains("<not set>"));
    }

    #[test]
    fn overrides_replace_url_and_key() {
        let mut cfg = sample();
        apply_overrides_from(&mut cfg, |name| match name {
            "TANK_OCTOPRINT_URL" => Some("http://10.0.0.7/api".to_string()),
            "TANK_API_KEY" => Some("from-env".to_string()),
            _ => None,
        });
        assert_eq!(cfg.octoprint.url, "http://10.0.0.7/api");
        assert_eq!(cfg.octoprint.api_key, "from-env");
    }

    #[test]
    fn load_from_reads_file_and_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tank.toml");
        fs::write(&path, SAMPLE).unwrap();

        // SAFETY: the only test in this crate touching this variable.
        unsafe { std::env::set_var("TANK_OCTOPRINT_URL", "http://robot-host/api") };
        let cfg = load_from(&path).unwrap();
        unsafe { std::env::remove_var("TANK_OCTOPRINT_URL") };

        assert_eq!(cfg.octoprint.url, "http://robot-host/api");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(matches!(TankError::from(err), TankError::Config(_)));
    }
}
