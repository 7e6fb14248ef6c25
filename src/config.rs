use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::signal::{MeterMode, DEFAULT_SILENCE_SECS};
use crate::smoothing::{DAMPING, DEFAULT_SWEEP_DEG, K_SPRING};
use crate::theme::Skin;
use crate::transport::{
    TransportConfig, BACKOFF_MAX_MS, BACKOFF_MIN_MS, DEFAULT_LEVEL_COMMAND, DEFAULT_PORT, POLL_MS,
    WATCHDOG_MS,
};

pub const DEFAULT_FPS: u32 = 60;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every field is optional so YAML, CLI and
/// defaults can be layered Option-by-Option.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,
    pub server: Option<ServerConfig>,
    pub display: Option<DisplayConfig>,
    pub meter: Option<MeterConfig>,
}

/// Where the telemetry stream and the control endpoint live.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub level_command: Option<String>,
    /// Base URL of the producer's control endpoint. Absent means the
    /// restart hotkey only cycles the local connection.
    pub control_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    /// Frame size in pixels; unset means size to the terminal.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub skin: Option<String>,
    pub asymmetric: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MeterConfig {
    pub mode: Option<String>,
    pub sweep_deg: Option<f32>,
    pub spring_k: Option<f32>,
    pub damping: Option<f32>,
    pub watchdog_ms: Option<u64>,
    pub poll_ms: Option<u64>,
    pub silence_secs: Option<f32>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mode: Option<String>,
    pub skin: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub sweep_deg: Option<f32>,
    pub asymmetric: Option<bool>,
    pub dump_config: bool,
}

/// Public entry point: defaults, then YAML, then CLI overrides, then validate.
pub fn load(overrides: &Overrides) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = overrides.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    apply_overrides(&mut cfg, overrides);
    validate(&cfg)?;

    if overrides.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/meterbridge/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/meterbridge/config.yaml");
        if p.exists() {
            return Some(p);
        }
        let p = home.join(".config/meterbridge.yaml");
        if p.exists() {
            return Some(p);
        }
    }
    // project local
    for candidate in &["meterbridge.yaml", "config.yaml", "config/meterbridge.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() {
        dst.log_level = src.log_level;
    }
    match (&mut dst.server, src.server) {
        (None, Some(c)) => dst.server = Some(c),
        (Some(d), Some(s)) => merge_server(d, s),
        _ => {}
    }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
    match (&mut dst.meter, src.meter) {
        (None, Some(c)) => dst.meter = Some(c),
        (Some(d), Some(s)) => merge_meter(d, s),
        _ => {}
    }
}

fn merge_server(dst: &mut ServerConfig, src: ServerConfig) {
    if src.host.is_some() {
        dst.host = src.host;
    }
    if src.port.is_some() {
        dst.port = src.port;
    }
    if src.level_command.is_some() {
        dst.level_command = src.level_command;
    }
    if src.control_url.is_some() {
        dst.control_url = src.control_url;
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.width.is_some() {
        dst.width = src.width;
    }
    if src.height.is_some() {
        dst.height = src.height;
    }
    if src.fps.is_some() {
        dst.fps = src.fps;
    }
    if src.skin.is_some() {
        dst.skin = src.skin;
    }
    if src.asymmetric.is_some() {
        dst.asymmetric = src.asymmetric;
    }
}

fn merge_meter(dst: &mut MeterConfig, src: MeterConfig) {
    if src.mode.is_some() {
        dst.mode = src.mode;
    }
    if src.sweep_deg.is_some() {
        dst.sweep_deg = src.sweep_deg;
    }
    if src.spring_k.is_some() {
        dst.spring_k = src.spring_k;
    }
    if src.damping.is_some() {
        dst.damping = src.damping;
    }
    if src.watchdog_ms.is_some() {
        dst.watchdog_ms = src.watchdog_ms;
    }
    if src.poll_ms.is_some() {
        dst.poll_ms = src.poll_ms;
    }
    if src.silence_secs.is_some() {
        dst.silence_secs = src.silence_secs;
    }
}

fn apply_overrides(cfg: &mut Config, cli: &Overrides) {
    if cli.host.is_some() || cli.port.is_some() {
        let server = cfg.server.get_or_insert_with(ServerConfig::default);
        if cli.host.is_some() {
            server.host = cli.host.clone();
        }
        if cli.port.is_some() {
            server.port = cli.port;
        }
    }
    if cli.skin.is_some()
        || cli.width.is_some()
        || cli.height.is_some()
        || cli.fps.is_some()
        || cli.asymmetric.is_some()
    {
        let display = cfg.display.get_or_insert_with(DisplayConfig::default);
        if cli.skin.is_some() {
            display.skin = cli.skin.clone();
        }
        if cli.width.is_some() {
            display.width = cli.width;
        }
        if cli.height.is_some() {
            display.height = cli.height;
        }
        if cli.fps.is_some() {
            display.fps = cli.fps;
        }
        if cli.asymmetric.is_some() {
            display.asymmetric = cli.asymmetric;
        }
    }
    if cli.mode.is_some() || cli.sweep_deg.is_some() {
        let meter = cfg.meter.get_or_insert_with(MeterConfig::default);
        if cli.mode.is_some() {
            meter.mode = cli.mode.clone();
        }
        if cli.sweep_deg.is_some() {
            meter.sweep_deg = cli.sweep_deg;
        }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(display) = cfg.display.as_ref() {
        if let (Some(w), Some(h)) = (display.width, display.height) {
            if w == 0 || h == 0 {
                return Err(ConfigError::Validation(
                    "display width/height must be > 0".into(),
                ));
            }
        }
        if let Some(fps) = display.fps {
            if !(1..=120).contains(&fps) {
                return Err(ConfigError::Validation("display fps must be 1..=120".into()));
            }
        }
    }
    if let Some(meter) = cfg.meter.as_ref() {
        if let Some(sweep) = meter.sweep_deg {
            if !(30.0..=180.0).contains(&sweep) {
                return Err(ConfigError::Validation(
                    "meter sweep_deg must be 30..=180".into(),
                ));
            }
        }
        if let Some(k) = meter.spring_k {
            if !(k > 0.0 && k <= 1.0) {
                return Err(ConfigError::Validation(
                    "meter spring_k must be in (0, 1]".into(),
                ));
            }
        }
        if let Some(d) = meter.damping {
            if !(d > 0.0 && d < 1.0) {
                return Err(ConfigError::Validation(
                    "meter damping must be in (0, 1)".into(),
                ));
            }
        }
        if let Some(s) = meter.silence_secs {
            if s <= 0.0 {
                return Err(ConfigError::Validation(
                    "meter silence_secs must be > 0".into(),
                ));
            }
        }
        // cross-check the resolved pair: a lone watchdog_ms under the
        // default poll cadence would reconnect-loop at runtime
        let wd = meter.watchdog_ms.unwrap_or(WATCHDOG_MS);
        let poll = meter.poll_ms.unwrap_or(POLL_MS);
        if wd <= poll {
            return Err(ConfigError::Validation(
                "meter watchdog_ms must exceed poll_ms".into(),
            ));
        }
    }
    Ok(())
}

// Resolved accessors: collapse the Option layers into working values so the
// rest of the app never repeats the default-juggling.
impl Config {
    pub fn transport(&self) -> TransportConfig {
        let server = self.server.as_ref();
        let meter = self.meter.as_ref();
        TransportConfig {
            host: server
                .and_then(|s| s.host.clone())
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: server.and_then(|s| s.port).unwrap_or(DEFAULT_PORT),
            level_command: server
                .and_then(|s| s.level_command.clone())
                .unwrap_or_else(|| DEFAULT_LEVEL_COMMAND.to_string()),
            watchdog: Duration::from_millis(
                meter.and_then(|m| m.watchdog_ms).unwrap_or(WATCHDOG_MS),
            ),
            poll_interval: Duration::from_millis(meter.and_then(|m| m.poll_ms).unwrap_or(POLL_MS)),
            backoff_min: Duration::from_millis(BACKOFF_MIN_MS),
            backoff_max: Duration::from_millis(BACKOFF_MAX_MS),
        }
    }

    pub fn control_url(&self) -> Option<String> {
        self.server.as_ref().and_then(|s| s.control_url.clone())
    }

    pub fn meter_mode(&self) -> MeterMode {
        match self.meter.as_ref().and_then(|m| m.mode.as_deref()) {
            Some(name) => MeterMode::from_name(name),
            None => MeterMode::Gauge,
        }
    }

    pub fn skin(&self) -> Skin {
        match self.display.as_ref().and_then(|d| d.skin.as_deref()) {
            Some(name) => Skin::from_name(name),
            None => Skin::Classic,
        }
    }

    pub fn fps(&self) -> u32 {
        self.display.as_ref().and_then(|d| d.fps).unwrap_or(DEFAULT_FPS)
    }

    pub fn asymmetric(&self) -> bool {
        self.display
            .as_ref()
            .and_then(|d| d.asymmetric)
            .unwrap_or(false)
    }

    /// Explicit frame size, or None to size to the terminal.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        let d = self.display.as_ref()?;
        match (d.width, d.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    pub fn sweep_deg(&self) -> f32 {
        self.meter
            .as_ref()
            .and_then(|m| m.sweep_deg)
            .unwrap_or(DEFAULT_SWEEP_DEG)
    }

    pub fn spring_k(&self) -> f32 {
        self.meter.as_ref().and_then(|m| m.spring_k).unwrap_or(K_SPRING)
    }

    pub fn damping(&self) -> f32 {
        self.meter.as_ref().and_then(|m| m.damping).unwrap_or(DAMPING)
    }

    pub fn silence_secs(&self) -> f32 {
        self.meter
            .as_ref()
            .and_then(|m| m.silence_secs)
            .unwrap_or(DEFAULT_SILENCE_SECS)
    }
}
