use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::Result;
use rune_cfg::{RuneConfig, Value};
use tracing::{info, warn};

use crate::config::model::*;

// Helper to try both - and _ variants of a key
fn try_get_string(config: &RuneConfig, base_path: &str) -> Option<String> {
    let hyphenated = base_path.replace('_', "-");
    if let Ok(val) = config.get::<String>(&hyphenated) {
        return Some(val);
    }

    let underscored = base_path.replace('-', "_");
    config.get::<String>(&underscored).ok()
}

fn try_get_bool(config: &RuneConfig, base_path: &str, default: bool) -> bool {
    let hyphenated = base_path.replace('_', "-");
    if let Ok(val) = config.get::<bool>(&hyphenated) {
        return val;
    }

    let underscored = base_path.replace('-', "_");
    config.get::<bool>(&underscored).unwrap_or(default)
}

fn try_get_value(config: &RuneConfig, base_path: &str) -> Option<Value> {
    let hyphenated = base_path.replace('_', "-");
    if let Ok(val) = config.get_value(&hyphenated) {
        return Some(val);
    }

    let underscored = base_path.replace('-', "_");
    config.get_value(&underscored).ok()
}

fn try_get_number(config: &RuneConfig, base_path: &str) -> Option<f64> {
    match try_get_value(config, base_path) {
        Some(Value::Number(n)) => Some(n as f64),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Accepts a minimum brightness in (0, 1].
pub fn validate_min_brightness(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0 && value <= 1.0).then_some(value)
}

/// Accepts a positive, finite timeout in seconds.
pub fn validate_timeout(seconds: f64) -> Option<Duration> {
    if seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok().filter(|d| !d.is_zero())
}

/// Keeps whole percentages in 1..=100, deduplicated and ordered highest first.
/// Returns `None` when nothing usable is left.
pub fn normalize_presets(raw: &[f64]) -> Option<Vec<u32>> {
    let mut presets: Vec<u32> = raw
        .iter()
        .filter(|p| p.is_finite() && p.fract() == 0.0 && **p >= 1.0 && **p <= 100.0)
        .map(|p| *p as u32)
        .collect();
    presets.sort_unstable_by(|a, b| b.cmp(a));
    presets.dedup();

    (!presets.is_empty()).then_some(presets)
}

fn parse_presets(config: &RuneConfig) -> Option<Vec<u32>> {
    let raw: Vec<f64> = match try_get_value(config, "dimmer.presets")? {
        Value::Array(arr) => arr
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => Some(*n as f64),
                Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
                _ => None,
            })
            .collect(),
        _ => return None,
    };

    let presets = normalize_presets(&raw);
    if presets.is_none() {
        warn!("No usable presets in config, using defaults {:?}", DEFAULT_PRESETS);
    }
    presets
}

fn parse_config(config: &RuneConfig) -> DimmerConfig {
    let defaults = DimmerConfig::default();

    let tool = try_get_string(config, "dimmer.tool")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or(defaults.tool);

    let min_brightness = match try_get_number(config, "dimmer.min_brightness") {
        Some(n) => validate_min_brightness(n).unwrap_or_else(|| {
            warn!("min_brightness {} is outside (0, 1], using {}", n, DEFAULT_MIN_BRIGHTNESS);
            DEFAULT_MIN_BRIGHTNESS
        }),
        None => defaults.min_brightness,
    };

    let command_timeout = match try_get_number(config, "dimmer.command_timeout") {
        Some(n) => validate_timeout(n).unwrap_or_else(|| {
            warn!("command_timeout {} is not a usable number of seconds, using {:?}", n, DEFAULT_COMMAND_TIMEOUT);
            DEFAULT_COMMAND_TIMEOUT
        }),
        None => defaults.command_timeout,
    };

    let presets = parse_presets(config).unwrap_or(defaults.presets);
    let restore_on_startup = try_get_bool(config, "dimmer.restore_on_startup", true);

    let settings_file = try_get_string(config, "dimmer.settings_file")
        .map(|p| expand_home(p.trim()))
        .unwrap_or(defaults.settings_file);

    DimmerConfig {
        tool,
        min_brightness,
        command_timeout,
        presets,
        restore_on_startup,
        settings_file,
    }
}

/// Expands a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load the application config.
///
/// An explicitly requested file must exist. Without one, the default
/// location is tried and built-in defaults are used when it is absent.
pub fn load_config(explicit: Option<&Path>) -> Result<DimmerConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                eyre::bail!("Config file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => path,
            None => {
                info!("No config file found, using defaults");
                return Ok(DimmerConfig::default());
            }
        },
    };

    let path_str = path
        .to_str()
        .ok_or_else(|| eyre::eyre!("Config path {} is not valid UTF-8", path.display()))?;
    let config = RuneConfig::from_file(path_str)?;
    let cfg = parse_config(&config);

    info!("Parsed config from {}:", path.display());
    info!("  tool = {:?}", cfg.tool);
    info!("  min_brightness = {}", cfg.min_brightness);
    info!("  command_timeout = {:?}", cfg.command_timeout);
    info!("  presets = {:?}", cfg.presets);
    info!("  restore_on_startup = {}", cfg.restore_on_startup);
    info!("  settings_file = {}", cfg.settings_file.display());

    Ok(cfg)
}
