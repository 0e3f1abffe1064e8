use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TOOL: &str = "xrandr";
pub const DEFAULT_MIN_BRIGHTNESS: f64 = 0.1;
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PRESETS: [u32; 4] = [100, 75, 50, 25];

#[derive(Debug, Clone, PartialEq)]
pub struct DimmerConfig {
    /// Display-configuration binary used for both query and apply
    pub tool: String,
    pub min_brightness: f64,
    pub command_timeout: Duration,
    /// Quick-select levels in percent, highest first
    pub presets: Vec<u32>,
    pub restore_on_startup: bool,
    pub settings_file: PathBuf,
}

impl Default for DimmerConfig {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            min_brightness: DEFAULT_MIN_BRIGHTNESS,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            presets: DEFAULT_PRESETS.to_vec(),
            restore_on_startup: true,
            settings_file: default_settings_path(),
        }
    }
}

/// `$XDG_CONFIG_HOME/dimmer/brightness.json`
pub fn default_settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("dimmer");
    path.push("brightness.json");
    path
}

/// `$XDG_CONFIG_HOME/dimmer/dimmer.rune`
pub fn default_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("dimmer");
    path.push("dimmer.rune");
    Some(path)
}
