use serde::Serialize;

use crate::config::model::DimmerConfig;
use crate::core::brightness::{BrightnessSettings, DEFAULT_BRIGHTNESS, format_percent};

/// Waybar-style `{"text", "tooltip"}` object, with the raw map alongside.
#[derive(Debug, Serialize)]
pub struct InfoSummary<'a> {
    pub text: String,
    pub tooltip: String,
    pub monitors: &'a [String],
    pub brightness: &'a BrightnessSettings,
}

impl DimmerConfig {
    /// Human-readable dump of the effective config plus live monitor state.
    pub fn pretty_print(&self, monitors: &[String], settings: &BrightnessSettings) -> String {
        let mut out = String::new();

        out.push_str("General:\n");
        out.push_str(&format!("  Tool               = {}\n", self.tool));
        out.push_str(&format!("  MinBrightness      = {}\n", self.min_brightness));
        out.push_str(&format!("  CommandTimeout     = {:?}\n", self.command_timeout));
        out.push_str(&format!(
            "  Presets            = {}\n",
            self.presets
                .iter()
                .map(|p| format!("{}%", p))
                .collect::<Vec<_>>()
                .join(",")
        ));
        out.push_str(&format!("  RestoreOnStartup   = {}\n", self.restore_on_startup));
        out.push_str(&format!("  SettingsFile       = {}\n", self.settings_file.display()));

        out.push_str("\nMonitors:\n");
        if monitors.is_empty() {
            out.push_str("  (none detected)\n");
        }
        for monitor in monitors {
            let value = settings.get(monitor).copied().unwrap_or(DEFAULT_BRIGHTNESS);
            out.push_str(&format!("  {:<20} {}\n", monitor, format_percent(value)));
        }

        let stale: Vec<_> = settings
            .iter()
            .filter(|(name, _)| !monitors.iter().any(|m| m == *name))
            .collect();
        if !stale.is_empty() {
            out.push_str("\nDisconnected (remembered):\n");
            for (monitor, value) in stale {
                out.push_str(&format!("  {:<20} {}\n", monitor, format_percent(*value)));
            }
        }

        out
    }

    pub fn json_summary<'a>(&self, monitors: &'a [String], settings: &'a BrightnessSettings) -> InfoSummary<'a> {
        let values: Vec<f64> = monitors
            .iter()
            .map(|m| settings.get(m).copied().unwrap_or(DEFAULT_BRIGHTNESS))
            .collect();

        let text = if values.is_empty() {
            "-".to_string()
        } else {
            format_percent(values.iter().sum::<f64>() / values.len() as f64)
        };

        let tooltip = monitors
            .iter()
            .zip(&values)
            .map(|(m, v)| format!("{}: {}", m, format_percent(*v)))
            .collect::<Vec<_>>()
            .join("\n");

        InfoSummary {
            text,
            tooltip: if tooltip.is_empty() { "No monitors detected".to_string() } else { tooltip },
            monitors,
            brightness: settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<String>, BrightnessSettings) {
        let monitors = vec!["DP-1".to_string(), "HDMI-1".to_string()];
        let mut settings = BrightnessSettings::new();
        settings.insert("DP-1".to_string(), 0.5);
        settings.insert("VGA-1".to_string(), 0.3);
        (monitors, settings)
    }

    #[test]
    fn pretty_print_lists_live_and_remembered_monitors() {
        let (monitors, settings) = sample();
        let out = DimmerConfig::default().pretty_print(&monitors, &settings);
        assert!(out.contains("Tool               = xrandr"));
        assert!(out.contains("Presets            = 100%,75%,50%,25%"));
        assert!(out.contains("DP-1                 50%"));
        assert!(out.contains("HDMI-1               100%"));
        assert!(out.contains("Disconnected (remembered):"));
        assert!(out.contains("VGA-1                30%"));
    }

    #[test]
    fn json_summary_averages_connected_monitors() {
        let (monitors, settings) = sample();
        let json = serde_json::to_value(DimmerConfig::default().json_summary(&monitors, &settings)).unwrap();
        assert_eq!(json["text"], "75%");
        assert_eq!(json["tooltip"], "DP-1: 50%\nHDMI-1: 100%");
        assert_eq!(json["brightness"]["VGA-1"], 0.3);
    }

    #[test]
    fn json_summary_without_monitors() {
        let settings = BrightnessSettings::new();
        let summary = DimmerConfig::default().json_summary(&[], &settings);
        assert_eq!(summary.text, "-");
        assert_eq!(summary.tooltip, "No monitors detected");
    }
}
