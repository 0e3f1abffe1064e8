use std::fmt::Write as _;

use crate::core::brightness::{Preset, format_percent};
use crate::core::controller::{ApplyResult, Controller};
use crate::services::xrandr::DisplayBackend;

/// Everything a front end (socket client, CLI, tray) can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetPreset(Preset),
    SetAll(f64),
    SetMonitor { monitor: String, fraction: f64 },
    /// Report one monitor's brightness, e.g. to seed a slider
    SelectMonitor(String),
    ListMonitors,
    Refresh,
    Info { json: bool },
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied(Vec<ApplyResult>),
    Brightness { monitor: String, fraction: f64 },
    Monitors(Vec<String>),
    Info(String),
    Rejected(String),
    /// The caller owns shutdown; settings are saved by the shutdown hook.
    Quit,
}

impl Outcome {
    /// Plain-text reply for the control socket and CLI.
    pub fn render(&self) -> String {
        match self {
            Outcome::Applied(results) if results.is_empty() => "No monitors detected".to_string(),
            Outcome::Applied(results) => {
                let mut out = String::new();
                for r in results {
                    let _ = match &r.result {
                        Ok(value) => writeln!(out, "{}: {}", r.monitor, format_percent(*value)),
                        Err(e) => writeln!(out, "{}: failed ({})", r.monitor, e),
                    };
                }
                out.trim_end().to_string()
            }
            Outcome::Brightness { monitor, fraction } => format!("{}: {}", monitor, format_percent(*fraction)),
            Outcome::Monitors(monitors) if monitors.is_empty() => "No monitors detected".to_string(),
            Outcome::Monitors(monitors) => monitors.join("\n"),
            Outcome::Info(text) => text.clone(),
            Outcome::Rejected(reason) => format!("error: {}", reason),
            Outcome::Quit => "Shutting down".to_string(),
        }
    }

    /// True when every requested apply failed (or the request was refused).
    pub fn is_failure(&self) -> bool {
        match self {
            Outcome::Rejected(_) => true,
            Outcome::Applied(results) => !results.is_empty() && results.iter().all(|r| !r.is_ok()),
            _ => false,
        }
    }
}

/// Single entry point for every action.
pub async fn dispatch<B: DisplayBackend>(controller: &mut Controller<B>, action: Action) -> Outcome {
    match action {
        Action::SetPreset(preset) => match preset.checked(&controller.config().presets) {
            Ok(preset) => Outcome::Applied(controller.set_all_brightness(preset.fraction()).await),
            Err(reason) => Outcome::Rejected(reason),
        },
        Action::SetAll(fraction) => Outcome::Applied(controller.set_all_brightness(fraction).await),
        Action::SetMonitor { monitor, fraction } => {
            Outcome::Applied(vec![controller.set_monitor(&monitor, fraction).await])
        }
        Action::SelectMonitor(monitor) => {
            if controller.is_known(&monitor) {
                let fraction = controller.get_brightness(&monitor);
                Outcome::Brightness { monitor, fraction }
            } else {
                Outcome::Rejected(format!("unknown monitor '{}'", monitor))
            }
        }
        Action::ListMonitors => Outcome::Monitors(controller.list_monitors().to_vec()),
        Action::Refresh => Outcome::Monitors(controller.refresh().await.to_vec()),
        Action::Info { json } => {
            let cfg = controller.config();
            let monitors = controller.list_monitors();
            let settings = controller.settings();
            if json {
                match serde_json::to_string(&cfg.json_summary(monitors, settings)) {
                    Ok(text) => Outcome::Info(text),
                    Err(e) => Outcome::Rejected(format!("failed to encode info: {}", e)),
                }
            } else {
                Outcome::Info(cfg.pretty_print(monitors, settings))
            }
        }
        Action::Quit => Outcome::Quit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controller::tests::{FakeBackend, TWO_MONITORS, test_config};

    #[tokio::test]
    async fn preset_applies_to_every_monitor_and_persists() {
        let cfg = test_config("preset");
        let mut ctl = Controller::new(FakeBackend::with_outputs("DP-1 connected 1920x1080+0+0\nHDMI-1 disconnected\n"), cfg.clone());
        ctl.refresh().await;

        let outcome = dispatch(&mut ctl, Action::SetPreset(Preset(75))).await;
        assert_eq!(outcome.render(), "DP-1: 75%");

        let raw = std::fs::read_to_string(&cfg.settings_file).unwrap();
        let saved: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved, serde_json::json!({"DP-1": 0.75}));
    }

    #[tokio::test]
    async fn unknown_preset_is_rejected_without_touching_monitors() {
        let backend = FakeBackend::with_outputs(TWO_MONITORS);
        let mut ctl = Controller::new(backend.clone(), test_config("bad-preset"));
        ctl.refresh().await;

        let outcome = dispatch(&mut ctl, Action::SetPreset(Preset(60))).await;
        assert!(outcome.is_failure());
        assert!(outcome.render().starts_with("error: 60% is not a preset"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn set_monitor_saves_immediately() {
        let cfg = test_config("set-monitor");
        let mut ctl = Controller::new(FakeBackend::with_outputs(TWO_MONITORS), cfg.clone());
        ctl.refresh().await;

        let outcome = dispatch(
            &mut ctl,
            Action::SetMonitor { monitor: "HDMI-1".to_string(), fraction: 0.05 },
        )
        .await;
        assert_eq!(outcome.render(), "HDMI-1: 10%");

        let raw = std::fs::read_to_string(&cfg.settings_file).unwrap();
        let saved: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved["HDMI-1"], 0.1);
    }

    #[tokio::test]
    async fn failed_set_monitor_reports_failure() {
        let backend = FakeBackend::with_outputs(TWO_MONITORS).failing_on("DP-1");
        let mut ctl = Controller::new(backend, test_config("set-fail"));
        ctl.refresh().await;

        let outcome = dispatch(&mut ctl, Action::SetMonitor { monitor: "DP-1".to_string(), fraction: 0.5 }).await;
        assert!(outcome.is_failure());
        assert!(outcome.render().starts_with("DP-1: failed"));
    }

    #[tokio::test]
    async fn select_monitor_reports_current_value() {
        let mut ctl = Controller::new(FakeBackend::with_outputs(TWO_MONITORS), test_config("select"));
        ctl.refresh().await;
        ctl.set_brightness("DP-1", 0.25).await.unwrap();

        assert_eq!(
            dispatch(&mut ctl, Action::SelectMonitor("DP-1".to_string())).await,
            Outcome::Brightness { monitor: "DP-1".to_string(), fraction: 0.25 }
        );
        assert!(dispatch(&mut ctl, Action::SelectMonitor("VGA-9".to_string())).await.is_failure());
    }

    #[tokio::test]
    async fn refresh_and_list_report_monitors() {
        let mut ctl = Controller::new(FakeBackend::with_outputs(TWO_MONITORS), test_config("list"));
        assert_eq!(dispatch(&mut ctl, Action::ListMonitors).await.render(), "No monitors detected");
        assert_eq!(dispatch(&mut ctl, Action::Refresh).await.render(), "DP-1\nHDMI-1");
        assert_eq!(
            dispatch(&mut ctl, Action::ListMonitors).await,
            Outcome::Monitors(vec!["DP-1".to_string(), "HDMI-1".to_string()])
        );
    }

    #[tokio::test]
    async fn partial_batch_failure_is_not_a_total_failure() {
        let backend = FakeBackend::with_outputs(TWO_MONITORS).failing_on("DP-1");
        let mut ctl = Controller::new(backend, test_config("partial"));
        ctl.refresh().await;

        let outcome = dispatch(&mut ctl, Action::SetAll(0.6)).await;
        assert!(!outcome.is_failure());
        assert!(outcome.render().contains("HDMI-1: 60%"));
    }

    #[tokio::test]
    async fn quit_leaves_saving_to_the_shutdown_hook() {
        let cfg = test_config("quit-action");
        let mut ctl = Controller::new(FakeBackend::with_outputs(TWO_MONITORS), cfg.clone());
        assert_eq!(dispatch(&mut ctl, Action::Quit).await, Outcome::Quit);
        assert!(!cfg.settings_file.exists());
    }
}
