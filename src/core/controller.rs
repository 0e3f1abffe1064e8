use std::collections::HashSet;

use eyre::Result;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::config::DimmerConfig;
use crate::core::brightness::{BrightnessSettings, DEFAULT_BRIGHTNESS, clamp_brightness, format_percent};
use crate::services::settings::SettingsStore;
use crate::services::xrandr::{DisplayBackend, detect_monitors};

/// Result of applying brightness to one monitor: the value actually applied,
/// or why the tool refused.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResult {
    pub monitor: String,
    pub result: Result<f64, String>,
}

impl ApplyResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Owns the monitor list, the brightness map and the settings file.
/// Every brightness change goes through here.
pub struct Controller<B: DisplayBackend> {
    backend: B,
    store: SettingsStore,
    cfg: DimmerConfig,
    monitors: Vec<String>,
    settings: BrightnessSettings,
    /// Monitors whose entry is only the first-sight default, never loaded or applied
    defaulted: HashSet<String>,
}

impl<B: DisplayBackend> Controller<B> {
    pub fn new(backend: B, cfg: DimmerConfig) -> Self {
        let store = SettingsStore::new(cfg.settings_file.clone());
        Self {
            backend,
            store,
            cfg,
            monitors: Vec::new(),
            settings: BrightnessSettings::new(),
            defaulted: HashSet::new(),
        }
    }

    pub fn config(&self) -> &DimmerConfig {
        &self.cfg
    }

    pub fn list_monitors(&self) -> &[String] {
        &self.monitors
    }

    pub fn settings(&self) -> &BrightnessSettings {
        &self.settings
    }

    pub fn is_known(&self, monitor: &str) -> bool {
        self.monitors.iter().any(|m| m == monitor) || self.settings.contains_key(monitor)
    }

    /// Stored fraction, or full brightness for a monitor never adjusted.
    pub fn get_brightness(&self, monitor: &str) -> f64 {
        self.settings.get(monitor).copied().unwrap_or(DEFAULT_BRIGHTNESS)
    }

    /// Replace the in-memory map with the settings file. Values are kept as
    /// stored, clamping only happens when they are applied.
    pub fn load_settings(&mut self) {
        self.settings = self.store.load();
        self.defaulted.clear();
    }

    pub fn save_count(&self) -> usize {
        self.store.save_count()
    }

    pub fn save_settings(&self) -> Result<()> {
        self.store.save(&self.settings)
    }

    /// Save, logging instead of failing. The in-memory map stays authoritative.
    fn persist(&self) -> bool {
        match self.save_settings() {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save settings to {}: {}", self.store.path().display(), e);
                false
            }
        }
    }

    /// Re-detect monitors. The list is replaced on success; on failure (tool
    /// missing, non-zero exit, timeout) the error is logged and the previous
    /// list is kept, which is empty on first use.
    pub async fn refresh(&mut self) -> &[String] {
        match detect_monitors(&self.backend).await {
            Ok(monitors) => {
                for monitor in &monitors {
                    if !self.settings.contains_key(monitor) {
                        self.settings.insert(monitor.clone(), DEFAULT_BRIGHTNESS);
                        self.defaulted.insert(monitor.clone());
                    }
                }
                info!("Detected monitors: [{}]", monitors.join(", "));
                self.monitors = monitors;
            }
            Err(e) => {
                error!("Monitor detection failed, keeping previous list: {}", e);
            }
        }
        &self.monitors
    }

    /// Apply `fraction` (clamped to the minimum) to one monitor. State only
    /// changes when the tool succeeds. Does not save.
    pub async fn set_brightness(&mut self, monitor: &str, fraction: f64) -> Result<f64> {
        let value = clamp_brightness(fraction, self.cfg.min_brightness);
        if value != fraction {
            warn!("Requested brightness {} for {} raised to minimum {}", fraction, monitor, value);
        }

        if let Err(e) = self.backend.set_brightness(monitor, value).await {
            error!("Failed to set brightness of {} to {}: {}", monitor, value, e);
            return Err(e);
        }

        self.settings.insert(monitor.to_string(), value);
        self.defaulted.remove(monitor);
        info!("Brightness of {} set to {}", monitor, format_percent(value));
        Ok(value)
    }

    /// Apply one monitor and save.
    pub async fn set_monitor(&mut self, monitor: &str, fraction: f64) -> ApplyResult {
        let result = self.set_brightness(monitor, fraction).await.map_err(|e| e.to_string());
        if result.is_ok() {
            self.persist();
        }
        ApplyResult { monitor: monitor.to_string(), result }
    }

    /// Apply `fraction` to every current monitor independently. The tool
    /// runs for all monitors at once; the settings file is written once
    /// after the whole batch.
    pub async fn set_all_brightness(&mut self, fraction: f64) -> Vec<ApplyResult> {
        let value = clamp_brightness(fraction, self.cfg.min_brightness);
        let targets: Vec<(String, f64)> = self.monitors.iter().map(|m| (m.clone(), value)).collect();
        let results = self.apply_batch(targets).await;
        self.persist();
        results
    }

    /// Push saved brightness to every detected monitor that has one.
    /// Monitors that only carry the first-sight default are left alone.
    /// Saved values below the minimum are clamped like any request.
    pub async fn restore(&mut self) -> Vec<ApplyResult> {
        let min = self.cfg.min_brightness;
        let targets: Vec<(String, f64)> = self
            .monitors
            .iter()
            .filter(|m| !self.defaulted.contains(*m))
            .filter_map(|m| self.settings.get(m).map(|v| (m.clone(), clamp_brightness(*v, min))))
            .collect();

        if targets.is_empty() {
            return Vec::new();
        }

        info!("Restoring saved brightness for {} monitor(s)", targets.len());
        let results = self.apply_batch(targets).await;
        self.persist();
        results
    }

    async fn apply_batch(&mut self, targets: Vec<(String, f64)>) -> Vec<ApplyResult> {
        let backend = &self.backend;
        let outcomes = join_all(targets.iter().map(|(monitor, value)| async move {
            backend.set_brightness(monitor, *value).await
        }))
        .await;

        let mut results = Vec::with_capacity(targets.len());
        for ((monitor, value), outcome) in targets.into_iter().zip(outcomes) {
            let result = match outcome {
                Ok(()) => {
                    self.settings.insert(monitor.clone(), value);
                    self.defaulted.remove(&monitor);
                    info!("Brightness of {} set to {}", monitor, format_percent(value));
                    Ok(value)
                }
                Err(e) => {
                    error!("Failed to set brightness of {} to {}: {}", monitor, value, e);
                    Err(e.to_string())
                }
            };
            results.push(ApplyResult { monitor, result });
        }
        results
    }

    /// Shutdown hook: persist settings before the process goes away.
    pub fn quit(&self) {
        if self.persist() {
            info!("Settings saved to {}", self.store.path().display());
        }
    }
}
