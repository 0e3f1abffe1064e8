use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use eyre::Result;
use tracing::{debug, error, info};

use crate::core::brightness::BrightnessSettings;

/// JSON file of `{ "<output>": <fraction> }`, rewritten whole on every save.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    saves: AtomicUsize,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), saves: AtomicUsize::new(0) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Completed saves since this store was created.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    /// Missing, unreadable or malformed files all load as empty settings.
    pub fn load(&self) -> BrightnessSettings {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings file at {}, starting empty", self.path.display());
                return BrightnessSettings::new();
            }
            Err(e) => {
                error!("Failed to read settings from {}: {}", self.path.display(), e);
                return BrightnessSettings::new();
            }
        };

        match serde_json::from_str::<BrightnessSettings>(&content) {
            Ok(settings) => {
                info!("Loaded brightness for {} monitor(s) from {}", settings.len(), self.path.display());
                settings
            }
            Err(e) => {
                error!("Settings file {} is not valid JSON: {}", self.path.display(), e);
                BrightnessSettings::new()
            }
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    pub fn save(&self, settings: &BrightnessSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        let n = self.saves.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Saved brightness for {} monitor(s) to {} (save #{})", settings.len(), self.path.display(), n);
        Ok(())
    }
}
