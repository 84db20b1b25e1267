//! On-disk configuration store.
//!
//! The store never refuses to produce a config: a missing file is created
//! from defaults, a broken file is moved aside to `config.json.bak` and
//! replaced with defaults, and repaired values are written back.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use barline_core::config::Config;
use barline_core::region::CaptureRegion;
use serde_json::Value;
use tracing::debug;

use crate::runner::paths;

/// A loaded config plus notes about anything that had to be fixed.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    pub notes: Vec<String>,
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the resolved default location (see [`paths`]).
    pub fn default_location() -> Self {
        Self::new(paths::get_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.sibling(".bak")
    }

    /// Load, repair and (when anything changed) persist the config.
    pub fn load(&self) -> Result<Loaded> {
        if !self.path.exists() {
            let config = Config::default();
            self.save(&config)?;
            return Ok(Loaded {
                config,
                notes: vec![format!("created default config at {}", self.path.display())],
            });
        }

        let parsed = fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()))
            .and_then(|value| {
                let on_disk = value.clone();
                Config::from_json(value)
                    .map(|(config, notes)| (on_disk, config, notes))
                    .ok_or_else(|| "root must be a JSON object".to_string())
            });

        let (on_disk, config, notes) = match parsed {
            Ok(parsed) => parsed,
            Err(reason) => return self.recreate(&reason),
        };

        let normalized = serde_json::to_value(&config).context("Failed to serialize config")?;
        if normalized != on_disk {
            debug!("Persisting normalized config to {}", self.path.display());
            self.save(&config)?;
        }

        Ok(Loaded { config, notes })
    }

    /// Back up an unusable file and start over from defaults.
    fn recreate(&self, reason: &str) -> Result<Loaded> {
        let backup = self.backup_path();
        let mut notes = vec![format!(
            "config at {} is unreadable ({}), replacing it with defaults",
            self.path.display(),
            reason
        )];

        if backup.exists() {
            let _ = fs::remove_file(&backup);
        }
        match fs::rename(&self.path, &backup) {
            Ok(()) => notes.push(format!("previous config saved to {}", backup.display())),
            Err(e) => notes.push(format!("could not back up previous config: {}", e)),
        }

        let config = Config::default();
        self.save(&config)?;
        Ok(Loaded { config, notes })
    }

    /// Write via a temp file and rename so readers never see a partial file.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        let mut text = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        text.push('\n');

        let tmp = self.sibling(".tmp");
        fs::write(&tmp, text).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Persist a new capture region.
    pub fn set_region(&self, region: CaptureRegion) -> Result<Loaded> {
        let Loaded { mut config, notes } = self.load()?;
        config.capture.region = Some(region);
        let (config, more) = config.sanitize();
        self.save(&config)?;
        Ok(Loaded {
            config,
            notes: notes.into_iter().chain(more).collect(),
        })
    }
}
