use std::{fs, net::SocketAddr, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

/// Age-based deletion rule applied uniformly to session directories and
/// event rows. Read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub max_age_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_age_days: 30 }
    }
}

/// Runtime configuration with tunable detection thresholds.
///
/// Loaded from a JSON file; missing fields fall back to the defaults
/// below, so a partial config file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    /// Root directory for session media (one subdirectory per session).
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,

    /// Period of the producer loop. 200 ms gives the ~5 Hz tick rate.
    pub tick_interval_ms: u64,

    /// Ticks of suppression after a trigger. One physical pothole spans
    /// several frames; this collapses them into a single event.
    pub cooldown_ticks: u32,

    /// Minimum model confidence for a detection to count as a trigger.
    /// The prototype this replaces accepted any positive confidence;
    /// that was too permissive, so the floor is explicit here.
    pub confidence_threshold: f64,

    /// Detection class watched by the pothole channel.
    pub monitored_label: String,

    /// G-force at or above which a tick counts as an impact.
    pub impact_threshold_g: f64,

    /// Samples kept in the live g-force trend ring.
    pub g_force_history_len: usize,

    pub retention: RetentionPolicy,
    pub retention_interval_hours: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            db_path: PathBuf::from("sentinel.sqlite3"),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            tick_interval_ms: 200,
            cooldown_ticks: 15,
            confidence_threshold: 0.25,
            monitored_label: "Pothole".to_string(),
            impact_threshold_g: 2.0,
            g_force_history_len: 60,
            retention: RetentionPolicy::default(),
            retention_interval_hours: 24,
        }
    }
}

impl ScanConfig {
    /// Reads the config file if present; a missing file means defaults.
    /// An unreadable or malformed file is an error rather than a silent
    /// fallback, since thresholds and the retention window live here.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Rejects values the runtime cannot operate with, so a bad file
    /// fails at load instead of somewhere inside the scan loop.
    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tickIntervalMs must be at least 1");
        }
        if self.g_force_history_len == 0 {
            bail!("gForceHistoryLen must be at least 1");
        }
        Ok(())
    }
}
