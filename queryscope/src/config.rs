// queryscope/src/config.rs
//
// Tunables consumed by the analysis core. Every section defaults, so a config
// file only needs the keys it overrides. Values are trusted: nothing here is
// range-checked, and a degenerate threshold simply produces the literal
// comparison result.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_SESSION_THRESHOLD_SECS: f64 = 30.0 * 60.0;
pub const SYSTEM_USER: &str = "splunk-system-user";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub session: SessionConfig,
    pub classifier: ClassifierConfig,
    pub entropy: EntropyConfig,
    pub timing: TimingConfig,
    /// Account names classified as system/service users.
    pub system_accounts: Vec<String>,
    /// Cap on groups built from a source and on verdicts printed by groups
    /// mode; `None` means no cap.
    pub group_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A gap strictly greater than this starts a new session.
    pub inactivity_threshold_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { inactivity_threshold_secs: DEFAULT_SESSION_THRESHOLD_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub consistency_max: f64,
    pub clockness_max: f64,
    pub distinct_users_max: usize,
    /// Per-user occurrences a text needs before its timing is judged.
    pub min_occurrences: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { consistency_max: 0.9, clockness_max: 0.9, distinct_users_max: 3, min_occurrences: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    pub buckets: usize,
    /// Histogram covers [0, range_secs).
    pub range_secs: f64,
    pub epsilon: f64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self { buckets: 10_000, range_secs: 1_000_000.0, epsilon: 1e-4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Tick length that "clockness" measures alignment against.
    pub clock_period_secs: f64,
    /// Half-width of the band around the mean counted as consistent.
    pub consistency_band: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self { clock_period_secs: 30.0, consistency_band: 0.1 }
    }
}

impl AnalysisConfig {
    /// Defaults plus the built-in system account list.
    pub fn standard() -> Self {
        Self { system_accounts: vec![SYSTEM_USER.to_string()], ..Self::default() }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let mut cfg: Self =
            serde_json::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if cfg.system_accounts.is_empty() {
            cfg.system_accounts.push(SYSTEM_USER.to_string());
        }
        Ok(cfg)
    }

    pub fn with_session_threshold(mut self, secs: f64) -> Self {
        self.session.inactivity_threshold_secs = secs;
        self
    }
}
