use crate::statistics::{DEFAULT_ID_COLUMN, DEFAULT_TIME_COLUMN};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

const DEFAULT_TOP_N: usize = 15;

fn settings_path() -> Option<PathBuf> {
    let path = env::var("ENSEMBLE_STATS_CONFIG_PATH").ok()?;
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsOverrides {
    #[serde(default)]
    time_column: Option<String>,
    #[serde(default)]
    id_column: Option<String>,
    #[serde(default)]
    top_n: Option<usize>,
}

fn load_settings_overrides() -> Option<SettingsOverrides> {
    let path = settings_path()?;
    if !path.exists() {
        tracing::warn!(path = %path.display(), "settings file does not exist; using env defaults");
        return None;
    }
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read settings file; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse settings file; using env defaults"
            );
            None
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Column roles and presentation defaults shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub time_column: String,
    pub id_column: String,
    /// Rows kept in ranked correlation output.
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl AnalysisConfig {
    /// Environment first, then the JSON settings file for anything the environment leaves unset.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        let time_column = env_value("ENSEMBLE_STATS_TIME_COLUMN");
        let id_column = env_value("ENSEMBLE_STATS_ID_COLUMN");
        let top_n = env_value("ENSEMBLE_STATS_TOP_N")
            .map(|raw| {
                raw.parse::<usize>().with_context(|| {
                    format!("ENSEMBLE_STATS_TOP_N must be an integer, got `{raw}`")
                })
            })
            .transpose()?;

        if let Some(overrides) = load_settings_overrides() {
            config.apply_overrides(&overrides);
        }
        if let Some(time_column) = time_column {
            config.time_column = time_column;
        }
        if let Some(id_column) = id_column {
            config.id_column = id_column;
        }
        if let Some(top_n) = top_n {
            config.top_n = top_n;
        }
        Ok(config)
    }

    fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(time_column) = overrides
            .time_column
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            self.time_column = time_column.to_string();
        }
        if let Some(id_column) = overrides
            .id_column
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            self.id_column = id_column.to_string();
        }
        if let Some(top_n) = overrides.top_n.filter(|v| *v != 0) {
            self.top_n = top_n;
        }
    }
}
