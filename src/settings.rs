use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_openfinance_url")]
    pub openfinance_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_statement_bytes")]
    pub max_statement_bytes: u64,
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: i64,
}

fn default_openfinance_url() -> String {
    "https://api.openfinance.br/open-banking/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_statement_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_lookback_days() -> i64 {
    90
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            openfinance_url: default_openfinance_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_statement_bytes: default_max_statement_bytes(),
            default_lookback_days: default_lookback_days(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ledgerbot")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("ledgerbot")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| LedgerError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join("ledger.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            openfinance_url: "http://localhost:9099/v1".to_string(),
            request_timeout_secs: 5,
            max_statement_bytes: 1024,
            default_lookback_days: 30,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.request_timeout_secs, 5);
        assert_eq!(loaded.default_lookback_days, 30);
    }

    #[test]
    fn test_missing_fields_merge_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.data_dir, "/tmp/test");
        assert_eq!(s.request_timeout_secs, 30);
        assert_eq!(s.max_statement_bytes, 10 * 1024 * 1024);
        assert!(s.openfinance_url.starts_with("https://"));
    }

    #[test]
    fn test_defaults_are_sane() {
        let s = Settings::default();
        assert!(!s.data_dir.is_empty());
        assert_eq!(s.default_lookback_days, 90);
    }
}
