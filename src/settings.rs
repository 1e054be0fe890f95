use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{KwachaError, Result};
use crate::fees::FeeConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Account-ending digits (e.g. "4321") to ledger account name.
    #[serde(default)]
    pub account_endings: HashMap<String, String>,
    /// Sender identifier to ledger account name, matched case-insensitively.
    #[serde(default = "default_sender_accounts")]
    pub sender_accounts: HashMap<String, String>,
    /// Catch-all account for messages no mapping covers.
    #[serde(default = "default_fallback_account")]
    pub fallback_account: String,
    #[serde(default = "default_directory_ttl_minutes")]
    pub directory_ttl_minutes: i64,
    /// Sliding window within which a follow-up can match a primary.
    #[serde(default = "default_correlation_window_minutes")]
    pub correlation_window_minutes: i64,
    /// Correlation rows older than this are swept regardless of state.
    #[serde(default = "default_correlation_retention_minutes")]
    pub correlation_retention_minutes: i64,
    #[serde(default = "FeeConfig::zambian_defaults")]
    pub fees: FeeConfig,
}

fn default_sender_accounts() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("AirtelMoney".to_string(), "Airtel Money".to_string());
    map.insert("MTNMoney".to_string(), "MTN Money".to_string());
    map.insert("Zamtel".to_string(), "Zamtel Kwacha".to_string());
    map.insert("Zanaco".to_string(), "Zanaco Current".to_string());
    map.insert("Absa".to_string(), "Absa Current".to_string());
    map.insert("FNB".to_string(), "FNB Current".to_string());
    map
}

fn default_fallback_account() -> String {
    "SMS Inbox".to_string()
}

fn default_directory_ttl_minutes() -> i64 {
    5
}

fn default_correlation_window_minutes() -> i64 {
    5
}

fn default_correlation_retention_minutes() -> i64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            account_endings: HashMap::new(),
            sender_accounts: default_sender_accounts(),
            fallback_account: default_fallback_account(),
            directory_ttl_minutes: default_directory_ttl_minutes(),
            correlation_window_minutes: default_correlation_window_minutes(),
            correlation_retention_minutes: default_correlation_retention_minutes(),
            fees: FeeConfig::zambian_defaults(),
        }
    }
}

impl Settings {
    /// Case-insensitive lookup in the sender-to-account table.
    pub fn account_for_sender(&self, sender: &str) -> Option<&str> {
        self.sender_accounts
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(sender))
            .map(|(_, name)| name.as_str())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("kwacha")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
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
        .map_err(|e| KwachaError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn default_db_path() -> PathBuf {
    config_dir().join("kwacha.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings
            .account_endings
            .insert("4321".to_string(), "Zanaco Current".to_string());
        settings.fallback_account = "Catch All".to_string();
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(
            loaded.account_endings.get("4321").map(String::as_str),
            Some("Zanaco Current")
        );
        assert_eq!(loaded.fallback_account, "Catch All");
    }

    #[test]
    fn test_partial_settings_merge_with_defaults() {
        let json = r#"{"fallback_account": "Elsewhere"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.fallback_account, "Elsewhere");
        assert_eq!(s.directory_ttl_minutes, 5);
        assert_eq!(s.correlation_retention_minutes, 60);
        assert!(!s.sender_accounts.is_empty());
    }

    #[test]
    fn test_account_for_sender_is_case_insensitive() {
        let s = Settings::default();
        assert_eq!(s.account_for_sender("airtelmoney"), Some("Airtel Money"));
        assert_eq!(s.account_for_sender("AIRTELMONEY"), Some("Airtel Money"));
        assert_eq!(s.account_for_sender("Betway"), None);
    }
}
