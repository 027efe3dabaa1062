//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::models::Location;

/// Environment variable that overrides the saved server address
pub const SERVER_ENV: &str = "SIGNAGE_PANEL_SERVER";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_locations")]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub last_location: String,
    #[serde(default = "default_image_duration")]
    pub default_image_duration: u32,
    #[serde(default = "default_system_poll")]
    pub system_poll_secs: u64,
    #[serde(default = "default_true")]
    pub dark_mode: bool,
    #[serde(default = "default_true")]
    pub push_enabled: bool,
}

fn default_server_url() -> String { "http://127.0.0.1:5000".to_string() }
fn default_image_duration() -> u32 { 7 }
fn default_system_poll() -> u64 { 10 }
fn default_true() -> bool { true }

fn default_locations() -> Vec<Location> {
    vec![
        Location::new("belediye", "Belediye Binası LED Ekran"),
        Location::new("havuzbasi", "Havuzbaşı Kent Meydanı LED Ekran"),
        Location::new("yenisehir", "Yenişehir LED Ekran"),
        Location::new("gurcukapi", "Gürcükapı LED Ekran"),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            locations: default_locations(),
            last_location: String::new(),
            default_image_duration: 7,
            system_poll_secs: 10,
            dark_mode: true,
            push_enabled: true,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("signage_panel");
        fs::create_dir_all(&path).ok();
        path.push("config.json");
        path
    }

    pub fn load() -> Self {
        let path = Self::config_path();

        let mut config = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => Self::from_json(&content).unwrap_or_else(|e| {
                    log::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Could not read config {}: {}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        if let Ok(server) = std::env::var(SERVER_ENV) {
            if !server.trim().is_empty() {
                config.server_url = server;
            }
        }
        config.normalize();
        config
    }

    pub fn save(&self) {
        let path = Self::config_path();
        match serde_json::to_string_pretty(self) {
            Ok(content) => {
                if let Err(e) = fs::write(&path, content) {
                    log::error!("Failed to save config {}: {}", path.display(), e);
                }
            }
            Err(e) => log::error!("Failed to serialize config: {}", e),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(content)?;
        config.normalize();
        Ok(config)
    }

    /// Repair values a hand-edited config file may have broken
    pub fn normalize(&mut self) {
        let trimmed = self.server_url.trim().trim_end_matches('/').to_string();
        self.server_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed
        } else {
            format!("http://{}", trimmed)
        };

        self.locations.retain(|l| !l.key.trim().is_empty());
        if self.locations.is_empty() {
            self.locations = default_locations();
        }
        self.default_image_duration = self.default_image_duration.clamp(1, 120);
        self.system_poll_secs = self.system_poll_secs.max(2);
    }

    /// Location shown at startup: the last one used if it still exists
    pub fn initial_location(&self) -> String {
        if self.locations.iter().any(|l| l.key == self.last_location) {
            self.last_location.clone()
        } else {
            self.locations.first().map(|l| l.key.clone()).unwrap_or_default()
        }
    }

    pub fn location_title(&self, key: &str) -> String {
        self.locations
            .iter()
            .find(|l| l.key == key)
            .map(|l| l.title.clone())
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = AppConfig::from_json(r#"{"server_url": "192.168.251.174:5000/"}"#).unwrap();
        assert_eq!(config.server_url, "http://192.168.251.174:5000");
        assert_eq!(config.locations.len(), 4);
        assert_eq!(config.default_image_duration, 7);
        assert_eq!(config.system_poll_secs, 10);
        assert!(config.push_enabled);
    }

    #[test]
    fn test_initial_location_falls_back_to_first() {
        let mut config = AppConfig::default();
        assert_eq!(config.initial_location(), "belediye");

        config.last_location = "yenisehir".to_string();
        assert_eq!(config.initial_location(), "yenisehir");

        config.last_location = "removed".to_string();
        assert_eq!(config.initial_location(), "belediye");
    }

    #[test]
    fn test_normalize_clamps_values() {
        let config = AppConfig::from_json(
            r#"{"locations": [], "default_image_duration": 500, "system_poll_secs": 0}"#,
        ).unwrap();
        assert_eq!(config.locations.len(), 4);
        assert_eq!(config.default_image_duration, 120);
        assert_eq!(config.system_poll_secs, 2);
    }

    #[test]
    fn test_location_title() {
        let config = AppConfig::default();
        assert_eq!(config.location_title("gurcukapi"), "Gürcükapı LED Ekran");
        assert_eq!(config.location_title("lobby"), "lobby");
    }
}
