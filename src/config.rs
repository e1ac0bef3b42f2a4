//! Configuration loading for taskbot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable that overrides the configured bot token.
pub const TOKEN_ENV: &str = "TASKBOT_BOT_TOKEN";

/// Get the taskbot home directory (~/.taskbot).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".taskbot"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.taskbot/settings.json
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

/// Load settings from an explicit path.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}. Run 'taskbot setup' first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if not found.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

/// Write settings to ~/.taskbot/settings.json
pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    let path = get_settings_path()?;
    save_settings_to(settings, &path)?;
    Ok(path)
}

/// Write settings to an explicit path, creating parent directories.
pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    tracing::info!("Saved settings to {}", path.display());
    Ok(())
}

/// Top-level settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    /// Telegram bot credential.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// SQLite database file. Defaults to ~/.taskbot/taskbot.db
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl Settings {
    /// Bot token, preferring the environment over the settings file.
    pub fn resolve_token(&self) -> Result<String> {
        let from_env = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        from_env
            .or_else(|| self.bot_token.clone().filter(|t| !t.trim().is_empty()))
            .ok_or_else(|| {
                Error::Config(format!(
                    "No bot token configured. Run 'taskbot setup --token <TOKEN>' or set {}",
                    TOKEN_ENV
                ))
            })
    }

    /// Database path, falling back to the home directory default.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_home_dir()?.join("taskbot.db")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_roundtrip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            bot_token: Some("123:abc".to_string()),
            db_path: Some(dir.path().join("tasks.db")),
        };
        save_settings_to(&settings, &path).unwrap();

        let loaded = load_settings_from(&path).unwrap();
        assert_eq!(loaded.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(loaded.resolve_db_path().unwrap(), dir.path().join("tasks.db"));
    }

    #[test]
    fn test_missing_settings_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = load_settings_from(&dir.path().join("settings.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_partial_settings_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{}").unwrap();

        let loaded = load_settings_from(&path).unwrap();
        assert!(loaded.bot_token.is_none());
        assert!(loaded.db_path.is_none());
    }
}
