use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use crate::types::UserId;
use crate::utils::{self, NumberFormatOptions};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UserConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Empty means the platform data directory.
    #[serde(default)]
    pub db_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub timezone: String,
    pub locale: String,
    pub number_comma: bool,
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        let id = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "local".to_string());
        Self {
            id,
            name: String::new(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: utils::get_local_timezone(),
            locale: default_locale(),
            number_comma: false,
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".trainmap.toml"))
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(Some(config))
    }

    /// Load the config file, falling back to defaults when it is missing or broken.
    pub fn load_or_default() -> Config {
        match Self::load() {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                utils::warn_once(format!("⚠️  {e:#}; using default configuration"));
                Config::default()
            }
        }
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("✅ Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }

    pub fn user_id(&self) -> Result<UserId> {
        let id = self.user.id.trim();
        if id.is_empty() {
            anyhow::bail!("No user configured. Run `trainmap config set user-id <ID>`");
        }
        Ok(UserId::new(id))
    }

    pub fn timezone(&self) -> Tz {
        utils::resolve_timezone(&self.display.timezone)
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        if !self.store.db_path.trim().is_empty() {
            return Ok(PathBuf::from(self.store.db_path.trim()));
        }

        Ok(dirs::data_dir()
            .context("Could not find data directory")?
            .join("trainmap")
            .join("trainmap.db"))
    }

    pub fn format_options(&self) -> NumberFormatOptions {
        NumberFormatOptions {
            use_comma: self.display.number_comma,
            locale: self.display.locale.clone(),
        }
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !std::fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("📝 Created default configuration file.");
        println!("📍 Training as user '{}'. Change it with:", config.user.id);
        println!("   trainmap config set user-id ...");
        println!("or");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            println!("🔧 Current configuration:");
            println!("   User ID: {}", config.user.id);
            println!(
                "   User Name: {}",
                if config.user.name.is_empty() {
                    "Not set"
                } else {
                    config.user.name.as_str()
                }
            );
            println!("   Database: {}", config.db_path()?.display());
            println!("   Timezone: {}", config.display.timezone);
            println!("   Locale: {}", config.display.locale);
            println!("   Number Comma: {}", config.display.number_comma);
        }
        None => {
            println!("❌ No configuration file found.");
            println!("   Run 'trainmap config init' to create one.");
        }
    }
    Ok(())
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "user-id" => {
            if value.trim().is_empty() {
                anyhow::bail!("User ID cannot be empty");
            }
            config.user.id = value.trim().to_string();
        }
        "user-name" => config.user.name = value.to_string(),
        "db-path" => config.store.db_path = value.to_string(),
        "timezone" => {
            value
                .parse::<Tz>()
                .map_err(|_| anyhow::anyhow!("Unknown timezone: {value}"))?;
            config.display.timezone = value.to_string();
        }
        "locale" => {
            config.display.locale = value.to_string();
        }
        "number-comma" => {
            let enabled = value
                .parse::<bool>()
                .context("Invalid boolean value. Use 'true' or 'false'")?;
            config.display.number_comma = enabled;
        }
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.save(false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_config() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let config_path = dir.path().join(".trainmap.toml");
        set_test_config_path(config_path.clone());
        (dir, config_path)
    }

    #[test]
    fn default_config_round_trip() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        let loaded = Config::load()
            .expect("load config")
            .expect("config should exist");

        assert!(!loaded.user.id.is_empty());
        assert_eq!(loaded.store.db_path, "");
        assert_eq!(loaded.display.locale, "en");
        assert!(!loaded.display.number_comma);
    }

    #[test]
    fn set_config_value_behaviour() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        set_config_value("user-id", "runner-42").expect("set user-id");
        set_config_value("user-name", "Jane").expect("set user-name");
        set_config_value("db-path", "/tmp/trainmap-test.db").expect("set db-path");
        set_config_value("timezone", "Asia/Tokyo").expect("set timezone");
        set_config_value("locale", "de").expect("set locale");
        set_config_value("number-comma", "true").expect("set number-comma");

        let cfg = Config::load()
            .expect("load config")
            .expect("config should exist");

        assert_eq!(cfg.user_id().expect("user id"), UserId::new("runner-42"));
        assert_eq!(cfg.user.name, "Jane");
        assert_eq!(
            cfg.db_path().expect("db path"),
            PathBuf::from("/tmp/trainmap-test.db")
        );
        assert_eq!(cfg.timezone(), chrono_tz::Asia::Tokyo);
        assert_eq!(cfg.display.locale, "de");
        assert!(cfg.format_options().use_comma);

        let err = set_config_value("unknown-key", "value").unwrap_err();
        let msg = format!("{err}");
        assert!(
            msg.contains("Unknown config key"),
            "unexpected error message: {msg}"
        );
        let err = set_config_value("number-comma", "not-a-bool").unwrap_err();
        assert!(format!("{err}").contains("Invalid boolean value"));
        let err = set_config_value("timezone", "Mars/Olympus").unwrap_err();
        assert!(format!("{err}").contains("Unknown timezone"));
        assert!(set_config_value("user-id", "  ").is_err());
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let (_dir, path) = setup_test_config();
        fs::write(&path, "[user]\nid = \"solo\"\n").expect("write");

        let cfg = Config::load().expect("load").expect("some");
        assert_eq!(cfg.user.id, "solo");
        assert_eq!(cfg.display.locale, "en");
        assert!(cfg.store.db_path.is_empty());
    }

    #[test]
    fn partial_display_section_keeps_configured_user() {
        let (_dir, path) = setup_test_config();
        fs::write(&path, "[user]\nid = \"solo\"\n\n[display]\nlocale = \"de\"\n")
            .expect("write");

        let cfg = Config::load().expect("load").expect("some");
        assert_eq!(cfg.user.id, "solo");
        assert_eq!(cfg.display.locale, "de");
        assert!(!cfg.display.timezone.is_empty());
        assert!(!cfg.display.number_comma);

        assert_eq!(Config::load_or_default().user.id, "solo");
    }

    #[test]
    fn user_section_without_id_uses_default_id() {
        let (_dir, path) = setup_test_config();
        fs::write(&path, "[user]\nname = \"Jane\"\n").expect("write");

        let cfg = Config::load().expect("load").expect("some");
        assert_eq!(cfg.user.name, "Jane");
        assert_eq!(cfg.user.id, UserConfig::default().id);
    }

    #[test]
    fn empty_user_id_is_an_error() {
        let mut cfg = Config::default();
        cfg.user.id = String::new();
        assert!(cfg.user_id().is_err());
    }
}
