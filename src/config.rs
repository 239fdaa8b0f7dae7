use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "rtmhabit", "rtmhabit")
}

pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("RTMHABIT_CONFIG") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.config_dir().join("config.toml");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("rtmhabit.toml")
}

pub fn cache_path() -> PathBuf {
    if let Some(path) = std::env::var_os("RTMHABIT_CACHE") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.cache_dir().join("state.json");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".rtmhabit-state.json")
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub rtm: RtmConfig,
    pub habitica: HabiticaConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RtmConfig {
    pub api_key: String,
    pub shared_secret: String,
    /// RTM search filter selecting the tasks to sync, e.g. "list:Habitica".
    pub filter: String,
    pub perms: String,
}

impl Default for RtmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            shared_secret: String::new(),
            filter: String::new(),
            perms: "delete".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HabiticaConfig {
    pub user_id: String,
    pub api_token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    /// Upper bound on the wait for the interactive browser authorization.
    pub auth_timeout_minutes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            auth_timeout_minutes: 10,
        }
    }
}

const CONFIG_TEMPLATE: &str = r#"[rtm]
# Apply for a key pair at https://www.rememberthemilk.com/services/api/keys.rtm
api_key = ""
shared_secret = ""
# RTM search filter selecting the tasks to sync, e.g. "list:Habitica".
filter = ""
perms = "delete"

[habitica]
# From https://habitica.com/user/settings/api
user_id = ""
api_token = ""

[http]
timeout_seconds = 30
auth_timeout_minutes = 10
"#;

impl Config {
    pub fn load() -> Result<Self, SyncError> {
        Self::load_from_path(&config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            write_template(path)?;
            return Err(SyncError::Config(format!(
                "no config found; wrote a template to {} - fill in your API credentials and rerun",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            SyncError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.rtm.api_key.trim().is_empty() || self.rtm.shared_secret.trim().is_empty() {
            return Err(SyncError::Config(
                "rtm api_key/shared_secret required in config".to_string(),
            ));
        }
        if self.rtm.filter.trim().is_empty() {
            return Err(SyncError::Config(
                "rtm filter required in config (e.g. \"list:Habitica\")".to_string(),
            ));
        }
        if self.habitica.user_id.trim().is_empty() || self.habitica.api_token.trim().is_empty() {
            return Err(SyncError::Config(
                "habitica user_id/api_token required in config".to_string(),
            ));
        }
        Ok(())
    }
}

fn write_template(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, CONFIG_TEMPLATE)
}
