use printhook_core::hooks::DispatcherConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    pub hooks_path: PathBuf,
    pub snapshot_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    dispatch: DispatchSection,
    #[serde(default)]
    storage: StorageSection,
    #[serde(default)]
    webcam: WebcamSection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DispatchSection {
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    max_concurrent: usize,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    #[serde(default = "default_hooks_path")]
    hooks_path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            hooks_path: default_hooks_path(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct WebcamSection {
    #[serde(default)]
    snapshot_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5050
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_max_concurrent() -> usize {
    32
}

fn default_hooks_path() -> PathBuf {
    PathBuf::from("hooks.json")
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        if let Some(file_config) = load_from_file()? {
            return Ok(file_config.into());
        }

        Ok(Self::from_env())
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let parsed: FileConfig = toml::from_str(contents)?;
        Ok(parsed.into())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_concurrent: self.max_concurrent,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn from_env() -> Self {
        let host = env::var("PRINTHOOK_HOST").unwrap_or_else(|_| default_host());
        let port = env::var("PRINTHOOK_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or_else(default_port);
        let timeout_secs = env::var("PRINTHOOK_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or_else(default_timeout_secs);
        let hooks_path = env::var("PRINTHOOK_HOOKS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_hooks_path());
        let snapshot_url = env::var("PRINTHOOK_SNAPSHOT_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            timeout_secs,
            max_concurrent: default_max_concurrent(),
            hooks_path,
            snapshot_url,
        }
    }
}

impl From<FileConfig> for ServerConfig {
    fn from(file: FileConfig) -> Self {
        Self {
            host: file.server.host,
            port: file.server.port,
            timeout_secs: file.dispatch.timeout_secs,
            max_concurrent: file.dispatch.max_concurrent,
            hooks_path: file.storage.hooks_path,
            snapshot_url: file
                .webcam
                .snapshot_url
                .filter(|url| !url.trim().is_empty()),
        }
    }
}

fn load_from_file() -> anyhow::Result<Option<FileConfig>> {
    let config_path = env::var("PRINTHOOK_CONFIG").ok();
    let path = if let Some(path) = config_path {
        Some(path)
    } else if Path::new("printhook.toml").exists() {
        Some("printhook.toml".to_string())
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&path)
        .map_err(|err| anyhow::anyhow!("Failed to read config {}: {}", path, err))?;
    let parsed: FileConfig = toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Failed to parse config {}: {}", path, err))?;
    Ok(Some(parsed))
}
