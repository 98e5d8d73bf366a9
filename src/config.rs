use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_CONFIG_FILE, DEFAULT_COUNTRY, DEFAULT_PORT};
use crate::error::{HeatmapError, Result};

pub const ENV_CONFIG_FILE: &str = "HEATMAP_CONFIG";
pub const ENV_READY_PATH: &str = "READY_PATH";
pub const ENV_SPOT_PATH: &str = "SPOT_PATH";
pub const ENV_POSTAL_TABLE_PATH: &str = "POSTAL_TABLE_PATH";
pub const ENV_COUNTRY: &str = "GEOCODER_COUNTRY";
pub const ENV_PORT: &str = "HEATMAP_PORT";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub sources: SourcesConfig,
    pub geocoder: GeocoderConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct SourcesConfig {
    /// Installed-base ("Ready") export, usually `.xlsb`
    pub ready_path: PathBuf,
    /// SPOT opportunity export, usually `.xlsx`
    pub spot_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    /// GeoNames-format postal code dump. Without one every lookup is null.
    pub postal_table_path: Option<PathBuf>,
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// On-disk shape of `heatmap.toml`. Every key is optional; the environment
/// wins over the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    sources: SourcesSection,
    geocoder: GeocoderSection,
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourcesSection {
    ready_path: Option<PathBuf>,
    spot_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeocoderSection {
    postal_table_path: Option<PathBuf>,
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    port: Option<u16>,
}

impl Config {
    /// Load `.env`, the optional config file and the process environment.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path = config_file_path(
            std::env::var(ENV_CONFIG_FILE).ok(),
            Path::new(DEFAULT_CONFIG_FILE),
        );

        let contents = match config_path {
            Some(path) => Some(fs::read_to_string(&path).map_err(|e| {
                HeatmapError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?),
            None => None,
        };

        Self::resolve(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Merge file contents with an environment lookup. Split out from `load`
    /// so tests never touch the real process environment.
    pub fn resolve<F>(file_contents: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: ConfigFile = match file_contents {
            Some(s) => toml::from_str(s)?,
            None => ConfigFile::default(),
        };
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let ready_path = env(ENV_READY_PATH)
            .map(PathBuf::from)
            .or(file.sources.ready_path)
            .ok_or_else(|| missing(ENV_READY_PATH))?;
        let spot_path = env(ENV_SPOT_PATH)
            .map(PathBuf::from)
            .or(file.sources.spot_path)
            .ok_or_else(|| missing(ENV_SPOT_PATH))?;

        let postal_table_path = env(ENV_POSTAL_TABLE_PATH)
            .map(PathBuf::from)
            .or(file.geocoder.postal_table_path);
        let country = env(ENV_COUNTRY)
            .or(file.geocoder.country)
            .unwrap_or_else(|| DEFAULT_COUNTRY.to_string())
            .to_uppercase();

        let port = match env(ENV_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                HeatmapError::Config(format!("{} must be a port number, got '{}': {}", ENV_PORT, raw, e))
            })?,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };

        Ok(Config {
            sources: SourcesConfig { ready_path, spot_path },
            geocoder: GeocoderConfig { postal_table_path, country },
            server: ServerConfig { port },
        })
    }
}

/// `HEATMAP_CONFIG` when set and non-blank, else `default` if it exists.
fn config_file_path(env_value: Option<String>, default: &Path) -> Option<PathBuf> {
    env_value
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| default.exists().then(|| default.to_path_buf()))
}

fn missing(key: &str) -> HeatmapError {
    HeatmapError::Config(format!(
        "{} is not set (environment, .env or {})",
        key, DEFAULT_CONFIG_FILE
    ))
}
