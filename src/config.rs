// Service configuration
//
// Layers, later wins: built-in defaults, optional TOML file, `VDL_*`
// environment variables (`__` separates sections, e.g. VDL_SERVER__PORT).

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the TOML file
pub const CONFIG_PATH_ENV: &str = "VDL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub downloads: DownloadsConfig,
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Managed output directory
    pub dir: PathBuf,
    /// Evict job records idle for this long; unset keeps them forever
    pub job_ttl_secs: Option<u64>,
    pub prune_interval_secs: u64,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            dir: default_download_dir(),
            job_ttl_secs: None,
            prune_interval_secs: 300,
        }
    }
}

/// `<user downloads>/video-downloader`, or `./downloads` without a home
fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .map(|d| d.join("video-downloader"))
        .unwrap_or_else(|| PathBuf::from("downloads"))
}

/// Settings for the yt-dlp provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Explicit yt-dlp path; discovered when unset
    pub binary: Option<String>,
    pub socket_timeout_secs: u64,
    /// Upper bound for one metadata resolution
    pub info_timeout_secs: u64,
    /// Proxy URL (http://, https://, socks5://)
    pub proxy: Option<String>,
    /// Netscape-format cookies file
    pub cookies_path: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: None,
            socket_timeout_secs: 30,
            info_timeout_secs: 90,
            proxy: None,
            cookies_path: None,
        }
    }
}

/// Path of the TOML file to read, from `VDL_CONFIG` or the default
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration. A missing file just leaves the defaults in place.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VDL_").ignore(&["config"]).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.downloads.dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "downloads.dir cannot be empty".to_string(),
        ));
    }

    if config.downloads.job_ttl_secs == Some(0) || config.downloads.prune_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "downloads.job_ttl_secs and downloads.prune_interval_secs must be positive"
                .to_string(),
        ));
    }

    if config.extractor.socket_timeout_secs == 0 || config.extractor.info_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "extractor timeouts must be positive".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_config(Path::new("missing.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 5000);
            assert_eq!(config.server.host.to_string(), "0.0.0.0");
            assert_eq!(config.downloads.job_ttl_secs, None);
            assert_eq!(config.extractor.socket_timeout_secs, 30);
            assert_eq!(config.extractor.info_timeout_secs, 90);
            assert!(validate_config(&config).is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[server]
host = "127.0.0.1"
port = 3000

[downloads]
dir = "/srv/media"
job_ttl_secs = 3600

[extractor]
proxy = "socks5://127.0.0.1:1080"
"#,
            )?;
            jail.set_env("VDL_SERVER__PORT", "8080");
            jail.set_env("VDL_CONFIG", "config.toml");

            let config = load_config(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.server.host.to_string(), "127.0.0.1");
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.downloads.dir, PathBuf::from("/srv/media"));
            assert_eq!(config.downloads.job_ttl_secs, Some(3600));
            assert_eq!(config.downloads.prune_interval_secs, 300);
            assert_eq!(
                config.extractor.proxy.as_deref(),
                Some("socks5://127.0.0.1:1080")
            );
            assert_eq!(config_path(), PathBuf::from("config.toml"));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[server]\nport = \"not a number\"\n")?;
            let err = load_config(Path::new("config.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)));
            Ok(())
        });
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_dir_fails() {
        let mut config = Config::default();
        config.downloads.dir = PathBuf::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeouts_fail() {
        let mut config = Config::default();
        config.extractor.info_timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.downloads.job_ttl_secs = Some(0);
        assert!(validate_config(&config).is_err());
    }
}
