use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub upload: UploadConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            enable_cors: false,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Frozen model artifact on local disk
    pub path: PathBuf,
    /// Refuse to start when the artifact cannot be loaded
    pub required: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/solar_model.json"),
            required: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default `EnvFilter` directives
    pub filter: String,
    /// JSON lines instead of the compact human format
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,hyper=warn,tower_http=info".to_string(),
            json: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("SOLAR__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 8501);
        assert_eq!(cfg.model.path, PathBuf::from("models/solar_model.json"));
        assert!(!cfg.model.required);
        assert!(cfg.log.json);
        assert_eq!(cfg.server.socket_addr().unwrap().to_string(), "127.0.0.1:8501");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
            r#"
            [server]
            port = 9000

            [model]
            path = "/srv/models/best.json"
            required = true
            "#,
        ));
        let cfg = Config::from_figment(figment).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert!(cfg.model.required);
        assert_eq!(cfg.upload.max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_shipped_toml_matches_defaults() {
        let shipped = include_str!("../config/default.toml");
        let from_file: Config = Figment::new().merge(Toml::string(shipped)).extract().unwrap();
        let defaults = Config::default();
        assert_eq!(from_file.server.host, defaults.server.host);
        assert_eq!(from_file.server.port, defaults.server.port);
        assert_eq!(from_file.server.request_timeout_secs, defaults.server.request_timeout_secs);
        assert_eq!(from_file.model.path, defaults.model.path);
        assert_eq!(from_file.upload.max_bytes, defaults.upload.max_bytes);
        assert_eq!(from_file.log.filter, defaults.log.filter);
        assert_eq!(from_file.log.json, defaults.log.json);
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string("[server]\nport = \"not a port\"\n"));
        assert!(Config::from_figment(figment).is_err());
    }
}
