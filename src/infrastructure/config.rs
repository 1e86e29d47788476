//! 配置基础设施
//!
//! 启动时读取一次环境变量（先加载可选的 .env 文件）。

use serde::{de, Deserialize, Deserializer};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::credentials::StoreSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid HOST value: {0}")]
    Host(String),
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口，PORT 环境变量覆盖
    #[serde(default, deserialize_with = "empty_as_none")]
    pub port: Option<u16>,

    // === 数据库连接 ===
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub db_host: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub db_port: Option<u16>,

    #[serde(default)]
    pub db_user: Option<String>,

    #[serde(default)]
    pub db_password: Option<String>,

    #[serde(default)]
    pub db_name: Option<String>,

    /// 平台注入的服务绑定 JSON
    #[serde(default)]
    pub vcap_services: Option<String>,

    // === 超时 ===
    #[serde(default, deserialize_with = "empty_as_none")]
    pub store_timeout_secs: Option<u64>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// 空值或纯空白视为未设置，平台常会注入 `DB_PORT=` 这样的空变量
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// 先读取 .env，再读取进程环境变量
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// 从键值对构造，测试中使用
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs.into_iter().map(|(k, v)| (k.into(), v.into()));
        Ok(envy::from_iter(pairs)?)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::Host(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port.unwrap_or(DEFAULT_PORT)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs.unwrap_or(DEFAULT_STORE_TIMEOUT_SECS))
    }

    /// 数据访问适配器所需的配置
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            database_url: self.database_url.clone(),
            db_host: self.db_host.clone(),
            db_port: self.db_port,
            db_user: self.db_user.clone(),
            db_password: self.db_password.clone(),
            db_name: self.db_name.clone(),
            vcap_services: self.vcap_services.clone(),
            timeout: self.store_timeout(),
        }
    }
}
