//! 数据库连接参数发现
//!
//! 按固定优先级解析，第一个完整的来源生效：
//! 1. `DATABASE_URL` 完整连接串
//! 2. `DB_HOST` / `DB_PORT` / `DB_USER` / `DB_PASSWORD` / `DB_NAME`
//! 3. `VCAP_SERVICES` 中名称包含 "hana" 的服务组

use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const DEFAULT_DB_PORT: u16 = 5432;

/// 适配器配置快照
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub database_url: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: Option<String>,
    pub vcap_services: Option<String>,
    pub timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            db_host: None,
            db_port: None,
            db_user: None,
            db_password: None,
            db_name: None,
            vcap_services: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// 解析后的连接参数
#[derive(Clone, PartialEq)]
pub enum ConnectionParams {
    Url(String),
    Discrete {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: Option<String>,
    },
}

/// 参数来源，仅用于日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ConnectionString,
    Environment,
    ServiceBinding,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::ConnectionString => write!(f, "DATABASE_URL"),
            CredentialSource::Environment => write!(f, "DB_* variables"),
            CredentialSource::ServiceBinding => write!(f, "VCAP_SERVICES"),
        }
    }
}

impl ConnectionParams {
    /// 脱敏后的连接摘要，密码一律替换为 ***
    pub fn sanitized(&self) -> String {
        match self {
            ConnectionParams::Url(raw) => redact_url(raw),
            ConnectionParams::Discrete {
                host,
                port,
                user,
                database,
                ..
            } => format!(
                "host={} port={} user={} password=*** database={}",
                host,
                port,
                user,
                database.as_deref().unwrap_or("<default>")
            ),
        }
    }
}

// 不在 Debug 输出中泄露密码
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionParams({})", self.sanitized())
    }
}

fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("***")).is_err() {
                return "<unparseable connection string>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<unparseable connection string>".to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 解析连接参数，找不到完整参数时返回 None
pub fn resolve(settings: &StoreSettings) -> Option<(CredentialSource, ConnectionParams)> {
    if let Some(url) = non_empty(&settings.database_url) {
        return Some((CredentialSource::ConnectionString, ConnectionParams::Url(url)));
    }

    if let (Some(host), Some(user), Some(password)) = (
        non_empty(&settings.db_host),
        non_empty(&settings.db_user),
        non_empty(&settings.db_password),
    ) {
        return Some((
            CredentialSource::Environment,
            ConnectionParams::Discrete {
                host,
                port: settings.db_port.unwrap_or(DEFAULT_DB_PORT),
                user,
                password,
                database: non_empty(&settings.db_name),
            },
        ));
    }

    let payload = non_empty(&settings.vcap_services)?;
    from_service_binding(&payload).map(|params| (CredentialSource::ServiceBinding, params))
}

/// 扫描服务绑定 JSON，返回第一个完整的 (host, user, password) 实例
pub fn from_service_binding(payload: &str) -> Option<ConnectionParams> {
    let root: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!("VCAP_SERVICES is not valid JSON: {}", e);
            return None;
        }
    };

    root.as_object()?
        .iter()
        .filter(|(group, _)| group.to_lowercase().contains("hana"))
        .filter_map(|(_, instances)| instances.as_array())
        .flatten()
        .filter_map(|instance| instance.get("credentials")?.as_object())
        .find_map(params_from_credentials)
}

fn first_string(credentials: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        credentials
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn port_of(credentials: &Map<String, Value>) -> Option<u16> {
    match credentials.get("port")? {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn params_from_credentials(credentials: &Map<String, Value>) -> Option<ConnectionParams> {
    let host = first_string(credentials, &["host", "hostname"])?;
    let user = first_string(credentials, &["user", "username", "hdi_user", "schema"])?;
    let password = first_string(credentials, &["password", "hdi_password"])?;

    Some(ConnectionParams::Discrete {
        host,
        port: port_of(credentials).unwrap_or(DEFAULT_DB_PORT),
        user,
        password,
        database: first_string(credentials, &["database", "dbname"]),
    })
}
