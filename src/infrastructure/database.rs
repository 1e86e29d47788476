//! 数据库基础设施
//!
//! 每次读取都新建一条连接，执行固定查询后关闭，不使用连接池。
//! 任何失败都只记录日志并返回 None，不向调用方传播错误。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgConnection, PgRow},
    ConnectOptions, Connection, Row,
};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::credentials::{self, ConnectionParams, StoreSettings};
use crate::app::products::model::Product;

const PRODUCTS_QUERY: &str =
    "SELECT id, name, price, created_at FROM products ORDER BY id ASC";

/// 产品数据源
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// 是否找到了连接参数（不建立连接）
    fn credentials_found(&self) -> bool;

    /// 可用时返回全部行（可能为空），不可用时返回 None
    async fn fetch_products(&self) -> Option<Vec<Product>>;
}

/// 适配器内部错误，不会离开本模块
#[derive(Debug, Error)]
enum StoreError {
    #[error("no database credentials configured")]
    MissingCredentials,

    #[error("invalid connection string: {0}")]
    InvalidUrl(sqlx::Error),

    #[error("connection failed: {0}")]
    Connect(sqlx::Error),

    #[error("query failed: {0}")]
    Query(sqlx::Error),

    #[error("malformed row: {0}")]
    Row(sqlx::Error),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// PostgreSQL 数据源
pub struct PgProductSource {
    settings: StoreSettings,
}

impl PgProductSource {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }

    fn connect_options(params: &ConnectionParams) -> Result<PgConnectOptions, StoreError> {
        let options = match params {
            ConnectionParams::Url(url) => {
                PgConnectOptions::from_str(url).map_err(StoreError::InvalidUrl)?
            }
            ConnectionParams::Discrete {
                host,
                port,
                user,
                password,
                database,
            } => {
                let options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .password(password);
                match database {
                    Some(database) => options.database(database),
                    None => options,
                }
            }
        };

        // 语句日志由本模块负责
        Ok(options.disable_statement_logging())
    }

    async fn load(&self) -> Result<Vec<Product>, StoreError> {
        let (source, params) =
            credentials::resolve(&self.settings).ok_or(StoreError::MissingCredentials)?;
        info!("connecting to database via {}: {}", source, params.sanitized());

        let options = Self::connect_options(&params)?;
        let timeout = self.settings.timeout;

        tokio::time::timeout(timeout, Self::query(options))
            .await
            .map_err(|_| StoreError::Timeout(timeout))?
    }

    async fn query(options: PgConnectOptions) -> Result<Vec<Product>, StoreError> {
        // 提前返回或超时取消时，连接随 drop 释放
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(StoreError::Connect)?;

        let rows = sqlx::query(PRODUCTS_QUERY)
            .fetch_all(&mut conn)
            .await
            .map_err(StoreError::Query)?;

        if let Err(e) = conn.close().await {
            warn!("failed to close database connection cleanly: {}", e);
        }

        rows.iter().map(product_from_row).collect()
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    // id 列可能是 INTEGER 或 BIGINT
    let id = match row.try_get::<i64, _>("id") {
        Ok(id) => id,
        Err(_) => row.try_get::<i32, _>("id").map(i64::from).map_err(StoreError::Row)?,
    };

    Ok(Product {
        id,
        name: row.try_get("name").map_err(StoreError::Row)?,
        price: row.try_get("price").map_err(StoreError::Row)?,
        created_at: created_at_from_row(row)?,
    })
}

/// TIMESTAMPTZ 直接解码，不带时区的 TIMESTAMP 按 UTC 解释
fn created_at_from_row(row: &PgRow) -> Result<DateTime<Utc>, StoreError> {
    match row.try_get::<DateTime<Utc>, _>("created_at") {
        Ok(created_at) => Ok(created_at),
        Err(_) => row
            .try_get::<NaiveDateTime, _>("created_at")
            .map(|naive| naive.and_utc())
            .map_err(StoreError::Row),
    }
}

#[async_trait]
impl ProductSource for PgProductSource {
    fn credentials_found(&self) -> bool {
        credentials::resolve(&self.settings).is_some()
    }

    async fn fetch_products(&self) -> Option<Vec<Product>> {
        match self.load().await {
            Ok(products) => {
                debug!("retrieved {} products from database", products.len());
                Some(products)
            }
            Err(e) => {
                warn!("database unavailable, using in-memory data: {}", e);
                None
            }
        }
    }
}
