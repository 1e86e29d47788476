//! 基础设施层：配置、日志和数据库访问

pub mod config;
pub mod credentials;
pub mod database;
pub mod logger;
