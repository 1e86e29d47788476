//! # 产品目录服务
//!
//! 通过 HTTP 提供产品的增删改查：
//! - 读操作优先查询数据库，数据库不可用时回退到内存中的示例数据
//! - 写操作只修改内存数据
//! - 数据库连接参数来自环境变量或平台服务绑定 (VCAP_SERVICES)

pub mod app;
pub mod core;
pub mod infrastructure;

pub use app::{create_router, AppState};
pub use app::products::{model::Product, store::MemoryStore};
pub use infrastructure::config::AppConfig;
pub use infrastructure::database::{PgProductSource, ProductSource};
