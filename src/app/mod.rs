//! 应用层：路由组装

pub mod products;

use axum::{middleware, routing::get, Router};
use std::{sync::Arc, time::Duration};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::core::middleware::request_logging_middleware;
use crate::infrastructure::database::ProductSource;
use products::{handler, service::ProductService, store::MemoryStore};

pub use products::handler::AppState;

impl AppState {
    pub fn new(source: Arc<dyn ProductSource>, memory: Arc<MemoryStore>) -> Self {
        Self {
            product_service: ProductService::new(source, memory),
        }
    }
}

/// 创建路由，request_timeout 限制单个请求的总耗时
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        // 健康检查与诊断
        .route("/health", get(handler::health_check))
        .route("/diagnose", get(handler::diagnose))
        // 产品 CRUD
        .route(
            "/products",
            get(handler::list_products).post(handler::create_product),
        )
        .route(
            "/products/:id",
            get(handler::get_product)
                .put(handler::update_product)
                .delete(handler::delete_product),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CatchPanicLayer::new())
        // 在超时和 panic 层之外，408 / 500 也有日志和 x-request-id
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
