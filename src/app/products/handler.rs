//! 产品处理器

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use tracing::info;
use validator::Validate;

use super::{
    model::{Product, ProductInput},
    service::ProductService,
};
use crate::core::{
    error::CoreError,
    response::{DiagnoseResponse, HealthResponse},
};

#[derive(Clone)]
pub struct AppState {
    pub product_service: ProductService,
}

fn product_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, CoreError> {
    let Path(id) = path?;
    Ok(id)
}

fn product_input(body: Result<Json<ProductInput>, JsonRejection>) -> Result<ProductInput, CoreError> {
    let Json(input) = body?;
    let input = input.normalized();
    input.validate()?;
    Ok(input)
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, CoreError> {
    let products = state.product_service.list_products().await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Product>, CoreError> {
    let id = product_id(path)?;
    let product = state.product_service.get_product(id).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let input = product_input(body)?;
    let product = state.product_service.create_product(input.name, input.price)?;
    info!("Created product: {} ({})", product.name, product.id);

    let location = format!("/products/{}", product.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(product),
    ))
}

pub async fn update_product(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> Result<Json<Product>, CoreError> {
    let id = product_id(path)?;
    let input = product_input(body)?;
    let product = state
        .product_service
        .update_product(id, input.name, input.price)?;
    info!("Updated product: {} ({})", product.name, product.id);
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, CoreError> {
    let id = product_id(path)?;
    state.product_service.delete_product(id)?;
    info!("Deleted product: {}", id);
    Ok(StatusCode::OK)
}

/// 健康检查
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// 数据源诊断
pub async fn diagnose(
    State(state): State<AppState>,
) -> Result<Json<DiagnoseResponse>, CoreError> {
    let service = &state.product_service;
    let snapshot = service.snapshot().await?;

    Ok(Json(DiagnoseResponse {
        credentials_found: service.credentials_found(),
        rows_retrieved: if snapshot.from_store {
            snapshot.products.len()
        } else {
            0
        },
        used_fallback: !snapshot.from_store,
    }))
}
