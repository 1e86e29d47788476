//! 产品业务服务
//!
//! 读操作优先使用数据源，不可用时整体回退到内存数据，两者从不合并。
//! 写操作只作用于内存数据。

use rust_decimal::Decimal;
use std::sync::Arc;

use super::{model::Product, store::MemoryStore};
use crate::core::error::CoreError;
use crate::infrastructure::database::ProductSource;

/// 一次读取使用的数据及其来源
#[derive(Debug)]
pub struct Snapshot {
    pub products: Vec<Product>,
    pub from_store: bool,
}

#[derive(Clone)]
pub struct ProductService {
    source: Arc<dyn ProductSource>,
    memory: Arc<MemoryStore>,
}

impl ProductService {
    pub fn new(source: Arc<dyn ProductSource>, memory: Arc<MemoryStore>) -> Self {
        Self { source, memory }
    }

    /// 选择数据来源并按 id 升序排序
    pub async fn snapshot(&self) -> Result<Snapshot, CoreError> {
        match self.source.fetch_products().await {
            Some(mut products) => {
                products.sort_by_key(|p| p.id);
                Ok(Snapshot {
                    products,
                    from_store: true,
                })
            }
            None => Ok(Snapshot {
                products: self.memory.list()?,
                from_store: false,
            }),
        }
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, CoreError> {
        Ok(self.snapshot().await?.products)
    }

    pub async fn get_product(&self, id: i64) -> Result<Product, CoreError> {
        self.snapshot()
            .await?
            .products
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub fn create_product(&self, name: String, price: Decimal) -> Result<Product, CoreError> {
        self.memory.create(name, price)
    }

    pub fn update_product(&self, id: i64, name: String, price: Decimal) -> Result<Product, CoreError> {
        self.memory
            .update(id, name, price)?
            .ok_or_else(|| not_found(id))
    }

    pub fn delete_product(&self, id: i64) -> Result<(), CoreError> {
        if self.memory.delete(id)? {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }

    pub fn credentials_found(&self) -> bool {
        self.source.credentials_found()
    }
}

fn not_found(id: i64) -> CoreError {
    CoreError::NotFound(format!("product {} not found", id))
}
