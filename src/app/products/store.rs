//! 内存产品存储
//!
//! 数据库不可用时读取的回退数据，同时也是所有写操作的唯一目标。
//! 所有 读-改-写 操作都在同一次加锁内完成。

use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::error;

use super::model::Product;
use crate::core::error::CoreError;

struct Inner {
    // 插入顺序，不保证按 id 排序
    products: Vec<Product>,
    next_id: i64,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// 带三条示例数据的存储，每次启动生成相同内容
    pub fn seeded() -> Self {
        let now = Utc::now();
        let seed = |id: i64, name: &str, price: Decimal, days_ago: i64| Product {
            id,
            name: name.to_string(),
            price,
            created_at: now - Duration::days(days_ago),
        };

        Self::with_products(vec![
            seed(1, "Laptop", dec!(999.99), 30),
            seed(2, "Mouse", dec!(29.99), 20),
            seed(3, "Keyboard", dec!(79.99), 10),
        ])
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        let next_id = products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        Self {
            inner: Mutex::new(Inner { products, next_id }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, CoreError> {
        self.inner.lock().map_err(|e| {
            error!("memory store lock poisoned: {}", e);
            CoreError::InternalServerError("internal error".to_string())
        })
    }

    /// 按 id 升序返回全部产品
    pub fn list(&self) -> Result<Vec<Product>, CoreError> {
        let inner = self.lock()?;
        let mut products = inner.products.clone();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    pub fn get(&self, id: i64) -> Result<Option<Product>, CoreError> {
        let inner = self.lock()?;
        Ok(inner.products.iter().find(|p| p.id == id).cloned())
    }

    /// 新 id = 历史最大 id + 1，删除后不会复用
    pub fn create(&self, name: String, price: Decimal) -> Result<Product, CoreError> {
        let mut inner = self.lock()?;
        let product = Product {
            id: inner.next_id,
            name,
            price,
            created_at: Utc::now(),
        };
        inner.next_id += 1;
        inner.products.push(product.clone());
        Ok(product)
    }

    /// 只修改 name 和 price
    pub fn update(&self, id: i64, name: String, price: Decimal) -> Result<Option<Product>, CoreError> {
        let mut inner = self.lock()?;
        Ok(inner.products.iter_mut().find(|p| p.id == id).map(|product| {
            product.name = name;
            product.price = price;
            product.clone()
        }))
    }

    /// 返回是否删除成功
    pub fn delete(&self, id: i64) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        match inner.products.iter().position(|p| p.id == id) {
            Some(index) => {
                inner.products.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> Result<usize, CoreError> {
        Ok(self.lock()?.products.len())
    }
}
