//! Read-only product catalog seam.
//!
//! The engine never writes to the catalog. Implementations may be remote and
//! slow; the pipeline wraps every fetch in a timeout.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    /// Ingredient names as listed by the catalog, not yet canonicalized
    pub ingredients: BTreeSet<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Product {
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            ingredients: ingredients.into_iter().map(Into::into).collect(),
            rating: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("catalog did not answer within {0:?}")]
    Timeout(Duration),

    #[error("malformed catalog data: {0}")]
    Malformed(String),
}

impl From<CatalogError> for skinmatch_core::Error {
    fn from(err: CatalogError) -> Self {
        skinmatch_core::Error::CatalogUnavailable(err.to_string())
    }
}

#[async_trait]
pub trait ProductCatalogView: Send + Sync {
    /// Products with the given ids, or every product when `ids` is `None`.
    /// Unknown ids are skipped. Result order is the catalog's own order.
    async fn fetch_products(&self, ids: Option<&[ProductId]>) -> Result<Vec<Product>, CatalogError>;
}

#[async_trait]
impl<T: ProductCatalogView + ?Sized> ProductCatalogView for Arc<T> {
    async fn fetch_products(&self, ids: Option<&[ProductId]>) -> Result<Vec<Product>, CatalogError> {
        (**self).fetch_products(ids).await
    }
}

/// Catalog held in memory, in insertion order
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<Vec<Product>>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let products: Vec<Product> =
            serde_json::from_str(json).map_err(|e| CatalogError::Malformed(e.to_string()))?;
        Ok(Self::new(products))
    }

    /// Add or replace a product. Replacement keeps the original position.
    pub fn upsert(&self, product: Product) {
        let mut products = self.products.write();
        match products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

#[async_trait]
impl ProductCatalogView for InMemoryCatalog {
    async fn fetch_products(&self, ids: Option<&[ProductId]>) -> Result<Vec<Product>, CatalogError> {
        let products = self.products.read();
        Ok(match ids {
            None => products.clone(),
            Some(ids) => products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect(),
        })
    }
}
