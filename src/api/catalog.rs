//! Catalog reads: products, categories, brands, banners.

use super::{ApiClient, Endpoint};
use crate::{Banner, Brand, Category, Product, Result};

impl ApiClient {
    pub async fn products(&self) -> Result<Vec<Product>> { self.get("/products").await }

    /// Products flagged live, i.e. visible in the storefront.
    pub async fn live_products(&self) -> Result<Vec<Product>> { self.get("/products/live").await }

    pub async fn product(&self, id: &str) -> Result<Product> { self.get(Endpoint::new("/products").param(id)).await }

    pub async fn categories(&self) -> Result<Vec<Category>> { self.get("/categories").await }

    pub async fn category(&self, id: &str) -> Result<Category> { self.get(Endpoint::new("/categories").param(id)).await }

    pub async fn brands(&self) -> Result<Vec<Brand>> { self.get("/brands").await }

    pub async fn brand(&self, id: &str) -> Result<Brand> { self.get(Endpoint::new("/brands").param(id)).await }

    pub async fn banners(&self) -> Result<Vec<Banner>> {
        let banners: Vec<Banner> = self.get("/banners").await?;
        Ok(banners.into_iter().filter(|b| b.is_active).collect())
    }
}
