//! Cached catalog reads.

use crate::api::{ApiClient, NewReview};
use crate::cache::{QueryCache, QueryKey};
use crate::{Banner, Brand, Category, DashboardStats, Product, RecentUpdate, Result, Review};

/// Categories and brands for filter screens.
#[derive(Clone, Debug)]
pub struct FilterOptions {
    pub categories: Vec<Category>,
    pub brands: Vec<Brand>,
}

#[derive(Clone, Debug)]
pub struct CatalogService {
    api: ApiClient,
    cache: QueryCache,
}

impl CatalogService {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self { Self { api, cache } }

    pub fn cache(&self) -> &QueryCache { &self.cache }

    /// Product listing. `live_only` is the storefront view; the full list is the admin one.
    pub async fn products(&self, live_only: bool) -> Result<Vec<Product>> {
        if live_only {
            self.cache.fetch_retried(QueryKey::scoped("products", "live"), || self.api.live_products()).await
        } else {
            self.cache.fetch_retried(QueryKey::list("products"), || self.api.products()).await
        }
    }

    pub async fn product(&self, id: &str) -> Result<Product> {
        self.cache.fetch_retried(QueryKey::scoped("products", id), || self.api.product(id)).await
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.cache.fetch(QueryKey::list("categories"), || self.api.categories()).await
    }

    pub async fn brands(&self) -> Result<Vec<Brand>> {
        self.cache.fetch(QueryKey::list("brands"), || self.api.brands()).await
    }

    /// Fetches categories and brands concurrently.
    pub async fn filter_options(&self) -> Result<FilterOptions> {
        let (categories, brands) = futures::try_join!(self.categories(), self.brands())?;
        Ok(FilterOptions { categories, brands })
    }

    pub async fn reviews(&self, product_id: &str) -> Result<Vec<Review>> {
        self.cache.fetch(QueryKey::scoped("reviews", product_id), || self.api.product_reviews(product_id)).await
    }

    pub async fn add_review(&self, review: &NewReview) -> Result<Review> {
        let created = self.api.create_review(review).await?;
        self.cache.remove(&QueryKey::scoped("reviews", review.product.clone())).await;
        Ok(created)
    }

    pub async fn banners(&self) -> Result<Vec<Banner>> {
        self.cache.fetch(QueryKey::list("banners"), || self.api.banners()).await
    }

    pub async fn dashboard(&self) -> Result<(DashboardStats, Vec<RecentUpdate>)> {
        futures::try_join!(self.api.dashboard_stats(), self.api.recent_updates())
    }
}
