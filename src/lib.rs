//! Maison Storefront
//!
//! Client for the Maison luxury e-commerce backend: catalog browsing, cart, checkout,
//! account management and the administrative back-office.
//!
//! ## Features
//! - Typed REST client for auth, catalog, cart, orders, reviews and dashboard endpoints
//! - Cart quantity reconciliation against live stock, for guest and member sessions
//! - Checkout with direct confirmation or external payment gateway redirect
//! - Optimistic admin mutations with rollback
//! - Tag-keyed query cache

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod services;
pub mod store;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use domain::aggregates::{Cart, CartError, CartLine, OrderError, ProductError, QuantityDecision};
pub use domain::events::{AdminEvent, CartEvent, DomainEvent, OrderEvent};
pub use domain::value_objects::{Money, VariantKey};

// =============================================================================
// Core Types
// =============================================================================

/// Reference to another entity: either a bare id or a populated `{_id, name}` object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(String),
    Populated {
        #[serde(rename = "_id", alias = "id")]
        id: String,
        #[serde(default)]
        name: String,
    },
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self { Self::Id(id) => id, Self::Populated { id, .. } => id }
    }
    pub fn name(&self) -> Option<&str> {
        match self { Self::Id(_) => None, Self::Populated { name, .. } => Some(name) }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub sold: u32,
    pub brand: Option<EntityRef>,
    pub category: Option<EntityRef>,
    #[serde(default)]
    pub images: Vec<String>,
    pub main_image: Option<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub specifications: Vec<Specification>,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_hot_deal: bool,
    #[serde(default)]
    pub status: ProductStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    #[default]
    Active,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    Draft,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "Active", Self::OutOfStock => "Out of Stock", Self::Draft => "Draft" }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image: Option<String>,
    #[serde(default)]
    pub product_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub logo: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub product_count: u32,
}

fn default_true() -> bool { true }

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub customer_info: Option<CustomerInfo>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Canceled,
}

/// How the customer pays. Online payments go through the external gateway.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "Cash on Delivery", alias = "COD")]
    CashOnDelivery,
    #[serde(rename = "Online Payment", alias = "Card")]
    Online,
}

impl PaymentMethod {
    pub fn uses_gateway(&self) -> bool { matches!(self, Self::Online) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 3, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 2, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 3, max = 12, message = "postal code is invalid"))]
    pub postal_code: String,
    #[validate(length(min = 2, message = "country is required"))]
    pub country: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[validate(length(min = 2, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 7, max = 20, message = "phone number is invalid"))]
    pub phone: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Role,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub two_factor_enabled: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Vendor,
    Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub product: String,
    #[serde(default)]
    pub name: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default)]
    pub total_revenue: Decimal,
    #[serde(default)]
    pub total_orders: u64,
    #[serde(default)]
    pub total_products: u64,
    #[serde(default)]
    pub total_users: u64,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentUpdate {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub image: String,
    pub link: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Product error: {0}")]
    Product(#[from] ProductError),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Stored cart is corrupt: {0}")]
    CorruptCart(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorefrontError {
    /// Whether the failure came from form validation rather than the network.
    pub fn is_validation(&self) -> bool { matches!(self, Self::Validation(_)) }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_wire_format() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "_id": "p-1",
            "name": "Silk Scarf",
            "price": 420.5,
            "stock": 3,
            "brand": { "_id": "b-1", "name": "Maison V" },
            "category": "c-1",
            "sizes": ["S", "M"],
            "isLive": true,
            "status": "Out of Stock"
        })).unwrap();
        assert_eq!(product.id, "p-1");
        assert_eq!(product.price, Decimal::new(4205, 1));
        assert_eq!(product.brand.as_ref().and_then(EntityRef::name), Some("Maison V"));
        assert_eq!(product.category.as_ref().map(EntityRef::id), Some("c-1"));
        assert_eq!(product.status, ProductStatus::OutOfStock);
        assert!(product.is_live && !product.is_main);
    }

    #[test]
    fn test_payment_method_aliases() {
        let m: PaymentMethod = serde_json::from_str("\"COD\"").unwrap();
        assert_eq!(m, PaymentMethod::CashOnDelivery);
        assert!(serde_json::from_str::<PaymentMethod>("\"Online Payment\"").unwrap().uses_gateway());
    }

    #[test]
    fn test_error_display() {
        let err = StorefrontError::Api { status: 409, message: "Email already registered".into() };
        assert_eq!(err.to_string(), "API error (409): Email already registered");
    }
}
