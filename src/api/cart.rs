//! Backend cart endpoints.

use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::{ApiClient, CartRemote};
use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::VariantKey;
use crate::{Result, StorefrontError};

/// `GET /cart` body. Items carry the populated product.
#[derive(Debug, Deserialize)]
struct CartBody {
    #[serde(default)]
    items: Vec<CartItemBody>,
}

#[derive(Debug, Deserialize)]
struct CartItemBody {
    product: Option<CartProduct>,
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartProduct {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    name: String,
    price: Decimal,
    main_image: Option<String>,
    #[serde(default)]
    images: Vec<String>,
}

impl CartBody {
    /// Display lines; items whose product no longer exists are dropped.
    fn into_lines(self) -> Vec<CartLine> {
        self.items
            .into_iter()
            .filter_map(|item| {
                let product = item.product?;
                Some(CartLine {
                    key: VariantKey::new(product.id, item.size, item.color),
                    name: product.name,
                    unit_price: product.price,
                    image: product.main_image.or_else(|| product.images.into_iter().next()),
                    quantity: item.quantity,
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddToCart<'a> {
    product_id: &'a str,
    quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
}

#[async_trait]
impl CartRemote for ApiClient {
    async fn fetch_cart(&self) -> Result<Vec<CartLine>> {
        if !self.is_authenticated().await { return Err(StorefrontError::Unauthorized); }
        let body: CartBody = self.get("/cart").await?;
        Ok(body.into_lines())
    }

    async fn add_to_cart(&self, key: &VariantKey, delta: i64) -> Result<()> {
        let body = AddToCart { product_id: key.product_id(), quantity: delta, size: key.size(), color: key.color() };
        let _: serde_json::Value = self.send_json(Method::POST, "/cart/add", &body).await?;
        Ok(())
    }

    async fn fetch_stock(&self, product_id: &str) -> Result<u32> {
        Ok(self.product(product_id).await?.stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_body_into_lines() {
        let body: CartBody = serde_json::from_value(serde_json::json!({
            "items": [
                { "product": { "_id": "p-1", "name": "Bag", "price": 1200, "images": ["/a.jpg"] }, "quantity": 1, "size": "", "color": "Noir" },
                { "product": null, "quantity": 2 },
                { "product": { "_id": "p-2", "name": "Belt", "price": 310.0, "mainImage": "/b.jpg" }, "quantity": 3 }
            ]
        })).unwrap();
        let lines = body.into_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].key, VariantKey::new("p-1", None, Some("Noir".into())));
        assert_eq!(lines[0].image.as_deref(), Some("/a.jpg"));
        assert_eq!(lines[1].image.as_deref(), Some("/b.jpg"));
        assert_eq!(lines[1].quantity, 3);
    }

    #[test]
    fn test_add_body_omits_absent_labels() {
        let key = VariantKey::new("p-1", Some("M".into()), None);
        let body = AddToCart { product_id: key.product_id(), quantity: -2, size: key.size(), color: key.color() };
        assert_eq!(serde_json::to_value(&body).unwrap(), serde_json::json!({ "productId": "p-1", "quantity": -2, "size": "M" }));
    }
}
