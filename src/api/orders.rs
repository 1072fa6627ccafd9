//! Order endpoints.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use super::{ApiClient, Endpoint, OrderRemote};
use crate::domain::aggregates::{CreateOrderRequest, OrderError, OrderPlacement, PaymentCallback};
use crate::{Order, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacementBody {
    order: Option<Order>,
    #[serde(alias = "paymentLink", alias = "redirectUrl")]
    payment_url: Option<String>,
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerificationBody {
    #[serde(default)]
    success: bool,
    order: Option<Order>,
}

impl ApiClient {
    /// Orders of the signed-in customer.
    pub async fn my_orders(&self) -> Result<Vec<Order>> { self.get("/orders/my-orders").await }

    pub async fn order(&self, id: &str) -> Result<Order> { self.get(Endpoint::new("/orders").param(id)).await }

    /// Every order; admin only.
    pub async fn all_orders(&self) -> Result<Vec<Order>> { self.get("/orders").await }
}

#[async_trait]
impl OrderRemote for ApiClient {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderPlacement> {
        let body: PlacementBody = self.send_json(Method::POST, "/orders", request).await?;
        Ok(OrderPlacement::resolve(request.payment_method, body.order, body.payment_url, body.order_id)?)
    }

    async fn verify_payment(&self, callback: &PaymentCallback) -> Result<Order> {
        let body: VerificationBody = self.send_json(Method::POST, "/orders/payment/verify", callback).await?;
        match (body.success, body.order) {
            (true, Some(order)) => Ok(order),
            _ => Err(OrderError::PaymentFailed(callback.order_id.clone()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_aliases() {
        let body: PlacementBody = serde_json::from_str(r#"{"paymentLink": "https://pay.example/s/1", "orderId": "o-1"}"#).unwrap();
        assert_eq!(body.payment_url.as_deref(), Some("https://pay.example/s/1"));
        assert!(body.order.is_none());
    }
}
