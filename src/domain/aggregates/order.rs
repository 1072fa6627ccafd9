//! Order Aggregate
//!
//! Checkout form, the order-creation request built from a cart, and the two ways the
//! backend answers it.

use reqwest::Url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::domain::aggregates::cart::Cart;
use crate::{CustomerInfo, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};

#[derive(Clone, Debug, Default, Validate)]
pub struct CheckoutForm {
    #[validate]
    pub shipping: ShippingAddress,
    #[validate]
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub customer_info: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub items_price: Decimal,
    pub total_price: Decimal,
}

impl CreateOrderRequest {
    pub fn from_cart(cart: &Cart, form: &CheckoutForm) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::EmptyCart); }
        let order_items: Vec<OrderItem> = cart
            .lines()
            .iter()
            .map(|l| OrderItem {
                product: l.key.product_id().to_string(),
                name: l.name.clone(),
                image: l.image.clone(),
                quantity: l.quantity,
                price: l.unit_price,
                size: l.key.size().map(String::from),
                color: l.key.color().map(String::from),
            })
            .collect();
        let items_price = cart.subtotal().amount();
        Ok(Self {
            order_items,
            shipping_address: form.shipping.clone(),
            customer_info: form.customer.clone(),
            payment_method: form.payment_method,
            items_price,
            total_price: items_price,
        })
    }
}

/// What the backend did with a new order.
#[derive(Clone, Debug)]
pub enum OrderPlacement {
    /// Order recorded; show the confirmation.
    Confirmed(Order),
    /// Customer must finish paying on the external gateway.
    Redirect { order_id: Option<String>, payment_url: String },
}

impl OrderPlacement {
    /// Interprets the order-creation response for the chosen payment method.
    pub fn resolve(method: PaymentMethod, order: Option<Order>, payment_url: Option<String>, order_id: Option<String>) -> Result<Self, OrderError> {
        match (method.uses_gateway(), payment_url, order) {
            (true, Some(payment_url), order) => Ok(Self::Redirect { order_id: order_id.or(order.map(|o| o.id)), payment_url }),
            (true, None, _) => Err(OrderError::MissingPaymentUrl),
            (false, _, Some(order)) => Ok(Self::Confirmed(order)),
            (false, _, None) => Err(OrderError::MissingOrder),
        }
    }
}

/// Query parameters the payment gateway appends when sending the customer back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub order_id: String,
    pub transaction_id: Option<String>,
    pub status: Option<String>,
}

impl PaymentCallback {
    /// Parses the gateway return URL, or just its `orderId=..&transactionId=..&status=..` query.
    pub fn from_query(query: &str) -> Result<Self, OrderError> {
        let url = match Url::parse(query) {
            Ok(url) => url,
            Err(_) => {
                let mut url = Url::parse("http://localhost/").map_err(|_| OrderError::MissingOrder)?;
                url.set_query(Some(query.trim_start_matches('?')));
                url
            }
        };
        let mut callback = Self::default();
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "orderId" | "order_id" => callback.order_id = v.into_owned(),
                "transactionId" | "transaction_id" => callback.transaction_id = Some(v.into_owned()),
                "status" => callback.status = Some(v.into_owned()),
                _ => {}
            }
        }
        if callback.order_id.is_empty() { return Err(OrderError::MissingOrder); }
        Ok(callback)
    }

    pub fn reports_failure(&self) -> bool {
        matches!(self.status.as_deref(), Some(s) if s.eq_ignore_ascii_case("failed") || s.eq_ignore_ascii_case("cancelled"))
    }
}

impl Order {
    pub fn is_awaiting_payment(&self) -> bool {
        self.payment_method.uses_gateway() && !self.is_paid && self.status != OrderStatus::Canceled
    }
    pub fn item_count(&self) -> u32 { self.order_items.iter().map(|i| i.quantity).sum() }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { EmptyCart, MissingOrder, MissingPaymentUrl, PaymentFailed(String) }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCart => write!(f, "Cannot check out an empty cart"),
            Self::MissingOrder => write!(f, "Response did not contain an order"),
            Self::MissingPaymentUrl => write!(f, "Response did not contain a payment link"),
            Self::PaymentFailed(id) => write!(f, "Payment for order {} was not completed", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::CartLine;
    use crate::domain::value_objects::VariantKey;

    fn form(method: PaymentMethod) -> CheckoutForm {
        CheckoutForm {
            shipping: ShippingAddress { address: "12 Rue du Faubourg".into(), city: "Paris".into(), postal_code: "75008".into(), country: "France".into() },
            customer: CustomerInfo { name: "A. Client".into(), email: "client@example.com".into(), phone: "+33123456789".into() },
            payment_method: method,
        }
    }

    #[test]
    fn test_request_from_cart() {
        let cart = Cart::from_lines("USD", vec![CartLine {
            key: VariantKey::new("P1", Some("M".into()), Some("Noir".into())),
            name: "Blazer".into(),
            unit_price: Decimal::new(900, 0),
            image: None,
            quantity: 2,
        }]);
        let req = CreateOrderRequest::from_cart(&cart, &form(PaymentMethod::CashOnDelivery)).unwrap();
        assert_eq!(req.total_price, Decimal::new(1800, 0));
        assert_eq!(req.order_items[0].size.as_deref(), Some("M"));
        assert_eq!(CreateOrderRequest::from_cart(&Cart::new("USD"), &form(PaymentMethod::Online)), Err(OrderError::EmptyCart));
    }

    #[test]
    fn test_form_validation() {
        let mut f = form(PaymentMethod::Online);
        assert!(f.validate().is_ok());
        f.customer.email = "not-an-email".into();
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_placement_branches_on_method() {
        let redirect = OrderPlacement::resolve(PaymentMethod::Online, None, Some("https://pay.example/x".into()), Some("o-1".into())).unwrap();
        assert!(matches!(redirect, OrderPlacement::Redirect { ref order_id, .. } if order_id.as_deref() == Some("o-1")));
        assert_eq!(OrderPlacement::resolve(PaymentMethod::Online, None, None, None).unwrap_err(), OrderError::MissingPaymentUrl);
        assert_eq!(OrderPlacement::resolve(PaymentMethod::CashOnDelivery, None, None, None).unwrap_err(), OrderError::MissingOrder);
    }

    #[test]
    fn test_callback_query() {
        let cb = PaymentCallback::from_query("?orderId=o-9&transactionId=t-1&status=success").unwrap();
        assert_eq!(cb.order_id, "o-9");
        assert!(!cb.reports_failure());
        assert!(PaymentCallback::from_query("status=failed&orderId=o-9").unwrap().reports_failure());
        assert!(PaymentCallback::from_query("transactionId=t").is_err());
    }

    #[test]
    fn test_callback_query_is_decoded() {
        let cb = PaymentCallback::from_query("orderId=ord%2D7&status=payment+failed").unwrap();
        assert_eq!(cb.order_id, "ord-7");
        assert_eq!(cb.status.as_deref(), Some("payment failed"));

        let cb = PaymentCallback::from_query("https://shop.example.com/payment/return?order_id=o%2F3&transaction_id=t%201&status=FAILED").unwrap();
        assert_eq!(cb.order_id, "o/3");
        assert_eq!(cb.transaction_id.as_deref(), Some("t 1"));
        assert!(cb.reports_failure());
    }
}
