//! Domain events
//!
//! Signals raised by cart, checkout and admin operations. Callers drain them after an
//! operation and turn them into user-facing notices.
use crate::domain::value_objects::VariantKey;
use rust_decimal::Decimal;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Cart(CartEvent),
    Order(OrderEvent),
    Admin(AdminEvent),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartEvent {
    LineAdded { key: VariantKey, quantity: u32 },
    QuantityChanged { key: VariantKey, from: u32, to: u32 },
    LineRemoved { key: VariantKey },
    QuantityAdjusted { key: VariantKey, requested: u32, applied: u32 },
    StockLimitReached { key: VariantKey, requested: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum OrderEvent {
    Placed { order_id: String, total: Decimal },
    AwaitingPayment { order_id: Option<String>, payment_url: String },
    PaymentVerified { order_id: String },
    /// The order went through but emptying the cart failed; the cart should be reloaded.
    CartNotCleared { order_id: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminEvent {
    MutationRolledBack { resource: &'static str, reason: String },
}

impl DomainEvent {
    /// Whether the event should be surfaced as a warning rather than a confirmation.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            DomainEvent::Cart(CartEvent::QuantityAdjusted { .. } | CartEvent::StockLimitReached { .. })
                | DomainEvent::Order(OrderEvent::CartNotCleared { .. })
                | DomainEvent::Admin(_)
        )
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainEvent::Cart(CartEvent::LineAdded { key, quantity }) => write!(f, "Added {} x {}", quantity, key),
            DomainEvent::Cart(CartEvent::QuantityChanged { key, from, to }) => write!(f, "{}: quantity {} -> {}", key, from, to),
            DomainEvent::Cart(CartEvent::LineRemoved { key }) => write!(f, "Removed {}", key),
            DomainEvent::Cart(CartEvent::QuantityAdjusted { key, requested, applied }) => {
                write!(f, "Limited stock for {}: requested {}, quantity adjusted to {}", key, requested, applied)
            }
            DomainEvent::Cart(CartEvent::StockLimitReached { key, .. }) => write!(f, "Stock limit reached for {}", key),
            DomainEvent::Order(OrderEvent::Placed { order_id, total }) => write!(f, "Order {} placed ({})", order_id, total),
            DomainEvent::Order(OrderEvent::AwaitingPayment { payment_url, .. }) => write!(f, "Continue payment at {}", payment_url),
            DomainEvent::Order(OrderEvent::PaymentVerified { order_id }) => write!(f, "Payment confirmed for order {}", order_id),
            DomainEvent::Order(OrderEvent::CartNotCleared { order_id, reason }) => {
                write!(f, "Order {} is placed but the cart could not be emptied: {}", order_id, reason)
            }
            DomainEvent::Admin(AdminEvent::MutationRolledBack { resource, reason }) => write!(f, "Could not update {}: {}", resource, reason),
        }
    }
}
