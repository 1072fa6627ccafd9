//! Checkout: turns the cart into an order and follows the payment gateway round trip.

use validator::Validate;
use crate::api::{CartRemote, OrderRemote};
use crate::domain::aggregates::{CheckoutForm, CreateOrderRequest, OrderError, OrderPlacement, PaymentCallback};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::services::cart::CartService;
use crate::{Order, Result};

pub struct CheckoutService<O> {
    orders: O,
    events: Vec<DomainEvent>,
}

impl<O: OrderRemote> CheckoutService<O> {
    pub fn new(orders: O) -> Self { Self { orders, events: vec![] } }

    /// Places an order for the current cart.
    ///
    /// A confirmed order empties the cart. A gateway redirect leaves it alone until the
    /// payment is verified, so an abandoned payment does not lose the customer's items.
    /// Once the backend has accepted the order this returns `Ok`, even when emptying the
    /// cart fails; that failure is reported as [`OrderEvent::CartNotCleared`].
    pub async fn place_order<R: CartRemote>(&mut self, cart: &CartService<R>, form: &CheckoutForm) -> Result<OrderPlacement> {
        form.validate()?;
        let snapshot = cart.load().await?;
        let request = CreateOrderRequest::from_cart(&snapshot, form)?;
        let placement = self.orders.create_order(&request).await?;
        match &placement {
            OrderPlacement::Confirmed(order) => {
                tracing::info!(order_id = %order.id, total = %order.total_price, "order placed");
                self.events.push(DomainEvent::Order(OrderEvent::Placed { order_id: order.id.clone(), total: order.total_price }));
                self.clear_after(cart, &order.id).await;
            }
            OrderPlacement::Redirect { order_id, payment_url } => {
                tracing::info!(order_id = ?order_id, %payment_url, "redirecting to payment gateway");
                self.events.push(DomainEvent::Order(OrderEvent::AwaitingPayment { order_id: order_id.clone(), payment_url: payment_url.clone() }));
            }
        }
        Ok(placement)
    }

    /// Confirms a payment after the gateway sends the customer back.
    pub async fn verify_payment<R: CartRemote>(&mut self, cart: &CartService<R>, callback: &PaymentCallback) -> Result<Order> {
        if callback.reports_failure() {
            tracing::warn!(order_id = %callback.order_id, status = ?callback.status, "gateway reported a failed payment");
            return Err(OrderError::PaymentFailed(callback.order_id.clone()).into());
        }
        let order = self.orders.verify_payment(callback).await?;
        self.events.push(DomainEvent::Order(OrderEvent::PaymentVerified { order_id: order.id.clone() }));
        self.clear_after(cart, &order.id).await;
        Ok(order)
    }

    async fn clear_after<R: CartRemote>(&mut self, cart: &CartService<R>, order_id: &str) {
        if let Err(e) = cart.clear().await {
            tracing::warn!(%order_id, error = %e, "order went through but the cart was not emptied");
            self.events.push(DomainEvent::Order(OrderEvent::CartNotCleared { order_id: order_id.to_string(), reason: e.to_string() }));
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
}
