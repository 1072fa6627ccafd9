//! Cart service: quantity reconciliation for guest and member sessions.
//!
//! Guests keep their cart in the [`LocalCartStore`]; every change is one statement
//! against it. Members mirror the backend cart. The backend only offers "add a delta", so a
//! quantity is reset with two calls (remove the old amount, add the new one). Those two
//! calls are not atomic; when either fails the mirror is reloaded from the backend and the
//! error is returned.

use tokio::sync::Mutex;
use crate::api::CartRemote;
use crate::domain::aggregates::{Cart, CartError, CartLine, ProductError, QuantityDecision};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::VariantKey;
use crate::store::LocalCartStore;
use crate::{Product, ProductStatus, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartMode { Guest, Member }

/// Result of a quantity change.
#[derive(Clone, Debug)]
pub struct CartUpdate {
    pub decision: QuantityDecision,
    pub events: Vec<DomainEvent>,
    pub cart: Cart,
}

/// Result of moving the guest cart into the member cart.
#[derive(Clone, Debug)]
pub struct CartMerge {
    pub cart: Cart,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug)]
struct CartState {
    mode: CartMode,
    mirror: Cart,
}

pub struct CartService<R> {
    remote: R,
    local: LocalCartStore,
    currency: String,
    state: Mutex<CartState>,
}

impl<R: CartRemote> CartService<R> {
    pub fn new(remote: R, local: LocalCartStore, mode: CartMode, currency: &str) -> Self {
        Self {
            remote,
            local,
            currency: currency.to_string(),
            state: Mutex::new(CartState { mode, mirror: Cart::new(currency) }),
        }
    }

    pub async fn mode(&self) -> CartMode { self.state.lock().await.mode }

    /// Current cart: the local store for guests, the backend cart for members.
    pub async fn load(&self) -> Result<Cart> {
        let mut state = self.state.lock().await;
        self.snapshot(&mut state).await
    }

    /// Adds `quantity` units of a product variant, subject to stock.
    pub async fn add_product(&self, product: &Product, size: Option<&str>, color: Option<&str>, quantity: u32) -> Result<CartUpdate> {
        if !product.is_live || product.status == ProductStatus::Draft {
            return Err(ProductError::NotPurchasable(product.name.clone()).into());
        }
        let key = product.variant_key(size, color)?;
        let template = product.to_cart_line(key);
        let mut state = self.state.lock().await;
        let cart = self.snapshot(&mut state).await?;
        let requested = cart.quantity_of(&template.key).saturating_add(quantity.max(1));
        self.change(&mut state, cart, template.key.clone(), requested, Some(template)).await
    }

    /// Sets the quantity of an existing line. Below 1 removes it.
    pub async fn update_quantity(&self, key: &VariantKey, requested: u32) -> Result<CartUpdate> {
        let mut state = self.state.lock().await;
        let cart = self.snapshot(&mut state).await?;
        self.change(&mut state, cart, key.clone(), requested, None).await
    }

    pub async fn remove(&self, key: &VariantKey) -> Result<CartUpdate> { self.update_quantity(key, 0).await }

    /// Empties the cart, e.g. after a confirmed order.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.mode {
            CartMode::Guest => self.local.clear().await,
            CartMode::Member => {
                let lines = self.snapshot(&mut state).await?.lines().to_vec();
                for line in &lines {
                    if let Err(e) = self.remote.add_to_cart(&line.key, -i64::from(line.quantity)).await {
                        self.resync(&mut state).await;
                        return Err(e);
                    }
                }
                state.mirror.clear();
                Ok(())
            }
        }
    }

    /// Switches to member mode and moves the guest cart into the backend cart.
    pub async fn sign_in(&self) -> Result<CartMerge> {
        self.state.lock().await.mode = CartMode::Member;
        self.merge_guest_cart().await
    }

    pub async fn sign_out(&self) {
        let mut state = self.state.lock().await;
        state.mode = CartMode::Guest;
        state.mirror.clear();
    }

    /// Adds every guest line on top of the backend cart, each one bounded by the product's
    /// current stock. A guest line leaves the local store as soon as the backend has it, so
    /// a merge that fails halfway can be retried without counting a line twice.
    pub async fn merge_guest_cart(&self) -> Result<CartMerge> {
        let mut state = self.state.lock().await;
        if state.mode != CartMode::Member {
            return Ok(CartMerge { cart: self.local.load(&self.currency).await?, events: vec![] });
        }
        let guest = self.local.lines().await?;
        if guest.is_empty() {
            return Ok(CartMerge { cart: self.snapshot(&mut state).await?, events: vec![] });
        }

        let mut cart = self.snapshot(&mut state).await?;
        for line in guest {
            let key = line.key.clone();
            let requested = cart.quantity_of(&key).saturating_add(line.quantity);
            let merged: Result<QuantityDecision> = match self.remote.fetch_stock(key.product_id()).await {
                Ok(stock) => cart.decide(&key, requested, Some(stock)).map_err(Into::into),
                Err(e) => Err(e),
            };
            let decision = match merged {
                // Other variants already use the stock; the backend line is never lowered.
                Ok(QuantityDecision::Clamped { previous, requested, quantity }) if quantity <= previous => {
                    QuantityDecision::Rejected { previous, requested }
                }
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "guest cart merge failed");
                    self.resync(&mut state).await;
                    return Err(e);
                }
            };
            if let Some(target) = decision.target() {
                if let Err(e) = self.remote.add_to_cart(&key, i64::from(target) - i64::from(decision.previous())).await {
                    tracing::warn!(%key, error = %e, "guest cart merge failed");
                    self.resync(&mut state).await;
                    return Err(e);
                }
            }
            self.local.remove(&key).await?;
            cart.apply_addition(CartLine { quantity: 0, ..line }, &decision)?;
        }

        let events = cart.take_events();
        for event in events.iter().filter(|e| e.is_warning()) {
            tracing::warn!("{}", event);
        }
        let cart = self.snapshot(&mut state).await?;
        tracing::info!(lines = cart.lines().len(), "merged guest cart");
        Ok(CartMerge { cart, events })
    }

    /// Cart the next decision is made against. Members always decide on the server's
    /// current lines.
    async fn snapshot(&self, state: &mut CartState) -> Result<Cart> {
        match state.mode {
            CartMode::Guest => self.local.load(&self.currency).await,
            CartMode::Member => {
                let lines = self.remote.fetch_cart().await?;
                state.mirror.replace_lines(lines);
                Ok(state.mirror.clone())
            }
        }
    }

    async fn change(&self, state: &mut CartState, mut cart: Cart, key: VariantKey, requested: u32, template: Option<CartLine>) -> Result<CartUpdate> {
        if template.is_none() && cart.line(&key).is_none() {
            return Err(CartError::LineNotFound(key).into());
        }
        let stock = if cart.requires_stock_check(&key, requested) {
            Some(self.remote.fetch_stock(key.product_id()).await?)
        } else {
            None
        };
        let decision = cart.decide(&key, requested, stock)?;

        match state.mode {
            CartMode::Guest => self.persist_local(&cart, &key, &decision, template.as_ref()).await?,
            CartMode::Member => {
                if let Err(e) = self.push_remote(&key, &decision).await {
                    tracing::warn!(%key, error = %e, "cart update failed, reloading from server");
                    self.resync(state).await;
                    return Err(e);
                }
            }
        }

        match template {
            Some(template) => cart.apply_addition(template, &decision)?,
            None => cart.apply(&key, &decision)?,
        }
        let events = cart.take_events();
        for event in events.iter().filter(|e| e.is_warning()) {
            tracing::warn!(%key, "{}", event);
        }
        if state.mode == CartMode::Member { state.mirror = cart.clone(); }
        Ok(CartUpdate { decision, events, cart })
    }

    async fn persist_local(&self, cart: &Cart, key: &VariantKey, decision: &QuantityDecision, template: Option<&CartLine>) -> Result<()> {
        match (decision, decision.target()) {
            (QuantityDecision::Remove { .. }, _) => { self.local.remove(key).await?; }
            (_, Some(quantity)) => {
                let base = cart.line(key).or(template).ok_or_else(|| CartError::LineNotFound(key.clone()))?;
                self.local.save_line(&CartLine { quantity, ..base.clone() }).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Remove-then-add against the backend cart.
    async fn push_remote(&self, key: &VariantKey, decision: &QuantityDecision) -> Result<()> {
        match decision {
            QuantityDecision::Remove { previous } => self.remote.add_to_cart(key, -i64::from(*previous)).await,
            QuantityDecision::Set { previous, quantity } | QuantityDecision::Clamped { previous, quantity, .. } => {
                if previous == quantity { return Ok(()); }
                if *previous > 0 { self.remote.add_to_cart(key, -i64::from(*previous)).await?; }
                self.remote.add_to_cart(key, i64::from(*quantity)).await
            }
            QuantityDecision::Unchanged | QuantityDecision::Rejected { .. } => Ok(()),
        }
    }

    async fn resync(&self, state: &mut CartState) {
        match self.remote.fetch_cart().await {
            Ok(lines) => state.mirror.replace_lines(lines),
            Err(e) => tracing::warn!(error = %e, "could not reload cart from server"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::aggregates::ProductDraft;
    use crate::domain::events::CartEvent;
    use crate::StorefrontError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// In-memory backend cart that can be told to fail the n-th add call.
    #[derive(Default)]
    pub(crate) struct FakeRemote {
        pub lines: StdMutex<Vec<CartLine>>,
        pub stock: StdMutex<HashMap<String, u32>>,
        pub calls: StdMutex<Vec<(VariantKey, i64)>>,
        pub stock_lookups: StdMutex<u32>,
        pub cart_fetches: StdMutex<u32>,
        pub fail_on_call: Option<usize>,
    }

    impl FakeRemote {
        pub(crate) fn with_stock(stock: &[(&str, u32)]) -> Self {
            Self { stock: StdMutex::new(stock.iter().map(|(k, v)| (k.to_string(), *v)).collect()), ..Default::default() }
        }
    }

    #[async_trait]
    impl CartRemote for FakeRemote {
        async fn fetch_cart(&self) -> Result<Vec<CartLine>> {
            *self.cart_fetches.lock().unwrap() += 1;
            Ok(self.lines.lock().unwrap().clone())
        }

        async fn add_to_cart(&self, key: &VariantKey, delta: i64) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((key.clone(), delta));
            if self.fail_on_call == Some(calls.len()) {
                return Err(StorefrontError::Api { status: 500, message: "cart unavailable".into() });
            }
            let mut lines = self.lines.lock().unwrap();
            match lines.iter_mut().find(|l| &l.key == key) {
                Some(line) => line.quantity = (i64::from(line.quantity) + delta).max(0) as u32,
                None if delta > 0 => lines.push(CartLine { key: key.clone(), name: "Item".into(), unit_price: Decimal::new(100, 0), image: None, quantity: delta as u32 }),
                None => {}
            }
            lines.retain(|l| l.quantity > 0);
            Ok(())
        }

        async fn fetch_stock(&self, product_id: &str) -> Result<u32> {
            *self.stock_lookups.lock().unwrap() += 1;
            self.stock.lock().unwrap().get(product_id).copied().ok_or_else(|| StorefrontError::NotFound(product_id.to_string()))
        }
    }

    pub(crate) fn product(id: &str, stock: u32) -> Product {
        ProductDraft {
            name: format!("Product {}", id),
            price: Decimal::new(500, 0),
            stock,
            sizes: vec!["M".into(), "L".into()],
            is_live: true,
            ..Default::default()
        }
        .preview(id.to_string())
    }

    fn key(size: &str) -> VariantKey { VariantKey::new("P1", Some(size.into()), None) }

    fn backend_line(size: &str, quantity: u32) -> CartLine {
        CartLine { key: key(size), name: "Product P1".into(), unit_price: Decimal::new(500, 0), image: None, quantity }
    }

    async fn guest(remote: FakeRemote) -> CartService<FakeRemote> {
        CartService::new(remote, LocalCartStore::in_memory().await.unwrap(), CartMode::Guest, "USD")
    }

    #[tokio::test]
    async fn test_guest_add_and_clamp() {
        let service = guest(FakeRemote::with_stock(&[("P1", 5)])).await;
        let p = product("P1", 5);
        service.add_product(&p, Some("M"), None, 2).await.unwrap();
        service.add_product(&p, Some("L"), None, 2).await.unwrap();

        let update = service.update_quantity(&key("M"), 4).await.unwrap();
        assert_eq!(update.decision, QuantityDecision::Clamped { previous: 2, requested: 4, quantity: 3 });
        assert!(update.events.iter().any(|e| matches!(e, DomainEvent::Cart(CartEvent::QuantityAdjusted { applied: 3, .. }))));

        let cart = service.load().await.unwrap();
        assert_eq!(cart.quantity_of(&key("M")), 3);
        assert_eq!(cart.product_total("P1"), 5);
    }

    #[tokio::test]
    async fn test_guest_rejected_when_stock_used() {
        let service = guest(FakeRemote::with_stock(&[("P1", 3)])).await;
        let p = product("P1", 3);
        service.add_product(&p, Some("M"), None, 3).await.unwrap();
        let update = service.add_product(&p, Some("L"), None, 1).await.unwrap();
        assert!(matches!(update.decision, QuantityDecision::Rejected { .. }));
        assert!(matches!(update.events[..], [DomainEvent::Cart(CartEvent::StockLimitReached { .. })]));
        let cart = service.load().await.unwrap();
        assert_eq!(cart.lines().len(), 1);
    }

    #[tokio::test]
    async fn test_decrease_skips_stock_lookup() {
        let remote = FakeRemote::with_stock(&[("P1", 10)]);
        let service = guest(remote).await;
        service.add_product(&product("P1", 10), Some("M"), None, 4).await.unwrap();
        let lookups = *service.remote.stock_lookups.lock().unwrap();
        service.remote.stock.lock().unwrap().insert("P1".into(), 0);

        service.update_quantity(&key("M"), 1).await.unwrap();
        assert_eq!(*service.remote.stock_lookups.lock().unwrap(), lookups);
        let update = service.update_quantity(&key("M"), 0).await.unwrap();
        assert_eq!(update.decision, QuantityDecision::Remove { previous: 1 });
        assert!(service.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_line() {
        let service = guest(FakeRemote::default()).await;
        let err = service.update_quantity(&key("M"), 2).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Cart(CartError::LineNotFound(_))));
    }

    #[tokio::test]
    async fn test_add_requires_size_choice() {
        let service = guest(FakeRemote::with_stock(&[("P1", 5)])).await;
        let err = service.add_product(&product("P1", 5), None, None, 1).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Product(ProductError::SizeRequired)));
    }

    #[tokio::test]
    async fn test_member_update_is_remove_then_add() {
        let remote = FakeRemote::with_stock(&[("P1", 10)]);
        let service = CartService::new(remote, LocalCartStore::in_memory().await.unwrap(), CartMode::Member, "USD");
        service.add_product(&product("P1", 10), Some("M"), None, 2).await.unwrap();
        service.update_quantity(&key("M"), 5).await.unwrap();
        let calls = service.remote.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(key("M"), 2), (key("M"), -2), (key("M"), 5)]);
        assert_eq!(service.load().await.unwrap().quantity_of(&key("M")), 5);
    }

    #[tokio::test]
    async fn test_member_failure_resyncs_from_server() {
        let mut remote = FakeRemote::with_stock(&[("P1", 10)]);
        remote.fail_on_call = Some(3);
        let service = CartService::new(remote, LocalCartStore::in_memory().await.unwrap(), CartMode::Member, "USD");
        service.add_product(&product("P1", 10), Some("M"), None, 2).await.unwrap();

        // call 2 removes the old quantity, call 3 (the add) fails
        assert!(service.update_quantity(&key("M"), 4).await.is_err());
        let state = service.state.lock().await;
        assert!(state.mirror.line(&key("M")).is_none(), "mirror follows the server, which lost the line");
    }

    #[tokio::test]
    async fn test_sign_in_merges_guest_cart() {
        let service = guest(FakeRemote::with_stock(&[("P1", 10)])).await;
        service.add_product(&product("P1", 10), Some("L"), None, 2).await.unwrap();
        let cart = service.sign_in().await.unwrap().cart;
        assert_eq!(service.mode().await, CartMode::Member);
        assert_eq!(cart.quantity_of(&key("L")), 2);
        assert!(service.local.lines().await.unwrap().is_empty());

        service.clear().await.unwrap();
        assert!(service.remote.lines.lock().unwrap().is_empty());
        service.sign_out().await;
        assert!(service.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_member_add_fetches_cart_once() {
        let remote = FakeRemote::with_stock(&[("P1", 10)]);
        let service = CartService::new(remote, LocalCartStore::in_memory().await.unwrap(), CartMode::Member, "USD");
        service.add_product(&product("P1", 10), Some("M"), None, 2).await.unwrap();
        assert_eq!(*service.remote.cart_fetches.lock().unwrap(), 1);
        service.update_quantity(&key("M"), 3).await.unwrap();
        assert_eq!(*service.remote.cart_fetches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_merge_respects_stock_held_by_backend() {
        let remote = FakeRemote::with_stock(&[("P1", 3)]);
        remote.lines.lock().unwrap().push(backend_line("L", 2));
        let service = guest(remote).await;
        service.add_product(&product("P1", 3), Some("M"), None, 3).await.unwrap();

        let merge = service.sign_in().await.unwrap();
        assert_eq!(merge.cart.product_total("P1"), 3);
        assert_eq!(merge.cart.quantity_of(&key("M")), 1);
        assert_eq!(merge.cart.quantity_of(&key("L")), 2);
        assert!(merge.events.iter().any(|e| matches!(e, DomainEvent::Cart(CartEvent::QuantityAdjusted { requested: 3, applied: 1, .. }))));
        assert_eq!(service.remote.calls.lock().unwrap().clone(), vec![(key("M"), 1)]);
        assert!(service.local.lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_drops_lines_without_stock() {
        let remote = FakeRemote::with_stock(&[("P1", 2)]);
        remote.lines.lock().unwrap().push(backend_line("L", 2));
        let service = guest(remote).await;
        service.add_product(&product("P1", 2), Some("M"), None, 1).await.unwrap();

        let merge = service.sign_in().await.unwrap();
        assert_eq!(merge.cart.product_total("P1"), 2);
        assert!(matches!(merge.events[..], [DomainEvent::Cart(CartEvent::StockLimitReached { .. })]));
        assert!(service.remote.calls.lock().unwrap().is_empty());
        assert!(service.local.lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_retry_does_not_double_lines() {
        let mut remote = FakeRemote::with_stock(&[("P1", 10)]);
        remote.fail_on_call = Some(2);
        let service = guest(remote).await;
        let p = product("P1", 10);
        service.add_product(&p, Some("M"), None, 1).await.unwrap();
        service.add_product(&p, Some("L"), None, 1).await.unwrap();

        assert!(service.sign_in().await.is_err());
        assert_eq!(service.local.lines().await.unwrap().len(), 1);

        let merge = service.merge_guest_cart().await.unwrap();
        assert_eq!(merge.cart.quantity_of(&key("M")), 1);
        assert_eq!(merge.cart.quantity_of(&key("L")), 1);
        assert!(service.local.lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draft_products_cannot_be_added() {
        let service = guest(FakeRemote::with_stock(&[("P1", 10)])).await;
        let mut p = product("P1", 10);
        p.status = ProductStatus::Draft;
        assert!(matches!(service.add_product(&p, Some("M"), None, 1).await, Err(StorefrontError::Product(ProductError::NotPurchasable(_)))));
    }
}
