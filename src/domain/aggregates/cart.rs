//! Cart Aggregate
//!
//! A cart is a list of lines keyed by [`VariantKey`]. Quantity changes go through
//! [`Cart::decide`], which checks increases against the product's stock minus whatever the
//! other variants of the same product already hold.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{Money, VariantKey};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub key: VariantKey,
    pub name: String,
    pub unit_price: Decimal,
    pub image: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self, currency: &str) -> Money { Money::new(self.unit_price, currency).multiply(self.quantity) }
}

/// Outcome of a requested quantity change, before it is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuantityDecision {
    /// Requested quantity equals the current one.
    Unchanged,
    Remove { previous: u32 },
    Set { previous: u32, quantity: u32 },
    /// Increase limited by stock; `quantity` is the largest allowed value.
    Clamped { previous: u32, requested: u32, quantity: u32 },
    /// No stock left for this product; the line stays as it is.
    Rejected { previous: u32, requested: u32 },
}

impl QuantityDecision {
    /// Quantity the line ends up with, `None` when it is removed or left untouched.
    pub fn target(&self) -> Option<u32> {
        match self {
            Self::Set { quantity, .. } | Self::Clamped { quantity, .. } => Some(*quantity),
            _ => None,
        }
    }
    pub fn previous(&self) -> u32 {
        match self {
            Self::Unchanged => 0,
            Self::Remove { previous } | Self::Set { previous, .. } | Self::Clamped { previous, .. } | Self::Rejected { previous, .. } => *previous,
        }
    }
    pub fn changes_cart(&self) -> bool { matches!(self, Self::Remove { .. } | Self::Set { .. } | Self::Clamped { .. }) }
}

#[derive(Clone, Debug)]
pub struct Cart {
    lines: Vec<CartLine>,
    currency: String,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { lines: vec![], currency: currency.to_string(), updated_at: Utc::now(), events: vec![] }
    }

    /// Builds a cart from stored or fetched lines. Lines with the same key are summed and
    /// zero-quantity lines are dropped.
    pub fn from_lines(currency: &str, lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new(currency);
        cart.replace_lines(lines);
        cart
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line(&self, key: &VariantKey) -> Option<&CartLine> { self.lines.iter().find(|l| &l.key == key) }
    pub fn quantity_of(&self, key: &VariantKey) -> u32 { self.line(key).map_or(0, |l| l.quantity) }
    pub fn item_count(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }

    pub fn product_total(&self, product_id: &str) -> u32 {
        self.lines.iter().filter(|l| l.key.product_id() == product_id).map(|l| l.quantity).sum()
    }

    /// Units of the same product held by lines other than `key`.
    pub fn other_variants_total(&self, key: &VariantKey) -> u32 {
        self.lines.iter().filter(|l| l.key.is_sibling_of(key)).map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, l| acc.add(&l.line_total(&self.currency)).unwrap_or(acc))
    }

    /// True when moving `key` to `requested` is an increase and needs a stock figure.
    pub fn requires_stock_check(&self, key: &VariantKey, requested: u32) -> bool {
        requested > self.quantity_of(key)
    }

    /// Decides what a request to set `key` to `requested` units does. `stock` is only
    /// consulted for increases; decreases never look at it.
    pub fn decide(&self, key: &VariantKey, requested: u32, stock: Option<u32>) -> Result<QuantityDecision, CartError> {
        let existing = self.line(key).map(|l| l.quantity);
        let current = existing.unwrap_or(0);
        if requested < 1 {
            return match existing {
                Some(previous) => Ok(QuantityDecision::Remove { previous }),
                None => Err(CartError::LineNotFound(key.clone())),
            };
        }
        if existing.is_some() && requested == current { return Ok(QuantityDecision::Unchanged); }
        if requested < current { return Ok(QuantityDecision::Set { previous: current, quantity: requested }); }

        let stock = stock.ok_or(CartError::StockUnknown)?;
        let max_allowed = stock.saturating_sub(self.other_variants_total(key));
        if max_allowed == 0 {
            Ok(QuantityDecision::Rejected { previous: current, requested })
        } else if max_allowed < requested {
            Ok(QuantityDecision::Clamped { previous: current, requested, quantity: max_allowed })
        } else {
            Ok(QuantityDecision::Set { previous: current, quantity: requested })
        }
    }

    /// Applies a decision to an existing line.
    pub fn apply(&mut self, key: &VariantKey, decision: &QuantityDecision) -> Result<(), CartError> {
        match decision {
            QuantityDecision::Unchanged => Ok(()),
            QuantityDecision::Rejected { requested, .. } => {
                self.raise_event(CartEvent::StockLimitReached { key: key.clone(), requested: *requested });
                Ok(())
            }
            QuantityDecision::Remove { .. } => {
                let before = self.lines.len();
                self.lines.retain(|l| &l.key != key);
                if self.lines.len() == before { return Err(CartError::LineNotFound(key.clone())); }
                self.raise_event(CartEvent::LineRemoved { key: key.clone() });
                self.touch();
                Ok(())
            }
            QuantityDecision::Set { quantity, .. } | QuantityDecision::Clamped { quantity, .. } => {
                let line = self.lines.iter_mut().find(|l| &l.key == key).ok_or_else(|| CartError::LineNotFound(key.clone()))?;
                let from = line.quantity;
                line.quantity = *quantity;
                self.raise_change(key, from, decision);
                self.touch();
                Ok(())
            }
        }
    }

    /// Applies a decision made for `template.key`, inserting the line when the cart does
    /// not hold that variant yet.
    pub fn apply_addition(&mut self, template: CartLine, decision: &QuantityDecision) -> Result<(), CartError> {
        if self.line(&template.key).is_some() {
            return self.apply(&template.key.clone(), decision);
        }
        match decision.target() {
            Some(quantity) => {
                let key = template.key.clone();
                self.lines.push(CartLine { quantity, ..template });
                self.raise_event(CartEvent::LineAdded { key: key.clone(), quantity });
                if let QuantityDecision::Clamped { requested, .. } = decision {
                    self.raise_event(CartEvent::QuantityAdjusted { key, requested: *requested, applied: quantity });
                }
                self.touch();
                Ok(())
            }
            None => self.apply(&template.key.clone(), decision),
        }
    }

    /// Replaces every line without raising events. Used when resynchronising with the
    /// backend or the local store.
    pub fn replace_lines(&mut self, lines: impl IntoIterator<Item = CartLine>) {
        self.lines.clear();
        for line in lines.into_iter().filter(|l| l.quantity > 0) {
            match self.lines.iter_mut().find(|l| l.key == line.key) {
                Some(existing) => existing.quantity += line.quantity,
                None => self.lines.push(line),
            }
        }
        self.touch();
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn raise_change(&mut self, key: &VariantKey, from: u32, decision: &QuantityDecision) {
        match decision {
            QuantityDecision::Clamped { requested, quantity, .. } => {
                self.raise_event(CartEvent::QuantityAdjusted { key: key.clone(), requested: *requested, applied: *quantity })
            }
            QuantityDecision::Set { quantity, .. } => {
                self.raise_event(CartEvent::QuantityChanged { key: key.clone(), from, to: *quantity })
            }
            _ => {}
        }
    }
    fn raise_event(&mut self, e: CartEvent) { self.events.push(DomainEvent::Cart(e)); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError { LineNotFound(VariantKey), StockUnknown, EmptyCart }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LineNotFound(key) => write!(f, "Cart line not found: {}", key),
            Self::StockUnknown => write!(f, "Stock is required to increase a quantity"),
            Self::EmptyCart => write!(f, "Cart is empty"),
        }
    }
}
