//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a cart line: one product in one size/color combination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    product_id: String,
    size: Option<String>,
    color: Option<String>,
}

impl VariantKey {
    pub fn new(product_id: impl Into<String>, size: Option<String>, color: Option<String>) -> Self {
        Self { product_id: product_id.into(), size: normalize(size), color: normalize(color) }
    }
    pub fn plain(product_id: impl Into<String>) -> Self { Self::new(product_id, None, None) }
    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn size(&self) -> Option<&str> { self.size.as_deref() }
    pub fn color(&self) -> Option<&str> { self.color.as_deref() }

    /// Same product, different size/color.
    pub fn is_sibling_of(&self, other: &VariantKey) -> bool {
        self.product_id == other.product_id && self != other
    }
}

fn normalize(label: Option<String>) -> Option<String> {
    label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.product_id)?;
        if let Some(size) = &self.size { write!(f, " [{}]", size)?; }
        if let Some(color) = &self.color { write!(f, " ({})", color)?; }
        Ok(())
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn usd(amount: Decimal) -> Self { Self::new(amount, "USD") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
}

impl Default for Money { fn default() -> Self { Self::zero("USD") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount.round_dp(2), self.currency) }
}

#[derive(Debug, Clone)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_variant_key_normalizes_blank_labels() {
        let a = VariantKey::new("P1", Some("  ".into()), Some("".into()));
        assert_eq!(a, VariantKey::plain("P1"));
        assert_eq!(VariantKey::new("P1", Some(" M ".into()), None).size(), Some("M"));
    }
    #[test]
    fn test_variant_siblings() {
        let black = VariantKey::new("P1", Some("M".into()), Some("Black".into()));
        let ivory = VariantKey::new("P1", Some("M".into()), Some("Ivory".into()));
        assert!(black.is_sibling_of(&ivory));
        assert!(!black.is_sibling_of(&black.clone()));
        assert!(!black.is_sibling_of(&VariantKey::plain("P2")));
    }
    #[test]
    fn test_money_add() {
        let a = Money::usd(Decimal::new(100, 0));
        let b = Money::usd(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert!(a.add(&Money::zero("EUR")).is_err());
    }
}
