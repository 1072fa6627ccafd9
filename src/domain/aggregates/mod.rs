//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{ImageUpload, ProductDraft, ProductError};
pub use order::{CheckoutForm, CreateOrderRequest, OrderError, OrderPlacement, PaymentCallback};
pub use cart::{Cart, CartError, CartLine, QuantityDecision};
