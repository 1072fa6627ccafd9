//! Device-local persistence.
pub mod local_cart;

pub use local_cart::LocalCartStore;
