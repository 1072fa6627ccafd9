//! Application services built on the API client, the guest store and the query cache.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;

pub use admin::AdminService;
pub use cart::{CartMerge, CartMode, CartService, CartUpdate};
pub use catalog::{CatalogService, FilterOptions};
pub use checkout::CheckoutService;
