//! Catalog domain: items, shops, and delivery-ETA estimation.

pub mod eta;
pub mod item;
pub mod shop;

pub use eta::GeoPoint;
pub use item::Item;
pub use shop::Shop;
