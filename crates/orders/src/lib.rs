//! Order domain: order records, the status lifecycle, and the checkout
//! request/error surface.

pub mod checkout;
pub mod order;

pub use checkout::{CheckoutRequest, PlaceOrderError};
pub use order::{Order, OrderLine, OrderStatus};
