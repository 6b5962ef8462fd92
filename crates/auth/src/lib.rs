//! Identity-provider collaborator types.
//!
//! The order core trusts the authenticated principal it is handed; nothing
//! here performs authentication itself.

pub mod principal;
pub mod state;

pub use principal::{Principal, Role};
pub use state::AuthState;
