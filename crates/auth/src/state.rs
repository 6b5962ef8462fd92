use serde::{Deserialize, Serialize};

use crate::principal::Principal;

/// Authentication state as a sum type: exactly one variant is active at a
/// time. Consumed by the presentation layer; the order core only ever sees
/// the principal inside `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    Idle,
    Loading,
    Authenticated(Principal),
    Failed { message: String },
}

impl AuthState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthState::Authenticated(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

impl Default for AuthState {
    fn default() -> Self {
        AuthState::Idle
    }
}
