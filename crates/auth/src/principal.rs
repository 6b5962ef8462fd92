use serde::{Deserialize, Serialize};

use freshcart_core::UserId;

/// Marketplace role attached to an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Customer,
}

/// Identity of an authenticated principal, as supplied by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: UserId,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn new(uid: UserId, email: impl Into<String>, role: Role) -> Self {
        Self {
            uid,
            email: email.into(),
            role,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    pub fn is_customer(&self) -> bool {
        self.role == Role::Customer
    }
}
