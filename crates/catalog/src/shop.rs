use serde::{Deserialize, Serialize};

use freshcart_core::{ShopId, UserId};

use crate::eta::GeoPoint;

/// A shop: reference data consumed read-only by the order core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub location: GeoPoint,
    pub owner_id: UserId,
}

impl Shop {
    pub fn new(id: ShopId, name: impl Into<String>, location: GeoPoint, owner_id: UserId) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            owner_id,
        }
    }
}
