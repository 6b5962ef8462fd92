use serde::{Deserialize, Serialize};

use freshcart_core::{DomainError, DomainResult, ItemId, ShopId};

/// A catalog item as seen by the versioned item store.
///
/// `version` is a monotonic counter owned by the store: every successful
/// write (stock commit or owner edit) increments it by exactly 1. Stock is
/// `u32`, so no state — transient or committed — can ever hold a negative
/// quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub shop_id: ShopId,
    pub name: String,
    pub description: String,
    pub image_url: String,
    /// Price in smallest currency unit (e.g., cents).
    pub price: u64,
    pub stock: u32,
    pub version: u64,
}

impl Item {
    /// Build a new item at version 0 (the store assigns the first real
    /// version on insert).
    pub fn new(
        id: ItemId,
        shop_id: ShopId,
        name: impl Into<String>,
        price: u64,
        stock: u32,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }

        Ok(Self {
            id,
            shop_id,
            name,
            description: String::new(),
            image_url: String::new(),
            price,
            stock,
            version: 0,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    pub fn belongs_to(&self, shop_id: ShopId) -> bool {
        self.shop_id == shop_id
    }
}
