//! Cart Records

use std::fmt;

use atelier::carts::{CartContents, CartLine, fingerprint::CartProtection};
use serde::{Deserialize, Serialize};

use crate::{domain::users::records::UserUuid, uuids::TypedUuid};

/// Cart UUID
pub type CartUuid = TypedUuid<StoredCart>;

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    /// Anonymous visitor identified by the `cart_session` cookie.
    Session(String),

    /// Authenticated buyer.
    User(UserUuid),
}

impl CartOwner {
    #[must_use]
    pub fn user(&self) -> Option<UserUuid> {
        match self {
            Self::Session(_) => None,
            Self::User(user) => Some(*user),
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::User(user) => write!(f, "user:{user}"),
        }
    }
}

/// A cart as held by a [`CartStore`](crate::domain::carts::stores::CartStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCart {
    pub uuid: CartUuid,
    pub contents: CartContents,
    pub protection: Option<CartProtection>,
}

impl StoredCart {
    /// An empty cart with a fresh id.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            uuid: CartUuid::new(),
            contents: CartContents::new(),
            protection: None,
        }
    }
}

/// What buyers see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub uuid: CartUuid,
    pub lines: Vec<CartLine>,
    pub items_total: u64,
    pub total_quantity: u32,
    pub content_hash: String,

    /// Signature the client must present to review or check out. `None` for an empty cart.
    pub fingerprint: Option<String>,

    /// Some snapshot prices were refreshed from the catalog.
    pub repriced: bool,
}

impl CartView {
    pub(crate) fn new(cart: &StoredCart, repriced: bool) -> Self {
        Self {
            uuid: cart.uuid,
            lines: cart.contents.lines().to_vec(),
            items_total: cart.contents.items_total(),
            total_quantity: cart.contents.total_quantity(),
            content_hash: cart.contents.content_hash(),
            fingerprint: cart
                .protection
                .as_ref()
                .map(|protection| protection.signature.clone()),
            repriced,
        }
    }
}
