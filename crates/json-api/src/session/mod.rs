//! Visitor sessions
//!
//! Every storefront request is attributed to a [`Visitor`]: an authenticated buyer, an
//! anonymous `cart_session` cookie, or the operator.

pub(crate) mod middleware;
pub(crate) mod operator;

use atelier_app::domain::{carts::records::CartOwner, users::records::UserUuid};
use salvo::http::{Request, header::AUTHORIZATION};

/// Cookie naming the anonymous cart.
pub(crate) const CART_SESSION_COOKIE: &str = "cart_session";

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Visitor {
    /// Whose cart the request reads and mutates.
    pub(crate) owner: CartOwner,

    /// The `cart_session` cookie, when the browser sent one.
    pub(crate) session: Option<String>,

    /// The bearer token matched the operator token.
    pub(crate) operator: bool,
}

impl Visitor {
    pub(crate) fn user(&self) -> Option<UserUuid> {
        self.owner.user()
    }
}

pub(crate) fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}

/// Session ids this server issues: 32 lowercase hex characters.
pub(crate) fn is_session_id(value: &str) -> bool {
    value.len() == 32 && value.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
}
