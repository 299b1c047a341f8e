// Ownership decision - pure, no I/O
use crate::auth::AuthenticatedIdentity;
use crate::db::models::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// A mutation may proceed only when the resolved identity is the
/// post's recorded owner. Identifiers are compared as canonical
/// values, never as stringified object references.
pub fn authorize(identity: &AuthenticatedIdentity, owner: &UserId) -> Decision {
    if identity.user_id == *owner {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
