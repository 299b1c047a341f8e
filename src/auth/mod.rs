pub mod password;
pub mod tokens;

pub use tokens::{AuthenticatedIdentity, TokenVerifier};
