use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::db::models::UserId;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// User identity extracted from a verified credential. Produced per
/// request and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub user_id: UserId,
}

/// Issues and verifies bearer tokens of the form
/// `<user-uuid>.<expiry-unix>.<hex signature>`, signed with a shared
/// secret injected at construction.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a token for a user, valid for the given number of hours.
    pub fn issue(&self, user_id: UserId, hours: u64) -> String {
        let expires = (Utc::now() + Duration::hours(hours as i64)).timestamp();
        self.issue_at(user_id, expires)
    }

    fn issue_at(&self, user_id: UserId, expires: i64) -> String {
        let payload = format!("{}.{}", user_id, expires);
        format!("{}.{}", payload, self.sign(&payload))
    }

    /// Verify a credential and extract the identity it carries.
    ///
    /// Every rejection reason collapses into the same `Unauthenticated`
    /// error so callers cannot distinguish a missing token from a
    /// malformed, expired, or forged one.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, AppError> {
        let mut parts = token.split('.');
        let (user, expires, signature) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(u), Some(e), Some(s), None) if !u.is_empty() => (u, e, s),
            _ => return Err(AppError::Unauthenticated),
        };

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AppError::Unauthenticated)?;
        mac.update(user.as_bytes());
        mac.update(b".");
        mac.update(expires.as_bytes());
        let signature = hex::decode(signature).map_err(|_| AppError::Unauthenticated)?;
        mac.verify_slice(&signature)
            .map_err(|_| AppError::Unauthenticated)?;

        let expires: i64 = expires.parse().map_err(|_| AppError::Unauthenticated)?;
        if expires < Utc::now().timestamp() {
            return Err(AppError::Unauthenticated);
        }

        let user_id: UserId = user.parse().map_err(|_| AppError::Unauthenticated)?;
        Ok(AuthenticatedIdentity { user_id })
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Generate a random 32-byte hex secret for installations that have
/// not configured one.
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new("test-secret")
    }

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let v = verifier();
        let user_id = UserId::generate();
        let token = v.issue(user_id, 1);
        let identity = v.verify(&token).unwrap();
        assert_eq!(identity.user_id, user_id);
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(verifier().verify("").is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        let v = verifier();
        assert!(v.verify("not-a-token").is_err());
        assert!(v.verify("a.b").is_err());
        assert!(v.verify("a.b.c.d").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let v = verifier();
        let token = v.issue_at(UserId::generate(), Utc::now().timestamp() - 60);
        assert!(v.verify(&token).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = TokenVerifier::new("other-secret").issue(UserId::generate(), 1);
        assert!(verifier().verify(&token).is_err());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let v = verifier();
        let token = v.issue(UserId::generate(), 1);
        let forged = format!("{}{}", UserId::generate(), &token[36..]);
        assert!(v.verify(&forged).is_err());
    }

    #[test]
    fn rejections_are_indistinguishable() {
        let v = verifier();
        let expired = v.issue_at(UserId::generate(), 0);
        for token in ["", "garbage", expired.as_str()] {
            match v.verify(token) {
                Err(AppError::Unauthenticated) => {}
                other => panic!("expected Unauthenticated, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn generate_secret_is_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
