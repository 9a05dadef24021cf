//! Bearer-token identity.
//!
//! Tokens are opaque random strings issued exactly once, at
//! registration; only their SHA-256 hash is persisted. Verification
//! hashes the presented token and resolves the owning user, so a
//! database dump never yields usable credentials.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use cadence_core::{CadenceError, CdResult, IdentityVerifier, VerifiedIdentity};

use crate::engine::CadenceEngine;

/// Generate a fresh raw bearer token.
pub fn generate_token() -> String {
    let mut raw_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw_bytes);
    format!("cad_{}", URL_SAFE_NO_PAD.encode(raw_bytes))
}

/// Hash a raw token for storage or lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    URL_SAFE_NO_PAD.encode(digest)
}

#[async_trait]
impl IdentityVerifier for CadenceEngine {
    async fn verify(&self, token: &str) -> CdResult<VerifiedIdentity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CadenceError::InvalidCredential("empty token".into()));
        }

        let user = self
            .users
            .find_user_by_token_hash(&hash_token(token))
            .await?
            .ok_or_else(|| CadenceError::InvalidCredential("unknown token".into()))?;

        Ok(VerifiedIdentity::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_prefixed_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert!(a.starts_with("cad_"));
        assert_ne!(a, b);
    }

    #[test]
    fn hashing_is_deterministic_and_not_identity() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }
}
