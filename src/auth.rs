//! Credential hashing and bearer token issuance.
//!
//! Passwords are stretched with PBKDF2-HMAC-SHA256 and stored as
//! `<iterations>$<salt>$<hash>` (base64), so stored hashes keep verifying
//! after the configured iteration count changes. Tokens are HS256 JWTs
//! carrying the user id; they never expire on their own and are only valid
//! while persisted in the user's token list.

use std::num::NonZeroU32;

use base64::{engine::general_purpose, Engine};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::{
    digest, pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Access kind recorded next to every issued token.
pub const AUTH_ACCESS: &str = "auth";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 16;
const CREDENTIAL_LEN: usize = digest::SHA256_OUTPUT_LEN;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub access: String,
    pub iat: i64,
    pub jti: String,
}

impl TokenClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl AuthKeys {
    pub fn new(secret: &str, iterations: NonZeroU32) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        AuthKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            iterations,
            rng: SystemRandom::new(),
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let salt: [u8; SALT_LEN] = self.random_bytes()?;

        let mut credential = [0u8; CREDENTIAL_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut credential,
        );

        Ok(format!(
            "{}${}${}",
            self.iterations,
            general_purpose::STANDARD.encode(salt),
            general_purpose::STANDARD.encode(credential)
        ))
    }

    /// Checks `password` against a hash produced by [`AuthKeys::hash_password`].
    /// A malformed stored hash never verifies.
    pub fn verify_password(&self, password: &str, stored: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        let (Some(iterations), Some(salt), Some(credential)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        let Some(iterations) = iterations.parse().ok().and_then(NonZeroU32::new) else {
            return false;
        };
        let (Ok(salt), Ok(credential)) = (
            general_purpose::STANDARD.decode(salt),
            general_purpose::STANDARD.decode(credential),
        ) else {
            return false;
        };

        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            password.as_bytes(),
            &credential,
        )
        .is_ok()
    }

    pub fn issue_token(&self, user_id: i64) -> Result<String, AppError> {
        let nonce: [u8; NONCE_LEN] = self.random_bytes()?;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            access: AUTH_ACCESS.to_string(),
            iat: chrono::Utc::now().timestamp(),
            jti: general_purpose::URL_SAFE_NO_PAD.encode(nonce),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
    }

    /// Returns the claims of a token signed with our secret, or `None` when
    /// the signature or payload does not check out.
    pub fn verify_token(&self, token: &str) -> Option<TokenClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).ok()?;
        (data.claims.access == AUTH_ACCESS).then_some(data.claims)
    }

    fn random_bytes<const N: usize>(&self) -> Result<[u8; N], AppError> {
        let mut bytes = [0u8; N];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal("failed to generate random bytes".to_string()))?;
        Ok(bytes)
    }
}
