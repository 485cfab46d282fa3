//! Session token verification.
//!
//! The gate only needs "token in, claims or typed failure out"; the
//! [`TokenVerifier`] trait is that seam. [`JwtVerifier`] is the production
//! implementation: HMAC-signed JWTs over a shared secret.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    /// Role name.
    pub role: String,
    /// Expiration (seconds since epoch).
    pub exp: u64,
}

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is missing claim {0:?}")]
    MissingClaim(String),

    #[error("token algorithm is not accepted")]
    Algorithm,

    #[error("token claim cannot be used as a header value")]
    UnusableClaim,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            ErrorKind::MissingRequiredClaim(claim) => VerifyError::MissingClaim(claim.clone()),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => VerifyError::Algorithm,
            // Claims are deserialized before registered-claim validation, so a payload
            // lacking `sub`, `role` or `exp` surfaces as a JSON error.
            ErrorKind::Json(_) => VerifyError::MissingClaim("sub/role/exp".to_string()),
            _ => VerifyError::Malformed,
        }
    }
}

/// Verifies session tokens.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Check signature and expiry, returning the decoded claims.
    async fn verify(&self, token: &str) -> Result<Claims, VerifyError>;
}

/// HMAC (HS256/384/512) JWT verifier over a shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.leeway_secs)
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}
