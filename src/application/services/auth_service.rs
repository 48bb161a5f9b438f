//! Token verification seam.
//!
//! Token issuance belongs to the platform's auth service; this engine only
//! verifies. The gateway calls [`TokenVerifier::verify`] once per connection
//! and the HTTP auth middleware once per request.

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// JWT claims structure issued by the platform
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (caller identity)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// External token verification collaborator.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Resolve a token to a caller identity, or `Unauthenticated`.
    async fn verify(&self, token: &str) -> Result<String, AppError>;
}

/// Verifier for platform-issued HS256 JWTs.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<String, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthenticated("Token expired".into())
                }
                _ => AppError::Unauthenticated("Invalid token".into()),
            })?;

        if token_data.claims.sub.is_empty() {
            return Err(AppError::Unauthenticated("Invalid token claims".into()));
        }

        Ok(token_data.claims.sub)
    }
}
