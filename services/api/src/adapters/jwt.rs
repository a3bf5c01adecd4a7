//! services/api/src/adapters/jwt.rs
//!
//! Bearer token verification. Implements the `TokenVerifier` port with HS256
//! JSON Web Tokens whose `sub` claim is the owner id.

use async_trait::async_trait;
use document_insights_core::domain::OwnerId;
use document_insights_core::ports::{PortError, PortResult, TokenVerifier};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct JwtTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> PortResult<OwnerId> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => debug!("Rejected expired token"),
                _ => debug!("JWT validation failed: {}", e),
            }
            PortError::Unauthorized
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(PortError::Unauthorized);
        }
        Ok(OwnerId::new(data.claims.sub))
    }
}
