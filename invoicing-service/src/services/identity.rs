//! Caller identity, delegated to the hosted auth provider.
//!
//! The provider issues HS256 access tokens signed with a project secret.
//! Verification here is purely local: signature, expiry and audience.

use crate::error::InvoicingError;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

/// Audience the hosted provider stamps on user sessions.
pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// Stable identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a caller credential (optionally `Bearer `-prefixed).
    async fn verify(&self, credential: &str) -> Result<Identity, InvoicingError>;
}

/// Claims carried by provider access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    #[instrument(skip(self, credential))]
    async fn verify(&self, credential: &str) -> Result<Identity, InvoicingError> {
        let token = credential
            .strip_prefix("Bearer ")
            .unwrap_or(credential)
            .trim();
        if token.is_empty() {
            return Err(InvoicingError::Unauthorized("Missing access token".to_string()));
        }

        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            warn!(error = %e, "Access token rejected");
            InvoicingError::Unauthorized("Invalid access token".to_string())
        })?;

        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| {
            warn!("Access token subject is not a UUID");
            InvoicingError::Unauthorized("Invalid access token subject".to_string())
        })?;

        Ok(Identity {
            user_id,
            email: data.claims.email,
        })
    }
}
