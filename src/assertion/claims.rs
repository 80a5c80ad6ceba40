//! Claim set for JWT-bearer assertions.

use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;

/// Claims carried by a grant assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Audience, the authorization server.
    pub aud: String,
    /// Issuer, the client integration.
    pub iss: String,
    /// Space-separated scopes.
    pub scope: String,
    /// Organization the token is requested on behalf of.
    pub consumer_org: String,
    /// Unique assertion ID.
    pub jti: String,
    /// Issued at (epoch seconds).
    pub iat: i64,
    /// Expiration time (epoch seconds).
    pub exp: i64,
}

impl AssertionClaims {
    /// Build claims for `config` issued at `now`, with a fresh `jti`.
    pub fn build(config: &ClientConfig, now: i64) -> Self {
        Self {
            aud: config.audience.clone(),
            iss: config.issuer.clone(),
            scope: config.scope_string(),
            consumer_org: config.consumer_organization.clone(),
            jti: generate_jti(),
            iat: now,
            exp: now.saturating_add_unsigned(config.expiry_seconds),
        }
    }
}

/// Generate a unique JWT ID.
fn generate_jti() -> String {
    uuid::Uuid::new_v4().to_string()
}
