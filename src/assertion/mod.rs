//! JWT-bearer grant assertions.
//!
//! An assertion is a short-lived, single-use JWT signed with the client's
//! registered key and posted to the token endpoint in place of a secret.

pub mod claims;
pub mod credential;
pub mod signer;

pub use claims::AssertionClaims;
pub use credential::{Credential, KeyPairCredential, PrivateJwk, RsaKeyMaterial, X509Credential};
pub use signer::sign_assertion;

use std::fmt;

use crate::config::ClientConfig;
use crate::error::SigningError;

/// A signed assertion and the claims it was built from.
#[derive(Clone, PartialEq, Eq)]
pub struct Assertion {
    token: String,
    claims: AssertionClaims,
}

impl Assertion {
    /// Build and sign a fresh assertion issued at `now`.
    pub fn generate(
        config: &ClientConfig,
        credential: &Credential,
        now: i64,
    ) -> Result<Self, SigningError> {
        let claims = AssertionClaims::build(config, now);
        let token = sign_assertion(&claims, credential)?;
        Ok(Self { token, claims })
    }

    /// Compact serialized JWT.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &AssertionClaims {
        &self.claims
    }

    pub fn jti(&self) -> &str {
        &self.claims.jti
    }

    /// Creation time in epoch seconds (the `iat` claim).
    pub fn generated_at(&self) -> i64 {
        self.claims.iat
    }
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assertion")
            .field("jti", &self.claims.jti)
            .field("iat", &self.claims.iat)
            .field("exp", &self.claims.exp)
            .finish_non_exhaustive()
    }
}
