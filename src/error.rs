//! Error taxonomy for assertion signing and token exchange.

use std::time::Duration;

use thiserror::Error;

/// Crate result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced to callers of the token lifecycle manager.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid client configuration. Only raised at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The assertion could not be signed.
    #[error("signing assertion: {0}")]
    Signing(#[from] SigningError),

    /// The exchange request failed or returned an unusable body.
    #[error("token exchange: {0}")]
    TokenExchange(#[from] TokenExchangeError),

    /// The token endpoint answered with a non-200 status.
    #[error("authorization server returned status {status}: {body}")]
    AuthorizationServer {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
        /// OAuth `error` field, when the body carried one.
        error: Option<String>,
        /// OAuth `error_description` field, when the body carried one.
        error_description: Option<String>,
    },

    /// A thread panicked while holding the lifecycle state lock.
    #[error("lifecycle state lock poisoned")]
    LockPoisoned,
}

/// Signing failures.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The credential variant has no signing implementation.
    #[error("unsupported signing method: {0}")]
    UnsupportedMethod(&'static str),

    /// Key material is missing parameters or cannot be decoded.
    #[error("malformed key material: {0}")]
    MalformedKey(String),

    /// The JWT library rejected the key or claims.
    #[error("encoding JWT: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Token exchange failures that are not an authorization server verdict.
#[derive(Debug, Error)]
pub enum TokenExchangeError {
    /// Connection, TLS or timeout failure in the HTTP transport.
    #[error("request to token endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller-supplied deadline elapsed before a response arrived.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The 200 response body was not JSON.
    #[error("response body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The 200 response body had no `access_token` string.
    #[error("response is missing the access_token field")]
    MissingAccessToken,
}

impl Error {
    /// HTTP status carried by an authorization server error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::AuthorizationServer { status, .. } => Some(*status),
            _ => None,
        }
    }
}
