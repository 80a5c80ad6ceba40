//! Token exchange against the authorization server.
//!
//! Posts a signed assertion with the JWT-bearer grant type and turns the
//! response into an access token or an authorization server error.

pub mod client;

pub use client::{AccessToken, ExchangeResponse, TokenExchangeClient, GRANT_TYPE_JWT_BEARER};
