//! Token endpoint client for the JWT-bearer grant (RFC 7523).

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{Error, Result, TokenExchangeError};

/// JWT-bearer grant type.
pub const GRANT_TYPE_JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Posts assertions to a token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    http_client: reqwest::Client,
}

impl TokenExchangeClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Reuse an existing HTTP client (connection pool, proxy and TLS settings).
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Post `assertion` to `token_url` and read the raw response.
    ///
    /// Only transport failures are errors here; the status is interpreted by
    /// the caller.
    #[instrument(skip(self, assertion), level = "debug")]
    pub async fn exchange(&self, token_url: &str, assertion: &str) -> Result<ExchangeResponse> {
        let form = [("grant_type", GRANT_TYPE_JWT_BEARER), ("assertion", assertion)];

        let response = self
            .http_client
            .post(token_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(TokenExchangeError::Transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(TokenExchangeError::Transport)?;

        debug!(status, body_len = body.len(), "Token endpoint responded");

        Ok(ExchangeResponse { status, body })
    }
}

/// Raw token endpoint response.
#[derive(Debug, Clone)]
pub struct ExchangeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl ExchangeResponse {
    /// The endpoint signals success with exactly 200.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Parse a successful token response.
    pub fn into_access_token(self) -> Result<AccessToken> {
        let value: serde_json::Value =
            serde_json::from_str(&self.body).map_err(TokenExchangeError::InvalidJson)?;

        let access_token = value
            .get("access_token")
            .and_then(|t| t.as_str())
            .ok_or(TokenExchangeError::MissingAccessToken)?
            .to_string();
        let token_type = value.get("token_type").and_then(|t| t.as_str()).map(String::from);
        let expires_in = value.get("expires_in").and_then(|t| t.as_u64());
        let scope = value.get("scope").and_then(|t| t.as_str()).map(String::from);

        Ok(AccessToken {
            access_token,
            token_type,
            expires_in,
            scope,
        })
    }

    /// Turn a non-success response into an authorization server error.
    pub fn into_server_error(self) -> Error {
        let parsed: Option<OAuthErrorBody> = serde_json::from_str(&self.body).ok();
        let (error, error_description) = parsed
            .map(|b| (b.error, b.error_description))
            .unwrap_or_default();

        Error::AuthorizationServer {
            status: self.status,
            body: self.body,
            error,
            error_description,
        }
    }
}

/// OAuth 2.0 error response body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Access token issued by the authorization server.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    /// Bearer token presented to the protected API.
    pub access_token: String,
    /// Token type, usually "Bearer".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Lifetime in seconds, as reported by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Granted scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn response(status: u16, body: &str) -> ExchangeResponse {
        ExchangeResponse {
            status,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_exchange_posts_form() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
            ))
            .and(body_string_contains("assertion=eyJhbGciOiJSUzI1NiJ9.e30.sig"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"access_token":"abc"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = TokenExchangeClient::new(Duration::from_secs(5)).unwrap();
        let result = client
            .exchange(&format!("{}/token", server.uri()), "eyJhbGciOiJSUzI1NiJ9.e30.sig")
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.into_access_token().unwrap().as_str(), "abc");
    }

    #[tokio::test]
    async fn test_exchange_returns_error_status_as_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&server)
            .await;

        let client = TokenExchangeClient::new(Duration::from_secs(5)).unwrap();
        let result = client.exchange(&server.uri(), "a.b.c").await.unwrap();

        assert_eq!(result.status, 400);
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_exchange_transport_failure() {
        // Bind and drop a listener to get a port with nothing behind it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let client = TokenExchangeClient::new(Duration::from_secs(5)).unwrap();
        let result = client
            .exchange(&format!("http://127.0.0.1:{}/token", port), "a.b.c")
            .await;

        assert!(matches!(
            result,
            Err(Error::TokenExchange(TokenExchangeError::Transport(_)))
        ));
    }

    #[test]
    fn test_parse_full_token_response() {
        let token = response(
            200,
            r#"{"access_token":"IxC0B76vlWl3fiQhAwZUmD0hr_PPwC9hSIXRdoUslPU=","token_type":"Bearer","expires_in":119,"scope":"nav:aareg"}"#,
        )
        .into_access_token()
        .unwrap();

        assert_eq!(token.as_str(), "IxC0B76vlWl3fiQhAwZUmD0hr_PPwC9hSIXRdoUslPU=");
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
        assert_eq!(token.expires_in, Some(119));
        assert_eq!(token.scope.as_deref(), Some("nav:aareg"));
        assert!(!format!("{:?}", token).contains("IxC0B76"));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            response(200, "<html>oops</html>").into_access_token(),
            Err(Error::TokenExchange(TokenExchangeError::InvalidJson(_)))
        ));
        assert!(matches!(
            response(200, r#"{"token_type":"Bearer"}"#).into_access_token(),
            Err(Error::TokenExchange(TokenExchangeError::MissingAccessToken))
        ));
        assert!(matches!(
            response(200, r#"{"access_token":42}"#).into_access_token(),
            Err(Error::TokenExchange(TokenExchangeError::MissingAccessToken))
        ));
    }

    #[test]
    fn test_server_error_extracts_oauth_fields() {
        let err = response(
            400,
            r#"{"error":"invalid_client","error_description":"Invalid assertion. Client authentication failed."}"#,
        )
        .into_server_error();

        match err {
            Error::AuthorizationServer {
                status,
                error,
                error_description,
                ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(error.as_deref(), Some("invalid_client"));
                assert!(error_description.unwrap().contains("Client authentication failed"));
            }
            other => panic!("expected AuthorizationServer, got {:?}", other),
        }

        let err = response(503, "Service Unavailable").into_server_error();
        match err {
            Error::AuthorizationServer {
                status, body, error, ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(body, "Service Unavailable");
                assert_eq!(error, None);
            }
            other => panic!("expected AuthorizationServer, got {:?}", other),
        }
    }
}
