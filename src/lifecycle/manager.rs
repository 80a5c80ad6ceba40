//! Assertion lifecycle and access token retrieval.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use crate::assertion::{Assertion, Credential, KeyPairCredential, X509Credential};
use crate::config::ClientConfig;
use crate::error::{Error, Result, TokenExchangeError};
use crate::exchange::{AccessToken, TokenExchangeClient};

/// An assertion is regenerated this many seconds before its `exp`.
pub const REGENERATION_MARGIN_SECS: i64 = 5;

/// Observable state of the cached assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionState {
    /// No assertion has been generated yet.
    Empty,
    /// The cached assertion will be reused.
    Valid,
    /// The cached assertion was consumed or is too close to expiry.
    Stale,
}

#[derive(Debug, Default)]
struct LifecycleState {
    current: Option<Arc<Assertion>>,
    consumed: bool,
}

impl LifecycleState {
    /// The cached assertion, if it may still be sent.
    fn reusable(&self, now: i64, expiry_seconds: u64) -> Option<&Arc<Assertion>> {
        let current = self.current.as_ref()?;
        let stale_at = current
            .generated_at()
            .saturating_add_unsigned(expiry_seconds)
            .saturating_sub(REGENERATION_MARGIN_SECS);

        (!self.consumed && now < stale_at).then_some(current)
    }

    fn observe(&self, now: i64, expiry_seconds: u64) -> AssertionState {
        if self.current.is_none() {
            AssertionState::Empty
        } else if self.reusable(now, expiry_seconds).is_some() {
            AssertionState::Valid
        } else {
            AssertionState::Stale
        }
    }
}

/// Obtains access tokens with single-use JWT-bearer assertions.
///
/// Share one instance (in an `Arc`) between tasks. Validity checks and
/// regeneration are serialized; the HTTP exchange runs without the lock.
///
/// Concurrent [`obtain_access_token`](Self::obtain_access_token) calls may
/// post the same valid assertion, and a server enforcing single use will
/// reject all but one. Serialize those calls if every one must succeed.
pub struct TokenLifecycleManager {
    config: ClientConfig,
    credential: Credential,
    exchange: TokenExchangeClient,
    clock: Arc<dyn Clock>,
    state: Mutex<LifecycleState>,
}

impl TokenLifecycleManager {
    /// Create a manager with the system clock and a default HTTP client.
    pub fn new(config: ClientConfig, credential: impl Into<Credential>) -> Result<Self> {
        Self::builder(config).credential(credential).build()
    }

    pub fn builder(config: ClientConfig) -> TokenLifecycleManagerBuilder {
        TokenLifecycleManagerBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current state of the cached assertion.
    pub fn state(&self) -> Result<AssertionState> {
        let state = self.lock_state()?;
        Ok(state.observe(self.clock.now(), self.config.expiry_seconds))
    }

    /// Return the cached assertion while valid, otherwise sign a new one.
    pub fn get_assertion(&self) -> Result<Arc<Assertion>> {
        let mut state = self.lock_state()?;
        let now = self.clock.now();

        if let Some(current) = state.reusable(now, self.config.expiry_seconds) {
            debug!(jti = %current.jti(), "Assertion still valid, reusing");
            return Ok(Arc::clone(current));
        }

        let assertion = Arc::new(Assertion::generate(&self.config, &self.credential, now)?);

        info!(
            jti = %assertion.jti(),
            method = self.credential.method(),
            iat = assertion.generated_at(),
            "Generated new assertion"
        );

        state.current = Some(Arc::clone(&assertion));
        state.consumed = false;

        Ok(assertion)
    }

    /// Exchange an assertion for a fresh access token.
    ///
    /// A 200 response consumes the assertion. Any failure leaves the cached
    /// assertion as it was, so the call can be retried without re-signing.
    #[instrument(skip(self), level = "debug", fields(token_url = %self.config.token_url))]
    pub async fn obtain_access_token(&self) -> Result<AccessToken> {
        let assertion = self.get_assertion()?;

        let response = self
            .exchange
            .exchange(&self.config.token_url, assertion.as_str())
            .await?;

        info!(
            status = response.status,
            jti = %assertion.jti(),
            "Token endpoint response"
        );

        if !response.is_success() {
            warn!(status = response.status, "Token request rejected");
            return Err(response.into_server_error());
        }

        // The server has spent this jti even if the body turns out unusable
        self.mark_consumed(&assertion)?;

        response.into_access_token()
    }

    /// Like [`obtain_access_token`](Self::obtain_access_token), bounded by `deadline`.
    pub async fn obtain_access_token_within(&self, deadline: Duration) -> Result<AccessToken> {
        match tokio::time::timeout(deadline, self.obtain_access_token()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "Token request deadline exceeded");
                Err(TokenExchangeError::DeadlineExceeded(deadline).into())
            }
        }
    }

    /// Mark `assertion` consumed, unless it has been replaced meanwhile.
    fn mark_consumed(&self, assertion: &Assertion) -> Result<()> {
        let mut state = self.lock_state()?;

        let is_current = state
            .current
            .as_ref()
            .is_some_and(|current| current.jti() == assertion.jti());

        if is_current {
            state.consumed = true;
            debug!(jti = %assertion.jti(), "Assertion consumed");
        } else {
            debug!(jti = %assertion.jti(), "Exchanged assertion already replaced");
        }

        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, LifecycleState>> {
        self.state.lock().map_err(|_| Error::LockPoisoned)
    }
}

impl fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("token_url", &self.config.token_url)
            .field("audience", &self.config.audience)
            .field("issuer", &self.config.issuer)
            .field("scopes", &self.config.scopes)
            .field("consumer_organization", &self.config.consumer_organization)
            .field("expiry_seconds", &self.config.expiry_seconds)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TokenLifecycleManager`].
pub struct TokenLifecycleManagerBuilder {
    config: ClientConfig,
    key_pair: Option<KeyPairCredential>,
    x509: Option<X509Credential>,
    clock: Option<Arc<dyn Clock>>,
    http_client: Option<reqwest::Client>,
}

impl TokenLifecycleManagerBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            key_pair: None,
            x509: None,
            clock: None,
            http_client: None,
        }
    }

    pub fn credential(self, credential: impl Into<Credential>) -> Self {
        match credential.into() {
            Credential::KeyPair(key_pair) => self.key_pair(key_pair),
            Credential::X509(x509) => self.x509(x509),
        }
    }

    pub fn key_pair(mut self, key_pair: KeyPairCredential) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    pub fn x509(mut self, x509: X509Credential) -> Self {
        self.x509 = Some(x509);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a preconfigured HTTP client. Its timeout replaces `http_timeout_secs`.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn build(self) -> Result<TokenLifecycleManager> {
        self.config.validate().map_err(Error::Configuration)?;
        let credential = Credential::from_parts(self.key_pair, self.x509)?;

        let exchange = match self.http_client {
            Some(http_client) => TokenExchangeClient::with_client(http_client),
            None => TokenExchangeClient::new(Duration::from_secs(self.config.http_timeout_secs))?,
        };

        debug!(
            token_url = %self.config.token_url,
            issuer = %self.config.issuer,
            method = credential.method(),
            "Token lifecycle manager configured"
        );

        Ok(TokenLifecycleManager {
            config: self.config,
            credential,
            exchange,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            state: Mutex::new(LifecycleState::default()),
        })
    }
}
