//! OAuth2 JWT-bearer grant client.
//!
//! Obtains access tokens from an authorization server by posting short-lived,
//! single-use assertions signed with a registered RSA key (RFC 7523). The
//! [`TokenLifecycleManager`] caches the current assertion, reuses it until a
//! successful exchange consumes it or it nears expiry, and regenerates it
//! otherwise.
//!
//! ```no_run
//! use jwt_bearer_client::{keys, ClientConfig, TokenLifecycleManager};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ClientConfig::new(
//!     "https://test.maskinporten.no/token",
//!     ["nav:aareg"],
//!     "https://test.maskinporten.no/",
//!     "my-integration",
//!     "123456789",
//! );
//! let key_pair = keys::load_key_pair_from_json("key.json")?;
//!
//! let manager = TokenLifecycleManager::new(config, key_pair)?;
//! let token = manager.obtain_access_token().await?;
//! println!("{}", token.as_str());
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod config;
pub mod error;
pub mod exchange;
pub mod keys;
pub mod lifecycle;

pub use assertion::{Assertion, AssertionClaims, Credential, KeyPairCredential, X509Credential};
pub use config::{ClientConfig, ClientConfigJson};
pub use error::{Error, Result, SigningError, TokenExchangeError};
pub use exchange::AccessToken;
pub use lifecycle::{AssertionState, Clock, ManualClock, SystemClock, TokenLifecycleManager};
