//! Signing credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Private RSA JSON Web Key, as downloaded when registering a key pair.
#[derive(Clone, Serialize, Deserialize)]
pub struct PrivateJwk {
    /// Key type (RSA)
    pub kty: String,
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// Key use (sig, enc)
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    // Public parameters (base64url)
    pub n: Option<String>,
    pub e: Option<String>,

    // Private parameters (base64url)
    pub d: Option<String>,
    pub p: Option<String>,
    pub q: Option<String>,
    pub dp: Option<String>,
    pub dq: Option<String>,
    pub qi: Option<String>,
}

impl fmt::Debug for PrivateJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateJwk")
            .field("kty", &self.kty)
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// RSA private key material.
#[derive(Clone)]
pub enum RsaKeyMaterial {
    /// Private JWK with CRT parameters.
    Jwk(PrivateJwk),
    /// PEM encoded private key (PKCS#1 or PKCS#8).
    Pem(Vec<u8>),
}

/// RSA key pair registered with the authorization server under `kid`.
#[derive(Clone)]
pub struct KeyPairCredential {
    kid: String,
    key: RsaKeyMaterial,
}

impl KeyPairCredential {
    /// Use a private JWK. The JWK must carry its `kid`.
    pub fn from_jwk(jwk: PrivateJwk) -> Result<Self> {
        let kid = jwk
            .kid
            .clone()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| Error::Configuration("private JWK has no kid".to_string()))?;

        Ok(Self {
            kid,
            key: RsaKeyMaterial::Jwk(jwk),
        })
    }

    /// Use a PEM encoded private key registered under `kid`.
    pub fn from_rsa_pem(kid: impl Into<String>, pem: impl Into<Vec<u8>>) -> Self {
        Self {
            kid: kid.into(),
            key: RsaKeyMaterial::Pem(pem.into()),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn key(&self) -> &RsaKeyMaterial {
        &self.key
    }
}

impl fmt::Debug for KeyPairCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.key {
            RsaKeyMaterial::Jwk(_) => "jwk",
            RsaKeyMaterial::Pem(_) => "pem",
        };
        f.debug_struct("KeyPairCredential")
            .field("kid", &self.kid)
            .field("key", &kind)
            .finish()
    }
}

/// Private key bound to an x509 business certificate.
#[derive(Clone)]
pub struct X509Credential {
    private_key_pem: Vec<u8>,
    certificate_pem: Option<Vec<u8>>,
}

impl X509Credential {
    pub fn new(private_key_pem: impl Into<Vec<u8>>, certificate_pem: Option<Vec<u8>>) -> Self {
        Self {
            private_key_pem: private_key_pem.into(),
            certificate_pem,
        }
    }

    pub fn private_key_pem(&self) -> &[u8] {
        &self.private_key_pem
    }

    pub fn certificate_pem(&self) -> Option<&[u8]> {
        self.certificate_pem.as_deref()
    }
}

impl fmt::Debug for X509Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X509Credential")
            .field("has_certificate", &self.certificate_pem.is_some())
            .finish_non_exhaustive()
    }
}

/// The credential an assertion is signed with.
#[derive(Debug, Clone)]
pub enum Credential {
    KeyPair(KeyPairCredential),
    X509(X509Credential),
}

impl Credential {
    /// Select the credential from two optional sources. Exactly one must be set.
    pub fn from_parts(
        key_pair: Option<KeyPairCredential>,
        x509: Option<X509Credential>,
    ) -> Result<Self> {
        match (key_pair, x509) {
            (Some(key_pair), None) => Ok(Credential::KeyPair(key_pair)),
            (None, Some(x509)) => Ok(Credential::X509(x509)),
            (Some(_), Some(_)) => Err(Error::Configuration(
                "only one of key pair and x509 credential may be supplied".to_string(),
            )),
            (None, None) => Err(Error::Configuration(
                "a key pair or x509 credential is required".to_string(),
            )),
        }
    }

    /// Short name of the signing method, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Credential::KeyPair(_) => "private_key",
            Credential::X509(_) => "x509",
        }
    }
}

impl From<KeyPairCredential> for Credential {
    fn from(credential: KeyPairCredential) -> Self {
        Credential::KeyPair(credential)
    }
}

impl From<X509Credential> for Credential {
    fn from(credential: X509Credential) -> Self {
        Credential::X509(credential)
    }
}
