//! RS256 signing of grant assertions.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use super::claims::AssertionClaims;
use super::credential::{Credential, KeyPairCredential, PrivateJwk, RsaKeyMaterial};
use crate::error::SigningError;

/// Sign `claims` with `credential` into a compact JWS.
pub fn sign_assertion(
    claims: &AssertionClaims,
    credential: &Credential,
) -> Result<String, SigningError> {
    match credential {
        Credential::KeyPair(key_pair) => sign_with_key_pair(claims, key_pair),
        Credential::X509(_) => Err(SigningError::UnsupportedMethod("x509")),
    }
}

fn sign_with_key_pair(
    claims: &AssertionClaims,
    key_pair: &KeyPairCredential,
) -> Result<String, SigningError> {
    let encoding_key = create_encoding_key(key_pair.key())?;

    let mut header = Header::new(Algorithm::RS256);
    header.typ = None;
    header.kid = Some(key_pair.kid().to_string());

    Ok(encode(&header, claims, &encoding_key)?)
}

/// Create encoding key from RSA key material.
fn create_encoding_key(material: &RsaKeyMaterial) -> Result<EncodingKey, SigningError> {
    match material {
        RsaKeyMaterial::Jwk(jwk) => Ok(EncodingKey::from_rsa_der(&rsa_jwk_to_der(jwk)?)),
        RsaKeyMaterial::Pem(pem) => EncodingKey::from_rsa_pem(pem)
            .map_err(|e| SigningError::MalformedKey(format!("RSA PEM: {}", e))),
    }
}

/// Encode a private RSA JWK as a PKCS#1 `RSAPrivateKey` DER structure.
fn rsa_jwk_to_der(jwk: &PrivateJwk) -> Result<Vec<u8>, SigningError> {
    if jwk.kty != "RSA" {
        return Err(SigningError::MalformedKey(format!(
            "key type {} cannot sign RS256",
            jwk.kty
        )));
    }
    if let Some(alg) = jwk.alg.as_deref().filter(|alg| *alg != "RS256") {
        return Err(SigningError::MalformedKey(format!(
            "key is registered for {}, not RS256",
            alg
        )));
    }

    let params = [
        ("n", &jwk.n),
        ("e", &jwk.e),
        ("d", &jwk.d),
        ("p", &jwk.p),
        ("q", &jwk.q),
        ("dp", &jwk.dp),
        ("dq", &jwk.dq),
        ("qi", &jwk.qi),
    ];

    // version 0 (two-prime)
    let mut body = Vec::new();
    push_integer(&[0], &mut body);

    for (name, value) in params {
        let value = value
            .as_deref()
            .ok_or_else(|| SigningError::MalformedKey(format!("RSA key missing '{}'", name)))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(value.trim_end_matches('='))
            .map_err(|e| SigningError::MalformedKey(format!("RSA '{}' is not base64url: {}", name, e)))?;
        push_integer(&bytes, &mut body);
    }

    let mut der = vec![0x30]; // SEQUENCE
    push_length(body.len(), &mut der);
    der.extend_from_slice(&body);

    Ok(der)
}

/// Append an unsigned big-endian integer as a DER INTEGER.
fn push_integer(value: &[u8], out: &mut Vec<u8>) {
    let leading_zeros = value.iter().take_while(|b| **b == 0).count();
    let digits = &value[leading_zeros..];
    // INTEGER is signed; prefix 0x00 when the high bit is set (or the value is zero)
    let pad = digits.first().map_or(true, |b| b & 0x80 != 0);

    out.push(0x02); // INTEGER tag
    push_length(digits.len() + usize::from(pad), out);
    if pad {
        out.push(0x00);
    }
    out.extend_from_slice(digits);
}

fn push_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }

    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}
