//! Signed token issuance and verification.
//!
//! Tokens are compact JWS strings (`header.claims.signature`, base64url
//! without padding) signed with HMAC-SHA256. Access and refresh tokens use
//! independent secrets, so a token of one class can never verify as the
//! other even with identical claims.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use super::state::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by both token classes.
///
/// The structure is closed: tokens whose decoded claims carry extra or
/// missing fields fail verification instead of being silently accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    /// Subject account id.
    pub sub: Uuid,
    /// Subject username at issuance time.
    pub name: String,
    /// Unique token id. Timestamps are second-granular, so without this two
    /// logins in the same second would produce identical refresh tokens and
    /// collide in the store.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported header")]
    UnsupportedHeader,
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Clone)]
struct TokenKey {
    secret: Vec<u8>,
    ttl_seconds: i64,
}

/// Stateless signer/verifier for the access/refresh token pair.
#[derive(Clone)]
pub struct TokenCodec {
    access: TokenKey,
    refresh: TokenKey,
}

impl TokenCodec {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: TokenKey {
                secret: config.access_token_secret().expose_secret().as_bytes().to_vec(),
                ttl_seconds: config.access_token_ttl_seconds(),
            },
            refresh: TokenKey {
                secret: config
                    .refresh_token_secret()
                    .expose_secret()
                    .as_bytes()
                    .to_vec(),
                ttl_seconds: config.refresh_token_ttl_seconds(),
            },
        }
    }

    /// Issue a short-lived access token for the subject.
    ///
    /// # Errors
    /// Returns an error if claims cannot be encoded or signing fails.
    pub fn issue_access(&self, sub: Uuid, name: &str) -> Result<String, TokenError> {
        sign(&self.access, sub, name, Utc::now().timestamp())
    }

    /// Issue a long-lived refresh token for the subject.
    ///
    /// # Errors
    /// Returns an error if claims cannot be encoded or signing fails.
    pub fn issue_refresh(&self, sub: Uuid, name: &str) -> Result<String, TokenError> {
        sign(&self.refresh, sub, name, Utc::now().timestamp())
    }

    /// Verify an access token: format, signature, then expiry.
    ///
    /// # Errors
    /// Returns a [`TokenError`] naming which check failed; callers surface a
    /// uniform invalid-token outcome and keep the detail for logs.
    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, TokenError> {
        verify(&self.access, token, Utc::now().timestamp())
    }

    /// Verify a refresh token: format, signature, then expiry.
    ///
    /// # Errors
    /// Returns a [`TokenError`] naming which check failed; callers surface a
    /// uniform invalid-token outcome and keep the detail for logs.
    pub fn verify_refresh(&self, token: &str) -> Result<TokenClaims, TokenError> {
        verify(&self.refresh, token, Utc::now().timestamp())
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh.ttl_seconds
    }

    #[cfg(test)]
    fn issue_access_at(&self, sub: Uuid, name: &str, now: i64) -> Result<String, TokenError> {
        sign(&self.access, sub, name, now)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn sign(key: &TokenKey, sub: Uuid, name: &str, now: i64) -> Result<String, TokenError> {
    let claims = TokenClaims {
        sub,
        name: name.to_string(),
        jti: Uuid::new_v4(),
        iat: now,
        exp: now + key.ttl_seconds,
    };

    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(&claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(&key.secret).map_err(|_| TokenError::Key)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

fn verify(key: &TokenKey, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) =
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s), None) => (h, c, s),
            _ => return Err(TokenError::TokenFormat),
        };

    let header: TokenHeader = b64d_json(header_b64)?;
    if header != TokenHeader::hs256() {
        return Err(TokenError::UnsupportedHeader);
    }

    let signature = Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::Base64)?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    let mut mac = HmacSha256::new_from_slice(&key.secret).map_err(|_| TokenError::Key)?;
    mac.update(signing_input.as_bytes());
    // Constant-time comparison; never compare signature bytes directly.
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: TokenClaims = b64d_json(claims_b64)?;
    if claims.exp <= now {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}
