//! GitHub App identity assertions.
//!
//! The first link of the credential chain is an RS256 JWT signed with the
//! App's private key. GitHub rejects assertions issued "in the future", so
//! the issue time is backdated to absorb clock skew between this host and
//! GitHub.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;
use crate::token::IssuedToken;

/// How far the `iat` claim is backdated.
pub const ASSERTION_BACKDATE_SECONDS: i64 = 60;

/// Assertion lifetime measured from the real current time.
pub const ASSERTION_LIFETIME_MINUTES: i64 = 10;

/// Registered claims GitHub expects on an App assertion.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Signs short-lived App identity assertions.
pub struct AppAssertionSigner {
    app_id: u64,
    key: EncodingKey,
}

impl AppAssertionSigner {
    /// Build a signer from a PEM-encoded RSA private key (PKCS#1 or PKCS#8).
    pub fn from_pem(app_id: u64, pem: &[u8]) -> Result<Self, CredentialError> {
        let key =
            EncodingKey::from_rsa_pem(pem).map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        Ok(Self { app_id, key })
    }

    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Sign an assertion valid from `now - 60s` until `now + 10m`.
    pub fn sign(&self) -> Result<IssuedToken, CredentialError> {
        self.sign_at(Utc::now())
    }

    pub fn sign_at(&self, now: DateTime<Utc>) -> Result<IssuedToken, CredentialError> {
        let expires_at = now + Duration::minutes(ASSERTION_LIFETIME_MINUTES);
        let claims = AppClaims {
            iat: (now - Duration::seconds(ASSERTION_BACKDATE_SECONDS)).timestamp(),
            exp: expires_at.timestamp(),
            iss: self.app_id.to_string(),
        };

        let jwt = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| CredentialError::Signing(e.to_string()))?;

        Ok(IssuedToken::new(jwt, Some(expires_at)))
    }
}

impl fmt::Debug for AppAssertionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppAssertionSigner")
            .field("app_id", &self.app_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/app_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/app_key.pub.pem");

    #[test]
    fn test_assertion_claims() {
        let signer = AppAssertionSigner::from_pem(123456, PRIVATE_KEY.as_bytes()).unwrap();
        let now = Utc::now();
        let issued = signer.sign_at(now).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&["123456"]);
        let decoded = jsonwebtoken::decode::<AppClaims>(
            issued.token.expose(),
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.iss, "123456");
        assert_eq!(decoded.claims.iat, now.timestamp() - 60);
        assert_eq!(decoded.claims.exp, now.timestamp() + 600);
        assert_eq!(issued.expires_at.map(|t| t.timestamp()), Some(now.timestamp() + 600));
    }

    #[test]
    fn test_rejects_garbage_key() {
        let err = AppAssertionSigner::from_pem(1, b"not a key").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidKey(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = AppAssertionSigner::from_pem(7, PRIVATE_KEY.as_bytes()).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains("app_id: 7"));
        assert!(!debug.contains("BEGIN"));
    }
}
