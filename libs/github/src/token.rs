//! Token wrappers that keep credential material out of logs.

use std::fmt;

use chrono::{DateTime, Utc};

/// An opaque credential string.
///
/// `Debug` and `Display` never print the value; call [`SecretToken::expose`]
/// at the point of use.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(<redacted>)")
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// A credential together with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: SecretToken,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedToken {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: SecretToken::new(token),
            expires_at,
        }
    }
}
