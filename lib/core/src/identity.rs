//! Customer identity.
//!
//! A [`CustomerIdentity`] is the stable key that ties a customer's turns
//! together: a phone number for SMS and voice, an e-mail address or a web
//! session token for web chat. The value is opaque to everything except
//! [`CustomerIdentity::phone`], which normalizes formatting noise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned when an identity cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The raw value was empty or whitespace.
    Empty,
    /// A phone number contained no digits.
    InvalidPhone { raw: String },
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "customer identity is empty"),
            Self::InvalidPhone { raw } => write!(f, "invalid phone number: {raw}"),
        }
    }
}

impl std::error::Error for IdentityError {}

/// Opaque, immutable key identifying one customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerIdentity(String);

impl CustomerIdentity {
    /// Creates an identity from an opaque key, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Empty`] if nothing remains after trimming.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdentityError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Creates an identity from a phone number.
    ///
    /// Keeps a leading `+` and the digits; spaces, dashes, dots and
    /// parentheses are dropped so differently formatted numbers map to the
    /// same customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty or has no digits.
    pub fn phone(raw: impl AsRef<str>) -> Result<Self, IdentityError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }

        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(IdentityError::InvalidPhone {
                raw: trimmed.to_string(),
            });
        }

        if trimmed.starts_with('+') {
            Ok(Self(format!("+{digits}")))
        } else {
            Ok(Self(digits))
        }
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CustomerIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
