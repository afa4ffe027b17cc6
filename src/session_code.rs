//! Session code generation and parsing
//!
//! Participants join a live session by typing its code, so codes are short
//! six-digit decimal numbers. Drawing a code is random; uniqueness against
//! the currently hosted sessions is enforced by the
//! [`SessionRegistry`](crate::registry::SessionRegistry).

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::constants::code::{MAX_VALUE, MIN_VALUE};

/// A short, human-enterable identifier for a hosted session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionCode(u32);

/// Errors produced when parsing a session code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The code is not a decimal number
    #[error("session code is not a number: {0}")]
    Malformed(#[from] ParseIntError),
    /// The code is a number but not a six-digit one
    #[error("session code must have six digits")]
    OutOfRange,
}

impl SessionCode {
    /// Draws a new random code
    ///
    /// The result is not guaranteed to be unused; callers that need
    /// uniqueness must check against the active sessions.
    pub fn random() -> Self {
        Self(fastrand::u32(MIN_VALUE..MAX_VALUE))
    }
}

impl Display for SessionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for SessionCode {
    type Err = Error;

    /// Parses a code from its six-digit representation
    ///
    /// Surrounding whitespace is ignored since codes are usually typed by hand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for non-numeric input and
    /// [`Error::OutOfRange`] for numbers outside the code space.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<u32>()?;
        if (MIN_VALUE..MAX_VALUE).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::OutOfRange)
        }
    }
}

impl TryFrom<u32> for SessionCode {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if (MIN_VALUE..MAX_VALUE).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::OutOfRange)
        }
    }
}

impl Serialize for SessionCode {
    /// Serializes the code as its six-digit string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionCode {
    fn deserialize<D>(deserializer: D) -> Result<SessionCode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SessionCode::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_code_in_range() {
        for _ in 0..100 {
            let code = SessionCode::random();
            assert!(code.0 >= MIN_VALUE);
            assert!(code.0 < MAX_VALUE);
        }
    }

    #[test]
    fn test_display_is_six_digits() {
        assert_eq!(SessionCode(MIN_VALUE).to_string(), "100000");
        assert_eq!(SessionCode(MAX_VALUE - 1).to_string(), "999999");
        assert_eq!(SessionCode(482_913).to_string(), "482913");
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            SessionCode::from_str("482913").unwrap(),
            SessionCode(482_913)
        );
        assert_eq!(
            SessionCode::from_str(" 100000 ").unwrap(),
            SessionCode(100_000)
        );
    }

    #[test]
    fn test_from_str_invalid() {
        assert!(matches!(
            SessionCode::from_str("abc"),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(SessionCode::from_str(""), Err(Error::Malformed(_))));
        assert_eq!(SessionCode::from_str("99999"), Err(Error::OutOfRange));
        assert_eq!(SessionCode::from_str("1000000"), Err(Error::OutOfRange));
    }

    #[test]
    fn test_try_from_u32() {
        assert_eq!(SessionCode::try_from(123_456), Ok(SessionCode(123_456)));
        assert_eq!(SessionCode::try_from(42), Err(Error::OutOfRange));
    }

    #[test]
    fn test_serialization() {
        let code = SessionCode(123_456);
        let serialized = serde_json::to_string(&code).unwrap();
        assert_eq!(serialized, "\"123456\"");

        let deserialized: SessionCode = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, code);
    }

    #[test]
    fn test_deserialization_rejects_numbers_and_short_codes() {
        assert!(serde_json::from_str::<SessionCode>("123456").is_err());
        assert!(serde_json::from_str::<SessionCode>("\"12\"").is_err());
    }
}
