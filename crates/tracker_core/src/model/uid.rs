//! Record identifiers.
//!
//! # Invariants
//! - A UID is exactly 11 ASCII alphanumeric characters.
//! - The first character is a letter.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const UID_LENGTH: usize = 11;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

static UID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9]{10}$").expect("valid uid regex"));

/// Stable identifier shared by enrollments, programs, tracked entities and
/// notification templates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

/// Rejected UID input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidError {
    pub value: String,
}

impl Display for UidError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid uid `{}`: expected {UID_LENGTH} alphanumeric characters starting with a letter",
            self.value
        )
    }
}

impl Error for UidError {}

impl Uid {
    /// Generates a new random UID.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut value = String::with_capacity(UID_LENGTH);
        value.push(char::from(LETTERS[rng.gen_range(0..LETTERS.len())]));
        for _ in 1..UID_LENGTH {
            value.push(char::from(ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())]));
        }
        Self(value)
    }

    /// Parses and validates a caller-provided UID.
    pub fn parse(value: &str) -> Result<Self, UidError> {
        if is_valid_uid(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(UidError {
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns whether `value` has the UID shape.
pub fn is_valid_uid(value: &str) -> bool {
    UID_RE.is_match(value)
}

impl Display for Uid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Uid {
    type Error = UidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_uid(&value) {
            Ok(Self(value))
        } else {
            Err(UidError { value })
        }
    }
}

impl From<Uid> for String {
    fn from(value: Uid) -> Self {
        value.0
    }
}
