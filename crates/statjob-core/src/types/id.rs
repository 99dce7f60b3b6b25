//! Newtype wrappers for job and worker identifiers.
//!
//! Identifiers are opaque strings, but they end up as directory names and
//! queue entry filenames, so construction validates them: 1..=128 ASCII
//! characters from `[A-Za-z0-9_.-]`, not starting with `.`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Maximum identifier length in bytes.
pub const MAX_ID_LEN: usize = 128;

/// Check that `value` is usable as a single path component.
pub fn validate_id(value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::invalid_id("identifier must not be empty"));
    }
    if value.len() > MAX_ID_LEN {
        return Err(AppError::invalid_id(format!(
            "identifier exceeds {MAX_ID_LEN} characters"
        )));
    }
    if value.starts_with('.') {
        return Err(AppError::invalid_id(format!(
            "identifier must not start with '.': {value}"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(AppError::invalid_id(format!(
            "identifier contains invalid character {bad:?}: {value}"
        )));
    }
    Ok(())
}

/// Macro to define a validated string identifier.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier, validating it.
            pub fn new(value: impl Into<String>) -> Result<Self, AppError> {
                let value = value.into();
                validate_id(&value)?;
                Ok(Self(value))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = AppError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier of a job and its record directory.
    JobId
);

define_id!(
    /// Identifier of a worker thread or process holding claims.
    WorkerId
);

impl JobId {
    /// Generate a fresh, time-ordered job identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }
}

impl WorkerId {
    /// Generate a worker identifier unique to this process and slot.
    pub fn generate(prefix: &str, slot: usize) -> Result<Self, AppError> {
        let nonce = Uuid::new_v4().simple().to_string();
        Self::new(format!(
            "{prefix}-{}-{slot}-{}",
            std::process::id(),
            &nonce[..8]
        ))
    }
}
