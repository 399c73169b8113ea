//! Identifier types for TokenLedger entities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LedgerError, Result};

/// Maximum identifier length in bytes.
pub const MAX_ID_LEN: usize = 256;

/// Separator byte of composite state keys. Identifiers may never contain it.
pub const KEY_SEPARATOR: char = '\u{0}';

/// Check that a raw identifier can be embedded in a composite key.
pub fn validate_id(value: &str, field: &'static str) -> Result<()> {
    if value.is_empty() {
        return Err(LedgerError::invalid_field(field, "must not be empty"));
    }
    if value.len() > MAX_ID_LEN {
        return Err(LedgerError::invalid_field(
            field,
            format!("exceeds {} bytes", MAX_ID_LEN),
        ));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(LedgerError::invalid_field(field, "contains U+0000"));
    }
    Ok(())
}

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier. Not validated; see [`Self::validate`].
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check the identifier is usable as a key component.
            pub fn validate(&self, field: &'static str) -> Result<()> {
                validate_id(&self.0, field)
            }

            /// Check the identifier format.
            pub fn is_valid(&self) -> bool {
                validate_id(&self.0, "id").is_ok()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_identifier!(
    /// Identifier of one fungible token type.
    AssetId
);

string_identifier!(
    /// Identifier of a token holder.
    OwnerId
);

string_identifier!(
    /// Client-chosen transaction identifier. Together with an [`AssetId`]
    /// it forms the idempotency key of an operation.
    TxnId
);

string_identifier!(
    /// Membership/organization identifier of a caller (e.g. `Org1MSP`).
    OrgId
);
