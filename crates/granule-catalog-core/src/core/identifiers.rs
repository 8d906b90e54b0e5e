// crates/granule-catalog-core/src/core/identifiers.rs
// ============================================================================
// Module: Granule Catalog Identifiers
// Description: Opaque identifiers for catalog providers, collections, and granules.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers used as catalog keys. String identifiers are opaque and
//! serialize transparently; emptiness is rejected by the message schema, not
//! by these wrappers. [`GranuleKey`] is the database-assigned surrogate id
//! used only to link file rows to their granule.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Defines a transparent string identifier with the shared accessor set.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier!(
    /// Data provider identifier (`providers.provider_id`).
    ProviderId
);

string_identifier!(
    /// Collection identifier (`collections.collection_id`).
    CollectionId
);

string_identifier!(
    /// Granule identifier assigned upstream; unique only within a collection.
    CumulusGranuleId
);

/// Database-assigned surrogate id of a granule row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GranuleKey(i64);

impl GranuleKey {
    /// Wraps a raw surrogate id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw surrogate id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for GranuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// ISO-8601 timestamp carried verbatim from the message.
///
/// The catalog never parses or reformats these values; the schema asserts the
/// `date-time` format and storage backends hand the text to the database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsoTimestamp(String);

impl IsoTimestamp {
    /// Wraps a timestamp string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the timestamp text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IsoTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for IsoTimestamp {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
