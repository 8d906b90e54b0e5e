// crates/granule-catalog-core/src/schema.rs
// ============================================================================
// Module: Catalog Record Schema Validation
// Description: Compiled JSON schema for catalog queue message bodies.
// Purpose: Reject malformed messages before any database interaction.
// Dependencies: jsonschema, serde_json
// ============================================================================

//! ## Overview
//! The catalog record schema is embedded at build time and compiled once into
//! a [`CatalogValidator`]. The validator is immutable after construction and
//! is shared by reference (typically inside an `Arc`) across every record of
//! every batch. Format assertions are enabled, so timestamp fields must be
//! RFC 3339 `date-time` strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

use crate::core::CatalogMessage;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Raw catalog record schema document.
pub const CATALOG_RECORD_SCHEMA: &str = include_str!("../schemas/catalog_record_input.json");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema validation failure for a decoded message body.
///
/// # Invariants
/// - `violations` is never empty when returned from [`CatalogValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("catalog record failed schema validation: {}", violations.join("; "))]
pub struct SchemaValidationError {
    /// One message per violated constraint, in schema evaluation order.
    pub violations: Vec<String>,
}

impl SchemaValidationError {
    /// Builds an error with a single violation message.
    #[must_use]
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            violations: vec![message.into()],
        }
    }
}

/// Failure to compile the embedded schema.
#[derive(Debug, Error)]
pub enum SchemaBuildError {
    /// The schema document is not valid JSON.
    #[error("catalog record schema is not valid json: {0}")]
    Parse(String),
    /// The schema document could not be compiled.
    #[error("invalid catalog record schema: {0}")]
    Compile(String),
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Compiled validator for catalog message bodies.
pub struct CatalogValidator {
    /// Compiled schema.
    validator: Validator,
}

impl CatalogValidator {
    /// Compiles the embedded catalog record schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaBuildError`] when the embedded schema cannot be compiled.
    pub fn new() -> Result<Self, SchemaBuildError> {
        let schema: Value = serde_json::from_str(CATALOG_RECORD_SCHEMA)
            .map_err(|err| SchemaBuildError::Parse(err.to_string()))?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|err| SchemaBuildError::Compile(err.to_string()))?;
        Ok(Self {
            validator,
        })
    }

    /// Validates a decoded message body.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaValidationError`] listing every violated constraint.
    pub fn validate(&self, payload: &Value) -> Result<(), SchemaValidationError> {
        let violations: Vec<String> =
            self.validator.iter_errors(payload).map(|err| err.to_string()).collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError {
                violations,
            })
        }
    }

    /// Validates a decoded body and converts it into the typed message model.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaValidationError`] when validation fails or the payload
    /// cannot be represented by [`CatalogMessage`].
    pub fn decode(&self, payload: Value) -> Result<CatalogMessage, SchemaValidationError> {
        self.validate(&payload)?;
        serde_json::from_value(payload)
            .map_err(|err| SchemaValidationError::single(format!("catalog record shape: {err}")))
    }
}

impl std::fmt::Debug for CatalogValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogValidator").finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
