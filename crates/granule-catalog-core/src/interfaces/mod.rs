// crates/granule-catalog-core/src/interfaces/mod.rs
// ============================================================================
// Module: Granule Catalog Interfaces
// Description: Backend-agnostic storage seams for the catalog writer.
// Purpose: Define the contract between the writer and storage backends.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Storage backends expose three layers:
//! - [`CatalogSessionFactory`] turns connection configuration into a session.
//! - [`CatalogSession`] owns transaction boundaries: it begins a transaction,
//!   runs the caller's work, commits on success, and rolls back on error.
//! - [`CatalogTransaction`] executes the four upsert statements.
//!
//! Backends must implement the conflict policy of each statement exactly;
//! the writer relies on it for idempotence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::CatalogFile;
use crate::core::Collection;
use crate::core::CollectionId;
use crate::core::Granule;
use crate::core::GranuleKey;
use crate::core::Provider;

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Upsert statement groups, in the order the writer executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogStatement {
    /// Provider insert, no-op on conflict.
    Provider,
    /// Collection insert, no-op on conflict.
    Collection,
    /// Granule upsert returning the surrogate id.
    Granule,
    /// File upserts keyed by archive location and key path.
    Files,
}

impl CatalogStatement {
    /// Returns a stable label for logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Collection => "collection",
            Self::Granule => "granule",
            Self::Files => "files",
        }
    }
}

impl fmt::Display for CatalogStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Catalog storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogStoreError {
    /// Connection could not be obtained or was lost.
    #[error("catalog store connection error: {0}")]
    Connection(String),
    /// An upsert statement failed.
    #[error("catalog store {statement} statement failed: {message}")]
    Statement {
        /// Statement group that failed.
        statement: CatalogStatement,
        /// Database error text.
        message: String,
    },
    /// Transaction begin, commit, or rollback failed.
    #[error("catalog store transaction error: {0}")]
    Transaction(String),
    /// Values cannot be represented by the store.
    #[error("catalog store invalid data: {0}")]
    Invalid(String),
}

impl CatalogStoreError {
    /// Builds a statement failure.
    #[must_use]
    pub fn statement(statement: CatalogStatement, message: impl Into<String>) -> Self {
        Self::Statement {
            statement,
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Transaction
// ============================================================================

/// Statement executor bound to one open transaction.
pub trait CatalogTransaction {
    /// Inserts a provider row; an existing row with the same id wins.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError`] when the statement fails.
    fn upsert_provider(&mut self, provider: &Provider) -> Result<(), CatalogStoreError>;

    /// Inserts a collection row; an existing row with the same id wins.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError`] when the statement fails.
    fn upsert_collection(&mut self, collection: &Collection) -> Result<(), CatalogStoreError>;

    /// Upserts a granule keyed by `(collection_id, cumulus_granule_id)`.
    ///
    /// On conflict only `execution_id` and `last_update` are overwritten.
    /// Returns the surrogate id of the inserted or updated row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError`] when the statement fails.
    fn upsert_granule(
        &mut self,
        collection_id: &CollectionId,
        granule: &Granule,
    ) -> Result<GranuleKey, CatalogStoreError>;

    /// Upserts file rows keyed by `(cumulus_archive_location, key_path)`.
    ///
    /// Rows are applied in order. On conflict `name`, `ingest_time`,
    /// `version`, `size_in_bytes`, `hash`, and `hash_type` are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError`] when any row fails.
    fn upsert_files(
        &mut self,
        granule_key: GranuleKey,
        files: &[CatalogFile],
    ) -> Result<(), CatalogStoreError>;
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Session capable of running work inside a transaction.
pub trait CatalogSession {
    /// Runs `work` inside a new transaction.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back in full
    /// when it returns `Err`; the error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError`] from `work`, or when the transaction
    /// cannot be opened or committed.
    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn CatalogTransaction) -> Result<(), CatalogStoreError>,
    ) -> Result<(), CatalogStoreError>;
}

/// Connection configuration able to open catalog sessions.
pub trait CatalogSessionFactory {
    /// Opens a session (for example a connection pool).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError`] when the backend is unreachable or the
    /// configuration is invalid.
    fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogStoreError>;
}
