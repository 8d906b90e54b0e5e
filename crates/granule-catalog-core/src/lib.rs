// crates/granule-catalog-core/src/lib.rs
// ============================================================================
// Module: Granule Catalog Core Library
// Description: Public API surface for the granule catalog core.
// Purpose: Expose message types, schema validation, storage seams, and runtime.
// Dependencies: crate::{audit, core, interfaces, runtime, schema}
// ============================================================================

//! ## Overview
//! Granule catalog core turns queue messages describing ingested granules
//! into catalog rows (providers, collections, granules, files). Each message
//! is validated against a fixed schema and then written with four ordered
//! upserts inside one transaction. Storage is reached only through the
//! [`CatalogSession`] seam, so backends stay out of this crate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::CatalogAuditSink;
pub use audit::FileAuditSink;
pub use audit::InMemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::CatalogSession;
pub use interfaces::CatalogSessionFactory;
pub use interfaces::CatalogStatement;
pub use interfaces::CatalogStoreError;
pub use interfaces::CatalogTransaction;
pub use runtime::BatchDriver;
pub use runtime::BatchDriverConfig;
pub use runtime::BatchError;
pub use runtime::BatchReport;
pub use runtime::CatalogWriter;
pub use runtime::FailurePolicy;
pub use runtime::InMemoryCatalog;
pub use runtime::QueueEvent;
pub use runtime::QueueRecord;
pub use runtime::RecordError;
pub use schema::CatalogValidator;
pub use schema::SchemaBuildError;
pub use schema::SchemaValidationError;
