// crates/granule-catalog-core/src/runtime/mod.rs
// ============================================================================
// Module: Granule Catalog Runtime
// Description: Catalog writer, batch driver, and in-memory backend.
// Purpose: Execute catalog records against a storage session.
// Dependencies: crate::{audit, core, interfaces, schema}
// ============================================================================

//! ## Overview
//! Runtime components that turn queue records into catalog rows.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod driver;
pub mod memory;
pub mod writer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use driver::BatchDriver;
pub use driver::BatchDriverConfig;
pub use driver::BatchError;
pub use driver::BatchItemFailure;
pub use driver::BatchItemFailures;
pub use driver::BatchReport;
pub use driver::DEFAULT_MAX_BATCH_RECORDS;
pub use driver::DEFAULT_MAX_BODY_BYTES;
pub use driver::FailurePolicy;
pub use driver::QueueEvent;
pub use driver::QueueRecord;
pub use driver::RecordError;
pub use driver::RecordFailure;
pub use driver::WrittenRecord;
pub use memory::CollectionRow;
pub use memory::FileRow;
pub use memory::GranuleRow;
pub use memory::InMemoryCatalog;
pub use memory::ProviderRow;
pub use writer::CatalogWriter;
