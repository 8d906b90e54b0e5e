// crates/granule-catalog-core/src/core/mod.rs
// ============================================================================
// Module: Granule Catalog Core Types
// Description: Identifiers and message model shared across the workspace.
// Purpose: Group the data types the writer and storage backends exchange.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types for catalog messages and keys.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod model;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::CollectionId;
pub use identifiers::CumulusGranuleId;
pub use identifiers::GranuleKey;
pub use identifiers::IsoTimestamp;
pub use identifiers::ProviderId;
pub use model::CatalogFile;
pub use model::CatalogMessage;
pub use model::Collection;
pub use model::Granule;
pub use model::Provider;
