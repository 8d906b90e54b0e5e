// crates/granule-catalog-config/src/lib.rs
// ============================================================================
// Module: Granule Catalog Config Library
// Description: Config model, environment overrides, and validation.
// Purpose: Single source of truth for granule-catalog.toml semantics.
// Dependencies: granule-catalog-core, granule-catalog-store-postgres, serde, toml
// ============================================================================

//! ## Overview
//! `granule-catalog-config` loads the worker configuration from TOML, layers
//! the deployment environment variables on top, and validates the result
//! fail-closed before anything connects to the database.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
