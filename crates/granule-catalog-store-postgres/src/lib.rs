// crates/granule-catalog-store-postgres/src/lib.rs
// ============================================================================
// Granule catalog storage on Postgres.
// ============================================================================

//! Postgres catalog backend.
//!
//! Implements the catalog session seam on a pooled `postgres` client and
//! provides the DDL that creates the catalog tables.

/// Catalog DDL and database bootstrap.
pub mod migrations;
/// Postgres-backed catalog sessions.
pub mod postgres_store;

pub use migrations::MigrationReport;
pub use migrations::apply_catalog_schema;
pub use migrations::ensure_catalog_database;
pub use migrations::migrate;
pub use postgres_store::PostgresCatalogConfig;
pub use postgres_store::PostgresCatalogError;
pub use postgres_store::PostgresCatalogStore;
