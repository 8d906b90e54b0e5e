// crates/granule-catalog-store-postgres/src/migrations.rs
// ============================================================================
// Module: Catalog Migrations
// Description: Catalog database bootstrap and table DDL.
// Purpose: Create the catalog database, tables, and application grants.
// ============================================================================

use postgres::NoTls;
use serde::Serialize;

use crate::postgres_store::PostgresCatalogConfig;
use crate::postgres_store::PostgresCatalogError;

/// Catalog tables. Every statement is idempotent.
pub const CATALOG_SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS providers (provider_id TEXT \
     PRIMARY KEY,name TEXT NOT NULL);CREATE TABLE IF NOT EXISTS collections (collection_id TEXT \
     PRIMARY KEY,shortname TEXT NOT NULL,version TEXT NOT NULL);CREATE TABLE IF NOT EXISTS \
     granules (id BIGSERIAL PRIMARY KEY,collection_id TEXT NOT NULL REFERENCES collections \
     (collection_id),cumulus_granule_id TEXT NOT NULL,execution_id TEXT NOT NULL,ingest_time \
     TIMESTAMPTZ NOT NULL,cumulus_create_time TIMESTAMPTZ NOT NULL,last_update TIMESTAMPTZ NOT \
     NULL,UNIQUE (collection_id, cumulus_granule_id));CREATE TABLE IF NOT EXISTS files (id \
     BIGSERIAL PRIMARY KEY,granule_id BIGINT NOT NULL REFERENCES granules (id),name TEXT NOT \
     NULL,orca_archive_location TEXT NOT NULL,cumulus_archive_location TEXT NOT NULL,key_path \
     TEXT NOT NULL,ingest_time TIMESTAMPTZ NOT NULL,etag TEXT NOT NULL,version TEXT NOT \
     NULL,size_in_bytes BIGINT NOT NULL CHECK (size_in_bytes >= 0),hash TEXT,hash_type \
     TEXT,UNIQUE (cumulus_archive_location, key_path));CREATE INDEX IF NOT EXISTS \
     idx_files_granule_id ON files (granule_id);";

/// Outcome of [`migrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// True when the catalog database did not exist and was created.
    pub database_created: bool,
    /// True when table privileges were granted to the application login.
    pub grants_applied: bool,
}

/// Quotes a Postgres identifier.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Grants the application login read/write access to the catalog tables.
pub(crate) fn grant_statements(username: &str) -> String {
    let role = quote_identifier(username);
    format!(
        "GRANT SELECT, INSERT, UPDATE ON providers, collections, granules, files TO {role};GRANT \
         USAGE, SELECT ON SEQUENCE granules_id_seq, files_id_seq TO {role};"
    )
}

/// Creates the catalog database through the admin database when missing.
///
/// Returns true when the database was created.
///
/// # Errors
///
/// Returns [`PostgresCatalogError`] when the admin connection or DDL fails.
pub fn ensure_catalog_database(
    config: &PostgresCatalogConfig,
) -> Result<bool, PostgresCatalogError> {
    config.validate()?;
    let mut client = config
        .admin_connection(&config.admin_database)
        .connect(NoTls)
        .map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?;
    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&config.user_database])
        .map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?
        .is_some();
    if exists {
        return Ok(false);
    }
    client
        .batch_execute(&format!("CREATE DATABASE {}", quote_identifier(&config.user_database)))
        .map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?;
    Ok(true)
}

/// Applies the catalog DDL to the catalog database with admin credentials.
///
/// Returns true when grants were issued to a distinct application login.
///
/// # Errors
///
/// Returns [`PostgresCatalogError`] when the connection or DDL fails.
pub fn apply_catalog_schema(config: &PostgresCatalogConfig) -> Result<bool, PostgresCatalogError> {
    config.validate()?;
    let mut client = config
        .admin_connection(&config.user_database)
        .connect(NoTls)
        .map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?;
    let mut tx =
        client.transaction().map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?;
    tx.batch_execute(CATALOG_SCHEMA_SQL)
        .map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?;
    let grant = config.user_username != config.admin_username;
    if grant {
        tx.batch_execute(&grant_statements(&config.user_username))
            .map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?;
    }
    tx.commit().map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?;
    Ok(grant)
}

/// Creates the catalog database if needed, then applies the catalog DDL.
///
/// # Errors
///
/// Returns [`PostgresCatalogError`] when any step fails.
pub fn migrate(config: &PostgresCatalogConfig) -> Result<MigrationReport, PostgresCatalogError> {
    let database_created = ensure_catalog_database(config)?;
    let grants_applied = apply_catalog_schema(config)?;
    Ok(MigrationReport {
        database_created,
        grants_applied,
    })
}
