// crates/granule-catalog-store-postgres/src/postgres_store.rs
// ============================================================================
// Module: Postgres Catalog Store
// Description: Pooled Postgres sessions executing the catalog upserts.
// Purpose: Persist providers, collections, granules, and files durably.
// ============================================================================

use std::fmt;
use std::time::Duration;

use granule_catalog_core::CatalogFile;
use granule_catalog_core::CatalogSession;
use granule_catalog_core::CatalogSessionFactory;
use granule_catalog_core::CatalogStatement;
use granule_catalog_core::CatalogStoreError;
use granule_catalog_core::CatalogTransaction;
use granule_catalog_core::Collection;
use granule_catalog_core::CollectionId;
use granule_catalog_core::Granule;
use granule_catalog_core::GranuleKey;
use granule_catalog_core::Provider;
use postgres::NoTls;
use postgres::Transaction;
use r2d2::Pool;
use r2d2::PooledConnection;
use r2d2_postgres::PostgresConnectionManager;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Default Postgres port.
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Provider insert; existing providers are left untouched.
pub(crate) const UPSERT_PROVIDER_SQL: &str =
    "INSERT INTO providers (provider_id, name) VALUES ($1, $2) ON CONFLICT (provider_id) DO \
     NOTHING";
/// Collection insert; existing collections are left untouched.
pub(crate) const UPSERT_COLLECTION_SQL: &str =
    "INSERT INTO collections (collection_id, shortname, version) VALUES ($1, $2, $3) ON \
     CONFLICT (collection_id) DO NOTHING";
/// Granule upsert returning the surrogate id.
pub(crate) const UPSERT_GRANULE_SQL: &str =
    "INSERT INTO granules (collection_id, cumulus_granule_id, execution_id, ingest_time, \
     cumulus_create_time, last_update) VALUES ($1, $2, $3, $4::text::timestamptz, \
     $5::text::timestamptz, $6::text::timestamptz) ON CONFLICT (collection_id, \
     cumulus_granule_id) DO UPDATE SET execution_id = EXCLUDED.execution_id, last_update = \
     EXCLUDED.last_update RETURNING id";
/// File upsert; locations and granule linkage never change after insert.
pub(crate) const UPSERT_FILE_SQL: &str =
    "INSERT INTO files (granule_id, name, orca_archive_location, cumulus_archive_location, \
     key_path, ingest_time, etag, version, size_in_bytes, hash, hash_type) VALUES ($1, $2, $3, \
     $4, $5, $6::text::timestamptz, $7, $8, $9, $10, $11) ON CONFLICT \
     (cumulus_archive_location, key_path) DO UPDATE SET name = EXCLUDED.name, ingest_time = \
     EXCLUDED.ingest_time, version = EXCLUDED.version, size_in_bytes = EXCLUDED.size_in_bytes, \
     hash = EXCLUDED.hash, hash_type = EXCLUDED.hash_type";

/// Postgres catalog connection settings.
///
/// The user credentials are used for catalog writes; the admin credentials
/// are only used by migrations.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostgresCatalogConfig {
    /// Database host name or address.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database holding the catalog tables.
    pub user_database: String,
    /// Application login used for writes.
    pub user_username: String,
    /// Application password.
    pub user_password: String,
    /// Maintenance database used to create the catalog database.
    pub admin_database: String,
    /// Admin login used by migrations.
    pub admin_username: String,
    /// Admin password.
    pub admin_password: String,
    /// Maximum pool size.
    pub max_connections: u32,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Statement timeout in milliseconds.
    pub statement_timeout_ms: u64,
}

impl Default for PostgresCatalogConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_POSTGRES_PORT,
            user_database: "granule_catalog".to_string(),
            user_username: "granule_catalog".to_string(),
            user_password: String::new(),
            admin_database: "postgres".to_string(),
            admin_username: "postgres".to_string(),
            admin_password: String::new(),
            max_connections: 4,
            connect_timeout_ms: 5_000,
            statement_timeout_ms: 30_000,
        }
    }
}

impl fmt::Debug for PostgresCatalogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCatalogConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user_database", &self.user_database)
            .field("user_username", &self.user_username)
            .field("user_password", &"<redacted>")
            .field("admin_database", &self.admin_database)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .finish()
    }
}

impl PostgresCatalogConfig {
    /// Validates connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresCatalogError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PostgresCatalogError> {
        let required = [
            ("host", &self.host),
            ("user_database", &self.user_database),
            ("user_username", &self.user_username),
            ("admin_database", &self.admin_database),
            ("admin_username", &self.admin_username),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PostgresCatalogError::Invalid(format!("{field} must be non-empty")));
            }
        }
        if self.port == 0 {
            return Err(PostgresCatalogError::Invalid("port must be non-zero".to_string()));
        }
        if self.max_connections == 0 {
            return Err(PostgresCatalogError::Invalid(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 || self.statement_timeout_ms == 0 {
            return Err(PostgresCatalogError::Invalid("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Connection settings for catalog writes (application credentials).
    #[must_use]
    pub fn user_connection(&self) -> postgres::Config {
        self.connection(&self.user_database, &self.user_username, &self.user_password)
    }

    /// Connection settings for `database` with admin credentials.
    #[must_use]
    pub fn admin_connection(&self, database: &str) -> postgres::Config {
        self.connection(database, &self.admin_username, &self.admin_password)
    }

    /// Builds client settings with the configured timeouts.
    fn connection(&self, database: &str, username: &str, password: &str) -> postgres::Config {
        let mut pg_config = postgres::Config::new();
        pg_config
            .host(&self.host)
            .port(self.port)
            .dbname(database)
            .user(username)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .options(&format!("-c statement_timeout={}", self.statement_timeout_ms));
        if !password.is_empty() {
            pg_config.password(password);
        }
        pg_config
    }
}

impl CatalogSessionFactory for PostgresCatalogConfig {
    fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogStoreError> {
        let store = PostgresCatalogStore::connect(self).map_err(|err| match err {
            PostgresCatalogError::Invalid(message) => CatalogStoreError::Invalid(message),
            PostgresCatalogError::Postgres(message) => CatalogStoreError::Connection(message),
        })?;
        Ok(Box::new(store))
    }
}

/// Postgres catalog errors.
#[derive(Debug, Error)]
pub enum PostgresCatalogError {
    /// Postgres error.
    #[error("postgres catalog error: {0}")]
    Postgres(String),
    /// Invalid configuration.
    #[error("postgres catalog invalid configuration: {0}")]
    Invalid(String),
}

/// Postgres-backed catalog session.
pub struct PostgresCatalogStore {
    /// Connection pool for Postgres access.
    pool: Option<Pool<PostgresConnectionManager<NoTls>>>,
}

impl Drop for PostgresCatalogStore {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let _ = std::thread::spawn(move || drop(pool));
        }
    }
}

impl fmt::Debug for PostgresCatalogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCatalogStore").field("open", &self.pool.is_some()).finish()
    }
}

impl PostgresCatalogStore {
    /// Builds the connection pool and verifies the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresCatalogError`] when the configuration is invalid or
    /// no connection can be established within the connect timeout.
    pub fn connect(config: &PostgresCatalogConfig) -> Result<Self, PostgresCatalogError> {
        config.validate()?;
        let manager = PostgresConnectionManager::new(config.user_connection(), NoTls);
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build(manager)
            .map_err(|err| PostgresCatalogError::Postgres(err.to_string()))?;
        Ok(Self {
            pool: Some(pool),
        })
    }

    /// Checks out a pooled connection.
    fn connection(
        &self,
    ) -> Result<PooledConnection<PostgresConnectionManager<NoTls>>, CatalogStoreError> {
        self.pool
            .as_ref()
            .ok_or_else(|| CatalogStoreError::Connection("postgres catalog closed".to_string()))?
            .get()
            .map_err(|err| CatalogStoreError::Connection(err.to_string()))
    }
}

impl CatalogSession for PostgresCatalogStore {
    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn CatalogTransaction) -> Result<(), CatalogStoreError>,
    ) -> Result<(), CatalogStoreError> {
        let mut conn = self.connection()?;
        let tx =
            conn.transaction().map_err(|err| CatalogStoreError::Transaction(err.to_string()))?;
        let mut catalog_tx = PostgresCatalogTransaction {
            tx,
        };
        let outcome = work(&mut catalog_tx);
        let tx = catalog_tx.tx;
        match outcome {
            Ok(()) => tx.commit().map_err(|err| CatalogStoreError::Transaction(err.to_string())),
            Err(err) => {
                // Rollback errors are dropped; the statement error is reported.
                let _ = tx.rollback();
                Err(err)
            }
        }
    }
}

/// Catalog statements executed inside one Postgres transaction.
struct PostgresCatalogTransaction<'a> {
    /// Open transaction.
    tx: Transaction<'a>,
}

impl CatalogTransaction for PostgresCatalogTransaction<'_> {
    fn upsert_provider(&mut self, provider: &Provider) -> Result<(), CatalogStoreError> {
        self.tx
            .execute(UPSERT_PROVIDER_SQL, &[&provider.provider_id.as_str(), &provider.name])
            .map_err(|err| statement_error(CatalogStatement::Provider, &err))?;
        Ok(())
    }

    fn upsert_collection(&mut self, collection: &Collection) -> Result<(), CatalogStoreError> {
        self.tx
            .execute(
                UPSERT_COLLECTION_SQL,
                &[&collection.collection_id.as_str(), &collection.shortname, &collection.version],
            )
            .map_err(|err| statement_error(CatalogStatement::Collection, &err))?;
        Ok(())
    }

    fn upsert_granule(
        &mut self,
        collection_id: &CollectionId,
        granule: &Granule,
    ) -> Result<GranuleKey, CatalogStoreError> {
        let row = self
            .tx
            .query_one(
                UPSERT_GRANULE_SQL,
                &[
                    &collection_id.as_str(),
                    &granule.cumulus_granule_id.as_str(),
                    &granule.execution_id,
                    &granule.ingest_time.as_str(),
                    &granule.cumulus_create_time.as_str(),
                    &granule.last_update.as_str(),
                ],
            )
            .map_err(|err| statement_error(CatalogStatement::Granule, &err))?;
        let id: i64 =
            row.try_get(0).map_err(|err| statement_error(CatalogStatement::Granule, &err))?;
        Ok(GranuleKey::new(id))
    }

    fn upsert_files(
        &mut self,
        granule_key: GranuleKey,
        files: &[CatalogFile],
    ) -> Result<(), CatalogStoreError> {
        let statement = self
            .tx
            .prepare(UPSERT_FILE_SQL)
            .map_err(|err| statement_error(CatalogStatement::Files, &err))?;
        let granule_id = granule_key.get();
        for file in files {
            let size_in_bytes = storable_size(file)?;
            self.tx
                .execute(
                    &statement,
                    &[
                        &granule_id,
                        &file.name,
                        &file.orca_archive_location,
                        &file.cumulus_archive_location,
                        &file.key_path,
                        &file.ingest_time.as_str(),
                        &file.etag,
                        &file.version,
                        &size_in_bytes,
                        &file.hash,
                        &file.hash_type,
                    ],
                )
                .map_err(|err| statement_error(CatalogStatement::Files, &err))?;
        }
        Ok(())
    }
}

/// Converts a file size to the `BIGINT` column range.
pub(crate) fn storable_size(file: &CatalogFile) -> Result<i64, CatalogStoreError> {
    i64::try_from(file.size_in_bytes).map_err(|_| {
        CatalogStoreError::Invalid(format!(
            "file {} size {} exceeds storage range",
            file.name, file.size_in_bytes
        ))
    })
}

/// Maps a driver error to a statement failure, keeping the SQLSTATE code.
fn statement_error(statement: CatalogStatement, err: &postgres::Error) -> CatalogStoreError {
    let message = match err.code() {
        Some(code) => format!("{err} (sqlstate {})", code.code()),
        None => err.to_string(),
    };
    CatalogStoreError::statement(statement, message)
}
