// crates/granule-catalog-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Catalog
// Description: Mutex-guarded catalog tables with upsert and rollback semantics.
// Purpose: Provide a deterministic catalog backend without external deps.
// Dependencies: crate::{core, interfaces}, serde
// ============================================================================

//! ## Overview
//! [`InMemoryCatalog`] implements the storage seams with the same conflict
//! policy as the Postgres backend, including foreign-key checks and full
//! rollback. Transactions hold the table lock for their whole duration and
//! work on a copy that replaces the tables only on commit. Statement failures
//! can be injected to exercise rollback paths. Intended for tests and local
//! runs, not production.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::CatalogFile;
use crate::core::Collection;
use crate::core::CollectionId;
use crate::core::CumulusGranuleId;
use crate::core::Granule;
use crate::core::GranuleKey;
use crate::core::IsoTimestamp;
use crate::core::Provider;
use crate::core::ProviderId;
use crate::interfaces::CatalogSession;
use crate::interfaces::CatalogSessionFactory;
use crate::interfaces::CatalogStatement;
use crate::interfaces::CatalogStoreError;
use crate::interfaces::CatalogTransaction;

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Stored provider row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRow {
    /// Provider identifier.
    pub provider_id: ProviderId,
    /// Display name.
    pub name: String,
}

/// Stored collection row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionRow {
    /// Collection identifier.
    pub collection_id: CollectionId,
    /// Short name.
    pub shortname: String,
    /// Version label.
    pub version: String,
}

/// Stored granule row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GranuleRow {
    /// Surrogate id.
    pub id: GranuleKey,
    /// Owning collection.
    pub collection_id: CollectionId,
    /// Upstream granule identifier.
    pub cumulus_granule_id: CumulusGranuleId,
    /// Latest execution id.
    pub execution_id: String,
    /// Ingest time from the first submission.
    pub ingest_time: IsoTimestamp,
    /// Upstream creation time from the first submission.
    pub cumulus_create_time: IsoTimestamp,
    /// Latest update time.
    pub last_update: IsoTimestamp,
}

/// Stored file row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRow {
    /// Surrogate id.
    pub id: i64,
    /// Owning granule.
    pub granule_id: GranuleKey,
    /// File name.
    pub name: String,
    /// Primary archive bucket.
    pub cumulus_archive_location: String,
    /// Recovery archive bucket.
    pub orca_archive_location: String,
    /// Object key.
    pub key_path: String,
    /// Object size in bytes.
    pub size_in_bytes: i64,
    /// Checksum value.
    pub hash: Option<String>,
    /// Checksum algorithm.
    pub hash_type: Option<String>,
    /// Object version.
    pub version: String,
    /// Archive time.
    pub ingest_time: IsoTimestamp,
    /// Object etag.
    pub etag: String,
}

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Full catalog contents plus id sequences.
#[derive(Debug, Clone, Default)]
struct CatalogTables {
    /// Providers keyed by id.
    providers: BTreeMap<ProviderId, ProviderRow>,
    /// Collections keyed by id.
    collections: BTreeMap<CollectionId, CollectionRow>,
    /// Granules keyed by `(collection_id, cumulus_granule_id)`.
    granules: BTreeMap<(CollectionId, CumulusGranuleId), GranuleRow>,
    /// Files keyed by `(cumulus_archive_location, key_path)`.
    files: BTreeMap<(String, String), FileRow>,
    /// Last granule id handed out.
    granule_seq: i64,
    /// Last file id handed out.
    file_seq: i64,
}

/// Shared mutable state behind every clone of an [`InMemoryCatalog`].
#[derive(Debug, Default)]
struct CatalogState {
    /// Committed tables.
    tables: CatalogTables,
    /// Statement that fails on its next execution, if any.
    fail_at: Option<CatalogStatement>,
    /// Committed transaction count.
    commits: usize,
    /// Rolled back transaction count.
    rollbacks: usize,
}

// ============================================================================
// SECTION: In-Memory Catalog
// ============================================================================

/// In-memory catalog for tests and examples.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    /// Catalog state protected by a mutex.
    state: Arc<Mutex<CatalogState>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent execution of `statement` fail until cleared.
    pub fn fail_at(&self, statement: CatalogStatement) {
        if let Ok(mut guard) = self.state.lock() {
            guard.fail_at = Some(statement);
        }
    }

    /// Clears any injected statement failure.
    pub fn clear_failure(&self) {
        if let Ok(mut guard) = self.state.lock() {
            guard.fail_at = None;
        }
    }

    /// Returns committed provider rows ordered by id.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderRow> {
        self.read(|tables| tables.providers.values().cloned().collect())
    }

    /// Returns committed collection rows ordered by id.
    #[must_use]
    pub fn collections(&self) -> Vec<CollectionRow> {
        self.read(|tables| tables.collections.values().cloned().collect())
    }

    /// Returns committed granule rows ordered by composite key.
    #[must_use]
    pub fn granules(&self) -> Vec<GranuleRow> {
        self.read(|tables| tables.granules.values().cloned().collect())
    }

    /// Returns committed file rows ordered by composite key.
    #[must_use]
    pub fn files(&self) -> Vec<FileRow> {
        self.read(|tables| tables.files.values().cloned().collect())
    }

    /// Returns the number of committed transactions.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.state.lock().map(|guard| guard.commits).unwrap_or_default()
    }

    /// Returns the number of rolled back transactions.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.state.lock().map(|guard| guard.rollbacks).unwrap_or_default()
    }

    /// Reads committed tables; a poisoned lock reads as empty.
    fn read<T: Default>(&self, f: impl FnOnce(&CatalogTables) -> T) -> T {
        self.state.lock().map(|guard| f(&guard.tables)).unwrap_or_default()
    }
}

impl CatalogSession for InMemoryCatalog {
    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn CatalogTransaction) -> Result<(), CatalogStoreError>,
    ) -> Result<(), CatalogStoreError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| CatalogStoreError::Transaction("catalog mutex poisoned".to_string()))?;
        let mut tx = MemoryTransaction {
            tables: guard.tables.clone(),
            fail_at: guard.fail_at,
        };
        match work(&mut tx) {
            Ok(()) => {
                guard.tables = tx.tables;
                guard.commits += 1;
                Ok(())
            }
            Err(err) => {
                guard.rollbacks += 1;
                Err(err)
            }
        }
    }
}

impl CatalogSessionFactory for InMemoryCatalog {
    fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogStoreError> {
        Ok(Box::new(self.clone()))
    }
}

// ============================================================================
// SECTION: Transaction
// ============================================================================

/// Working copy of the tables for one transaction.
struct MemoryTransaction {
    /// Uncommitted tables.
    tables: CatalogTables,
    /// Injected failure.
    fail_at: Option<CatalogStatement>,
}

impl MemoryTransaction {
    /// Fails when `statement` has an injected failure.
    fn check(&self, statement: CatalogStatement) -> Result<(), CatalogStoreError> {
        if self.fail_at == Some(statement) {
            return Err(CatalogStoreError::statement(statement, "injected failure"));
        }
        Ok(())
    }
}

impl CatalogTransaction for MemoryTransaction {
    fn upsert_provider(&mut self, provider: &Provider) -> Result<(), CatalogStoreError> {
        self.check(CatalogStatement::Provider)?;
        self.tables.providers.entry(provider.provider_id.clone()).or_insert_with(|| ProviderRow {
            provider_id: provider.provider_id.clone(),
            name: provider.name.clone(),
        });
        Ok(())
    }

    fn upsert_collection(&mut self, collection: &Collection) -> Result<(), CatalogStoreError> {
        self.check(CatalogStatement::Collection)?;
        self.tables.collections.entry(collection.collection_id.clone()).or_insert_with(|| {
            CollectionRow {
                collection_id: collection.collection_id.clone(),
                shortname: collection.shortname.clone(),
                version: collection.version.clone(),
            }
        });
        Ok(())
    }

    fn upsert_granule(
        &mut self,
        collection_id: &CollectionId,
        granule: &Granule,
    ) -> Result<GranuleKey, CatalogStoreError> {
        self.check(CatalogStatement::Granule)?;
        if !self.tables.collections.contains_key(collection_id) {
            return Err(CatalogStoreError::statement(
                CatalogStatement::Granule,
                format!("foreign key violation: collection {collection_id} does not exist"),
            ));
        }
        let key = (collection_id.clone(), granule.cumulus_granule_id.clone());
        if let Some(row) = self.tables.granules.get_mut(&key) {
            row.execution_id.clone_from(&granule.execution_id);
            row.last_update = granule.last_update.clone();
            return Ok(row.id);
        }
        self.tables.granule_seq += 1;
        let id = GranuleKey::new(self.tables.granule_seq);
        self.tables.granules.insert(key, GranuleRow {
            id,
            collection_id: collection_id.clone(),
            cumulus_granule_id: granule.cumulus_granule_id.clone(),
            execution_id: granule.execution_id.clone(),
            ingest_time: granule.ingest_time.clone(),
            cumulus_create_time: granule.cumulus_create_time.clone(),
            last_update: granule.last_update.clone(),
        });
        Ok(id)
    }

    fn upsert_files(
        &mut self,
        granule_key: GranuleKey,
        files: &[CatalogFile],
    ) -> Result<(), CatalogStoreError> {
        self.check(CatalogStatement::Files)?;
        if !self.tables.granules.values().any(|row| row.id == granule_key) {
            return Err(CatalogStoreError::statement(
                CatalogStatement::Files,
                format!("foreign key violation: granule {granule_key} does not exist"),
            ));
        }
        for file in files {
            let size_in_bytes = i64::try_from(file.size_in_bytes).map_err(|_| {
                CatalogStoreError::Invalid(format!(
                    "file {} size {} exceeds storage range",
                    file.name, file.size_in_bytes
                ))
            })?;
            let key = (file.cumulus_archive_location.clone(), file.key_path.clone());
            if let Some(row) = self.tables.files.get_mut(&key) {
                row.name.clone_from(&file.name);
                row.ingest_time = file.ingest_time.clone();
                row.version.clone_from(&file.version);
                row.size_in_bytes = size_in_bytes;
                row.hash.clone_from(&file.hash);
                row.hash_type.clone_from(&file.hash_type);
                continue;
            }
            self.tables.file_seq += 1;
            self.tables.files.insert(key, FileRow {
                id: self.tables.file_seq,
                granule_id: granule_key,
                name: file.name.clone(),
                cumulus_archive_location: file.cumulus_archive_location.clone(),
                orca_archive_location: file.orca_archive_location.clone(),
                key_path: file.key_path.clone(),
                size_in_bytes,
                hash: file.hash.clone(),
                hash_type: file.hash_type.clone(),
                version: file.version.clone(),
                ingest_time: file.ingest_time.clone(),
                etag: file.etag.clone(),
            });
        }
        Ok(())
    }
}
