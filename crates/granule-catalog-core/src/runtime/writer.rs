// crates/granule-catalog-core/src/runtime/writer.rs
// ============================================================================
// Module: Catalog Writer
// Description: Ordered provider/collection/granule/file upserts in one transaction.
// Purpose: Make a catalog record durable atomically and idempotently.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! [`CatalogWriter::write`] runs four statement groups, strictly in order,
//! inside a single transaction owned by the session:
//! provider → collection → granule (returns the surrogate id) → files.
//! Any failure rolls the whole transaction back, is logged with the record's
//! identifying ids, and is returned unchanged. There is no retry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::audit::CatalogAuditSink;
use crate::audit::CatalogWriteEvent;
use crate::audit::CatalogWriteFailedEvent;
use crate::core::Collection;
use crate::core::Granule;
use crate::core::GranuleKey;
use crate::core::Provider;
use crate::interfaces::CatalogSession;
use crate::interfaces::CatalogStoreError;
use crate::interfaces::CatalogTransaction;

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Writes one catalog record per call.
#[derive(Clone)]
pub struct CatalogWriter {
    /// Destination for write outcomes.
    audit: Arc<dyn CatalogAuditSink>,
}

impl CatalogWriter {
    /// Creates a writer that reports outcomes to `audit`.
    #[must_use]
    pub fn new(audit: Arc<dyn CatalogAuditSink>) -> Self {
        Self {
            audit,
        }
    }

    /// Upserts the provider, collection, granule, and files in one transaction.
    ///
    /// Returns the granule's surrogate id, which is stable across repeated
    /// writes of the same `(collection_id, cumulus_granule_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError`] from the first failing statement or from
    /// the transaction itself. Nothing from this call is committed in that case.
    pub fn write(
        &self,
        provider: &Provider,
        collection: &Collection,
        granule: &Granule,
        session: &dyn CatalogSession,
    ) -> Result<GranuleKey, CatalogStoreError> {
        let mut granule_key = None;
        let result = session.with_transaction(&mut |tx: &mut dyn CatalogTransaction| {
            tx.upsert_provider(provider)?;
            tx.upsert_collection(collection)?;
            let key = tx.upsert_granule(&collection.collection_id, granule)?;
            if !granule.files.is_empty() {
                tx.upsert_files(key, &granule.files)?;
            }
            granule_key = Some(key);
            Ok(())
        });
        let outcome = result.and_then(|()| {
            granule_key.ok_or_else(|| {
                CatalogStoreError::Transaction("transaction committed without a granule id".into())
            })
        });
        match outcome {
            Ok(key) => {
                self.audit.record_write(&CatalogWriteEvent::new(
                    provider.provider_id.clone(),
                    collection.collection_id.clone(),
                    granule.cumulus_granule_id.clone(),
                    key,
                    granule.files.len(),
                ));
                Ok(key)
            }
            Err(err) => {
                let statement = match &err {
                    CatalogStoreError::Statement {
                        statement, ..
                    } => Some(*statement),
                    _ => None,
                };
                self.audit.record_write_failed(&CatalogWriteFailedEvent::new(
                    provider.provider_id.clone(),
                    collection.collection_id.clone(),
                    granule.cumulus_granule_id.clone(),
                    statement,
                    err.to_string(),
                ));
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for CatalogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogWriter").finish_non_exhaustive()
    }
}
