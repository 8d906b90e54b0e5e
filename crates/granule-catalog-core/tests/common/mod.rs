// crates/granule-catalog-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Sample catalog messages and queue records for core tests.
// Purpose: Keep payload construction consistent across test binaries.
// Dependencies: granule-catalog-core, serde_json
// ============================================================================

//! ## Overview
//! Builders for catalog message bodies. Payloads start from a valid message
//! and tests mutate the JSON to exercise specific constraints.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use granule_catalog_core::BatchDriver;
use granule_catalog_core::BatchDriverConfig;
use granule_catalog_core::CatalogMessage;
use granule_catalog_core::CatalogValidator;
use granule_catalog_core::InMemoryAuditSink;
use granule_catalog_core::QueueRecord;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Timestamp used by every fixture.
pub const TIMESTAMP: &str = "2024-05-01T12:00:00+00:00";

/// Returns a file entry with the given identity and size.
pub fn file_json(name: &str, key_path: &str, size: i64) -> Value {
    json!({
        "name": name,
        "cumulusArchiveLocation": "cumulus-archive",
        "orcaArchiveLocation": "orca-archive",
        "keyPath": key_path,
        "sizeInBytes": size,
        "version": "v1",
        "ingestTime": TIMESTAMP,
        "etag": "E1"
    })
}

/// Returns a valid message body for the given ids and files.
pub fn message_json(
    provider_id: &str,
    collection_id: &str,
    granule_id: &str,
    files: Vec<Value>,
) -> Value {
    json!({
        "provider": {"providerId": provider_id, "name": "N1"},
        "collection": {"collectionId": collection_id, "shortname": "S1", "version": "V1"},
        "granule": {
            "cumulusGranuleId": granule_id,
            "executionId": "execution-1",
            "ingestTime": TIMESTAMP,
            "cumulusCreateTime": TIMESTAMP,
            "lastUpdate": TIMESTAMP,
            "files": files
        }
    })
}

/// Returns the P1/C1/G1 message with a single file `F1` of the given size.
pub fn scenario_json(size: i64) -> Value {
    message_json("P1", "C1", "G1", vec![file_json("F1", "data/F1", size)])
}

/// Decodes a payload into the typed message model.
pub fn message(payload: Value) -> CatalogMessage {
    validator().decode(payload).expect("fixture payload is valid")
}

/// Wraps a payload as a queue record.
pub fn record(message_id: &str, payload: &Value) -> QueueRecord {
    QueueRecord {
        message_id: Some(message_id.to_string()),
        receipt_handle: Some(format!("receipt-{message_id}")),
        body: payload.to_string(),
    }
}

/// Compiles the catalog validator.
pub fn validator() -> CatalogValidator {
    CatalogValidator::new().expect("compile catalog schema")
}

/// Builds a driver with an in-memory audit sink.
pub fn driver(config: BatchDriverConfig) -> (BatchDriver, Arc<InMemoryAuditSink>) {
    let audit = Arc::new(InMemoryAuditSink::new());
    let driver = BatchDriver::new(Arc::new(validator()), audit.clone(), config);
    (driver, audit)
}
