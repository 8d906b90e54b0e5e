// crates/granule-catalog-core/src/audit.rs
// ============================================================================
// Module: Catalog Audit Logging
// Description: Structured audit events for catalog writes and batch runs.
// Purpose: Emit JSON-line logs with identifying context without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are plain serializable structs written as one JSON object per
//! line. Sinks decide where lines go (stderr, an append-only file, memory, or
//! nowhere). Sink failures never affect catalog processing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

use crate::core::CollectionId;
use crate::core::CumulusGranuleId;
use crate::core::GranuleKey;
use crate::core::ProviderId;
use crate::interfaces::CatalogStatement;
use crate::runtime::FailurePolicy;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Successful catalog write.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogWriteEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Provider identifier.
    pub provider_id: ProviderId,
    /// Collection identifier.
    pub collection_id: CollectionId,
    /// Upstream granule identifier.
    pub cumulus_granule_id: CumulusGranuleId,
    /// Surrogate granule id returned by the upsert.
    pub granule_id: GranuleKey,
    /// Number of file rows upserted.
    pub file_count: usize,
}

/// Failed catalog write; the transaction was rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogWriteFailedEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Provider identifier.
    pub provider_id: ProviderId,
    /// Collection identifier.
    pub collection_id: CollectionId,
    /// Upstream granule identifier.
    pub cumulus_granule_id: CumulusGranuleId,
    /// Statement group that failed, when known.
    pub statement: Option<CatalogStatement>,
    /// Underlying database error.
    pub error: String,
}

/// Queue record that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct RecordRejectedEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Position of the record in the batch.
    pub index: usize,
    /// Queue message id when provided.
    pub message_id: Option<String>,
    /// Failure kind label (`decode`, `schema`, `store`).
    pub kind: &'static str,
    /// Failure message.
    pub error: String,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchCompleteEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Records received.
    pub records: usize,
    /// Records written successfully.
    pub written: usize,
    /// Records that failed.
    pub failed: usize,
    /// Failure policy in effect.
    pub failure_policy: FailurePolicy,
    /// True when the batch stopped before the last record.
    pub halted: bool,
}

/// Returns the current time in milliseconds since epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

impl CatalogWriteEvent {
    /// Creates a write event with a consistent timestamp.
    #[must_use]
    pub fn new(
        provider_id: ProviderId,
        collection_id: CollectionId,
        cumulus_granule_id: CumulusGranuleId,
        granule_id: GranuleKey,
        file_count: usize,
    ) -> Self {
        Self {
            event: "catalog_write",
            timestamp_ms: now_ms(),
            provider_id,
            collection_id,
            cumulus_granule_id,
            granule_id,
            file_count,
        }
    }
}

impl CatalogWriteFailedEvent {
    /// Creates a write failure event with a consistent timestamp.
    #[must_use]
    pub fn new(
        provider_id: ProviderId,
        collection_id: CollectionId,
        cumulus_granule_id: CumulusGranuleId,
        statement: Option<CatalogStatement>,
        error: String,
    ) -> Self {
        Self {
            event: "catalog_write_failed",
            timestamp_ms: now_ms(),
            provider_id,
            collection_id,
            cumulus_granule_id,
            statement,
            error,
        }
    }
}

impl RecordRejectedEvent {
    /// Creates a rejection event with a consistent timestamp.
    #[must_use]
    pub fn new(
        index: usize,
        message_id: Option<String>,
        kind: &'static str,
        error: String,
    ) -> Self {
        Self {
            event: "record_rejected",
            timestamp_ms: now_ms(),
            index,
            message_id,
            kind,
            error,
        }
    }
}

impl BatchCompleteEvent {
    /// Creates a batch summary event with a consistent timestamp.
    #[must_use]
    pub fn new(
        records: usize,
        written: usize,
        failed: usize,
        failure_policy: FailurePolicy,
        halted: bool,
    ) -> Self {
        Self {
            event: "batch_complete",
            timestamp_ms: now_ms(),
            records,
            written,
            failed,
            failure_policy,
            halted,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for catalog events.
pub trait CatalogAuditSink: Send + Sync {
    /// Record a successful write.
    fn record_write(&self, event: &CatalogWriteEvent);

    /// Record a failed write.
    fn record_write_failed(&self, event: &CatalogWriteFailedEvent);

    /// Record a rejected queue record.
    fn record_rejected(&self, _event: &RecordRejectedEvent) {}

    /// Record a batch summary.
    fn record_batch(&self, _event: &BatchCompleteEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl CatalogAuditSink for StderrAuditSink {
    fn record_write(&self, event: &CatalogWriteEvent) {
        Self::emit(event);
    }

    fn record_write_failed(&self, event: &CatalogWriteFailedEvent) {
        Self::emit(event);
    }

    fn record_rejected(&self, event: &RecordRejectedEvent) {
        Self::emit(event);
    }

    fn record_batch(&self, event: &BatchCompleteEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event and flushes.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl CatalogAuditSink for FileAuditSink {
    fn record_write(&self, event: &CatalogWriteEvent) {
        self.emit(event);
    }

    fn record_write_failed(&self, event: &CatalogWriteFailedEvent) {
        self.emit(event);
    }

    fn record_rejected(&self, event: &RecordRejectedEvent) {
        self.emit(event);
    }

    fn record_batch(&self, event: &BatchCompleteEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl CatalogAuditSink for NoopAuditSink {
    fn record_write(&self, _event: &CatalogWriteEvent) {}

    fn record_write_failed(&self, _event: &CatalogWriteFailedEvent) {}
}

/// Audit sink that keeps events in memory, for tests and embedding hosts.
#[derive(Default)]
pub struct InMemoryAuditSink {
    /// Serialized events in arrival order.
    events: Mutex<Vec<Value>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Returns recorded events whose `event` field equals `name`.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event.get("event").and_then(Value::as_str) == Some(name))
            .collect()
    }

    /// Stores one serialized event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut guard) = self.events.lock()
        {
            guard.push(value);
        }
    }
}

impl CatalogAuditSink for InMemoryAuditSink {
    fn record_write(&self, event: &CatalogWriteEvent) {
        self.push(event);
    }

    fn record_write_failed(&self, event: &CatalogWriteFailedEvent) {
        self.push(event);
    }

    fn record_rejected(&self, event: &RecordRejectedEvent) {
        self.push(event);
    }

    fn record_batch(&self, event: &BatchCompleteEvent) {
        self.push(event);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
