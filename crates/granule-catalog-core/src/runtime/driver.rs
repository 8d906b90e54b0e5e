// crates/granule-catalog-core/src/runtime/driver.rs
// ============================================================================
// Module: Catalog Batch Driver
// Description: Decodes, validates, and writes a batch of queue records.
// Purpose: Adapt queue deliveries to per-record catalog transactions.
// Dependencies: crate::{audit, core, interfaces, schema}, serde, serde_json
// ============================================================================

//! ## Overview
//! The driver opens one session per batch and processes records in input
//! order, one transaction per record. Records never share a transaction.
//!
//! What happens after a failing record is controlled by [`FailurePolicy`]:
//! - [`FailurePolicy::FailFast`] (default) stops at the first failure and
//!   returns it; later records are not attempted.
//! - [`FailurePolicy::Continue`] records the failure and moves on, so the
//!   queue runtime can redeliver only the failed messages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::audit::BatchCompleteEvent;
use crate::audit::CatalogAuditSink;
use crate::audit::RecordRejectedEvent;
use crate::core::CatalogMessage;
use crate::core::GranuleKey;
use crate::interfaces::CatalogSession;
use crate::interfaces::CatalogSessionFactory;
use crate::interfaces::CatalogStoreError;
use crate::runtime::writer::CatalogWriter;
use crate::schema::CatalogValidator;
use crate::schema::SchemaValidationError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum record body size (the queue's message size ceiling).
pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024;
/// Default maximum number of records accepted in one batch.
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 10_000;

// ============================================================================
// SECTION: Queue Types
// ============================================================================

/// One queue delivery. Only `body` is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    /// Queue message id.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Queue receipt handle.
    #[serde(default)]
    pub receipt_handle: Option<String>,
    /// JSON text of a [`CatalogMessage`].
    pub body: String,
}

impl QueueRecord {
    /// Creates a record with only a body, as used by direct invocations.
    #[must_use]
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            receipt_handle: None,
            body: body.into(),
        }
    }
}

/// Queue event envelope delivered by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Records in delivery order.
    #[serde(rename = "Records")]
    pub records: Vec<QueueRecord>,
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Behavior after a record fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the batch at the first failing record.
    #[default]
    FailFast,
    /// Attempt every record and report failures individually.
    Continue,
}

/// Batch driver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDriverConfig {
    /// Behavior after a record fails.
    pub failure_policy: FailurePolicy,
    /// Maximum accepted body size in bytes.
    pub max_body_bytes: usize,
    /// Maximum accepted records per batch.
    pub max_records: usize,
}

impl Default for BatchDriverConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_records: DEFAULT_MAX_BATCH_RECORDS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure while processing a single record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Body is oversized, not JSON, or not representable.
    #[error("record body could not be decoded: {0}")]
    Decode(String),
    /// Body failed schema validation; nothing was written.
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    /// Catalog write failed; the record's transaction was rolled back.
    #[error(transparent)]
    Store(#[from] CatalogStoreError),
}

impl RecordError {
    /// Returns a stable label for the failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Schema(_) => "schema",
            Self::Store(_) => "store",
        }
    }
}

/// Batch-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Batch exceeds the configured record limit; nothing was processed.
    #[error("batch has {count} records (max {max})")]
    TooManyRecords {
        /// Records received.
        count: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Session could not be opened; nothing was processed.
    #[error("catalog session unavailable: {0}")]
    Session(CatalogStoreError),
    /// A record failed under [`FailurePolicy::FailFast`].
    #[error("record {index} failed: {source}")]
    Record {
        /// Position of the failing record.
        index: usize,
        /// Queue message id when provided.
        message_id: Option<String>,
        /// Record failure.
        source: RecordError,
    },
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Record written successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenRecord {
    /// Position in the batch.
    pub index: usize,
    /// Queue message id when provided.
    pub message_id: Option<String>,
    /// Surrogate id of the granule row.
    pub granule_id: GranuleKey,
}

/// Record that failed under [`FailurePolicy::Continue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Position in the batch.
    pub index: usize,
    /// Queue message id when provided.
    pub message_id: Option<String>,
    /// Record failure.
    pub error: RecordError,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    /// Records received.
    pub records: usize,
    /// Records written, in input order.
    pub written: Vec<WrittenRecord>,
    /// Records that failed, in input order.
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    /// Returns true when every record was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.written.len() == self.records
    }

    /// Builds the queue runtime's partial batch response.
    ///
    /// Records without a message id are identified by their batch index.
    #[must_use]
    pub fn item_failures(&self) -> BatchItemFailures {
        BatchItemFailures {
            batch_item_failures: self
                .failures
                .iter()
                .map(|failure| BatchItemFailure {
                    item_identifier: failure
                        .message_id
                        .clone()
                        .unwrap_or_else(|| failure.index.to_string()),
                })
                .collect(),
        }
    }
}

/// Partial batch response listing records to redeliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailures {
    /// Failed items.
    pub batch_item_failures: Vec<BatchItemFailure>,
}

/// Single failed item in a partial batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    /// Queue message id of the failed record.
    pub item_identifier: String,
}

// ============================================================================
// SECTION: Driver
// ============================================================================

/// Processes batches of queue records against a catalog session.
#[derive(Clone)]
pub struct BatchDriver {
    /// Compiled message validator shared by every record.
    validator: Arc<CatalogValidator>,
    /// Catalog writer.
    writer: CatalogWriter,
    /// Destination for record and batch events.
    audit: Arc<dyn CatalogAuditSink>,
    /// Driver settings.
    config: BatchDriverConfig,
}

impl BatchDriver {
    /// Creates a driver around a compiled validator.
    #[must_use]
    pub fn new(
        validator: Arc<CatalogValidator>,
        audit: Arc<dyn CatalogAuditSink>,
        config: BatchDriverConfig,
    ) -> Self {
        Self {
            validator,
            writer: CatalogWriter::new(Arc::clone(&audit)),
            audit,
            config,
        }
    }

    /// Returns the driver settings.
    #[must_use]
    pub const fn config(&self) -> &BatchDriverConfig {
        &self.config
    }

    /// Decodes and validates a record body without touching storage.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Decode`] or [`RecordError::Schema`].
    pub fn decode_record(&self, record: &QueueRecord) -> Result<CatalogMessage, RecordError> {
        if record.body.len() > self.config.max_body_bytes {
            return Err(RecordError::Decode(format!(
                "body is {} bytes (max {})",
                record.body.len(),
                self.config.max_body_bytes
            )));
        }
        let payload: Value = serde_json::from_str(&record.body)
            .map_err(|err| RecordError::Decode(err.to_string()))?;
        Ok(self.validator.decode(payload)?)
    }

    /// Decodes, validates, and writes one record in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] on decode, validation, or storage failure.
    pub fn process_record(
        &self,
        record: &QueueRecord,
        session: &dyn CatalogSession,
    ) -> Result<GranuleKey, RecordError> {
        let message = self.decode_record(record)?;
        let key = self.writer.write(
            &message.provider,
            &message.collection,
            &message.granule,
            session,
        )?;
        Ok(key)
    }

    /// Processes a batch with one session and one transaction per record.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] when the batch is oversized, the session cannot
    /// be opened, or (under [`FailurePolicy::FailFast`]) a record fails.
    pub fn run(
        &self,
        records: &[QueueRecord],
        sessions: &dyn CatalogSessionFactory,
    ) -> Result<BatchReport, BatchError> {
        if records.len() > self.config.max_records {
            return Err(BatchError::TooManyRecords {
                count: records.len(),
                max: self.config.max_records,
            });
        }
        let session = sessions.open_session().map_err(BatchError::Session)?;
        let mut report = BatchReport {
            records: records.len(),
            ..BatchReport::default()
        };
        for (index, record) in records.iter().enumerate() {
            match self.process_record(record, session.as_ref()) {
                Ok(granule_id) => report.written.push(WrittenRecord {
                    index,
                    message_id: record.message_id.clone(),
                    granule_id,
                }),
                Err(error) => {
                    self.audit.record_rejected(&RecordRejectedEvent::new(
                        index,
                        record.message_id.clone(),
                        error.kind(),
                        error.to_string(),
                    ));
                    match self.config.failure_policy {
                        FailurePolicy::FailFast => {
                            self.record_summary(&report, 1, true);
                            return Err(BatchError::Record {
                                index,
                                message_id: record.message_id.clone(),
                                source: error,
                            });
                        }
                        FailurePolicy::Continue => report.failures.push(RecordFailure {
                            index,
                            message_id: record.message_id.clone(),
                            error,
                        }),
                    }
                }
            }
        }
        self.record_summary(&report, 0, false);
        Ok(report)
    }

    /// Emits the batch summary event.
    fn record_summary(&self, report: &BatchReport, pending_failures: usize, halted: bool) {
        self.audit.record_batch(&BatchCompleteEvent::new(
            report.records,
            report.written.len(),
            report.failures.len() + pending_failures,
            self.config.failure_policy,
            halted,
        ));
    }
}

impl std::fmt::Debug for BatchDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDriver").field("config", &self.config).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]

    use super::BatchReport;
    use super::FailurePolicy;
    use super::QueueEvent;
    use super::RecordError;
    use super::RecordFailure;

    #[test]
    fn queue_event_parses_runtime_envelope() {
        let event: QueueEvent = serde_json::from_str(
            r#"{"Records":[{"messageId":"m-1","receiptHandle":"r-1","body":"{}"}]}"#,
        )
        .expect("parse event");
        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].message_id.as_deref(), Some("m-1"));
        assert_eq!(event.records[0].receipt_handle.as_deref(), Some("r-1"));
    }

    #[test]
    fn failure_policy_uses_snake_case_labels() {
        let policy: FailurePolicy = serde_json::from_str("\"continue\"").expect("parse policy");
        assert_eq!(policy, FailurePolicy::Continue);
        assert_eq!(FailurePolicy::default(), FailurePolicy::FailFast);
    }

    #[test]
    fn item_failures_fall_back_to_index() {
        let report = BatchReport {
            records: 2,
            written: Vec::new(),
            failures: vec![
                RecordFailure {
                    index: 0,
                    message_id: Some("m-0".to_string()),
                    error: RecordError::Decode("bad".to_string()),
                },
                RecordFailure {
                    index: 1,
                    message_id: None,
                    error: RecordError::Decode("bad".to_string()),
                },
            ],
        };
        let json = serde_json::to_value(report.item_failures()).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "batchItemFailures": [
                    {"itemIdentifier": "m-0"},
                    {"itemIdentifier": "1"}
                ]
            })
        );
    }
}
