// crates/granule-catalog-core/src/core/model.rs
// ============================================================================
// Module: Granule Catalog Message Model
// Description: Typed view of a validated catalog queue message.
// Purpose: Carry provider, collection, granule, and file data into the writer.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A catalog message names one provider, one collection, and one granule with
//! its files. Field names follow the camelCase wire format of the queue body.
//! Values are only constructed from payloads that already passed
//! [`crate::schema::CatalogValidator`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CollectionId;
use crate::core::identifiers::CumulusGranuleId;
use crate::core::identifiers::IsoTimestamp;
use crate::core::identifiers::ProviderId;

// ============================================================================
// SECTION: Message Types
// ============================================================================

/// Decoded body of one queue record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMessage {
    /// Provider that ingested the granule.
    pub provider: Provider,
    /// Collection the granule belongs to.
    pub collection: Collection,
    /// Granule and its archived files.
    pub granule: Granule,
}

/// Provider row contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Provider identifier.
    pub provider_id: ProviderId,
    /// Display name.
    pub name: String,
}

/// Collection row contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Collection identifier.
    pub collection_id: CollectionId,
    /// Collection short name.
    pub shortname: String,
    /// Collection version label.
    pub version: String,
}

/// Granule row contents plus its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Granule {
    /// Upstream granule identifier.
    pub cumulus_granule_id: CumulusGranuleId,
    /// Workflow execution that produced this submission.
    pub execution_id: String,
    /// Time the granule was ingested.
    pub ingest_time: IsoTimestamp,
    /// Time the granule was created upstream.
    pub cumulus_create_time: IsoTimestamp,
    /// Time of the latest upstream update.
    pub last_update: IsoTimestamp,
    /// Archived files; may be empty.
    pub files: Vec<CatalogFile>,
}

/// File row contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    /// File name.
    pub name: String,
    /// Bucket holding the primary copy.
    pub cumulus_archive_location: String,
    /// Bucket holding the recovery copy.
    pub orca_archive_location: String,
    /// Object key inside both buckets.
    pub key_path: String,
    /// Object size in bytes.
    pub size_in_bytes: u64,
    /// Checksum value, if reported.
    #[serde(default)]
    pub hash: Option<String>,
    /// Checksum algorithm, if reported. Independent of `hash`.
    #[serde(default)]
    pub hash_type: Option<String>,
    /// Object version in the recovery bucket.
    pub version: String,
    /// Time the file was archived.
    pub ingest_time: IsoTimestamp,
    /// Object etag in the recovery bucket.
    pub etag: String,
}

impl CatalogFile {
    /// Returns the file's conflict key `(cumulus_archive_location, key_path)`.
    #[must_use]
    pub fn conflict_key(&self) -> (&str, &str) {
        (&self.cumulus_archive_location, &self.key_path)
    }
}
