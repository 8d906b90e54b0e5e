// crates/granule-catalog-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for event parsing, bounded reads, and reports.
// Purpose: Ensure event input handling fails closed on malformed files.
// Dependencies: granule-catalog-cli main helpers
// ============================================================================

//! ## Overview
//! Validates `read_bytes_with_limit`, `parse_event`, and `render_report`.
//!
//! Security posture: event files are untrusted; size limits must fail closed.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use clap::Parser;
use granule_catalog_core::BatchReport;
use granule_catalog_core::CatalogStoreError;
use granule_catalog_core::FailurePolicy;
use granule_catalog_core::GranuleKey;
use granule_catalog_core::RecordError;
use granule_catalog_core::runtime::RecordFailure;
use granule_catalog_core::runtime::WrittenRecord;
use serde_json::json;
use tempfile::TempDir;

use super::Cli;
use super::Commands;
use super::FailurePolicyArg;
use super::ReadLimitError;
use super::parse_event;
use super::read_bytes_with_limit;
use super::render_report;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn read_bytes_with_limit_rejects_oversized_files() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("event.json");
    fs::write(&path, vec![b'x'; 32]).expect("write event");
    match read_bytes_with_limit(&path, 16) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 32);
            assert_eq!(limit, 16);
        }
        other => panic!("expected size limit error, got {other:?}"),
    }
    assert_eq!(read_bytes_with_limit(&path, 32).expect("at limit").len(), 32);
}

#[test]
fn read_bytes_with_limit_reports_missing_files() {
    let dir = TempDir::new().expect("temp dir");
    let result = read_bytes_with_limit(&dir.path().join("absent.json"), 16);
    assert!(matches!(result, Err(ReadLimitError::Io(_))));
}

#[test]
fn parse_event_splits_queue_records() {
    let event = json!({
        "Records": [
            {"messageId": "m-0", "receiptHandle": "r-0", "body": "{}"},
            {"body": "[]"}
        ]
    });
    let records = parse_event(event.to_string().as_bytes()).expect("queue event");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message_id.as_deref(), Some("m-0"));
    assert_eq!(records[0].body, "{}");
    assert_eq!(records[1].message_id, None);
    assert_eq!(records[1].body, "[]");
}

#[test]
fn parse_event_treats_other_json_as_one_body() {
    let text = r#"{"provider": {"providerId": "P1"}}"#;
    let records = parse_event(text.as_bytes()).expect("direct message");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].body, text);
}

#[test]
fn parse_event_rejects_malformed_input() {
    assert!(parse_event(b"{not json").is_err());
    assert!(parse_event(&[0xff, 0xfe]).is_err());
    let err = parse_event(br#"{"Records": [{"messageId": "m-0"}]}"#).expect_err("no body");
    assert!(err.to_string().contains("invalid queue event"));
}

#[test]
fn render_report_lists_failures_for_redelivery() {
    let report = BatchReport {
        records: 2,
        written: vec![WrittenRecord {
            index: 0,
            message_id: Some("m-0".to_string()),
            granule_id: GranuleKey::new(7),
        }],
        failures: vec![RecordFailure {
            index: 1,
            message_id: None,
            error: RecordError::Store(CatalogStoreError::Connection("down".to_string())),
        }],
    };
    let rendered = render_report(&report);
    assert_eq!(rendered["records"], 2);
    assert_eq!(rendered["written"][0]["granule_id"], 7);
    assert_eq!(rendered["failures"][0]["kind"], "store");
    assert_eq!(rendered["batch_item_failures"], json!([{"itemIdentifier": "1"}]));
}

#[test]
fn failure_policy_flag_parses_kebab_case() {
    let cli = Cli::try_parse_from([
        "granule-catalog",
        "ingest",
        "--event",
        "event.json",
        "--failure-policy",
        "continue",
    ])
    .expect("parse ingest");
    let Commands::Ingest(command) = cli.command else {
        panic!("expected ingest command");
    };
    assert_eq!(command.failure_policy, Some(FailurePolicyArg::Continue));
    assert_eq!(FailurePolicy::from(FailurePolicyArg::FailFast), FailurePolicy::FailFast);
    let args = ["granule-catalog", "ingest", "--event", "e", "--failure-policy", "retry"];
    assert!(Cli::try_parse_from(args).is_err());
}
