// crates/granule-catalog-core/tests/proptest_schema.rs
// ============================================================================
// Module: Schema Property Tests
// Description: Property checks for file size bounds and identifier strings.
// Purpose: Ensure the schema accepts exactly the storable size range.
// Dependencies: granule-catalog-core, proptest
// ============================================================================

//! ## Overview
//! Property-based checks for the catalog record schema.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use proptest::prelude::*;

use crate::common::file_json;
use crate::common::message_json;
use crate::common::validator;

proptest! {
    #[test]
    fn storable_sizes_are_accepted(size in 0_i64..=i64::MAX) {
        let payload = message_json("P1", "C1", "G1", vec![file_json("F1", "data/F1", size)]);
        let message = validator().decode(payload).expect("size in range");
        prop_assert_eq!(i64::try_from(message.granule.files[0].size_in_bytes).ok(), Some(size));
    }

    #[test]
    fn negative_sizes_are_rejected(size in i64::MIN..0_i64) {
        let payload = message_json("P1", "C1", "G1", vec![file_json("F1", "data/F1", size)]);
        prop_assert!(validator().validate(&payload).is_err());
    }

    #[test]
    fn non_empty_identifiers_are_accepted(
        provider in "[A-Za-z0-9_.-]{1,32}",
        granule in "[A-Za-z0-9_.-]{1,64}",
    ) {
        let payload = message_json(&provider, "C1", &granule, Vec::new());
        let message = validator().decode(payload).expect("identifiers accepted");
        prop_assert_eq!(message.provider.provider_id.as_str(), provider.as_str());
        prop_assert_eq!(message.granule.cumulus_granule_id.as_str(), granule.as_str());
    }
}
