//! Property-based tests for engram
//!
//! Invariants that must hold for all inputs:
//! - Redaction is idempotent and never leaves a <private> span behind
//! - The FTS sanitizer never panics and always emits quoted tokens
//! - Stored content stays within the configured maximum
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

mod redaction_tests {
    use super::*;
    use engram::redact::strip_private_tags;

    proptest! {
        /// strip_private_tags never panics on any input
        #[test]
        fn never_panics(s in ".*") {
            let _ = strip_private_tags(&s);
        }

        /// Applying redaction twice yields the same result as once
        #[test]
        fn idempotent(s in ".*") {
            let once = strip_private_tags(&s);
            prop_assert_eq!(once.clone(), strip_private_tags(&once));
        }

        /// No complete <private>...</private> span survives redaction.
        /// Digit-only secrets cannot collide with surrounding text or
        /// with the replacement token.
        #[test]
        fn no_span_survives(prefix in "[a-z ]{0,20}", secret in "[0-9]{4,40}", suffix in "[a-z ]{0,20}") {
            let input = format!("{prefix}<private>{secret}</private>{suffix}");
            let out = strip_private_tags(&input);
            prop_assert!(!out.to_lowercase().contains("<private>"));
            prop_assert!(!out.contains(&secret));
        }

        /// Output is always trimmed
        #[test]
        fn output_trimmed(s in ".*") {
            let out = strip_private_tags(&s);
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}

mod sanitizer_tests {
    use super::*;
    use engram::storage::sanitize_match_query;

    proptest! {
        /// sanitize_match_query never panics on any input
        #[test]
        fn never_panics(s in ".*") {
            let _ = sanitize_match_query(&s);
        }

        /// Every emitted token is wrapped in double quotes
        #[test]
        fn tokens_quoted(s in "[a-zA-Z0-9:!?.,*()\\-]{1,15}( [a-zA-Z0-9:!?.,*()\\-]{1,15}){0,5}") {
            let out = sanitize_match_query(&s);
            for token in out.split(' ') {
                prop_assert!(token.starts_with('"'), "token {token:?} not quoted");
                prop_assert!(token.ends_with('"'), "token {token:?} not quoted");
            }
        }

        /// Whitespace-only input collapses to the empty expression
        #[test]
        fn whitespace_collapses(s in "\\s*") {
            prop_assert_eq!(sanitize_match_query(&s), "");
        }
    }
}

mod truncation_tests {
    use super::*;
    use engram::storage::{add_observation, create_session, get_observation, Storage};
    use engram::types::AddObservationParams;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Stored content never exceeds the configured maximum plus the
        /// marker, and is always valid UTF-8 cut on a char boundary.
        #[test]
        fn stored_content_bounded(content in "[a-zA-Zé€\u{1F600} ]{0,3000}") {
            let storage = Storage::open_in_memory().unwrap();
            let max = storage.config().max_observation_length;

            let id = storage.with_connection(|conn| {
                create_session(conn, "s1", "acme", "/tmp")?;
                add_observation(conn, storage.config(), &AddObservationParams {
                    session_id: "s1".into(),
                    observation_type: "manual".into(),
                    title: "t".into(),
                    content,
                    tool_name: None,
                    project: None,
                })
            }).unwrap();

            let stored = storage
                .with_connection(|conn| get_observation(conn, id))
                .unwrap();
            prop_assert!(stored.content.len() <= max + "... [truncated]".len());
        }
    }
}
