//! Property-based tests for result payloads and success ratios.
//!
//! - Each result tier carries every field of the tier below it, unchanged
//! - Partial lists never exceed `partial_unexpected_count`
//! - Success under `mostly` is monotone: lowering the threshold never
//!   turns a pass into a failure

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use term_expectations::expectations::{
    format_map_output, map_success, MapObservations, ResultFormat, ResultFormatConfig,
};

fn payload(format: ResultFormat, partial: usize, observed: &MapObservations<'_>) -> Map<String, Value> {
    let config = ResultFormatConfig::new(format).with_partial_unexpected_count(partial);
    format_map_output(&config, true, observed)
        .result
        .unwrap_or_default()
}

/// Every field of `lower` appears in `higher` with the same value.
fn extends(lower: &Map<String, Value>, higher: &Map<String, Value>) -> bool {
    lower.iter().all(|(key, value)| higher.get(key) == Some(value))
}

prop_compose! {
    fn observations()(
        elements in 0u64..200,
        missing_fraction in 0.0f64..1.0,
        unexpected in prop::collection::vec(prop_oneof![
            any::<i64>().prop_map(|v| json!(v)),
            "[a-e]{1,3}".prop_map(Value::String),
            Just(Value::Null),
        ], 0..60),
        track_missing in any::<bool>(),
    ) -> (u64, Option<u64>, Vec<Value>) {
        let missing = (elements as f64 * missing_fraction) as u64;
        (elements, track_missing.then_some(elements - missing), unexpected)
    }
}

proptest! {
    #[test]
    fn tiers_are_supersets(
        (elements, nonnull, unexpected) in observations(),
        partial in 0usize..30,
    ) {
        let indices: Vec<Value> = (0..unexpected.len()).map(|i| json!(i)).collect();
        let observed = MapObservations {
            element_count: Some(elements),
            nonnull_count: nonnull,
            unexpected_count: unexpected.len() as u64,
            unexpected_list: &unexpected,
            unexpected_index_list: Some(&indices),
            unexpected_rows: None,
        };

        let boolean = payload(ResultFormat::BooleanOnly, partial, &observed);
        let basic = payload(ResultFormat::Basic, partial, &observed);
        let summary = payload(ResultFormat::Summary, partial, &observed);
        let complete = payload(ResultFormat::Complete, partial, &observed);

        prop_assert!(boolean.is_empty());
        prop_assert!(extends(&basic, &summary), "{basic:?} vs {summary:?}");
        prop_assert!(extends(&summary, &complete), "{summary:?} vs {complete:?}");
        prop_assert_eq!(basic.contains_key("missing_count"), nonnull.is_some());
    }

    #[test]
    fn partial_lists_are_truncated(
        (elements, nonnull, unexpected) in observations(),
        partial in 0usize..30,
    ) {
        let observed = MapObservations {
            element_count: Some(elements),
            nonnull_count: nonnull,
            unexpected_count: unexpected.len() as u64,
            unexpected_list: &unexpected,
            unexpected_index_list: None,
            unexpected_rows: None,
        };
        let config = ResultFormatConfig::new(ResultFormat::Complete)
            .with_partial_unexpected_count(partial);
        let result = format_map_output(&config, false, &observed).result.unwrap();

        let partial_list = result["partial_unexpected_list"].as_array().unwrap();
        prop_assert_eq!(partial_list.len(), partial.min(unexpected.len()));
        prop_assert_eq!(&partial_list[..], &unexpected[..partial_list.len()]);
        prop_assert_eq!(result["unexpected_list"].as_array().unwrap().len(), unexpected.len());
        if let Some(Value::Array(counts)) = result.get("partial_unexpected_counts") {
            prop_assert!(counts.len() <= partial);
            let total: u64 = counts.iter().filter_map(|c| c["count"].as_u64()).sum();
            prop_assert!(total <= unexpected.len() as u64);
        }
    }

    #[test]
    fn lower_mostly_never_fails_more(
        total in 0u64..1000,
        null_fraction in 0.0f64..1.0,
        unexpected_fraction in 0.0f64..1.0,
        mostly in 0.0f64..=1.0,
        slack in 0.0f64..=1.0,
    ) {
        let null = (total as f64 * null_fraction) as u64;
        let unexpected = ((total - null) as f64 * unexpected_fraction) as u64;
        let strict = map_success(Some(total), unexpected, Some(null), mostly);
        let relaxed = map_success(Some(total), unexpected, Some(null), mostly * slack);
        prop_assert!(!strict || relaxed);
        if unexpected == 0 {
            prop_assert!(strict);
        }
    }
}
