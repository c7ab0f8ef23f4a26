use proptest::prelude::*;
use serde_json::{json, Value};
use trial_watch::core::filter::StatusFilter;
use trial_watch::core::flatten::{flatten, FIRST_ENTRY_ONLY_KEYS};
use trial_watch::core::projection::Projector;
use trial_watch::core::{Pipeline, ProjectedRow};
use trial_watch::{LocalStorage, SmtpNotifier, TomlConfig, TrialsPipeline};

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("locations".to_string()),
        Just("centralContacts".to_string()),
        Just("overallOfficials".to_string()),
        Just("overallStatus".to_string()),
        "[a-z]{1,8}",
    ]
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::btree_map(arb_key(), inner, 0..5)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_status() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("RECRUITING".to_string()),
        Just("NOT_YET_RECRUITING".to_string()),
        Just("recruiting".to_string()),
        Just("COMPLETED".to_string()),
        Just(String::new()),
        "[A-Z_]{1,12}",
    ]
}

proptest! {
    #[test]
    fn flatten_is_deterministic(record in arb_json()) {
        prop_assert_eq!(flatten(&record), flatten(&record));
    }

    #[test]
    fn projection_always_has_every_column(record in arb_json()) {
        let projector = Projector::default();
        let row = projector.project(&flatten(&record));

        let columns: Vec<&str> = row.columns().collect();
        let header = projector.header();
        prop_assert_eq!(columns, header.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn only_first_contact_survives(record in arb_json()) {
        for key in flatten(&record).keys() {
            let segments: Vec<&str> = key.split('.').collect();
            for pair in segments.windows(2) {
                // Objects under these keys recurse normally; only list
                // indices are restricted.
                if FIRST_ENTRY_ONLY_KEYS.contains(&pair[0]) && pair[1].parse::<usize>().is_ok() {
                    prop_assert_eq!(pair[1], "0", "key {}", key);
                }
            }
        }
    }

    #[test]
    fn filter_matches_allow_list_exactly(status in arb_status()) {
        let filter = StatusFilter::default();
        let mut row = ProjectedRow::new();
        row.set("Trial Status", status.clone());

        let expected = status == "RECRUITING" || status == "NOT_YET_RECRUITING";
        prop_assert_eq!(filter.retains(&row), expected);
    }

    #[test]
    fn transform_keeps_only_allowed_statuses(
        statuses in prop::collection::vec(arb_status(), 0..8)
    ) {
        let mut config = TomlConfig::default();
        config.notify.enabled = false;
        let pipeline: TrialsPipeline<LocalStorage, SmtpNotifier> =
            TrialsPipeline::new(config, LocalStorage::new("unused".to_string()), None);

        let records: Vec<Value> = statuses
            .iter()
            .map(|s| json!({"protocolSection": {"statusModule": {"overallStatus": s}}}))
            .collect();
        let expected = statuses
            .iter()
            .filter(|s| *s == "RECRUITING" || *s == "NOT_YET_RECRUITING")
            .count();

        let table = tokio_test::block_on(pipeline.transform(records)).unwrap();
        prop_assert_eq!(table.len(), expected);
        for row in table.rows() {
            let status = row.get("Trial Status").unwrap_or_default();
            prop_assert!(status == "RECRUITING" || status == "NOT_YET_RECRUITING");
        }
    }
}
