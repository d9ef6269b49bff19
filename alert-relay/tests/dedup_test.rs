mod common;

use alert_relay::dedup::{advance, tracked_categories};
use alert_relay::{
    AlertRecord, DedupEngine, DrillFilter, FeedOutcome, IdentityRule, SourceDescriptor, SourceKind,
    WatermarkMap, WatermarkUpdateSet,
};
use common::*;

fn engine() -> DedupEngine {
    DedupEngine::new(DrillFilter::new(["演習", "drill", "exercise"]), IdentityRule::default())
}

fn record(release_time: &str, page_key: &str, category: &str, body: &str) -> AlertRecord {
    AlertRecord {
        release_time: release_time.to_string(),
        page_key: page_key.to_string(),
        category: category.to_string(),
        body: body.to_string(),
    }
}

fn single(category: &str, records: Vec<AlertRecord>) -> (SourceDescriptor, FeedOutcome) {
    let location = format!("https://feeds.example.test/alerts/{category}.json");
    (
        SourceDescriptor {
            template: location.clone(),
            location,
            kind: SourceKind::Single(category.to_string()),
        },
        FeedOutcome::Records(records),
    )
}

fn aggregated(records: Vec<AlertRecord>) -> (SourceDescriptor, FeedOutcome) {
    (
        SourceDescriptor {
            template: MONTHLY_TEMPLATE.to_string(),
            location: MONTHLY_FEED.to_string(),
            kind: SourceKind::Aggregated,
        },
        FeedOutcome::Records(records),
    )
}

fn watermarks(entries: &[(&str, &str)]) -> WatermarkMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_only_records_after_watermark_are_included() {
    init_tracing();

    let sources = vec![single(
        "eq",
        vec![
            record("202401010800", "20240101080000", "eq", "old quake"),
            record("202401011200", "20240101120000", "eq", "new quake"),
        ],
    )];

    let outcome = engine().run(&watermarks(&[("eq", "202401010800")]), &sources);

    assert_eq!(outcome.new_alerts.len(), 1);
    let included = outcome.new_alerts.values().next().unwrap();
    assert_eq!(included.release_time, "202401011200");
    assert_eq!(outcome.updates.get("eq").map(String::as_str), Some("202401011200"));
    assert_eq!(outcome.stale, 1);
}

#[test]
fn test_first_run_includes_everything() {
    let sources = vec![single(
        "eq",
        vec![
            record("202401010800", "20240101080000", "eq", "a"),
            record("202401011200", "20240101120000", "eq", "b"),
        ],
    )];

    let outcome = engine().run(&WatermarkMap::new(), &sources);
    assert_eq!(outcome.new_alerts.len(), 2);
    assert_eq!(outcome.updates["eq"], "202401011200");
}

#[test]
fn test_aggregated_stale_and_untracked_records_change_nothing() {
    init_tracing();

    let prior = watermarks(&[("eq", "202401011200")]);
    let sources = vec![
        single("eq", Vec::new()),
        aggregated(vec![
            record("202401010800", "20240101080000", "eq", "earlier quake"),
            record("202401020800", "20240102080000", "xyz", "untracked"),
        ]),
    ];

    let outcome = engine().run(&prior, &sources);

    assert!(outcome.new_alerts.is_empty());
    assert!(outcome.updates.is_empty());
    assert_eq!(outcome.untracked, 1);
    assert_eq!(outcome.stale, 1);
}

#[test]
fn test_untracked_category_ignored_even_on_first_run() {
    let sources = vec![
        single("eq", Vec::new()),
        aggregated(vec![record("202401020800", "20240102080000", "xyz", "untracked")]),
    ];

    let outcome = engine().run(&WatermarkMap::new(), &sources);
    assert!(outcome.new_alerts.is_empty());
    assert!(!outcome.updates.contains_key("xyz"));
}

#[test]
fn test_tracked_categories_come_from_single_sources() {
    let sources = vec![single("eq", Vec::new()), single("typhoon", Vec::new()), aggregated(Vec::new())];
    let tracked = tracked_categories(sources.iter().map(|(d, _)| d));
    assert_eq!(tracked.into_iter().collect::<Vec<_>>(), vec!["eq", "typhoon"]);
}

#[test]
fn test_same_bulletin_from_two_sources_is_emitted_once_last_wins() {
    init_tracing();

    // Short raw keys get the MMDD of the release time, so both sources
    // agree on "01011234".
    let sources = vec![
        single("eq", vec![record("202401011000", "1234", "eq", "from category feed")]),
        aggregated(vec![record("202401011100", "1234", "eq", "from monthly report")]),
    ];

    let outcome = engine().run(&WatermarkMap::new(), &sources);

    assert_eq!(outcome.new_alerts.len(), 1);
    let representative = &outcome.new_alerts["01011234"];
    assert_eq!(representative.body, "from monthly report");
    assert_eq!(outcome.updates["eq"], "202401011100");
}

#[test]
fn test_running_watermark_applies_across_sources() {
    // The aggregated copy has the same release time as the one already
    // included, so it is not after the running watermark.
    let sources = vec![
        single("eq", vec![record("202401011000", "1234", "eq", "first copy")]),
        aggregated(vec![record("202401011000", "1234", "eq", "second copy")]),
    ];

    let outcome = engine().run(&WatermarkMap::new(), &sources);
    assert_eq!(outcome.new_alerts["01011234"].body, "first copy");
    assert_eq!(outcome.stale, 1);
}

#[test]
fn test_drills_are_never_included() {
    init_tracing();

    let sources = vec![single(
        "eq",
        vec![
            record("202401011000", "20240101100000", "eq", "地震演習 please ignore"),
            record("202401011100", "20240101110000", "eq", "This is a DRILL"),
            record("202401011200", "20240101120000", "eq", "Nationwide Exercise"),
        ],
    )];

    let outcome = engine().run(&WatermarkMap::new(), &sources);
    assert!(outcome.new_alerts.is_empty());
    assert!(outcome.updates.is_empty());
    assert_eq!(outcome.drills, 3);
}

#[test]
fn test_drill_cannot_suppress_real_bulletin_with_same_key() {
    let sources = vec![
        single("eq", vec![record("202401011000", "1234", "eq", "real quake")]),
        aggregated(vec![record("202401011100", "1234", "eq", "drill of the same")]),
    ];

    let outcome = engine().run(&WatermarkMap::new(), &sources);
    assert_eq!(outcome.new_alerts["01011234"].body, "real quake");
    assert_eq!(outcome.updates["eq"], "202401011000");
}

#[test]
fn test_watermark_updates_never_regress() {
    let prior = watermarks(&[("eq", "202401010000"), ("typhoon", "202401050000")]);
    let sources = vec![
        single("eq", vec![
            record("202401010100", "20240101010000", "eq", "a"),
            record("202401010300", "20240101030000", "eq", "b"),
        ]),
        single("typhoon", vec![record("202401040000", "20240104000000", "typhoon", "old")]),
        aggregated(vec![record("202401010200", "20240101020000", "eq", "in between")]),
    ];

    let outcome = engine().run(&prior, &sources);

    assert_eq!(outcome.updates["eq"], "202401010300");
    assert!(!outcome.updates.contains_key("typhoon"));
    for (category, value) in &outcome.updates {
        assert!(value.as_str() > prior[category].as_str());
    }
}

#[test]
fn test_no_data_sources_contribute_nothing() {
    let (descriptor, _) = single("eq", Vec::new());
    let sources = vec![(descriptor, FeedOutcome::NoData)];

    let outcome = engine().run(&WatermarkMap::new(), &sources);
    assert_eq!(outcome.candidates, 0);
    assert!(outcome.new_alerts.is_empty());
}

#[test]
fn test_advance_is_monotonic() {
    let mut updates = WatermarkUpdateSet::new();
    assert!(advance(&mut updates, "eq", "202401010800"));
    assert!(!advance(&mut updates, "eq", "202401010700"));
    assert!(!advance(&mut updates, "eq", "202401010800"));
    assert!(advance(&mut updates, "eq", "202401010900"));
    assert_eq!(updates["eq"], "202401010900");
}

#[test]
fn test_drill_filter_is_case_insensitive_and_ignores_blank_markers() {
    let filter = DrillFilter::new(["Drill", " ", ""]);
    assert_eq!(filter.markers(), &["drill".to_string()]);
    assert!(filter.is_drill("DRILL in progress"));
    assert!(!filter.is_drill("Actual earthquake"));
}
