//! Data model store and launch seeding tests.

use std::collections::BTreeMap;

use rte_kernel::dialect::Dialect;
use rte_kernel::domain::Element;
use rte_kernel::error_code::ErrorCode;
use rte_kernel::state::{create_initial_store, LaunchContext};
use rte_kernel::store::DataModelStore;
use rte_kernel::validation::{try_validate_all, try_validate_value};

#[test]
fn access_modes_are_enforced_for_content() {
    let mut store = DataModelStore::new();
    assert_eq!(
        store.set(Element::LearnerId, "x"),
        Err(ErrorCode::ReadOnlyElement)
    );
    assert_eq!(store.get(Element::Exit), Err(ErrorCode::WriteOnlyElement));
    assert_eq!(store.set(Element::Exit, "suspend"), Ok(()));
    assert_eq!(store.raw(Element::Exit), Some("suspend"));
}

#[test]
fn host_writes_bypass_access_but_not_types() {
    let mut store = DataModelStore::new();
    assert_eq!(store.host_set(Element::LearnerId, "learner-1"), Ok(()));
    assert_eq!(store.get(Element::LearnerId), Ok("learner-1".to_string()));
    assert_eq!(
        store.host_set(Element::Credit, "maybe"),
        Err(ErrorCode::IncorrectDataType)
    );
    assert!(!store.was_written_by_content(Element::LearnerId));
}

#[test]
fn host_write_takes_element_back_from_content() {
    let mut store = DataModelStore::new();
    store.set(Element::SuccessStatus, "failed").unwrap();
    assert!(store.was_written_by_content(Element::SuccessStatus));

    store.host_set(Element::SuccessStatus, "unknown").unwrap();
    assert!(!store.was_written_by_content(Element::SuccessStatus));
    assert_eq!(store.raw(Element::SuccessStatus), Some("unknown"));
}

#[test]
fn rejected_writes_leave_no_trace() {
    let mut store = DataModelStore::new();
    assert_eq!(
        store.set(Element::ScoreScaled, "2"),
        Err(ErrorCode::IncorrectDataType)
    );
    assert_eq!(store.raw(Element::ScoreScaled), None);
    assert!(!store.is_dirty());
    assert!(!store.was_written_by_content(Element::ScoreScaled));
}

#[test]
fn persist_triggering_writes_mark_dirty() {
    let mut store = DataModelStore::new();
    store.set(Element::SessionTime, "PT1M").unwrap();
    assert!(!store.is_dirty());

    store.set(Element::Location, "page-2").unwrap();
    assert!(store.is_dirty());
    assert!(store.take_dirty());
    assert!(!store.take_dirty());
}

#[test]
fn persisted_values_exclude_session_fields() {
    let mut store = DataModelStore::new();
    store.host_set(Element::LearnerId, "learner-1").unwrap();
    store.set(Element::SessionTime, "PT1M").unwrap();
    store.set(Element::SuspendData, "abc").unwrap();
    store.set(Element::ScoreRaw, "42").unwrap();

    let persisted = store.persisted_values();
    assert_eq!(persisted.len(), 2);
    assert_eq!(persisted.get(&Element::SuspendData).map(String::as_str), Some("abc"));
    assert_eq!(persisted.get(&Element::ScoreRaw).map(String::as_str), Some("42"));
}

#[test]
fn scaled_score_prefers_content_value_then_derives() {
    let mut store = DataModelStore::new();
    assert_eq!(store.scaled_score(), None);

    store.set(Element::ScoreRaw, "85").unwrap();
    assert_eq!(store.scaled_score(), None);
    store.set(Element::ScoreMax, "100").unwrap();
    assert_eq!(store.scaled_score(), Some(8_500));

    store.set(Element::ScoreMin, "50").unwrap();
    assert_eq!(store.scaled_score(), Some(7_000));

    store.set(Element::ScoreScaled, "0.9").unwrap();
    assert_eq!(store.scaled_score(), Some(9_000));
}

#[test]
fn extensions_require_allow_listing() {
    let mut store = DataModelStore::with_extensions(["x.acme.page"]);
    assert_eq!(store.set_extension("x.acme.page", "4"), Ok(()));
    assert_eq!(store.get_extension("x.acme.page"), Ok("4".to_string()));
    assert_eq!(
        store.set_extension("x.acme.other", "4"),
        Err(ErrorCode::InvalidArgument)
    );
}

#[test]
fn snapshot_encodes_times_in_requested_dialect() {
    let mut store = DataModelStore::new();
    store.set(Element::CompletionStatus, "completed").unwrap();
    store.set(Element::ScoreRaw, "85").unwrap();
    store.set(Element::ScoreMax, "100").unwrap();
    store.set(Element::Location, "p9").unwrap();

    let legacy = store.snapshot(93_000, 453_000, Dialect::Legacy);
    assert_eq!(legacy.completion_status, "completed");
    assert_eq!(legacy.success_status, "unknown");
    assert_eq!(legacy.score_raw.as_deref(), Some("85"));
    assert_eq!(legacy.score_min, None);
    assert_eq!(legacy.score_scaled.as_deref(), Some("0.85"));
    assert_eq!(legacy.session_time, "00:15:30");
    assert_eq!(legacy.total_time, "01:15:30");
    assert_eq!(legacy.location, "p9");
    assert!(legacy.is_completed());

    let current = store.snapshot(93_000, 453_000, Dialect::Current);
    assert_eq!(current.session_time, "PT15M30S");
    assert_eq!(current.total_time, "PT1H15M30S");
}

#[test]
fn validation_checks_each_value_type() {
    assert!(try_validate_value(Element::Mode, "review").is_ok());
    assert!(try_validate_value(Element::ProgressMeasure, "1").is_ok());
    assert!(try_validate_value(Element::ProgressMeasure, "-0.1").is_err());
    assert!(try_validate_value(Element::ScoreRaw, "").is_ok());
    assert!(try_validate_value(Element::TotalTime, "P1DT2H").is_ok());
    assert!(try_validate_value(Element::TotalTime, "01:00:00").is_err());

    let mut entries = BTreeMap::new();
    entries.insert(Element::Location, "p1".to_string());
    entries.insert(Element::SuccessStatus, "maybe".to_string());
    assert_eq!(
        try_validate_all(&entries),
        Err((Element::SuccessStatus, ErrorCode::IncorrectDataType))
    );
}

// ---------------------------------------------------------------------------
// Launch seeding
// ---------------------------------------------------------------------------

#[test]
fn fresh_launch_is_seeded_ab_initio() {
    let launch = LaunchContext {
        learner_id: "learner-1".into(),
        learner_name: "Ada".into(),
        launch_data: "chapter=2".into(),
        ..LaunchContext::default()
    };
    let mut store = create_initial_store(&launch).unwrap();

    assert_eq!(store.raw(Element::Entry), Some("ab-initio"));
    assert_eq!(store.raw(Element::Mode), Some("normal"));
    assert_eq!(store.raw(Element::Credit), Some("credit"));
    assert_eq!(store.raw(Element::TotalTime), Some("PT0S"));
    assert_eq!(store.raw(Element::CompletionStatus), Some("unknown"));
    assert_eq!(store.raw(Element::LaunchData), Some("chapter=2"));
    assert_eq!(store.raw(Element::ScaledPassingScore), None);
    assert!(!store.take_dirty());
}

#[test]
fn resumed_launch_restores_values() {
    let mut resume = BTreeMap::new();
    resume.insert(Element::Location, "page-5".to_string());
    resume.insert(Element::SuspendData, "state".to_string());
    let launch = LaunchContext {
        learner_id: "learner-1".into(),
        mastery_score: Some("80".into()),
        prior_total_time_centis: 6_000,
        resume,
        ..LaunchContext::default()
    };
    let store = create_initial_store(&launch).unwrap();

    assert_eq!(store.raw(Element::Entry), Some("resume"));
    assert_eq!(store.raw(Element::Location), Some("page-5"));
    assert_eq!(store.raw(Element::TotalTime), Some("PT1M"));
    assert_eq!(store.raw(Element::ScaledPassingScore), Some("0.8"));
    assert!(!store.was_written_by_content(Element::Location));
}

#[test]
fn invalid_launch_values_are_reported() {
    let launch = LaunchContext {
        mode: Some("sideways".into()),
        ..LaunchContext::default()
    };
    assert_eq!(
        create_initial_store(&launch).err(),
        Some((Element::Mode, ErrorCode::IncorrectDataType))
    );
}

#[test]
fn launch_context_reads_camel_case_json() {
    let json = r#"{
        "launchUrl": "https://content.example/sco/index.html",
        "learnerId": "learner-9",
        "masteryScore": "0.75",
        "priorTotalTimeCentis": 12000,
        "resume": { "cmi.location": "p2" }
    }"#;
    let launch: LaunchContext = serde_json::from_str(json).unwrap();
    assert_eq!(launch.learner_id, "learner-9");
    assert_eq!(launch.mastery_threshold(), Some(7_500));
    assert_eq!(launch.prior_total_time_centis, 12_000);
    assert_eq!(launch.resume.get(&Element::Location).map(String::as_str), Some("p2"));
}
