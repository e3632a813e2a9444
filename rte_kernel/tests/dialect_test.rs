//! Dialect adapter tests: key normalization, timespans, lesson status.

use rte_kernel::dialect::{
    decode_timespan, encode_timespan, CanonicalKey, Dialect, DialectAdapter, Namespace,
    TimeDirection,
};
use rte_kernel::domain::Element;
use rte_kernel::error_code::ErrorCode;

#[test]
fn legacy_keys_map_onto_canonical_elements() {
    let adapter = DialectAdapter::new(Dialect::Legacy);
    let cases = [
        ("cmi.core.student_id", Element::LearnerId),
        ("cmi.core.score.raw", Element::ScoreRaw),
        ("cmi.core.lesson_location", Element::Location),
        ("cmi.core.session_time", Element::SessionTime),
        ("cmi.suspend_data", Element::SuspendData),
        ("cmi.core.lesson_mode", Element::Mode),
    ];
    for (key, element) in cases {
        assert_eq!(adapter.normalize_key(key), CanonicalKey::Element(element), "{}", key);
    }
    assert_eq!(
        adapter.normalize_key("cmi.core.lesson_status"),
        CanonicalKey::LessonStatus
    );
}

#[test]
fn current_keys_are_canonical() {
    let adapter = DialectAdapter::new(Dialect::Current);
    for element in Element::ALL {
        assert_eq!(
            adapter.normalize_key(element.canonical_key()),
            CanonicalKey::Element(element)
        );
    }
    assert_eq!(
        adapter.normalize_key("cmi.core.lesson_status"),
        CanonicalKey::Extension("cmi.core.lesson_status".to_string())
    );
}

#[test]
fn unknown_keys_pass_through_unchanged() {
    let adapter = DialectAdapter::new(Dialect::Legacy);
    assert_eq!(
        adapter.normalize_key("x.vendor.page"),
        CanonicalKey::Extension("x.vendor.page".to_string())
    );
    assert_eq!(
        adapter.normalize_key("cmi.interactions.3.result"),
        CanonicalKey::Unimplemented("cmi.interactions.3.result".to_string())
    );
    assert_eq!(
        adapter.normalize_key("cmi.objectives._count"),
        CanonicalKey::Count(Namespace::Objectives)
    );
}

#[test]
fn legacy_timespans_parse_to_centiseconds() {
    assert_eq!(decode_timespan("00:15:30", Dialect::Legacy), Some(93_000));
    assert_eq!(decode_timespan("0001:02:03.5", Dialect::Legacy), Some(372_350));
    assert_eq!(decode_timespan("01:02:03.25", Dialect::Legacy), Some(372_325));
    assert_eq!(decode_timespan("1:02:03.25", Dialect::Legacy), None);
    assert_eq!(decode_timespan("00:60:00", Dialect::Legacy), None);
    assert_eq!(decode_timespan("00:00:61", Dialect::Legacy), None);
    assert_eq!(decode_timespan("00:00:01.123", Dialect::Legacy), None);
    assert_eq!(decode_timespan("10000:00:00", Dialect::Legacy), None);
    assert_eq!(decode_timespan("PT1M", Dialect::Legacy), None);
}

#[test]
fn iso_timespans_parse_to_centiseconds() {
    assert_eq!(decode_timespan("PT1H30M", Dialect::Current), Some(540_000));
    assert_eq!(decode_timespan("PT1.5S", Dialect::Current), Some(150));
    assert_eq!(decode_timespan("P1D", Dialect::Current), Some(8_640_000));
    assert_eq!(decode_timespan("P1M", Dialect::Current), Some(30 * 8_640_000));
    assert_eq!(decode_timespan("P1Y", Dialect::Current), Some(365 * 8_640_000));
    assert_eq!(decode_timespan("P1DT1S", Dialect::Current), Some(8_640_100));
    assert_eq!(decode_timespan("P", Dialect::Current), None);
    assert_eq!(decode_timespan("PT", Dialect::Current), None);
    assert_eq!(decode_timespan("PT1S1M", Dialect::Current), None);
    assert_eq!(decode_timespan("PT1.5M", Dialect::Current), None);
    assert_eq!(decode_timespan("00:01:00", Dialect::Current), None);
}

#[test]
fn timespans_encode_per_dialect() {
    assert_eq!(encode_timespan(372_350, Dialect::Legacy), "01:02:03.50");
    assert_eq!(encode_timespan(93_000, Dialect::Legacy), "00:15:30");
    assert_eq!(encode_timespan(372_350, Dialect::Current), "PT1H2M3.5S");
    assert_eq!(encode_timespan(0, Dialect::Current), "PT0S");
    assert_eq!(encode_timespan(360_000, Dialect::Current), "PT1H");
}

#[test]
fn time_conversion_preserves_centiseconds() {
    let legacy = DialectAdapter::new(Dialect::Legacy);
    let canonical = legacy
        .normalize_time("12:34:56.78", TimeDirection::Inbound)
        .unwrap();
    assert_eq!(canonical, "PT12H34M56.78S");
    assert_eq!(
        legacy.normalize_time(&canonical, TimeDirection::Outbound).as_deref(),
        Some("12:34:56.78")
    );
}

#[test]
fn timespans_survive_encode_then_decode() {
    let samples = (0..200_000u64)
        .step_by(37)
        .chain([99, 100, 6_000, 360_000, 8_640_000, 35_999_999_u64]);
    for centis in samples {
        for dialect in [Dialect::Legacy, Dialect::Current] {
            let text = encode_timespan(centis, dialect);
            assert_eq!(
                decode_timespan(&text, dialect),
                Some(centis),
                "{:?} {} encoded as {}",
                dialect,
                centis,
                text
            );
        }
    }
}

#[test]
fn lesson_status_splits_and_composes() {
    let adapter = DialectAdapter::new(Dialect::Legacy);

    let passed = adapter.lesson_status_inbound("passed").unwrap();
    assert_eq!(passed.completion, "completed");
    assert_eq!(passed.success, Some("passed"));

    let incomplete = adapter.lesson_status_inbound("incomplete").unwrap();
    assert_eq!(incomplete.completion, "incomplete");
    assert_eq!(incomplete.success, None);

    assert_eq!(
        adapter.lesson_status_inbound("unknown"),
        Err(ErrorCode::IncorrectDataType)
    );

    assert_eq!(DialectAdapter::lesson_status_outbound("completed", "failed"), "failed");
    assert_eq!(DialectAdapter::lesson_status_outbound("completed", "unknown"), "completed");
    assert_eq!(DialectAdapter::lesson_status_outbound("unknown", "unknown"), "not attempted");
    assert_eq!(DialectAdapter::lesson_status_outbound("browsed", "unknown"), "browsed");
}

#[test]
fn legacy_mastery_score_reads_as_percentage() {
    let adapter = DialectAdapter::new(Dialect::Legacy);
    assert_eq!(adapter.outbound_value(Element::ScaledPassingScore, "0.85"), "85");
    let current = DialectAdapter::new(Dialect::Current);
    assert_eq!(current.outbound_value(Element::ScaledPassingScore, "0.85"), "0.85");
}

#[test]
fn error_numbers_map_per_dialect() {
    assert_eq!(ErrorCode::NotInitialized.number(Dialect::Legacy), 301);
    assert_eq!(ErrorCode::NotInitialized.number(Dialect::Current), 122);
    assert_eq!(
        ErrorCode::from_number(301, Dialect::Current),
        Some(ErrorCode::ElementCannotHaveChildren)
    );
    assert_eq!(
        ErrorCode::from_number(101, Dialect::Legacy),
        Some(ErrorCode::GeneralException)
    );
    assert_eq!(ErrorCode::parse(" 406 ", Dialect::Current), Some(ErrorCode::IncorrectDataType));
    assert_eq!(ErrorCode::parse("abc", Dialect::Current), None);
    for code in ErrorCode::ALL {
        for dialect in [Dialect::Legacy, Dialect::Current] {
            assert!(!code.description(dialect).is_empty());
        }
    }
}
