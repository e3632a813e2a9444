//! Integration tests for the local progress cache.
//!
//! Every test works in its own temporary directory.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;

use chrono::{Duration, TimeZone, Utc};

use rte_kernel::domain::Element;
use rte_runtime::progress_cache::{CacheKey, ProgressCache};

fn values(location: &str) -> BTreeMap<Element, String> {
    BTreeMap::from([
        (Element::CompletionStatus, "incomplete".to_string()),
        (Element::Location, location.to_string()),
        (Element::SuspendData, "state=1".to_string()),
    ])
}

fn key() -> CacheKey {
    CacheKey::new("learner-42", "course-7")
}

#[test]
fn newest_frame_wins_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ProgressCache::open(dir.path(), 64).unwrap();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let mut journal = cache.journal(&key()).unwrap();
    assert_eq!(journal.save(&values("page-1"), t0).unwrap(), 1);
    assert_eq!(journal.save(&values("page-2"), t0 + Duration::seconds(5)).unwrap(), 2);
    drop(journal);

    let journal = cache.journal(&key()).unwrap();
    assert_eq!(journal.last_sequence(), 2);
    let latest = journal.load_latest().unwrap().unwrap();
    assert_eq!(latest.sequence, 2);
    assert_eq!(latest.values, values("page-2"));
    assert_eq!(latest.saved_at, t0 + Duration::seconds(5));
}

#[test]
fn missing_journal_has_nothing_cached() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ProgressCache::open(dir.path(), 64).unwrap();
    let journal = cache.journal(&key()).unwrap();
    assert_eq!(journal.frame_count(), 0);
    assert!(journal.load_latest().unwrap().is_none());
}

#[test]
fn torn_tail_is_cut_and_appends_continue() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ProgressCache::open(dir.path(), 64).unwrap();
    let now = Utc::now();

    let mut journal = cache.journal(&key()).unwrap();
    journal.save(&values("page-1"), now).unwrap();
    journal.save(&values("page-2"), now).unwrap();
    let intact_len = fs::metadata(journal.path()).unwrap().len();

    // A frame header promising more bytes than were written.
    let mut file = OpenOptions::new().append(true).open(journal.path()).unwrap();
    file.write_all(&200u32.to_le_bytes()).unwrap();
    file.write_all(&[0x0a, 0x01]).unwrap();
    drop(file);
    let path = journal.path().to_path_buf();
    drop(journal);

    let mut journal = cache.journal(&key()).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);
    assert_eq!(journal.frame_count(), 2);
    assert_eq!(journal.load_latest().unwrap().unwrap().values, values("page-2"));

    assert_eq!(journal.save(&values("page-3"), now).unwrap(), 3);
    let reopened = cache.journal(&key()).unwrap();
    assert_eq!(reopened.load_latest().unwrap().unwrap().values, values("page-3"));
}

#[test]
fn saves_after_a_torn_append_stay_readable() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ProgressCache::open(dir.path(), 64).unwrap();
    let now = Utc::now();

    let mut journal = cache.journal(&key()).unwrap();
    journal.save(&values("p1"), now).unwrap();

    // Half-written frame left behind by an append that failed.
    let mut file = OpenOptions::new().append(true).open(journal.path()).unwrap();
    file.write_all(&200u32.to_le_bytes()).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();
    drop(file);

    assert_eq!(journal.save(&values("p2"), now).unwrap(), 2);
    assert_eq!(journal.save(&values("p3"), now).unwrap(), 3);
    assert_eq!(journal.frame_count(), 3);

    let latest = journal.load_latest().unwrap().unwrap();
    assert_eq!(latest.sequence, 3);
    assert_eq!(latest.values, values("p3"));

    let reopened = cache.journal(&key()).unwrap();
    assert_eq!(reopened.frame_count(), 3);
    assert_eq!(reopened.load_latest().unwrap().unwrap().values, values("p3"));
}

#[test]
fn journal_compacts_to_newest_frame() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ProgressCache::open(dir.path(), 3).unwrap();
    let now = Utc::now();

    let mut journal = cache.journal(&key()).unwrap();
    for page in 1..=5 {
        journal.save(&values(&format!("page-{}", page)), now).unwrap();
        assert!(journal.frame_count() <= 3);
    }

    let latest = journal.load_latest().unwrap().unwrap();
    assert_eq!(latest.sequence, 5);
    assert_eq!(latest.values, values("page-5"));

    let reopened = cache.journal(&key()).unwrap();
    assert_eq!(reopened.last_sequence(), 5);
    assert!(reopened.frame_count() <= 3);
}

#[test]
fn journals_are_separate_per_learner_and_content() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ProgressCache::open(dir.path(), 64).unwrap();
    let now = Utc::now();

    let mut a = cache.journal(&CacheKey::new("learner-1", "course-7")).unwrap();
    let mut b = cache.journal(&CacheKey::new("learner-2", "course-7")).unwrap();
    a.save(&values("a"), now).unwrap();
    b.save(&values("b"), now).unwrap();

    assert_ne!(a.path(), b.path());
    assert_eq!(a.load_latest().unwrap().unwrap().values, values("a"));
    assert_eq!(b.load_latest().unwrap().unwrap().values, values("b"));
}
