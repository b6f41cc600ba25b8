//! Event log behaviour through the public store API

mod common;
use common::*;

use chrono::Duration;
use serde_json::json;
use wips_store::{EventContext, EventType, Fingerprint, StoreError};

#[test]
fn scenario_append_scan_delete() {
    let t = Tmp::new();
    let store = t.store();

    let a = note_at(utc(2024, 3, 5, 10, 0, 0), "fix bug");
    let b = note_at(utc(2024, 3, 5, 11, 0, 0), "add feature");
    store.events().append(&a).unwrap();
    store.events().append(&b).unwrap();

    let start = utc(2024, 3, 5, 0, 0, 0);
    let end = utc(2024, 3, 5, 23, 59, 59);
    assert_eq!(
        store.events().scan(&start, &end).unwrap(),
        vec![a.clone(), b.clone()]
    );

    let removed = store.events().delete_by_id(&a.id.to_string()).unwrap();
    assert_eq!(removed, a);
    assert_eq!(store.events().scan(&start, &end).unwrap(), vec![b]);
}

#[test]
fn appended_event_roundtrips_with_all_fields() {
    let t = Tmp::new();
    let store = t.store();
    let at = utc(2024, 6, 1, 8, 30, 0);

    let event = note_at(at, "multi\nline \"quoted\" content")
        .with_context(EventContext {
            repo_id: Some(Fingerprint::of("git@example.com:me/wips.git")),
            cwd_id: Some(Fingerprint::of("/home/me/wips")),
            env_id: Some(Fingerprint::of("laptopme")),
            branch: Some("main".to_string()),
            head: Some("abc1234".to_string()),
        })
        .with_meta(json!({"tags": ["release"]}));
    store.events().append(&event).unwrap();

    let found = store
        .events()
        .scan(&(at - Duration::seconds(1)), &(at + Duration::seconds(1)))
        .unwrap();
    assert_eq!(found, vec![event]);
}

#[test]
fn range_bounds_are_inclusive() {
    let t = Tmp::new();
    let store = t.store();
    let start = utc(2024, 3, 10, 9, 0, 0);
    let end = utc(2024, 3, 10, 17, 0, 0);

    let before = note_at(start - Duration::milliseconds(1), "before");
    let at_start = note_at(start, "at start");
    let at_end = note_at(end, "at end");
    let after = note_at(end + Duration::milliseconds(1), "after");
    for event in [&before, &at_start, &at_end, &after] {
        store.events().append(event).unwrap();
    }

    assert_eq!(
        store.events().scan(&start, &end).unwrap(),
        vec![at_start, at_end]
    );
}

#[test]
fn scan_spans_months_in_shard_order_and_skips_missing_shards() {
    let t = Tmp::new();
    let store = t.store();

    let may = note_at(utc(2024, 5, 15, 12, 0, 0), "may");
    let january = note_at(utc(2024, 1, 15, 12, 0, 0), "january");
    // appended out of order; shard order decides the result order
    store.events().append(&may).unwrap();
    store.events().append(&january).unwrap();

    let found = store
        .events()
        .scan(&utc(2024, 1, 1, 0, 0, 0), &utc(2024, 6, 30, 0, 0, 0))
        .unwrap();
    assert_eq!(found, vec![january, may]);
    assert!(!t.shard_path(&utc(2024, 3, 15, 12, 0, 0)).exists());
}

#[test]
fn delete_removes_exactly_one_record() {
    let t = Tmp::new();
    let store = t.store();
    let events: Vec<_> = (0..5)
        .map(|i| note_at(utc(2024, 3, 12, 8 + i, 0, 0), &format!("event {i}")))
        .collect();
    for event in &events {
        store.events().append(event).unwrap();
    }

    store.events().delete_by_id(&events[2].id.to_string()).unwrap();

    let remaining = store
        .events()
        .scan(&utc(2024, 3, 1, 0, 0, 0), &utc(2024, 3, 31, 0, 0, 0))
        .unwrap();
    let mut expected = events.clone();
    expected.remove(2);
    assert_eq!(remaining, expected);
}

#[test]
fn unknown_id_leaves_shard_byte_identical() {
    let t = Tmp::new();
    let store = t.store();
    let at = utc(2024, 3, 12, 8, 0, 0);
    store.events().append(&note_at(at, "present")).unwrap();

    let path = t.shard_path(&at);
    let before = std::fs::read(&path).unwrap();

    let stranger = note_at(at, "never appended");
    let err = store
        .events()
        .delete_by_id(&stranger.id.to_string())
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    let err = store
        .events()
        .update_by_id(&stranger.id.to_string(), |event| {
            event.content = "changed".to_string()
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn update_changes_only_the_target() {
    let t = Tmp::new();
    let store = t.store();
    let first = note_at(utc(2024, 3, 12, 8, 0, 0), "first");
    let second = note_at(utc(2024, 3, 12, 9, 0, 0), "second");
    let third = note_at(utc(2024, 3, 12, 10, 0, 0), "third");
    for event in [&first, &second, &third] {
        store.events().append(event).unwrap();
    }

    let path = t.shard_path(&utc(2024, 3, 12, 8, 0, 0));
    let lines_before: Vec<String> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();

    let updated = store
        .events()
        .update_by_id(&second.id.to_string(), |event| {
            event.content = "second, reworded".to_string();
            event.kind = EventType::Undo;
        })
        .unwrap();
    assert_eq!(updated.id, second.id);
    assert_eq!(updated.content, "second, reworded");

    let lines_after: Vec<String> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines_after.len(), 3);
    assert_eq!(lines_after[0], lines_before[0]);
    assert_ne!(lines_after[1], lines_before[1]);
    assert_eq!(lines_after[2], lines_before[2]);

    assert_eq!(
        store.events().get_by_id(&second.id.to_string()).unwrap(),
        updated
    );
}

#[test]
fn corrupt_shard_blocks_only_itself() {
    let t = Tmp::new();
    let store = t.store();
    let march = note_at(utc(2024, 3, 12, 8, 0, 0), "march");
    let april = note_at(utc(2024, 4, 12, 8, 0, 0), "april");
    store.events().append(&march).unwrap();
    store.events().append(&april).unwrap();

    let march_path = t.shard_path(&utc(2024, 3, 12, 8, 0, 0));
    let mut text = std::fs::read_to_string(&march_path).unwrap();
    text.insert_str(0, "not json at all\n");
    std::fs::write(&march_path, text).unwrap();

    let err = store
        .events()
        .scan(&utc(2024, 3, 1, 0, 0, 0), &utc(2024, 4, 30, 0, 0, 0))
        .unwrap_err();
    assert!(matches!(err, StoreError::Decode { line: Some(1), .. }));

    let err = store
        .events()
        .delete_by_id(&march.id.to_string())
        .unwrap_err();
    assert_eq!(err.error_code(), "E_DECODE");

    assert_eq!(
        store
            .events()
            .scan(&utc(2024, 4, 5, 0, 0, 0), &utc(2024, 4, 25, 0, 0, 0))
            .unwrap(),
        vec![april.clone()]
    );
    store.events().delete_by_id(&april.id.to_string()).unwrap();
}

#[test]
fn shard_lines_use_trimmed_fractions_and_html_escapes() {
    let t = Tmp::new();
    let store = t.store();
    let at = utc(2024, 3, 5, 10, 0, 0) + Duration::milliseconds(120);
    let event = note_at(at, "<b>R&D</b>");
    store.events().append(&event).unwrap();

    let text = std::fs::read_to_string(t.shard_path(&at)).unwrap();
    assert_eq!(
        text,
        format!(
            "{{\"id\":\"{}\",\"ts\":\"2024-03-05T10:00:00.12Z\",\"type\":\"note\",\"content\":\"\\u003cb\\u003eR\\u0026D\\u003c/b\\u003e\",\"ctx\":{{}}}}\n",
            event.id
        )
    );

    assert_eq!(store.events().get_by_id(&event.id.to_string()).unwrap(), event);
}
