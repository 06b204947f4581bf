//! Campus Cache Integration Tests
//!
//! Exercises the public API end to end with in-memory and file-backed
//! adapters:
//! - Preload sessions for each role
//! - Durable tier persistence across process restarts
//! - Failure injection on the record store and the durable tier

use std::path::PathBuf;
use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{json, Value};
use uuid::Uuid;

use campus_cache::adapters::{
    FileKeyValueStore, InMemoryEventCollector, InMemoryKeyValueStore, InMemoryRecordStore,
    ManualClock, SystemClock,
};
use campus_cache::cache::{CacheConfig, CacheManager};
use campus_cache::domain::{KeyValueStore, Role};
use campus_cache::preload::{CycleOutcome, PreloadOrchestrator, PreloadOutcome};
use campus_cache::{AppConfig, PreloadConfig};

fn school() -> Value {
    json!({
        "Faculty": {
            "t1": { "name": "Ravi", "years": { "0": "1st", "1": "2nd" }, "divisions": ["A"] },
            "t2": { "name": "Meera", "yearsTaught": "3rd Year", "divisions": ["B"] }
        },
        "Students": {
            "s1": { "name": "Asha", "Year": "2nd Year", "Division": "A" },
            "s2": { "name": "Kiran", "Year": "3rd", "Division": "A" },
            "s3": { "name": "Dev", "Year": "1st", "Division": "B" },
            "s4": { "name": "Nila", "year": 1, "division": "a" }
        },
        "Assignments": {
            "a1": { "title": "Essay", "teacherId": "t1", "Year": "2nd", "Division": "A" },
            "a2": { "title": "Lab report", "teacherId": "t2", "Year": "3rd", "Division": "B" }
        },
        "Notices": {
            "n1": { "title": "Holiday", "audience": "all" },
            "n2": { "title": "Staff meeting", "audience": "teacher" }
        }
    })
}

fn ids(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .expect("cached collections are arrays")
        .iter()
        .map(|v| v["id"].as_str().expect("views carry an id"))
        .collect()
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("campus-cache-it-{}", Uuid::new_v4()))
}

async fn file_backed(
    dir: &PathBuf,
    records: Arc<InMemoryRecordStore>,
) -> (Arc<PreloadOrchestrator>, Arc<CacheManager>) {
    let store = FileKeyValueStore::open(dir).await.unwrap();
    let events = Arc::new(InMemoryEventCollector::new());
    let cache = Arc::new(CacheManager::with_parts(
        CacheConfig::default(),
        Arc::new(store),
        events.clone(),
        Arc::new(SystemClock),
    ));
    let orchestrator =
        PreloadOrchestrator::new(cache.clone(), records, events, PreloadConfig::default()).unwrap();
    (Arc::new(orchestrator), cache)
}

// =============================================================================
// Preload Sessions
// =============================================================================

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_teacher_session_end_to_end() {
        let records = Arc::new(InMemoryRecordStore::from_tree(school()));
        let cache = Arc::new(CacheManager::in_memory());
        let orchestrator = PreloadOrchestrator::new(
            cache.clone(),
            records.clone(),
            Arc::new(InMemoryEventCollector::new()),
            PreloadConfig::default(),
        )
        .unwrap();

        let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();
        let outcome = orchestrator.preload_all_data(&subject).await;

        let report = outcome.report().expect("cycle ran");
        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.collection("assignedStudents").unwrap().source_records, 4);

        let students = orchestrator.get_cached_data("assignedStudents").await.unwrap();
        assert_eq!(ids(&students), vec!["s1", "s4"]);
        let notices = orchestrator.get_cached_data("notices").await.unwrap();
        assert_eq!(ids(&notices), vec!["n1", "n2"]);
        assert!(cache.is_fresh());
    }

    #[tokio::test]
    async fn test_student_session_end_to_end() {
        let records = Arc::new(InMemoryRecordStore::from_tree(school()));
        let orchestrator = PreloadOrchestrator::new(
            Arc::new(CacheManager::in_memory()),
            records,
            Arc::new(InMemoryEventCollector::new()),
            PreloadConfig::default(),
        )
        .unwrap();

        let subject = orchestrator.load_subject(Role::Student, "s3").await.unwrap();
        orchestrator.preload_all_data(&subject).await;

        let faculty = orchestrator.get_cached_data("facultyList").await.unwrap();
        assert!(ids(&faculty).is_empty());
        let classmates = orchestrator.get_cached_data("classmates").await.unwrap();
        assert!(ids(&classmates).is_empty());
        let notices = orchestrator.get_cached_data("notices").await.unwrap();
        assert_eq!(ids(&notices), vec!["n1"]);
        assert_eq!(
            orchestrator.get_cached_data("userRole").await,
            Some(json!("student"))
        );
    }

    #[tokio::test]
    async fn test_parent_plan_caches_identity_and_notices() {
        let mut tree = school();
        tree["Parents"] = json!({ "p1": { "name": "Lata", "children": ["s1"] } });
        let orchestrator = PreloadOrchestrator::new(
            Arc::new(CacheManager::in_memory()),
            Arc::new(InMemoryRecordStore::from_tree(tree)),
            Arc::new(InMemoryEventCollector::new()),
            PreloadConfig::default(),
        )
        .unwrap();

        let subject = orchestrator.load_subject(Role::Parent, "p1").await.unwrap();
        let outcome = orchestrator.preload_all_data(&subject).await;

        assert_eq!(outcome.report().unwrap().collections.len(), 1);
        let identity = orchestrator.get_cached_data("parentData").await.unwrap();
        assert_eq!(identity["children"], json!(["s1"]));
        assert_eq!(
            orchestrator.get_cached_data("notices").await.map(|n| ids(&n).len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_small_chunks_keep_source_order() {
        let mut students = serde_json::Map::new();
        for i in 0..50 {
            let year = if i % 2 == 0 { "2nd" } else { "4th" };
            students.insert(format!("s{:02}", i), json!({ "Year": year, "Division": "A" }));
        }
        let records = Arc::new(InMemoryRecordStore::from_tree(json!({
            "Faculty": { "t1": { "years": ["2"], "divisions": ["a"] } },
            "Students": students
        })));
        let config = PreloadConfig {
            chunk_size: 7,
            ..PreloadConfig::default()
        };
        let orchestrator = PreloadOrchestrator::new(
            Arc::new(CacheManager::in_memory()),
            records,
            Arc::new(InMemoryEventCollector::new()),
            config,
        )
        .unwrap();

        let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();
        orchestrator.preload_all_data(&subject).await;

        let cached = orchestrator.get_cached_data("assignedStudents").await.unwrap();
        let expected: Vec<String> = (0..50).step_by(2).map(|i| format!("s{:02}", i)).collect();
        assert_eq!(ids(&cached), expected);
    }
}

// =============================================================================
// Persistence Across Restarts
// =============================================================================

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_restart_within_window_reuses_durable_batch() {
        let dir = temp_dir();
        let records = Arc::new(InMemoryRecordStore::from_tree(school()));

        {
            let (orchestrator, cache) = file_backed(&dir, records.clone()).await;
            let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();
            orchestrator.preload_all_data(&subject).await;
            cache.flush().await;
        }
        let reads = records.total_reads();

        let (orchestrator, cache) = file_backed(&dir, records.clone()).await;
        assert!(!cache.is_fresh());

        let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();
        let outcome = orchestrator.preload_all_data(&subject).await;
        assert_eq!(outcome, PreloadOutcome::Fresh);
        // Only the subject lookup hit the record store.
        assert_eq!(records.total_reads(), reads + 1);

        let durable_hits = cache.metrics().durable_hits;
        let students = orchestrator.get_cached_data("assignedStudents").await.unwrap();
        assert_eq!(ids(&students), vec!["s1", "s4"]);
        assert_eq!(cache.metrics().durable_hits, durable_hits + 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_restart_with_another_subject_refetches() {
        let dir = temp_dir();
        let records = Arc::new(InMemoryRecordStore::from_tree(school()));

        {
            let (orchestrator, cache) = file_backed(&dir, records.clone()).await;
            let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();
            orchestrator.preload_all_data(&subject).await;
            cache.flush().await;
        }

        let (orchestrator, cache) = file_backed(&dir, records.clone()).await;
        let subject = orchestrator.load_subject(Role::Student, "s1").await.unwrap();
        let outcome = orchestrator.preload_all_data(&subject).await;
        assert_matches!(outcome, PreloadOutcome::Ran(_));
        cache.flush().await;

        let identity = orchestrator.get_cached_data("studentData").await.unwrap();
        assert_eq!(identity["id"], "s1");
        assert_eq!(orchestrator.get_cached_data("teacherData").await, None);

        let store = FileKeyValueStore::open(&dir).await.unwrap();
        assert_eq!(store.get("teacherData").await.unwrap(), None);
        assert_eq!(store.get("userRole").await.unwrap().as_deref(), Some("\"student\""));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_clear_cache_empties_durable_tier() {
        let dir = temp_dir();
        let records = Arc::new(InMemoryRecordStore::from_tree(school()));
        let (orchestrator, _cache) = file_backed(&dir, records).await;

        let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();
        orchestrator.preload_all_data(&subject).await;
        orchestrator.clear_cache().await;

        let remaining = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(remaining, 0);

        let store = FileKeyValueStore::open(&dir).await.unwrap();
        assert_eq!(store.get("teacherData").await.unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_cold_start_read_is_not_fresh() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.insert_raw("teacherData", r#"{"id":"t1","name":"Ravi"}"#);
        let clock = Arc::new(ManualClock::starting_now());
        let cache = CacheManager::with_parts(
            CacheConfig::default(),
            store,
            Arc::new(InMemoryEventCollector::new()),
            clock.clone(),
        );
        clock.advance(chrono::Duration::hours(6));

        assert_eq!(
            cache.get("teacherData").await,
            Some(json!({ "id": "t1", "name": "Ravi" }))
        );
        assert!(!cache.is_fresh());
    }
}

// =============================================================================
// Failure Injection
// =============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_every_fetch_failing_keeps_identity() {
        let records = Arc::new(InMemoryRecordStore::from_tree(school()));
        for path in ["Students", "Assignments", "Faculty", "Notices"] {
            records.fail_path(path, "network unreachable");
        }
        let events = Arc::new(InMemoryEventCollector::new());
        let orchestrator = PreloadOrchestrator::new(
            Arc::new(CacheManager::in_memory()),
            records.clone(),
            events.clone(),
            PreloadConfig::default(),
        )
        .unwrap();
        let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();

        let outcome = orchestrator.preload_all_data(&subject).await;

        let report = outcome.report().unwrap();
        assert_eq!(report.outcome, CycleOutcome::CompletedWithFailures);
        assert_eq!(report.failed_collections().count(), 4);
        assert_eq!(events.events_of_type("CollectionFailed").len(), 4);
        assert_eq!(
            orchestrator.get_cached_data("teacherData").await.unwrap()["name"],
            "Ravi"
        );
        for key in ["assignedStudents", "teacherAssignments", "facultyDirectory", "notices"] {
            assert_eq!(orchestrator.get_cached_data(key).await, Some(json!([])));
        }
    }

    #[tokio::test]
    async fn test_durable_write_failures_are_published() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.set_fail_writes(true);
        let events = Arc::new(InMemoryEventCollector::new());
        let cache = Arc::new(CacheManager::with_parts(
            CacheConfig::default(),
            store.clone(),
            events.clone(),
            Arc::new(SystemClock),
        ));
        let orchestrator = PreloadOrchestrator::new(
            cache.clone(),
            Arc::new(InMemoryRecordStore::from_tree(school())),
            events.clone(),
            PreloadConfig::default(),
        )
        .unwrap();
        let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();

        orchestrator.preload_all_data(&subject).await;
        cache.flush().await;

        assert!(store.is_empty());
        assert!(!events.events_of_type("DurableWriteFailed").is_empty());
        let students = orchestrator.get_cached_data("assignedStudents").await.unwrap();
        assert_eq!(ids(&students), vec!["s1", "s4"]);
    }

    #[tokio::test]
    async fn test_recovered_collection_after_refresh() {
        let records = Arc::new(InMemoryRecordStore::from_tree(school()));
        records.fail_path("Notices", "timeout");
        let orchestrator = PreloadOrchestrator::new(
            Arc::new(CacheManager::in_memory()),
            records.clone(),
            Arc::new(InMemoryEventCollector::new()),
            PreloadConfig::default(),
        )
        .unwrap();
        let subject = orchestrator.load_subject(Role::Teacher, "t1").await.unwrap();

        orchestrator.preload_all_data(&subject).await;
        assert_eq!(orchestrator.get_cached_data("notices").await, Some(json!([])));

        records.heal_path("Notices");
        let outcome = orchestrator.refresh_data(&subject).await;

        assert_eq!(outcome.report().unwrap().outcome, CycleOutcome::Completed);
        let notices = orchestrator.get_cached_data("notices").await.unwrap();
        assert_eq!(ids(&notices), vec!["n1", "n2"]);
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config_tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_yaml_window_drives_freshness() {
        let config = AppConfig::from_yaml_str("preload:\n  freshness_window_minutes: 1\n").unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = CacheManager::with_parts(
            CacheConfig::from(&config.preload),
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(InMemoryEventCollector::new()),
            clock.clone(),
        );

        assert_eq!(cache.config().freshness_window, Duration::from_secs(60));
        cache.set("k", json!(1));
        clock.advance(chrono::Duration::seconds(59));
        assert!(cache.is_fresh());
        clock.advance(chrono::Duration::seconds(1));
        assert!(!cache.is_fresh());
    }
}
