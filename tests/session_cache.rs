use std::collections::HashMap;
use std::sync::Arc;

use exam_seating::cache::{BlobStore, FsStore, MemoryStore, SessionCache};
use exam_seating::error::CacheError;
use exam_seating::models::plan::GenerationRequest;
use exam_seating::models::snapshot::RoomInputs;
use exam_seating::seating::plan_room;

fn request() -> GenerationRequest {
    GenerationRequest::new(4, 6, 2)
        .with_roster(1, (1..=8).map(|i| format!("BTCS24O10{i:02}")))
        .with_roster(2, (1..=8).map(|i| format!("BTEC24O20{i:02}")))
}

async fn save_sample<S: BlobStore>(cache: &SessionCache<S>, plan_id: &str, room: &str) -> bool {
    let request = request();
    let result = plan_room(&request, &HashMap::new()).unwrap();
    cache
        .save_room(plan_id, room, &result, RoomInputs::from_request(&request))
        .await
        .unwrap()
}

#[tokio::test]
async fn saved_room_loads_back() {
    let cache = SessionCache::new(MemoryStore::new());
    let plan_id = cache.create_plan(None).await.unwrap();
    assert!(save_sample(&cache, &plan_id, "A-101").await);

    let request = request();
    let expected = plan_room(&request, &HashMap::new()).unwrap();
    let loaded = cache.load_room(&plan_id, "A-101").await.unwrap().unwrap();
    assert_eq!(loaded, expected);

    let snapshot = cache.load_snapshot(&plan_id).await.unwrap().unwrap();
    assert_eq!(snapshot.metadata.latest_room.as_deref(), Some("A-101"));
    assert_eq!(snapshot.metadata.total_students, 16);
    assert!(cache.load_room(&plan_id, "B-202").await.unwrap().is_none());
    assert!(cache.load_room("missing", "A-101").await.unwrap().is_none());
}

#[tokio::test]
async fn saving_the_same_room_twice_leaves_bytes_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let cache = SessionCache::new(store.clone());
    cache.create_plan(Some("p1")).await.unwrap();

    assert!(save_sample(&cache, "p1", "A-101").await);
    let first = store.get("plans/p1.json").await.unwrap().unwrap();
    assert!(!save_sample(&cache, "p1", "A-101").await);
    let second = store.get("plans/p1.json").await.unwrap().unwrap();
    assert_eq!(first, second);

    let on_disk = std::fs::read(dir.path().join("plans").join("p1.json")).unwrap();
    assert_eq!(on_disk, first);
}

#[tokio::test]
async fn imported_room_is_identical() {
    let cache = SessionCache::new(MemoryStore::new());
    save_sample(&cache, "src", "A-101").await;
    cache.create_plan(Some("dst")).await.unwrap();

    cache.import_snapshot("src", "dst", "A-101").await.unwrap();
    let a = cache.load_room_entry("src", "A-101").await.unwrap().unwrap();
    let b = cache.load_room_entry("dst", "A-101").await.unwrap().unwrap();
    assert_eq!(a, b);

    let missing = cache.import_snapshot("src", "dst", "Z-999").await;
    assert!(matches!(missing, Err(CacheError::RoomNotFound { .. })));
    let no_plan = cache.import_snapshot("nope", "dst", "A-101").await;
    assert!(matches!(no_plan, Err(CacheError::PlanNotFound(_))));
}

#[tokio::test]
async fn finalize_prunes_and_freezes() {
    let cache = SessionCache::new(MemoryStore::new());
    save_sample(&cache, "p1", "A-101").await;
    save_sample(&cache, "p1", "B-202").await;

    let keep = vec!["A-101".to_string()];
    let first = cache.finalize("p1", Some(&keep)).await.unwrap();
    assert!(first.is_finalized());
    assert_eq!(first.rooms.keys().collect::<Vec<_>>(), vec!["A-101"]);
    assert_eq!(first.metadata.latest_room, None);

    let second = cache.finalize("p1", None).await.unwrap();
    assert_eq!(first, second);

    let request = request();
    let result = plan_room(&request, &HashMap::new()).unwrap();
    let refused = cache.save_room("p1", "C-303", &result, RoomInputs::from_request(&request)).await;
    assert!(matches!(refused, Err(CacheError::PlanFinalized(_))));
}

#[tokio::test]
async fn corrupt_snapshot_only_breaks_its_own_plan() {
    let store = MemoryStore::new();
    let cache = SessionCache::new(store.clone());
    store.put("plans/broken.json", b"{ not json".to_vec()).await.unwrap();
    save_sample(&cache, "good", "A-101").await;

    let err = cache.load_snapshot("broken").await.unwrap_err();
    assert!(matches!(err, CacheError::Corruption { ref plan_id, .. } if plan_id == "broken"));
    assert!(cache.load_snapshot("good").await.unwrap().is_some());

    let fingerprint = "f".repeat(64);
    assert!(cache.find_room(&fingerprint, "other").await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_identifiers_are_rejected() {
    let cache = SessionCache::new(MemoryStore::new());
    assert!(matches!(cache.create_plan(Some("../etc")).await, Err(CacheError::InvalidPlanId(_))));

    let request = request();
    let result = plan_room(&request, &HashMap::new()).unwrap();
    let blank = cache.save_room("p1", "  ", &result, RoomInputs::from_request(&request)).await;
    assert!(matches!(blank, Err(CacheError::InvalidRoomName(_))));
}

#[tokio::test]
async fn concurrent_writers_do_not_lose_rooms() {
    let cache = Arc::new(SessionCache::new(MemoryStore::new()));
    cache.create_plan(Some("busy")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            save_sample(&*cache, "busy", &format!("R-{i:02}")).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    let snapshot = cache.load_snapshot("busy").await.unwrap().unwrap();
    assert_eq!(snapshot.rooms.len(), 16);
    assert_eq!(snapshot.metadata.total_students, 16 * 16);
}

#[tokio::test]
async fn occupied_rolls_skip_the_current_room() {
    let cache = SessionCache::new(MemoryStore::new());
    save_sample(&cache, "p1", "A-101").await;

    let elsewhere = cache.occupied_rolls("p1", "B-202").await.unwrap();
    assert_eq!(elsewhere.len(), 16);
    assert_eq!(elsewhere.get("BTCS24O1001").map(String::as_str), Some("A-101"));
    assert!(cache.occupied_rolls("p1", "A-101").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_the_plan() {
    let cache = SessionCache::new(MemoryStore::new());
    save_sample(&cache, "p1", "A-101").await;
    assert!(cache.delete_snapshot("p1").await.unwrap());
    assert!(!cache.delete_snapshot("p1").await.unwrap());
    assert!(cache.load_snapshot("p1").await.unwrap().is_none());
}
