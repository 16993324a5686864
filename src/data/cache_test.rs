use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn key_collects_display_parts() {
    assert_eq!(key(["team", "abc"]), vec!["team".to_owned(), "abc".to_owned()]);
    assert_eq!(key([7, 8]), vec!["7".to_owned(), "8".to_owned()]);
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let value = cache
            .get_or_fetch(key(["events"]), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(vec![1, 2, 3])
            })
            .await
            .unwrap();
        assert_eq!(*value, vec![1, 2, 3]);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_stale_time_always_refetches() {
    let cache = QueryCache::new(Duration::ZERO);
    cache.insert(key(["events"]), Arc::new(1_u32)).await;
    assert!(cache.get::<u32>(&key(["events"])).await.is_none());
}

#[tokio::test]
async fn errors_are_not_cached() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let err = cache
        .get_or_fetch::<u32, _, _, _>(key(["profile", "u"]), || async { Err("offline") })
        .await
        .unwrap_err();
    assert_eq!(err, "offline");
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn wrong_type_is_a_miss() {
    let cache = QueryCache::new(Duration::from_secs(60));
    cache.insert(key(["team", "t"]), Arc::new(String::from("x"))).await;
    assert!(cache.get::<u32>(&key(["team", "t"])).await.is_none());
    assert!(cache.get::<String>(&key(["team", "t"])).await.is_some());
}

#[tokio::test]
async fn invalidate_drops_matching_prefix_only() {
    let cache = QueryCache::new(Duration::from_secs(60));
    cache.insert(key(["my-teams", "u1"]), Arc::new(1_u8)).await;
    cache.insert(key(["my-teams", "u2"]), Arc::new(2_u8)).await;
    cache.insert(key(["team", "t1"]), Arc::new(3_u8)).await;
    cache.insert(key(["my-teams-archive"]), Arc::new(4_u8)).await;

    assert_eq!(cache.invalidate(&key(["my-teams"])).await, 2);
    assert_eq!(cache.len().await, 2);
    assert!(cache.get::<u8>(&key(["team", "t1"])).await.is_some());
    assert!(cache.get::<u8>(&key(["my-teams-archive"])).await.is_some());
}

#[tokio::test]
async fn exact_key_invalidation() {
    let cache = QueryCache::new(Duration::from_secs(60));
    cache.insert(key(["team", "t1"]), Arc::new(1_u8)).await;
    cache.insert(key(["team", "t2"]), Arc::new(2_u8)).await;
    assert_eq!(cache.invalidate(&key(["team", "t1"])).await, 1);
    assert!(cache.get::<u8>(&key(["team", "t2"])).await.is_some());

    cache.clear().await;
    assert!(cache.is_empty().await);
}
