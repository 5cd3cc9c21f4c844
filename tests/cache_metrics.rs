use std::collections::HashSet;

use metrics_util::debugging::DebuggingRecorder;
use uuid::Uuid;

use hymnary::cache::{
    CacheConfig, EventKind, EventQueue, METRIC_CACHE_CONSUME_MS, METRIC_CACHE_EVENTS_CONSUMED,
    METRIC_EVENTS_DROPPED, METRIC_FETCH_ERROR, METRIC_HIT, METRIC_INVALIDATED, METRIC_MISS,
    QueryCache, QueryKey, Resource,
};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cache = QueryCache::new(CacheConfig::default());
    let key = QueryKey::prefix(Resource::Hymns).with("page", 1);

    // miss, then hit
    for _ in 0..2 {
        let state = cache
            .client
            .fetch(key.clone(), || async { Ok::<_, String>(7_u32) })
            .await;
        assert!(!state.is_error());
    }

    // invalidation through the trigger, consumed immediately
    cache.trigger.hymn_upserted(Uuid::new_v4());

    // a failed refetch after the copy went stale
    let state = cache
        .client
        .fetch(key, || async { Err::<u32, _>("database timeout".to_string()) })
        .await;
    assert!(state.is_error());

    let queue = EventQueue::with_limit(1);
    queue.publish(EventKind::HymnViewed { id: Uuid::new_v4() });
    queue.publish(EventKind::HymnViewed { id: Uuid::new_v4() });
    assert!(queue.take_overflow());

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        METRIC_HIT,
        METRIC_MISS,
        METRIC_INVALIDATED,
        METRIC_FETCH_ERROR,
        METRIC_CACHE_CONSUME_MS,
        METRIC_CACHE_EVENTS_CONSUMED,
        METRIC_EVENTS_DROPPED,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
