mod support;

use std::collections::HashSet;

use dayboard::api::{habits, reminders, tags};
use dayboard::infra::telemetry;
use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;
use time::macros::date;

use support::{FakeApi, client, habit};

#[tokio::test]
async fn sync_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let api = FakeApi::new();
    api.route("GET /habit/stats", json!({ "total": 1 }))
        .route("GET /tag", json!([]))
        .route("POST /habit/create", habit(1, "walk"));
    let client = client(&api, date!(2024 - 05 - 01));

    // Miss, fetch, then a deduplicated join and a hit.
    assert!(client.store().get(&habits::stats_key()).is_none());
    let (first, second) = tokio::join!(
        client.fetch(habits::stats_query(client.transport())),
        client.fetch(habits::stats_query(client.transport())),
    );
    first.expect("stats");
    second.expect("stats");
    assert!(client.store().get(&habits::stats_key()).is_some());

    // Failed read and failed mutation.
    let _ = client
        .fetch(reminders::detail_query(client.transport(), 5))
        .await;
    let _ = client.perform(reminders::delete(5)).await;

    // Successful mutation triggers invalidation.
    let _tags = client.subscribe(tags::list_key());
    client
        .fetch(tags::list_query(client.transport()))
        .await
        .expect("tags");
    let create = habits::create(&dayboard_api_types::HabitCreateRequest {
        name: "walk".to_string(),
        ..Default::default()
    })
    .expect("mutation");
    client.perform(create).await.expect("created");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "dayboard_cache_hit_total",
        "dayboard_cache_miss_total",
        "dayboard_cache_entries",
        "dayboard_query_fetch_total",
        "dayboard_query_fetch_ms",
        "dayboard_query_dedup_total",
        "dayboard_query_error_total",
        "dayboard_invalidation_total",
        "dayboard_mutation_total",
        "dayboard_mutation_error_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
