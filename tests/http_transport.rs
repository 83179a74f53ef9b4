use std::sync::Arc;
use std::time::Duration;

use dayboard::api::{SharedTransport, habits, reminders, tags};
use dayboard::application::SyncClient;
use dayboard::cache::{CacheConfig, QueryStatus};
use dayboard::config::ApiSettings;
use dayboard::infra::error::TransportError;
use dayboard::infra::transport::{ApiRequest, HttpTransport, Transport};
use dayboard::util::clock::FixedClock;
use dayboard_api_types::TagCreateRequest;
use futures::future::join_all;
use httpmock::MockServer;
use serde_json::json;
use time::macros::date;
use url::Url;

fn settings(server: &MockServer, token: Option<&str>) -> ApiSettings {
    ApiSettings {
        base_url: Url::parse(&server.url("/api")).expect("mock url"),
        token: token.map(str::to_string),
        timeout: Duration::from_secs(2),
    }
}

fn client(server: &MockServer) -> SyncClient {
    let transport: SharedTransport =
        Arc::new(HttpTransport::new(&settings(server, Some("secret"))).expect("transport"));
    SyncClient::new(
        transport,
        CacheConfig::default(),
        Arc::new(FixedClock(date!(2024 - 05 - 01))),
    )
}

#[tokio::test]
async fn sends_bearer_token_and_filter_params() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/api/reminder")
            .header("authorization", "Bearer secret")
            .query_param("status", "completed")
            .query_param("page", "1");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "success": true,
                "data": {
                    "reminders": [{ "id": 9, "title": "file taxes", "status": "completed" }],
                    "pagination": { "current_page": 1, "total_pages": 1 }
                }
            }));
    });

    let client = client(&server);
    let params = vec![("status", "completed".to_string())];
    let snapshot = client
        .fetch(reminders::list_query(client.transport(), &params))
        .await
        .expect("reminders");

    mock.assert();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert!(!snapshot.has_next_page());
}

#[tokio::test]
async fn concurrent_reads_share_one_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/api/habit/stats");
        then.status(200)
            .header("content-type", "application/json")
            .delay(Duration::from_millis(100))
            .json_body(json!({ "success": true, "data": { "total": 3 } }));
    });

    let client = client(&server);
    let fetches = (0..8).map(|_| client.fetch(habits::stats_query(client.transport())));
    let results = join_all(fetches).await;

    assert!(results.iter().all(Result::is_ok));
    mock.assert_calls(1);
}

#[tokio::test]
async fn server_errors_carry_status_and_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/api/habit/99/details");
        then.status(404)
            .header("content-type", "application/json")
            .json_body(json!({ "success": false, "message": "habit not found" }));
    });

    let client = client(&server);
    let err = client
        .fetch(habits::detail_query(client.transport(), 99))
        .await
        .expect_err("missing habit");

    assert_eq!(err, TransportError::server(404, "habit not found"));
    let snapshot = client.store().get(&habits::detail_key(99)).expect("entry");
    assert_eq!(snapshot.status, QueryStatus::Error);
}

#[tokio::test]
async fn unsuccessful_envelope_is_a_server_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/api/tag");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "success": false, "message": "name taken" }));
    });

    let client = client(&server);
    let mutation = tags::create(&TagCreateRequest {
        name: "health".to_string(),
        color: None,
    })
    .expect("mutation");
    let err = client.perform(mutation).await.expect_err("rejected");

    assert!(matches!(err, TransportError::Server { status: 200, ref message } if message == "name taken"));
    assert!(client.store().is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/api/tag");
        then.status(200)
            .header("content-type", "application/json")
            .body("<html>maintenance</html>");
    });

    let transport = HttpTransport::new(&settings(&server, None)).expect("transport");
    let err = transport
        .request(ApiRequest::get("/tag"))
        .await
        .expect_err("not json");
    assert!(matches!(err, TransportError::Decode(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let transport = HttpTransport::new(&ApiSettings {
        base_url: Url::parse("http://127.0.0.1:9/api").expect("url"),
        token: None,
        timeout: Duration::from_millis(500),
    })
    .expect("transport");

    let err = transport
        .request(ApiRequest::get("/tag"))
        .await
        .expect_err("nothing listens on the discard port");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn mutation_body_is_sent_as_json() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/api/habit/7/done")
            .json_body(json!({ "date": "2024-05-01" }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "success": true, "data": { "id": 7 } }));
    });

    let client = client(&server);
    let mutation = habits::mark(7, date!(2024 - 05 - 01), dayboard::mutation::HabitMark::Done)
        .expect("mutation");
    client.perform(mutation).await.expect("marked");
    mock.assert();
}
