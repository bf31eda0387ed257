use applogs::auth::{Identity, SubscribeClient};
use applogs::config::BackendConfig;
use applogs::payload::{AppLogEvent, DisplayPrefix};
use applogs::poller::{Filters, PollClient};
use applogs::session::{LogSessionRequest, SchedulerConfig, Session, SessionState};
use applogs::sink::Sink;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default)]
struct Received {
    events: Vec<(String, DisplayPrefix)>,
    statuses: Vec<String>,
    fatals: Vec<String>,
}

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Received>>);

impl Sink for SharedSink {
    fn on_event(&mut self, event: &AppLogEvent, prefix: &DisplayPrefix) {
        self.0
            .lock()
            .unwrap()
            .events
            .push((event.cursor.clone(), prefix.clone()));
    }

    fn on_status(&mut self, message: &str) {
        self.0.lock().unwrap().statuses.push(message.to_string());
    }

    fn on_fatal(&mut self, message: &str) {
        self.0.lock().unwrap().fatals.push(message.to_string());
    }
}

fn record(cursor: &str) -> serde_json::Value {
    json!({
        "shop_id": 1,
        "api_client_id": 2,
        "payload": json!({
            "input": "{\"cart\":{}}",
            "input_bytes": 11,
            "output": {"operations": []},
            "output_bytes": 17,
            "logs": "ran",
            "function_id": "fn-1",
            "invocation_id": format!("inv-{}", cursor),
            "fuel_consumed": 1_234_567,
        })
        .to_string(),
        "log_type": "function_run",
        "source": "discount-fn",
        "source_namespace": "extensions",
        "cursor": cursor,
        "status": "success",
        "log_timestamp": "2024-05-23T19:17:00.240Z",
    })
}

fn backend(server: &MockServer) -> BackendConfig {
    BackendConfig {
        poll_url: format!("{}/app_logs/poll", server.uri()),
        subscribe_url: format!("{}/app_logs/subscribe", server.uri()),
        access_token: None,
        request_timeout: Duration::from_secs(5),
    }
}

fn fast() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_millis(1),
        error_retry_interval: Duration::from_millis(1),
        throttle_retry_interval: Duration::from_millis(1),
        max_auth_attempts: 3,
    }
}

async fn mount_subscribe(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/app_logs/subscribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jwtToken": token,
            "success": true,
            "errors": []
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
}

fn new_session(
    server: &MockServer,
    request: LogSessionRequest,
    config: SchedulerConfig,
) -> (Session<PollClient, SubscribeClient, SharedSink>, SharedSink) {
    let backend = backend(server);
    let sink = SharedSink::default();
    let session = Session::new(
        request,
        SubscribeClient::new(&backend).unwrap(),
        PollClient::new(&backend).unwrap(),
        sink.clone(),
        config,
    );
    (session, sink)
}

#[tokio::test]
async fn test_stream_survives_token_expiry() {
    let server = MockServer::start().await;
    mount_subscribe(&server, "t1").await;
    mount_subscribe(&server, "t2").await;

    Mock::given(method("GET"))
        .and(path("/app_logs/poll"))
        .and(header("authorization", "Bearer t1"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "app_logs": [record("c1")],
            "cursor": "c1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer t1"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"errors": ["token expired"]})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer t2"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "app_logs": [record("c2")],
            "cursor": "c2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = LogSessionRequest::new(Identity::new("s1", "k1"));
    let (mut session, sink) = new_session(&server, request, fast());

    // subscribe, poll, 401, resubscribe, poll
    for _ in 0..5 {
        session.step().await;
    }

    let received = sink.0.lock().unwrap();
    let cursors: Vec<&str> = received.events.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(cursors, vec!["c1", "c2"]);
    assert_eq!(received.events[0].1.fuel_consumed.as_deref(), Some("1.2346"));
    assert!(received.fatals.is_empty());
    assert_eq!(session.cursor(), "c2");
    assert_eq!(session.auth().subscribe_calls(), 2);
    assert_eq!(session.state(), SessionState::Polling);
}

#[tokio::test]
async fn test_bad_record_does_not_stop_stream() {
    let server = MockServer::start().await;
    mount_subscribe(&server, "t1").await;

    let mut bad = record("c2");
    bad["payload"] = json!("{\"function_id\": ");
    Mock::given(method("GET"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "app_logs": [record("c1"), bad, record("c3")],
            "cursor": "c3"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("cursor", "c3"))
        .and(query_param("status", "success"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"errors": ["stop here"]})))
        .expect(1)
        .mount(&server)
        .await;

    let request = LogSessionRequest::new(Identity::new("s1", "k1"))
        .with_filters(Filters::new(Some("success".to_string()), None));
    let (session, sink) = new_session(&server, request, fast());

    let (_tx, rx) = watch::channel(false);
    let summary = session.run(rx).await;

    let received = sink.0.lock().unwrap();
    assert_eq!(received.events.len(), 2);
    assert_eq!(received.statuses.len(), 1);
    assert!(received.statuses[0].starts_with("Failed to decode log record"));
    assert_eq!(received.fatals, vec!["stop here while fetching app logs".to_string()]);
    assert_eq!(summary.polls, 2);
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(summary.cursor, "c3");
    assert_eq!(summary.state, SessionState::Terminated);
}

#[tokio::test]
async fn test_throttle_and_server_errors_keep_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("cursor", "c5"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("cursor", "c5"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("cursor", "c5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cursor": "c6"})))
        .mount(&server)
        .await;

    let request = LogSessionRequest::new(Identity::new("s1", "k1"))
        .with_cursor("c5")
        .with_credential(applogs::auth::Credential::new("t0"));
    let config = SchedulerConfig {
        throttle_retry_interval: Duration::from_secs(60),
        error_retry_interval: Duration::from_secs(5),
        ..fast()
    };
    let (mut session, sink) = new_session(&server, request, config);

    assert_eq!(session.step().await, Some(Duration::from_secs(60)));
    assert_eq!(session.state(), SessionState::Throttled);
    assert_eq!(session.cursor(), "c5");

    assert_eq!(session.step().await, Some(Duration::from_secs(5)));
    assert_eq!(session.state(), SessionState::BackingOff);
    assert_eq!(session.cursor(), "c5");

    assert_eq!(session.step().await, Some(Duration::from_millis(1)));
    assert_eq!(session.cursor(), "c6");

    let received = sink.0.lock().unwrap();
    assert_eq!(
        received.statuses,
        vec![
            "429: slow down\nRetrying in 60s".to_string(),
            "503: Service Unavailable\nRetrying in 5s".to_string(),
            "Resumed streaming".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_rejected_subscribe_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/app_logs/subscribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jwtToken": "",
            "success": false,
            "errors": ["App is not installed on this store"]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = LogSessionRequest::new(Identity::new("s1", "k1"));
    let (session, sink) = new_session(&server, request, fast());

    let (_tx, rx) = watch::channel(false);
    let summary = session.run(rx).await;

    assert_eq!(summary.state, SessionState::Terminated);
    assert_eq!(summary.polls, 0);
    let received = sink.0.lock().unwrap();
    assert_eq!(received.fatals.len(), 1);
    assert!(received.fatals[0].contains("App is not installed on this store"));
}
