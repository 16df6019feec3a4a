use rama::{
    graceful::Shutdown,
    http::{Body, BodyExtractExt as _},
};

use super::*;
use crate::{
    client::new_web_client,
    comparator::{DEFAULT_TICK_INTERVAL, EventSink, PollingComparator},
    config::TargetConfig,
};

fn mock_server(api_key: Option<&str>) -> MockApiServer {
    MockApiServer {
        base_latency: 5.,
        penalty: 8.,
        jitter: 0.,
        error_rate: 0.,
        api_key: api_key.map(|key| key.parse().unwrap()),
        delay: false,
    }
}

fn get(path: &str, api_key: Option<&str>) -> Request {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(api_key) = api_key {
        builder = builder.header(API_KEY_HEADER, api_key);
    }
    builder.body(Body::empty()).unwrap()
}

fn mock_command(extra: &[&str]) -> MockCommand {
    #[derive(Debug, clap::Parser)]
    struct Cli {
        #[command(flatten)]
        mock: MockCommand,
    }

    <Cli as clap::Parser>::try_parse_from(["indexbench"].iter().chain(extra))
        .unwrap()
        .mock
}

#[test]
fn test_try_new_with_defaults() {
    let server = MockApiServer::try_new(&mock_command(&[])).unwrap();
    assert_eq!(5., server.base_latency);
    assert_eq!(8., server.penalty);
    assert_eq!(0.2, server.jitter);
    assert_eq!(0., server.error_rate);
    assert!(server.api_key.is_none());
    assert!(server.delay);

    let server = MockApiServer::try_new(&mock_command(&[
        "--jitter",
        "3",
        "--error-rate",
        "1.5",
        "--no-delay",
    ]))
    .unwrap();
    assert_eq!(1., server.jitter);
    assert_eq!(1., server.error_rate);
    assert!(!server.delay);
}

#[test]
fn test_try_new_rejects_unbounded_latency() {
    for extra in [
        &["--base-latency", "inf"][..],
        &["--base-latency", "NaN"][..],
        &["--base-latency=-1"][..],
        &["--penalty", "inf"][..],
        &["--penalty", "1e300"][..],
        &["--base-latency", "1e10", "--penalty", "1"][..],
        &["--base-latency", "10000", "--penalty", "8"][..],
        &["--jitter", "NaN"][..],
        &["--error-rate", "NaN"][..],
    ] {
        assert!(
            MockApiServer::try_new(&mock_command(extra)).is_err(),
            "args: {extra:?}"
        );
    }

    // largest config which still fits: 3750 ms x 8 with full jitter is 60s
    let server =
        MockApiServer::try_new(&mock_command(&["--base-latency", "3750", "--jitter", "1"]))
            .unwrap();
    assert_eq!(60_000., server.compute_latency(EndpointVariant::NoIndex, 1.));
}

#[test]
fn test_route() {
    for (path, expected) in [
        (
            "/with-index/select",
            Some((EndpointVariant::WithIndex, ActionKind::Select)),
        ),
        (
            "/no-index/update",
            Some((EndpointVariant::NoIndex, ActionKind::Update)),
        ),
        ("/no-index/delete", None),
        ("/with-index/", None),
        ("/with-index", None),
        ("/with-index/select/extra", None),
        ("/indexed/select", None),
        ("/", None),
        ("", None),
    ] {
        assert_eq!(expected, MockApiServer::route(path), "path: '{path}'");
    }
}

#[test]
fn test_compute_latency() {
    let mut server = mock_server(None);
    assert_eq!(5., server.compute_latency(EndpointVariant::WithIndex, 0.7));
    assert_eq!(40., server.compute_latency(EndpointVariant::NoIndex, 0.7));

    server.jitter = 0.2;
    assert_eq!(4., server.compute_latency(EndpointVariant::WithIndex, 0.));
    assert_eq!(5., server.compute_latency(EndpointVariant::WithIndex, 0.5));
    assert_eq!(48., server.compute_latency(EndpointVariant::NoIndex, 1.));

    server.base_latency = 0.;
    assert_eq!(0., server.compute_latency(EndpointVariant::NoIndex, 0.));
}

#[test]
fn test_pick_outcome() {
    let mut server = mock_server(None);
    assert_eq!(MockOutcome::Ok, server.pick_outcome(0.));

    server.error_rate = 0.25;
    assert_eq!(MockOutcome::Error, server.pick_outcome(0.1));
    assert_eq!(MockOutcome::Ok, server.pick_outcome(0.25));

    server.error_rate = 1.;
    assert_eq!(MockOutcome::Error, server.pick_outcome(0.999));
}

#[tokio::test]
async fn test_serve_reports_latency() {
    let server = mock_server(Some("secret"));

    let resp = server
        .serve(get("/no-index/insert", Some("secret")))
        .await
        .unwrap();
    assert_eq!(StatusCode::OK, resp.status());
    let body: serde_json::Value = resp.try_into_json().await.unwrap();
    assert_eq!(serde_json::json!({ "result": 40. }), body);
}

#[tokio::test]
async fn test_serve_rejections() {
    let server = mock_server(Some("secret"));

    for (req, expected_status) in [
        (get("/no-index/insert", None), StatusCode::UNAUTHORIZED),
        (get("/no-index/insert", Some("guess")), StatusCode::UNAUTHORIZED),
        (get("/no-index/delete", Some("secret")), StatusCode::NOT_FOUND),
        (get("/health", Some("secret")), StatusCode::NOT_FOUND),
        (
            Request::builder()
                .method(Method::POST)
                .uri("/with-index/insert")
                .header(API_KEY_HEADER, "secret")
                .body(Body::empty())
                .unwrap(),
            StatusCode::METHOD_NOT_ALLOWED,
        ),
    ] {
        let uri = req.uri().clone();
        let resp = server.serve(req).await.unwrap();
        assert_eq!(expected_status, resp.status(), "uri: {uri}");
    }
}

#[tokio::test]
async fn test_serve_mock_failure_is_not_json() {
    let mut server = mock_server(None);
    server.error_rate = 1.;

    let resp = server.serve(get("/with-index/select", None)).await.unwrap();
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resp.status());
    assert!(
        resp.try_into_json::<serde_json::Value>().await.is_err(),
        "failure body is expected to be undecodable"
    );
}

async fn spawn_mock_server(shutdown: &Shutdown, server: MockApiServer) -> String {
    let exec = Executor::graceful(shutdown.guard());
    let tcp_listener = TcpListener::bind("127.0.0.1:0".parse::<Interface>().unwrap(), exec.clone())
        .await
        .unwrap();
    let server_addr = tcp_listener.local_addr().unwrap();
    tokio::spawn(serve(tcp_listener, exec, server));
    format!("http://{server_addr}")
}

fn comparator_for(shutdown: &Shutdown, origin: &str, api_key: &str) -> PollingComparator {
    let target = TargetConfig {
        with_index: format!("{origin}/with-index").parse().unwrap(),
        no_index: format!("{origin}/no-index").parse().unwrap(),
        api_key: api_key.parse().unwrap(),
    };
    PollingComparator::new(
        shutdown.guard(),
        new_web_client(Some(Duration::from_secs(5))),
        target,
        DEFAULT_TICK_INTERVAL,
        EventSink::default(),
    )
}

#[tokio::test]
async fn test_comparator_against_mock_server() {
    let shutdown = Shutdown::new(std::future::pending::<()>());
    let origin = spawn_mock_server(&shutdown, mock_server(Some("e2e-key"))).await;
    let comparator = comparator_for(&shutdown, &origin, "e2e-key");

    for expected_action in [ActionKind::Select, ActionKind::Insert] {
        let report = comparator.tick().await;
        assert_eq!(expected_action, report.action);
        assert_eq!(Some(5.), report.with_index_ms);
        assert_eq!(Some(40.), report.no_index_ms);
    }

    let snapshot = comparator.snapshot();
    let select = snapshot.row(ActionKind::Select).unwrap();
    assert_eq!(1, select.count);
    assert_eq!(35., select.delta_ms);
    assert_eq!(
        format!("Send query to {origin}/no-index/insert [40 ms]"),
        snapshot.logs.no_index
    );
}

#[tokio::test]
async fn test_comparator_against_mock_server_with_wrong_key() {
    let shutdown = Shutdown::new(std::future::pending::<()>());
    let origin = spawn_mock_server(&shutdown, mock_server(Some("e2e-key"))).await;
    let comparator = comparator_for(&shutdown, &origin, "not-the-key");

    let report = comparator.tick().await;
    assert_eq!(None, report.with_index_ms);
    assert_eq!(None, report.no_index_ms);

    let select = report.snapshot.row(ActionKind::Select).unwrap();
    assert_eq!(1, select.count);
    assert_eq!(0., select.with_index_ms);
    assert_eq!(
        format!("Send query to {origin}/with-index/select"),
        report.snapshot.logs.with_index
    );
}
