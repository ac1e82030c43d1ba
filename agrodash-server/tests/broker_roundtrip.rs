//! Client broker réel (TCP) contre le stub de la devkit.

use agrodash_devkit::{init_test_logging, BrokerStub, StubScript, WireMessageBuilder};
use agrodash_server::broker::{BrokerClient, BrokerError, BrokerSettings, LoopEnd, TcpConnector};
use agrodash_server::clock::{Clock, SystemClock};
use agrodash_server::http::{build_router, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

fn settings(port: u16) -> BrokerSettings {
    BrokerSettings {
        host: "127.0.0.1".into(),
        port,
        io_timeout: Duration::from_secs(2),
        read_window: Duration::from_secs(3),
        ..BrokerSettings::default()
    }
}

fn client(port: u16) -> BrokerClient<TcpConnector> {
    BrokerClient::new(TcpConnector, Arc::new(SystemClock::default()), settings(port))
}

fn field_readings() -> Vec<u8> {
    WireMessageBuilder::lines(&[
        WireMessageBuilder::sensor_data("humidity", 33.0),
        WireMessageBuilder::other("subscribe", "humidity"),
        WireMessageBuilder::sensor_data("temperature", 24.5),
        WireMessageBuilder::sensor_data("wind", 8.0),
        WireMessageBuilder::sensor_data("humidity", 31.5),
    ])
}

#[tokio::test]
async fn test_quiet_broker_returns_before_the_window() {
    init_test_logging();
    let stub = BrokerStub::start(StubScript::new().bytes(field_readings())).await.unwrap();
    let client = client(stub.port());

    let started = Instant::now();
    let cycle = client.read_cycle().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(cycle.ended_by, LoopEnd::Idle);
    assert_eq!(
        cycle.snapshot.topics().collect::<Vec<_>>(),
        vec!["humidity", "temperature", "wind"]
    );
    assert_eq!(cycle.snapshot.value_of("humidity"), Some(31.5));
    assert_eq!(cycle.ignored_lines, 1);

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, "get_current");
    assert_eq!(requests[0].client_id, "dashboard");
    assert_eq!(requests[0].topic, "");

    // le client a refermé son socket : le stub voit la fin de flux
    assert!(stub.wait_all_closed(Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_broker_closing_after_reply() {
    let stub = BrokerStub::start(StubScript::new().bytes(field_readings()).close_after())
        .await
        .unwrap();

    let snapshot = client(stub.port()).fetch_current_readings().await.unwrap();

    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.get("wind").unwrap().unit, "km/h");
}

#[tokio::test]
async fn test_pause_mid_line_ends_cycle_early() {
    let line = WireMessageBuilder::sensor_data("temperature", 29.0).to_line();
    let (head, tail) = line.split_at(line.len() / 2);
    let script = StubScript::new()
        .bytes(WireMessageBuilder::sensor_data("humidity", 45.0).to_line())
        .bytes(head)
        .delay(Duration::from_millis(500))
        .bytes(tail);
    let stub = BrokerStub::start(script).await.unwrap();

    let cycle = client(stub.port()).read_cycle().await.unwrap();

    // La sonde ne voit rien pendant la pause : ligne partielle abandonnée
    assert_eq!(cycle.ended_by, LoopEnd::Idle);
    assert_eq!(cycle.snapshot.topics().collect::<Vec<_>>(), vec!["humidity"]);
}

#[tokio::test]
async fn test_unreachable_broker_is_connect_failed() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = client(port).fetch_current_readings().await.unwrap_err();

    assert!(matches!(err, BrokerError::ConnectFailed(_)), "{err:?}");
}

#[tokio::test]
async fn test_system_status_end_to_end() {
    let readings = WireMessageBuilder::lines(&[
        WireMessageBuilder::sensor_data("humidity", 15.0),
        WireMessageBuilder::sensor_data("temperature", 40.0),
        WireMessageBuilder::sensor_data("wind", 15.0),
    ]);
    let stub = BrokerStub::start(StubScript::new().bytes(readings)).await.unwrap();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
    let app = build_router(AppState {
        broker: Arc::new(BrokerClient::new(TcpConnector, clock.clone(), settings(stub.port()))),
        clock,
    });

    let response = app
        .oneshot(
            Request::builder()
                .uri("/dashboard/system-status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"]["overall"], "critical");
    assert_eq!(json["status"]["irrigation_needed"], true);
    assert_eq!(json["status"]["alerts"].as_array().unwrap().len(), 2);
}
