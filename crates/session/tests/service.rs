mod common;

use std::sync::Arc;
use std::time::Duration;

use castlink_connection::ConnectionConfig;
use castlink_connection::fake::{FakeDialer, ReceiverScript};
use castlink_discovery::{DeviceStatus, DiscoveryConfig, DiscoveryError};
use castlink_protocol::CastEvent;
use castlink_protocol::events::BufferSink;
use castlink_session::{CastService, SessionError, SessionState};

use common::{StaticTransport, eventually, names, record};

fn service(transport: Arc<StaticTransport>) -> (CastService, Arc<BufferSink>) {
    let sink = Arc::new(BufferSink::new());
    let service = CastService::new(
        transport,
        Arc::new(FakeDialer::new(ReceiverScript::default())),
        sink.clone(),
        DiscoveryConfig::default(),
        ConnectionConfig::default(),
    )
    .unwrap();
    (service, sink)
}

#[tokio::test(start_paused = true)]
async fn discover_cast_and_stop() {
    let transport = StaticTransport::new(vec![record("d1", "Living Room", "192.168.1.50")]);
    let (service, sink) = service(transport);

    service.start_discovery().unwrap();
    eventually(|| !service.get_devices().is_empty()).await;

    let devices = service.get_devices();
    assert_eq!(devices.len(), 1);
    let device = &devices[0];
    assert_eq!(device.id, "d1");
    assert_eq!(device.name, "Living Room");
    assert_eq!(device.host, "192.168.1.50");
    assert_eq!(device.port, 8009);
    assert_eq!(sink.snapshot()[0].payload()["deviceId"], "d1");

    let session = service.cast_media("d1", "http://media/1.mp4").await.unwrap();
    assert_eq!(session.state, SessionState::Active);
    assert!(
        sink.snapshot()
            .contains(&CastEvent::session_started(&session.session_id, "d1"))
    );

    service.stop_casting(&session.session_id).await;
    assert_eq!(
        sink.snapshot().last(),
        Some(&CastEvent::session_ended(&session.session_id))
    );
    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_already_active() {
    let (service, _sink) = service(StaticTransport::new(vec![]));
    service.start_discovery().unwrap();
    assert!(matches!(
        service.start_discovery(),
        Err(SessionError::Discovery(DiscoveryError::AlreadyActive))
    ));
    assert!(service.is_discovering());

    service.stop_discovery();
    service.stop_discovery();
    assert!(!service.is_discovering());
    service.start_discovery().unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_discovery_keeps_only_bound_devices() {
    let transport = StaticTransport::new(vec![
        record("d1", "Living Room", "192.168.1.50"),
        record("d2", "Kitchen", "192.168.1.51"),
    ]);
    let (service, _sink) = service(transport);

    service.start_discovery().unwrap();
    eventually(|| service.get_devices().len() == 2).await;
    service.cast_media("d1", "http://media/1.mp4").await.unwrap();

    service.stop_discovery();
    let devices = service.get_devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "d1");
    assert_eq!(devices[0].status, DeviceStatus::Connected);

    service.shutdown().await;
    assert!(service.sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_discovery_without_sessions_empties_devices() {
    let transport = StaticTransport::new(vec![record("d1", "Living Room", "192.168.1.50")]);
    let (service, _sink) = service(transport);
    service.start_discovery().unwrap();
    eventually(|| !service.get_devices().is_empty()).await;

    service.stop_discovery();
    assert!(service.get_devices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_device_is_lost_once() {
    let transport = StaticTransport::new(vec![
        record("d1", "Living Room", "192.168.1.50"),
        record("d2", "Kitchen", "192.168.1.51"),
    ]);
    let (service, sink) = service(transport.clone());
    service.start_discovery().unwrap();
    eventually(|| service.get_devices().len() == 2).await;

    transport.set(vec![record("d1", "Living Room", "192.168.1.50")]);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let lost: Vec<CastEvent> = sink
        .snapshot()
        .into_iter()
        .filter(|e| e.name() == "device-lost")
        .collect();
    assert_eq!(lost, [CastEvent::device_lost("d2")]);
    let ids: Vec<String> = service.get_devices().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, ["d1"]);
}

#[tokio::test(start_paused = true)]
async fn refresh_runs_a_cycle_on_demand() {
    let transport = StaticTransport::new(vec![record("tv", "TV", "10.0.0.4")]);
    let (service, sink) = service(transport);

    service.refresh_devices().await;
    assert_eq!(service.get_devices().len(), 1);
    assert_eq!(names(&sink), ["device-discovered"]);
}

#[tokio::test(start_paused = true)]
async fn rediscovered_bound_device_survives_stop_discovery() {
    let transport = StaticTransport::new(vec![record("d1", "Living Room", "192.168.1.50")]);
    let (service, _sink) = service(transport.clone());
    service.start_discovery().unwrap();
    eventually(|| !service.get_devices().is_empty()).await;
    let session = service.cast_media("d1", "http://media/1.mp4").await.unwrap();

    transport.set(vec![]);
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(service.get_devices().is_empty());

    transport.set(vec![record("d1", "Living Room", "192.168.1.50")]);
    tokio::time::sleep(Duration::from_secs(10)).await;
    let devices = service.get_devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].status, DeviceStatus::Connected);

    service.stop_discovery();
    let devices = service.get_devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "d1");
    assert_eq!(
        service.session(&session.session_id).unwrap().state,
        SessionState::Active
    );

    service.stop_casting(&session.session_id).await;
    service.stop_discovery();
    assert!(service.get_devices().is_empty());
}
