//! Integration tests for the streaming service over a real loopback socket.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use datalink_core::config::StreamConfig;
use datalink_core::{FlightControl, ServerSettings};
use datalink_server::{DataLink, ServerError};
use datalink_types::{Telemetry, Universe, Vessel, VesselId};
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Controls;

impl FlightControl for Controls {
    fn set_throttle(&mut self, _throttle: f64) {}

    fn set_sas(&mut self, _engaged: bool) {}

    fn set_rcs(&mut self, _engaged: bool) {}

    fn activate_next_stage(&mut self) {}

    fn set_warp_rate(&mut self, _rate: f64) {}
}

fn link() -> Arc<DataLink> {
    let settings = ServerSettings {
        port: 0,
        ..ServerSettings::default()
    };
    let stream = StreamConfig {
        push_interval_ms: 100,
        min_push_interval_ms: 50,
    };
    Arc::new(DataLink::new(settings, stream).unwrap())
}

fn telemetry(vessel: Option<&Vessel>) -> Telemetry {
    Telemetry {
        universe: Universe {
            universal_time: 42.0,
            paused: false,
            warp_rate: 1.0,
        },
        vessel: vessel.cloned(),
    }
}

fn vessel(name: &str) -> Vessel {
    Vessel {
        id: VesselId::new(),
        name: name.to_owned(),
        altitude: 0.0,
        velocity: datalink_types::Vector3::default(),
        mission_time: 0.0,
        throttle: 0.0,
        sas: false,
        rcs: false,
        orbit: datalink_types::Orbit::default(),
        resources: std::collections::BTreeMap::new(),
        sensors: Vec::new(),
    }
}

/// Tick the link every 20 ms, flying `vessel`.
fn ticker(link: &Arc<DataLink>, vessel: Vessel) -> JoinHandle<()> {
    let link = Arc::clone(link);
    tokio::spawn(async move {
        let mut controls = Controls;
        loop {
            link.update(&mut controls, telemetry(Some(&vessel)));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
}

async fn connect(link: &DataLink) -> Client {
    let address = *link.addresses().first().unwrap();
    let (client, _response) = connect_async(format!("ws://{address}/datalink"))
        .await
        .unwrap();
    client
}

async fn send(client: &mut Client, json: Value) {
    client.send(Message::text(json.to_string())).await.unwrap();
}

async fn next_frame(client: &mut Client) -> Map<String, Value> {
    loop {
        let message = timeout(WAIT, client.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read frames until one has exactly `keys`, in order.
async fn frame_with_keys(client: &mut Client, keys: &[&str]) -> Map<String, Value> {
    for _ in 0..100 {
        let frame = next_frame(client).await;
        if frame.keys().map(String::as_str).eq(keys.iter().copied()) {
            return frame;
        }
    }
    panic!("no frame with keys {keys:?}");
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe() {
    let link = link();
    link.start().unwrap();
    let ticks = ticker(&link, vessel("Kestrel"));
    let mut client = connect(&link).await;

    send(&mut client, json!({"+": ["vessel.name", "game.time"]})).await;
    let frame = frame_with_keys(&mut client, &["vessel.name", "game.time"]).await;
    assert_eq!(frame["vessel.name"], "Kestrel");
    assert_eq!(frame["game.time"], 42.0);
    assert_eq!(link.active_streams(), 1);

    send(&mut client, json!({"-": ["game.time"]})).await;
    let frame = frame_with_keys(&mut client, &["vessel.name"]).await;
    assert_eq!(frame["vessel.name"], "Kestrel");

    ticks.abort();
    link.stop().await;
}

#[tokio::test]
async fn test_run_once_is_sent_in_one_frame_only() {
    let link = link();
    link.start().unwrap();
    let ticks = ticker(&link, vessel("Kestrel"));
    let mut client = connect(&link).await;

    send(
        &mut client,
        json!({"+": ["vessel.name"], "run": ["control.stage"]}),
    )
    .await;
    let frame = frame_with_keys(&mut client, &["vessel.name", "control.stage"]).await;
    assert_eq!(frame["control.stage"], 0);

    for _ in 0..3 {
        let frame = next_frame(&mut client).await;
        assert!(!frame.contains_key("control.stage"));
    }

    ticks.abort();
    link.stop().await;
}

#[tokio::test]
async fn test_vessel_switch_pushes_immediately() {
    let link = link();
    link.start().unwrap();
    let mut client = connect(&link).await;
    let mut controls = Controls;

    let first = vessel("Kestrel");
    link.update(&mut controls, telemetry(Some(&first)));
    send(&mut client, json!({"+": ["vessel.name"], "rate": 60_000})).await;

    // Ticks keep coming until the subscription has been applied and served.
    let frame = loop {
        link.update(&mut controls, telemetry(Some(&first)));
        if let Ok(Some(Ok(Message::Text(text)))) =
            timeout(Duration::from_millis(50), client.next()).await
        {
            break serde_json::from_str::<Map<String, Value>>(&text).unwrap();
        }
    };
    assert_eq!(frame["vessel.name"], "Kestrel");

    // The interval is a minute away, so only the switch can trigger this.
    let second = vessel("Osprey");
    link.update(&mut controls, telemetry(Some(&second)));
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["vessel.name"], "Osprey");

    link.stop().await;
}

#[tokio::test]
async fn test_stop_closes_streams() {
    let link = link();
    link.start().unwrap();
    let mut client = connect(&link).await;
    let mut controls = Controls;

    send(&mut client, json!({"+": ["game.time"]})).await;
    let frame = loop {
        link.update(&mut controls, telemetry(None));
        if let Ok(Some(Ok(Message::Text(text)))) =
            timeout(Duration::from_millis(50), client.next()).await
        {
            break serde_json::from_str::<Map<String, Value>>(&text).unwrap();
        }
    };
    assert_eq!(frame["game.time"], 42.0);

    link.stop().await;
    assert!(!link.is_running());

    let closed = timeout(WAIT, async {
        while let Some(Ok(message)) = client.next().await {
            if message.is_close() {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    timeout(WAIT, async {
        while link.active_streams() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_start_twice_fails_and_restart_works() {
    let link = link();
    let first = link.start().unwrap();
    assert_eq!(first.len(), 1);
    assert_ne!(link.port(), 0);
    assert!(matches!(link.start(), Err(ServerError::AlreadyRunning)));

    link.stop().await;
    assert!(link.addresses().is_empty());

    link.start().unwrap();
    let mut client = connect(&link).await;
    send(&mut client, json!({"+": ["game.paused"]})).await;
    let mut controls = Controls;
    let frame = loop {
        link.update(&mut controls, telemetry(None));
        if let Ok(Some(Ok(Message::Text(text)))) =
            timeout(Duration::from_millis(50), client.next()).await
        {
            break serde_json::from_str::<Map<String, Value>>(&text).unwrap();
        }
    };
    assert_eq!(frame["game.paused"], 2);

    link.stop().await;
}
