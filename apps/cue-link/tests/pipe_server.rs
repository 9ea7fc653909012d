//! Drives a session against a real WebSocket server on `/pipe`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use cue_link::model::{Marker, Strip};
use cue_link::session::{RemoteView, SessionEvent};
use cue_link::transport::WebSocketConnector;
use cue_link::{
    Config, ConnectionState, FrameRate, MemoryTimeline, PollingScheduler, Session, TimelineHost,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct ServerState {
    project: Arc<Mutex<Value>>,
    received: Arc<Mutex<Vec<String>>>,
    uploads: mpsc::UnboundedSender<Value>,
    hang_up: bool,
}

struct TestServer {
    port: u16,
    received: Arc<Mutex<Vec<String>>>,
    uploads: mpsc::UnboundedReceiver<Value>,
    _shutdown: oneshot::Sender<()>,
}

async fn spawn_server(project: Value, hang_up: bool) -> TestServer {
    let (uploads_tx, uploads) = mpsc::unbounded_channel();
    let state = ServerState {
        project: Arc::new(Mutex::new(project)),
        received: Arc::new(Mutex::new(Vec::new())),
        uploads: uploads_tx,
        hang_up,
    };
    let received = state.received.clone();
    let router = Router::new()
        .route("/pipe", get(pipe_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener bind");
    let port = listener.local_addr().expect("local addr").port();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        port,
        received,
        uploads,
        _shutdown: shutdown_tx,
    }
}

async fn pipe_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ServerState) {
    if state.hang_up {
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let op = request["op"].as_str().unwrap_or_default().to_string();
        state.received.lock().push(op.clone());

        let reply = match op.as_str() {
            "CMSG_IDENTITY" => Some(json!({ "op": "SMSG_IDENTITY" })),
            "CMSG_LIST_SOURCES" => Some(json!({
                "op": "SMSG_LIST_SOURCES",
                "sources": ["Camera 1", "Projector A"]
            })),
            "CMSG_LIST_SCENES" => Some(json!({
                "op": "SMSG_LIST_SCENES",
                "scenes": ["Prologue"]
            })),
            "CMSG_DOWNLOAD_PROJECT" => {
                let mut reply = state.project.lock().clone();
                reply["op"] = json!("SMSG_DOWNLOAD_PROJECT");
                Some(reply)
            }
            "CMSG_UPLOAD_PROJECT" => {
                *state.project.lock() = request["project"].clone();
                let _ = state.uploads.send(request["project"].clone());
                None
            }
            _ => None,
        };
        if let Some(reply) = reply {
            if socket.send(WsMessage::Text(reply.to_string())).await.is_err() {
                break;
            }
        }
    }
}

fn session(port: u16) -> (Session, Arc<PollingScheduler>) {
    let config = Config {
        server_port: port,
        connect_timeout: Duration::from_secs(2),
        drain_interval: Duration::from_millis(10),
        ..Config::default()
    };
    let scheduler = Arc::new(PollingScheduler::new(config.drain_interval));
    let session = Session::new(
        config,
        Arc::new(WebSocketConnector),
        scheduler.clone(),
        Handle::current(),
    );
    (session, scheduler)
}

async fn wait_for_state(session: &Session, state: ConnectionState) {
    timeout(WAIT, async {
        while session.state() != state {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never reached {state}, stuck at {}", session.state()));
}

async fn pump_until(
    session: &Session,
    scheduler: &PollingScheduler,
    doc: &mut MemoryTimeline,
    done: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(WAIT, session.drain_until(scheduler, doc, done))
        .await
        .expect("server never replied")
        .expect("connection dropped")
}

fn show_project() -> Value {
    json!({
        "project_name": "The Tempest",
        "scenes": [
            {
                "name": "Storm",
                "frame_start": 0,
                "frame_final_duration": 240,
                "markers": [
                    { "name": "1 CUE thunder", "type": "CUE", "position_ms": 1000 },
                    { "name": "note", "type": "UNKNOWN", "position_ms": 2000 }
                ],
                "zones": [{
                    "name": "Cyc",
                    "channel_offset": 1,
                    "offset_x": 10, "offset_y": 20,
                    "scale_x": 1.5, "scale_y": 1.5,
                    "rotation": 0,
                    "crop_min_x": 0, "crop_min_y": 0,
                    "crop_max_x": 0, "crop_max_y": 0,
                    "source": "Camera 1"
                }]
            },
            {
                "name": "Island",
                "frame_start": 480,
                "frame_final_duration": 240,
                "markers": [],
                "zones": []
            }
        ]
    })
}

#[tokio::test]
async fn handshake_enumerates_sources_and_scenes() {
    let server = spawn_server(json!({ "scenes": [] }), false).await;
    let (session, scheduler) = session(server.port);
    let mut doc = MemoryTimeline::default();

    session.connect("localhost", server.port).expect("connect");
    wait_for_state(&session, ConnectionState::Connected).await;
    assert!(scheduler.is_armed());

    pump_until(&session, &scheduler, &mut doc, |e| {
        matches!(e, SessionEvent::Scenes(_))
    })
    .await;

    assert_eq!(
        session.remote(),
        RemoteView {
            sources: ["Camera 1", "Projector A"].map(String::from).into(),
            scenes: vec!["Prologue".into()],
            active_scene: None,
        }
    );
    assert_eq!(
        *server.received.lock(),
        vec!["CMSG_IDENTITY", "CMSG_LIST_SOURCES", "CMSG_LIST_SCENES"]
    );
}

#[tokio::test]
async fn download_replaces_synchronised_content_and_uploads_back() {
    let mut server = spawn_server(show_project(), false).await;
    let (session, scheduler) = session(server.port);
    let mut doc = MemoryTimeline::new(FrameRate::new(24.0).expect("rate"));
    doc.insert_strip(Strip::scene("Old", 3, 0, 100));
    doc.insert_marker(Marker::new("2 CUE stale", 50, Some("CUE".into())));
    doc.insert_marker(Marker::new("loose", 5_000, None));

    session.connect("127.0.0.1", server.port).expect("connect");
    wait_for_state(&session, ConnectionState::Connected).await;
    session.request_download().expect("download");

    let event = pump_until(&session, &scheduler, &mut doc, |e| {
        matches!(e, SessionEvent::ProjectApplied(_))
    })
    .await;
    let SessionEvent::ProjectApplied(report) = event else {
        unreachable!()
    };
    assert_eq!(report.channel, 3);
    assert_eq!(report.removed_scenes, 1);
    assert_eq!(report.created_scenes, 2);
    assert_eq!(report.created_zones, 1);

    assert_eq!(doc.project_name(), Some("The Tempest"));
    let scenes: Vec<_> = doc
        .scenes()
        .into_iter()
        .map(|(_, s)| (s.name.clone(), s.channel, s.frame_start))
        .collect();
    assert_eq!(
        scenes,
        vec![("Storm".into(), 3, 0), ("Island".into(), 3, 480)]
    );
    let mut markers: Vec<_> = doc
        .markers()
        .into_iter()
        .map(|(_, m)| (m.name.clone(), m.frame))
        .collect();
    markers.sort();
    assert_eq!(
        markers,
        vec![
            ("1 CUE thunder".into(), 24),
            ("loose".into(), 5_000),
            ("note".into(), 48),
        ]
    );

    let sent = session.upload_project(&doc).expect("upload");
    assert_eq!(sent, 2);
    let uploaded = timeout(WAIT, server.uploads.recv())
        .await
        .expect("upload timeout")
        .expect("upload");
    assert_eq!(uploaded["project_name"], "The Tempest");
    let storm = &uploaded["scenes"][0];
    assert_eq!(storm["name"], "Storm");
    let position = storm["markers"][0]["position_ms"].as_f64().expect("position");
    assert!((position - 1000.0).abs() < 1e-6, "position {position}");
    assert_eq!(storm["markers"][1]["type"], "UNKNOWN");
    assert_eq!(storm["zones"][0]["channel_offset"], 1);
    assert_eq!(storm["zones"][0]["source"], "Camera 1");
}

#[tokio::test]
async fn server_hang_up_disconnects() {
    let server = spawn_server(json!({ "scenes": [] }), true).await;
    let (session, scheduler) = session(server.port);

    session.connect("127.0.0.1", server.port).expect("connect");
    wait_for_state(&session, ConnectionState::Disconnected).await;
    assert!(!scheduler.is_armed());
    assert!(session.request_download().is_err());
}

#[tokio::test]
async fn nothing_listening_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let (session, scheduler) = session(port);
    session.connect("127.0.0.1", port).expect("connect");
    wait_for_state(&session, ConnectionState::Failed).await;
    assert_eq!(session.state().to_string(), "Failed to Connect");
    assert!(!scheduler.is_armed());
}
