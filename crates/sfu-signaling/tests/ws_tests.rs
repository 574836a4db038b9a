//! WebSocket wire-level tests: a real client connection speaking the frame
//! protocol against a bound server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use futures_util::{SinkExt, StreamExt};
use media_engine::{LocalEngine, WebRtcTransportOptions};
use serde_json::{json, Value};
use sfu_signaling::actors::{SessionActorHandle, SessionMetrics};
use sfu_signaling::signaling::SignalingServer;
use sfu_signaling::store::StoreSnapshot;
use sfu_test_utils::fixtures;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (Arc<LocalEngine>, SessionActorHandle, String) {
    let (engine, worker) = fixtures::engine_with_worker().await;
    let session = SessionActorHandle::new(
        worker,
        fixtures::test_codecs(),
        WebRtcTransportOptions::default(),
        Arc::new(SessionMetrics::new()),
    );

    let server = SignalingServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run(session.clone(), session.child_token()));

    (engine, session, format!("ws://{addr}"))
}

async fn connect(url: &str) -> WsClient {
    let (client, _response) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

/// Send a frame and wait for the reply with the matching ack.
async fn request(client: &mut WsClient, frame: Value) -> Value {
    let ack = frame.get("ack").and_then(Value::as_u64).unwrap();
    client
        .send(Message::Text(frame.to_string()))
        .await
        .unwrap();

    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a reply")
            .unwrap()
            .unwrap();
        let Message::Text(text) = message else {
            continue;
        };
        let reply: Value = serde_json::from_str(&text).unwrap();
        if reply.get("ack").and_then(Value::as_u64) == Some(ack) {
            return reply.get("data").cloned().unwrap();
        }
    }
}

async fn wait_for_status<F>(session: &SessionActorHandle, mut predicate: F) -> StoreSnapshot
where
    F: FnMut(&StoreSnapshot) -> bool,
{
    for _ in 0..200 {
        let snapshot = session.status().await.unwrap();
        if predicate(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("store did not reach the expected state within the timeout");
}

#[tokio::test]
async fn test_create_or_join_room_round_trip() {
    let (_engine, _session, url) = start_server().await;
    let mut client = connect(&url).await;

    let data = request(
        &mut client,
        json!({"event": "createOrJoinRoom", "data": {"roomName": "standup"}, "ack": 1}),
    )
    .await;

    let room_id = data.as_str().expect("reply data should be the room id");
    assert!(!room_id.is_empty());

    // Same name from a second client resolves to the same room.
    let mut second = connect(&url).await;
    let data = request(
        &mut second,
        json!({"event": "createOrJoinRoom", "data": {"roomName": "standup"}, "ack": 1}),
    )
    .await;
    assert_eq!(data.as_str().unwrap(), room_id);
}

#[tokio::test]
async fn test_full_publish_flow_over_websocket() {
    let (_engine, _session, url) = start_server().await;
    let mut client = connect(&url).await;

    let room_id = request(
        &mut client,
        json!({"event": "createOrJoinRoom", "data": {"roomName": "standup"}, "ack": 1}),
    )
    .await
    .as_str()
    .unwrap()
    .to_string();

    let capabilities = request(
        &mut client,
        json!({"event": "getRTPCapabilities", "data": {"roomID": room_id}, "ack": 2}),
    )
    .await;
    assert_eq!(
        capabilities.get("codecs").unwrap().as_array().unwrap().len(),
        2
    );

    let transport = request(
        &mut client,
        json!({"event": "createSendRtcTransport", "data": {"roomID": room_id}, "ack": 3}),
    )
    .await;
    let peer_id = transport.get("peerID").unwrap().as_str().unwrap().to_string();
    let params = transport.get("params").unwrap();
    assert!(params.get("id").is_some());
    assert!(params.get("iceParameters").is_some());
    assert!(params.get("iceCandidates").is_some());
    assert!(params.get("dtlsParameters").is_some());

    // No reply expected for connectSendTransport.
    client
        .send(Message::Text(
            json!({
                "event": "connectSendTransport",
                "data": {
                    "dtlsParameters": {
                        "role": "client",
                        "fingerprints": [{"algorithm": "sha-256", "value": "AA:BB"}]
                    },
                    "peerID": peer_id
                }
            })
            .to_string(),
        ))
        .await
        .unwrap();

    let produced = request(
        &mut client,
        json!({
            "event": "produceMedia",
            "data": {
                "kind": "audio",
                "rtpParameters": {"codecs": []},
                "peerID": peer_id,
                "roomID": room_id
            },
            "ack": 4
        }),
    )
    .await;
    assert!(produced.get("producerID").is_some());
    assert_eq!(
        produced.get("transportID").unwrap().as_str().unwrap(),
        params.get("id").unwrap().as_str().unwrap()
    );
}

#[tokio::test]
async fn test_error_reply_for_unknown_room() {
    let (_engine, _session, url) = start_server().await;
    let mut client = connect(&url).await;

    let data = request(
        &mut client,
        json!({"event": "getRTPCapabilities", "data": {"roomID": "no-such-room"}, "ack": 7}),
    )
    .await;

    assert_eq!(
        data.get("error").unwrap().as_str().unwrap(),
        "There is no room with the specified id"
    );
}

#[tokio::test]
async fn test_produce_without_transport_gets_error_reply() {
    let (_engine, _session, url) = start_server().await;
    let mut client = connect(&url).await;

    request(
        &mut client,
        json!({"event": "createOrJoinRoom", "data": {"roomName": "standup"}, "ack": 1}),
    )
    .await;

    let data = request(
        &mut client,
        json!({
            "event": "produceMedia",
            "data": {"kind": "audio", "rtpParameters": {}, "peerID": "whoever", "roomID": "x"},
            "ack": 2
        }),
    )
    .await;

    let message = data.get("error").unwrap().as_str().unwrap();
    assert!(message.starts_with("No peer was found with this id"));
}

#[tokio::test]
async fn test_socket_close_runs_disconnect_cleanup() {
    let (_engine, session, url) = start_server().await;
    let mut client = connect(&url).await;

    let room_id = request(
        &mut client,
        json!({"event": "createOrJoinRoom", "data": {"roomName": "standup"}, "ack": 1}),
    )
    .await
    .as_str()
    .unwrap()
    .to_string();
    request(
        &mut client,
        json!({"event": "createSendRtcTransport", "data": {"roomID": room_id}, "ack": 2}),
    )
    .await;

    let snapshot = session.status().await.unwrap();
    assert_eq!(snapshot.peer_count, 1);

    client.close(None).await.unwrap();
    drop(client);

    let snapshot = wait_for_status(&session, |snapshot| snapshot.peer_count == 0).await;
    // The room outlives its last peer.
    assert_eq!(snapshot.rooms.len(), 1);
    assert_eq!(snapshot.rooms.first().unwrap().producer_transport_count, 0);
}

#[tokio::test]
async fn test_exit_room_over_websocket_keeps_connection_usable() {
    let (_engine, session, url) = start_server().await;
    let mut client = connect(&url).await;

    let room_id = request(
        &mut client,
        json!({"event": "createOrJoinRoom", "data": {"roomName": "standup"}, "ack": 1}),
    )
    .await
    .as_str()
    .unwrap()
    .to_string();
    request(
        &mut client,
        json!({"event": "createSendRtcTransport", "data": {"roomID": room_id}, "ack": 2}),
    )
    .await;

    client
        .send(Message::Text(
            json!({"event": "exitRoom", "data": {}}).to_string(),
        ))
        .await
        .unwrap();

    let snapshot = wait_for_status(&session, |snapshot| {
        snapshot
            .rooms
            .first()
            .is_some_and(|room| room.producer_transport_count == 0)
    })
    .await;
    // Exit keeps the peer; the connection can renegotiate.
    assert_eq!(snapshot.peer_count, 1);

    let transport = request(
        &mut client,
        json!({"event": "createSendRtcTransport", "data": {"roomID": room_id}, "ack": 3}),
    )
    .await;
    assert!(transport.get("params").is_some());
}
