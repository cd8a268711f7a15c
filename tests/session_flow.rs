mod support;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn connect() -> Client {
    let (ws, _) = connect_async(support::ws_url())
        .await
        .expect("websocket should connect");
    ws
}

async fn join(name: &str) -> (Client, u64) {
    let mut ws = connect().await;
    send_json(
        &mut ws,
        json!({ "type": "Join", "data": { "display_name": name } }),
    )
    .await;
    let hello = next_of_type(&mut ws, "Hello").await;
    let my_id = hello["data"]["my_id"]
        .as_u64()
        .expect("hello should carry my_id");
    (ws, my_id)
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

// Skips everything until a message of the wanted type arrives.
async fn next_of_type(ws: &mut Client, wanted: &str) -> Value {
    tokio::time::timeout(WAIT, async {
        loop {
            let msg = ws
                .next()
                .await
                .expect("stream should stay open")
                .expect("frame should be readable");
            let Message::Text(text) = msg else {
                continue;
            };
            let value: Value = serde_json::from_str(text.as_str()).expect("server sends json");
            if value["type"] == wanted {
                return value;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no {wanted} message within {WAIT:?}"))
}

async fn next_close_code(ws: &mut Client) -> Option<CloseCode> {
    tokio::time::timeout(WAIT, async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(frame)) => return frame.map(|f| f.code),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
        None
    })
    .await
    .expect("socket should close in time")
}

#[tokio::test]
async fn when_client_joins_then_hello_join_and_world_updates_follow() {
    let mut ws = connect().await;
    send_json(
        &mut ws,
        json!({ "type": "Join", "data": { "display_name": "  Maverick  " } }),
    )
    .await;

    let hello = next_of_type(&mut ws, "Hello").await;
    let my_id = hello["data"]["my_id"].as_u64().expect("my_id");
    assert!(my_id >= 1);
    assert_eq!(
        hello["data"]["id_to_name"][my_id.to_string()],
        "Maverick"
    );

    let joined = next_of_type(&mut ws, "PlayerJoined").await;
    assert_eq!(joined["data"]["id"], my_id);
    assert_eq!(joined["data"]["name"], "Maverick");

    let update = next_of_type(&mut ws, "WorldUpdate").await;
    assert!(update["data"]["frame_id"].as_u64().expect("frame_id") >= 1);
    let ships = update["data"]["ships"].as_array().expect("ships array");
    assert!(ships.iter().any(|ship| ship["id"] == my_id));
}

#[tokio::test]
async fn when_second_client_joins_and_leaves_then_first_client_sees_both() {
    let (mut first, first_id) = join("Goose").await;
    let (second, second_id) = join("Iceman").await;
    assert_ne!(first_id, second_id);

    let joined = loop {
        let joined = next_of_type(&mut first, "PlayerJoined").await;
        if joined["data"]["id"] == second_id {
            break joined;
        }
    };
    assert_eq!(joined["data"]["name"], "Iceman");

    drop(second);

    loop {
        let left = next_of_type(&mut first, "PlayerLeft").await;
        if left["data"]["id"] == second_id {
            break;
        }
    }
}

#[tokio::test]
async fn when_input_is_sent_before_join_then_socket_is_closed_with_policy() {
    let mut ws = connect().await;
    send_json(
        &mut ws,
        json!({ "type": "Input", "data": { "thrust": 1.0 } }),
    )
    .await;

    assert_eq!(next_close_code(&mut ws).await, Some(CloseCode::Policy));
}

#[tokio::test]
async fn when_display_name_is_blank_then_socket_is_closed_with_policy() {
    let mut ws = connect().await;
    send_json(
        &mut ws,
        json!({ "type": "Join", "data": { "display_name": "   " } }),
    )
    .await;

    assert_eq!(next_close_code(&mut ws).await, Some(CloseCode::Policy));
}

#[tokio::test]
async fn when_joined_client_sends_binary_then_socket_is_closed_as_unsupported() {
    let (mut ws, _) = join("Viper").await;

    ws.send(Message::Binary(vec![1, 2, 3].into()))
        .await
        .expect("send should succeed");

    assert_eq!(next_close_code(&mut ws).await, Some(CloseCode::Unsupported));
}

#[tokio::test]
async fn when_stats_are_requested_then_server_reports_running() {
    let base_url = support::ensure_server();
    let (_ws, _) = join("Jester").await;

    // Join notifications reach the activity counters a dispatch or two later.
    let payload = tokio::time::timeout(WAIT, async {
        loop {
            let res = reqwest::get(format!("{base_url}/stats"))
                .await
                .expect("request should succeed");
            assert_eq!(res.status(), reqwest::StatusCode::OK);
            let payload: Value = res.json().await.expect("stats should be json");
            if payload["activity"]["joined"].as_u64().unwrap_or(0) >= 1 {
                return payload;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("join should be counted in time");

    assert_eq!(payload["running"], true);
}
