//! Tests for the realtime channel against a live server.

use futures::{SinkExt, StreamExt};
use hexlink_core::protocol::{Frame, ServerMessage};
use hexlink_core::{Cell, Color, Position};
use hexlink_server::{Server, ServerConfig};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let config = ServerConfig::default().with_port(0);
    let server = Server::bind(config).await.expect("bind failed");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn post(addr: SocketAddr, path: &str, body: Value) -> Value {
    reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .json(&body)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid json")
}

/// Creates and joins a match over REST; returns (id, blue id, red id).
async fn started(addr: SocketAddr) -> (String, String, String) {
    let created = post(addr, "/api/games/create", json!({"playerId": "p1"})).await;
    let id = created["data"]["gameId"].as_str().unwrap().to_string();
    let joined = post(addr, &format!("/api/games/{id}/join"), json!({"playerId": "p2"})).await;
    if joined["data"]["playerColor"] == 1 {
        (id, "p2".into(), "p1".into())
    } else {
        (id, "p1".into(), "p2".into())
    }
}

async fn connect(addr: SocketAddr, id: &str, player: &str) -> Socket {
    let url = format!("ws://{addr}/api/games/{id}/ws?playerId={player}");
    let (socket, _) = connect_async(url).await.expect("upgrade failed");
    socket
}

/// Next application message, skipping liveness traffic.
async fn next_message(socket: &mut Socket) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for message")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            match Frame::<ServerMessage>::parse(text.as_str()) {
                Frame::Message(message) => return message,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }
}

async fn send_move(socket: &mut Socket, row: i64, col: i64) {
    let text = json!({"type": "move", "row": row, "col": col}).to_string();
    socket.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn test_attach_receives_state_then_peer_notice() {
    let addr = spawn_server().await;
    let (id, blue, red) = started(addr).await;

    let mut blue_socket = connect(addr, &id, &blue).await;
    let ServerMessage::State(view) = next_message(&mut blue_socket).await else {
        panic!("first message must be state");
    };
    assert_eq!(view.your_color, Color::Blue);
    assert!(view.is_your_turn);

    let mut red_socket = connect(addr, &id, &red).await;
    assert!(matches!(next_message(&mut red_socket).await, ServerMessage::State(_)));
    assert_eq!(next_message(&mut blue_socket).await, ServerMessage::OpponentConnected);

    drop(red_socket);
    assert_eq!(next_message(&mut blue_socket).await, ServerMessage::OpponentDisconnected);
}

#[tokio::test]
async fn test_move_fans_out_and_errors_go_to_sender_only() {
    let addr = spawn_server().await;
    let (id, blue, red) = started(addr).await;

    let mut blue_socket = connect(addr, &id, &blue).await;
    next_message(&mut blue_socket).await;
    let mut red_socket = connect(addr, &id, &red).await;
    next_message(&mut red_socket).await;
    assert_eq!(next_message(&mut blue_socket).await, ServerMessage::OpponentConnected);

    // Out of turn: only red hears about it.
    send_move(&mut red_socket, 3, 3).await;
    assert_eq!(
        next_message(&mut red_socket).await,
        ServerMessage::Error {
            message: "Not your turn".into()
        }
    );

    send_move(&mut blue_socket, 0, 0).await;
    for (socket, color) in [(&mut blue_socket, Color::Blue), (&mut red_socket, Color::Red)] {
        let ServerMessage::State(view) = next_message(socket).await else {
            panic!("expected state push");
        };
        assert_eq!(view.your_color, color);
        assert_eq!(view.game_state.board.get(Position::new(0, 0)), Some(Cell::Stone(Color::Blue)));
        assert_eq!(view.is_your_turn, color == Color::Red);
    }
}

#[tokio::test]
async fn test_ping_and_malformed_frames() {
    let addr = spawn_server().await;
    let (id, blue, _) = started(addr).await;
    let mut socket = connect(addr, &id, &blue).await;
    next_message(&mut socket).await;

    socket.send(Message::Text("ping".into())).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply.to_text().unwrap(), "pong");

    socket.send(Message::Text("{not json".into())).await.unwrap();
    assert_eq!(
        next_message(&mut socket).await,
        ServerMessage::Error {
            message: "Invalid JSON".into()
        }
    );

    // The session keeps working after a bad frame.
    send_move(&mut socket, 0, 0).await;
    assert!(matches!(next_message(&mut socket).await, ServerMessage::State(_)));
}

#[tokio::test]
async fn test_upgrade_rejections() {
    let addr = spawn_server().await;
    let (id, _, _) = started(addr).await;

    let url = format!("ws://{addr}/api/games/{id}/ws?playerId=stranger");
    let err = connect_async(url).await.unwrap_err();
    assert!(err.to_string().contains("403"), "{err}");

    let url = format!("ws://{addr}/api/games/ZZZZZZ/ws?playerId=p1");
    let err = connect_async(url).await.unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");
}

#[tokio::test]
async fn test_rest_move_reaches_sockets() {
    let addr = spawn_server().await;
    let (id, blue, red) = started(addr).await;
    let mut red_socket = connect(addr, &id, &red).await;
    next_message(&mut red_socket).await;

    let body = post(
        addr,
        &format!("/api/games/{id}/move"),
        json!({"playerId": blue, "row": 0, "col": 5}),
    )
    .await;
    assert_eq!(body["success"], true);

    let ServerMessage::State(view) = next_message(&mut red_socket).await else {
        panic!("expected state push");
    };
    assert!(view.is_your_turn);
}
