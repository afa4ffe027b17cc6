//! End-to-end tests driving the WebSocket gateway over a real socket.

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use quizhost::{
    coordinator::Coordinator,
    server::router,
    session::Options,
    store::{InMemoryQuizStore, LogResultsSink},
};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Starts a server on an ephemeral port and returns its address
async fn start_server() -> String {
    let coordinator = Coordinator::new(
        Arc::new(InMemoryQuizStore::default()),
        Arc::new(LogResultsSink),
        Options::default(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, router(coordinator)).await.unwrap();
    });
    addr
}

async fn connect(addr: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn send(client: &mut Client, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    client.send(Message::text(frame)).await.unwrap();
}

/// Reads frames until one carries `event`, skipping the others
async fn expect_event(client: &mut Client, event: &str) -> Value {
    let wait = async {
        while let Some(frame) = client.next().await {
            let frame = frame.unwrap();
            if let Message::Text(text) = frame {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value["event"] == event {
                    return value;
                }
            }
        }
        panic!("connection closed before {event}");
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {event}"))
}

async fn http_get(addr: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

fn quiz() -> Value {
    json!({
        "title": "Capitals",
        "questions": [
            {
                "id": "q1",
                "prompt": "Capital of France?",
                "type": "single-choice",
                "options": ["Paris", "Lyon"],
                "correctAnswers": [0],
                "points": 1000,
                "timeLimitSeconds": 30
            },
            {
                "id": "q2",
                "prompt": "Capital of Italy?",
                "type": "single-choice",
                "options": ["Milan", "Rome"],
                "correctAnswers": [1],
                "points": 1000,
                "timeLimitSeconds": 30
            }
        ]
    })
}

async fn host_session(addr: &str) -> (Client, String) {
    let mut host = connect(addr).await;
    send(
        &mut host,
        "host-quiz",
        json!({ "quizId": "capitals", "hostId": "owner", "quizSnapshot": quiz() }),
    )
    .await;
    let hosted = expect_event(&mut host, "quiz-hosted").await;
    let code = hosted["data"]["code"].as_str().unwrap().to_string();
    (host, code)
}

#[tokio::test]
async fn test_quiz_round_over_websocket() {
    let addr = start_server().await;
    let (mut host, code) = host_session(&addr).await;

    let mut alice = connect(&addr).await;
    send(
        &mut alice,
        "join-quiz",
        json!({ "code": code, "displayName": "Alice" }),
    )
    .await;
    let joined = expect_event(&mut alice, "joined-quiz").await;
    assert_eq!(joined["data"]["quiz"]["title"], "Capitals");
    let participant = expect_event(&mut host, "participant-joined").await;
    assert_eq!(participant["data"]["participant"]["name"], "Alice");

    send(&mut host, "start-quiz", json!({ "code": code })).await;
    let question = expect_event(&mut alice, "quiz-started").await;
    assert_eq!(question["data"]["id"], "q1");
    assert!(question["data"].get("correctAnswers").is_none());

    send(
        &mut alice,
        "submit-answer",
        json!({ "code": code, "questionId": "q1", "answer": 0, "timeSpentSeconds": 0 }),
    )
    .await;
    let submitted = expect_event(&mut alice, "answer-submitted").await;
    assert_eq!(submitted["data"]["totalScore"], 1500);
    let answered = expect_event(&mut host, "participant-answered").await;
    assert_eq!(answered["data"]["pointsAwarded"], 1500);

    let detail = http_get(&addr, &format!("/api/sessions/{code}")).await;
    assert!(detail.starts_with("HTTP/1.1 200"));
    assert!(detail.contains(r#""phase":"Active""#));

    send(&mut host, "end-quiz", json!({ "code": code })).await;
    let finished = expect_event(&mut alice, "quiz-finished").await;
    assert_eq!(finished["data"]["leaderboard"][0]["score"], 1500);
    let summary = expect_event(&mut host, "summary").await;
    assert_eq!(summary["data"]["stats"][0]["correct"], 1);
}

#[tokio::test]
async fn test_rejections_reach_only_the_issuer() {
    let addr = start_server().await;
    let (_host, code) = host_session(&addr).await;

    let mut mallory = connect(&addr).await;
    send(&mut mallory, "start-quiz", json!({ "code": code })).await;
    let rejected = expect_event(&mut mallory, "rejected").await;
    assert_eq!(rejected["data"]["event"], "start-quiz");
    assert_eq!(rejected["data"]["error"], "Unauthorized");

    mallory.send(Message::text("{not json")).await.unwrap();
    let malformed = expect_event(&mut mallory, "rejected").await;
    assert_eq!(malformed["data"]["error"], "MalformedMessage");
}

#[tokio::test]
async fn test_host_disconnect_ends_session() {
    let addr = start_server().await;
    let (mut host, code) = host_session(&addr).await;

    let mut alice = connect(&addr).await;
    send(
        &mut alice,
        "join-quiz",
        json!({ "code": code, "displayName": "Alice" }),
    )
    .await;
    expect_event(&mut alice, "joined-quiz").await;
    expect_event(&mut host, "participant-joined").await;

    host.close(None).await.unwrap();
    expect_event(&mut alice, "host-disconnected").await;

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match alice.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    let detail = http_get(&addr, &format!("/api/sessions/{code}")).await;
    assert!(detail.starts_with("HTTP/1.1 404"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = start_server().await;
    let (_host, _) = host_session(&addr).await;

    let health = http_get(&addr, "/api/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains(r#""status":"ok""#));
    assert!(health.contains(r#""sessions":1"#));
}
