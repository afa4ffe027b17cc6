//! WebSocket and HTTP surface of the real-time gateway
//!
//! Every WebSocket connection gets a coordinator connection id. Inbound text
//! frames are parsed and dispatched one at a time; outbound frames are pushed
//! by a separate task so a slow client never blocks a session.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::{
    config::Config,
    coordinator::{Coordinator, Outbound, Stats},
    protocol::IncomingMessage,
    session::SessionInfo,
    session_code::SessionCode,
};

/// Builds the router serving `/ws`, `/api/health` and `/api/sessions/{code}`
pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/api/sessions/{code}", get(session_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}

/// Serves the gateway until Ctrl+C or SIGTERM
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_server(
    config: &Config,
    coordinator: Arc<Coordinator>,
) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("quiz server listening on {}", listener.local_addr()?);
    tracing::info!("connect to: ws://{}/ws", bind_addr);

    axum::serve(listener, router(coordinator))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl+c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    #[serde(flatten)]
    stats: Stats,
}

async fn health_check(State(coordinator): State<Arc<Coordinator>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        stats: coordinator.stats().await,
    })
}

async fn session_detail(
    State(coordinator): State<Arc<Coordinator>>,
    Path(code): Path<String>,
) -> Result<Json<SessionInfo>, StatusCode> {
    let code = code
        .parse::<SessionCode>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    coordinator
        .session_info(code)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(coordinator): State<Arc<Coordinator>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, coordinator))
}

/// Pushes queued frames to the socket until the queue closes or a close is requested
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, coordinator: Arc<Coordinator>) {
    let (sender, mut receiver) = socket.split();
    let (id, rx) = coordinator.connect();
    tracing::info!(connection = %id, "client connected");

    let dispatcher = coordinator.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            let message = match message {
                Ok(message) => message,
                Err(error) => {
                    tracing::debug!(connection = %id, %error, "websocket error");
                    break;
                }
            };

            match message {
                Message::Text(text) => match IncomingMessage::parse(&text) {
                    Ok(message) => dispatcher.dispatch(id, message).await,
                    Err(error) => dispatcher.report_malformed(id, &error),
                },
                Message::Close(_) => {
                    tracing::debug!(connection = %id, "client requested close");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    coordinator.disconnect(id).await;
    tracing::info!(connection = %id, "client disconnected");
}
