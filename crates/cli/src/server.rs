//! WebSocket front of the coordinator.
//!
//! Each sandbox relay holds one socket on `/state-update`. The first message
//! claims a partition (`register`); afterwards the relay sends its board
//! changes (`state_update`) and receives changes addressed to it.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use mirror::Coordinator;
use mirror::SandboxLink;
use mirror::protocol::{CoordinatorMessage, PartitionKey, STATE_UPDATE_CHANNEL, SandboxMessage, StateUpdate};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::error::MirrorError;

/// Outbound half of one sandbox socket.
#[derive(Clone)]
pub struct WsLink(mpsc::UnboundedSender<Message>);

impl WsLink {
	fn send(&self, message: &CoordinatorMessage) -> bool {
		match serde_json::to_string(message) {
			Ok(text) => self.0.send(Message::Text(text.into())).is_ok(),
			Err(err) => {
				warn!(error = %err, "failed to encode coordinator message");
				false
			}
		}
	}
}

impl SandboxLink for WsLink {
	fn deliver(&self, update: StateUpdate) -> bool {
		self.send(&CoordinatorMessage::StateUpdate(update))
	}
}

type SharedCoordinator = Arc<Mutex<Coordinator<WsLink>>>;

pub fn router() -> Router {
	let state: SharedCoordinator = Arc::new(Mutex::new(Coordinator::new()));

	Router::new()
		.route("/", get(|| async { "OK" }))
		.route(
			&format!("/{STATE_UPDATE_CHANNEL}"),
			get(
				|ws: WebSocketUpgrade, State(state): State<SharedCoordinator>| async move {
					ws.on_upgrade(|socket| handle_sandbox_socket(socket, state))
				},
			),
		)
		.with_state(state)
}

/// Binds the coordinator socket. `host` may be an IP literal or a name such
/// as `localhost`; the first resolved address is used.
pub async fn bind(host: &str, port: u16) -> std::result::Result<TcpListener, MirrorError> {
	let addr = format!("{host}:{port}");
	let resolved = tokio::net::lookup_host(addr.as_str())
		.await
		.ok()
		.and_then(|mut addrs| addrs.next())
		.ok_or_else(|| MirrorError::Config(format!("invalid host/port combination: {addr}")))?;
	debug!(%addr, %resolved, "resolved coordinator address");

	TcpListener::bind(resolved)
		.await
		.map_err(|source| MirrorError::Bind { addr, source })
}

/// Serves the coordinator until the listener fails.
pub async fn serve(listener: TcpListener) -> Result<()> {
	if let Ok(addr) = listener.local_addr() {
		info!(%addr, "coordinator listening");
	}
	axum::serve(listener, router().into_make_service())
		.await
		.context("Coordinator server error")
}

async fn handle_sandbox_socket(socket: WebSocket, state: SharedCoordinator) {
	debug!("sandbox connected");

	let (tx, rx) = mpsc::unbounded_channel();
	let link = WsLink(tx);
	let mut rx_stream = UnboundedReceiverStream::new(rx);
	let (mut ws_tx, mut ws_rx) = socket.split();

	let send_task = tokio::spawn(async move {
		while let Some(msg) = rx_stream.next().await {
			if ws_tx.send(msg).await.is_err() {
				break;
			}
		}
	});

	let mut partition: Option<PartitionKey> = None;
	while let Some(msg) = ws_rx.next().await {
		match msg {
			Ok(Message::Text(text)) => handle_sandbox_message(&state, &link, &mut partition, &text).await,
			Ok(Message::Close(_)) => break,
			Ok(_) => {}
			Err(err) => {
				warn!(error = %err, "sandbox websocket error");
				break;
			}
		}
	}

	if let Some(partition) = partition {
		let mut coordinator = state.lock().await;
		// A failed delivery may already have replaced this link.
		let owned = coordinator
			.registry()
			.get(&partition)
			.is_some_and(|current| current.0.same_channel(&link.0));
		if owned {
			coordinator.unregister(&partition);
		}
		info!(%partition, "sandbox disconnected");
	}

	send_task.abort();
}

async fn handle_sandbox_message(state: &SharedCoordinator, link: &WsLink, partition: &mut Option<PartitionKey>, raw: &str) {
	let message = match serde_json::from_str::<SandboxMessage>(raw) {
		Ok(message) => message,
		Err(err) => {
			debug!(error = %err, "ignoring malformed sandbox message");
			return;
		}
	};

	match message {
		SandboxMessage::Register { partition: key } => {
			if let Some(current) = partition.as_ref() {
				link.send(&CoordinatorMessage::Rejected {
					reason: format!("connection already registered as {current}"),
				});
				return;
			}

			let registered = state.lock().await.register(key.clone(), link.clone());
			match registered {
				Ok(()) => {
					info!(partition = %key, "sandbox registered");
					link.send(&CoordinatorMessage::Registered { partition: key.clone() });
					*partition = Some(key);
				}
				Err(err) => {
					warn!(partition = %key, error = %err, "rejected sandbox registration");
					link.send(&CoordinatorMessage::Rejected {
						reason: err.to_string(),
					});
				}
			}
		}
		SandboxMessage::StateUpdate(notification) => {
			state.lock().await.route(notification);
		}
	}
}
