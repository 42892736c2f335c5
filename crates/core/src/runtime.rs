//! tokio drivers for the relay pipeline.
//!
//! Each execution context of a browser sandbox maps to one task here:
//!
//! - [`run_coordinator`]: the process-wide router
//! - [`run_sandbox_relay`]: a sandbox's isolated context (poll + inbound)
//! - [`run_page_bridge`]: a sandbox's page context
//!
//! Tasks talk over unbounded channels only; no send waits for the receiver.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Interval, MissedTickBehavior};
use tracing::debug;

use crate::bridge::{EventSink, PageBridge};
use crate::clock::Clock;
use crate::coordinator::{Coordinator, SandboxLink};
use crate::error::{Error, Result};
use crate::locator::RenderGraph;
use crate::protocol::{BridgeCommand, BridgeEvent, ChangeNotification, PartitionKey, StateUpdate};
use crate::relay::{InboundRelay, OutboundRelay, RelayTuning};
use crate::sandbox::RelayRole;
use crate::store::{BlobAccessor, BlobStore};

/// Capacity of a page's bridge event broadcast.
pub const BRIDGE_EVENT_CAPACITY: usize = 64;

impl SandboxLink for UnboundedSender<StateUpdate> {
	fn deliver(&self, update: StateUpdate) -> bool {
		self.send(update).is_ok()
	}
}

impl EventSink for broadcast::Sender<BridgeEvent> {
	fn emit(&self, event: BridgeEvent) {
		// No listener is fine: the relay may not be attached yet.
		let _ = self.send(event);
	}
}

enum Control {
	Register {
		partition: PartitionKey,
		link: UnboundedSender<StateUpdate>,
		reply: oneshot::Sender<Result<()>>,
	},
	Unregister(PartitionKey),
}

/// Cloneable handle to a running coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
	control: UnboundedSender<Control>,
	notifications: UnboundedSender<ChangeNotification>,
}

impl CoordinatorHandle {
	/// Registers a sandbox and returns the stream of updates addressed to it.
	pub async fn register(&self, partition: PartitionKey) -> Result<UnboundedReceiver<StateUpdate>> {
		let (link, updates) = mpsc::unbounded_channel();
		let (reply, response) = oneshot::channel();
		self.control
			.send(Control::Register {
				partition,
				link,
				reply,
			})
			.map_err(|_| Error::CoordinatorClosed)?;
		response.await.map_err(|_| Error::CoordinatorClosed)??;
		Ok(updates)
	}

	/// Marks a sandbox closed.
	pub fn unregister(&self, partition: PartitionKey) {
		let _ = self.control.send(Control::Unregister(partition));
	}

	/// Sender relays use to publish changes.
	pub fn notifier(&self) -> UnboundedSender<ChangeNotification> {
		self.notifications.clone()
	}
}

/// Starts a coordinator on the current runtime.
pub fn spawn_coordinator() -> (CoordinatorHandle, JoinHandle<()>) {
	let (control, control_rx) = mpsc::unbounded_channel();
	let (notifications, notification_rx) = mpsc::unbounded_channel();
	let task = tokio::spawn(run_coordinator(Coordinator::new(), control_rx, notification_rx));
	(
		CoordinatorHandle {
			control,
			notifications,
		},
		task,
	)
}

async fn run_coordinator(
	mut coordinator: Coordinator<UnboundedSender<StateUpdate>>,
	mut control: UnboundedReceiver<Control>,
	mut notifications: UnboundedReceiver<ChangeNotification>,
) {
	loop {
		tokio::select! {
			Some(msg) = control.recv() => match msg {
				Control::Register { partition, link, reply } => {
					let _ = reply.send(coordinator.register(partition, link));
				}
				Control::Unregister(partition) => {
					coordinator.unregister(&partition);
				}
			},
			Some(notification) = notifications.recv() => {
				coordinator.route(notification);
			}
			else => break,
		}
	}
	debug!("coordinator stopped");
}

/// Channels wiring one sandbox relay to the coordinator and its page.
pub struct RelayChannels {
	pub to_coordinator: UnboundedSender<ChangeNotification>,
	pub updates: UnboundedReceiver<StateUpdate>,
	pub to_page: UnboundedSender<BridgeCommand>,
	pub from_page: broadcast::Receiver<BridgeEvent>,
}

/// Runs a sandbox's isolated-context relay until the coordinator goes away.
///
/// With a publish target the relay samples the board every poll period. When
/// mirroring it applies forwarded blobs and asks the page to (re)locate the
/// controller every find period, starting immediately.
pub async fn run_sandbox_relay<S: BlobStore>(
	role: RelayRole,
	accessor: BlobAccessor<S>,
	tuning: RelayTuning,
	channels: RelayChannels,
) {
	let RelayChannels {
		to_coordinator,
		mut updates,
		to_page,
		mut from_page,
	} = channels;

	let mut outbound = role.publish_to.clone().map(OutboundRelay::new);
	let mut inbound = InboundRelay::new();
	let mut poll = outbound.as_ref().map(|_| ticker(tuning.poll_interval()));
	let mut find = role.mirror_incoming.then(|| ticker(tuning.find_retry_interval()));
	let mut page_open = true;

	loop {
		tokio::select! {
			_ = next_tick(&mut poll) => {
				let Some(relay) = outbound.as_mut() else { continue };
				if let Some(notification) = relay.poll(&accessor) {
					if to_coordinator.send(notification).is_err() {
						break;
					}
				}
			}
			_ = next_tick(&mut find) => {
				let _ = to_page.send(inbound.find_request());
			}
			update = updates.recv() => match update {
				Some(update) if role.mirror_incoming => {
					if let Some(command) = inbound.receive(&update) {
						let _ = to_page.send(command);
					}
				}
				Some(_) => {}
				None => break,
			},
			event = from_page.recv(), if page_open => match event {
				Ok(event) => inbound.observe_event(&event),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					debug!(skipped, "bridge events lagged");
				}
				Err(broadcast::error::RecvError::Closed) => page_open = false,
			},
		}
	}
	debug!("sandbox relay stopped");
}

/// Runs a page bridge: one search right away, then commands until the relay
/// hangs up.
pub async fn run_page_bridge<G, S, C, E>(mut bridge: PageBridge<G, S, C, E>, mut commands: UnboundedReceiver<BridgeCommand>)
where
	G: RenderGraph,
	S: BlobStore,
	C: Clock,
	E: EventSink,
{
	bridge.find_instance();
	while let Some(command) = commands.recv().await {
		bridge.handle(command);
	}
}

fn ticker(period: Duration) -> Interval {
	let mut interval = time::interval(period);
	interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
	interval
}

async fn next_tick(interval: &mut Option<Interval>) {
	match interval {
		Some(interval) => {
			interval.tick().await;
		}
		None => std::future::pending().await,
	}
}
