//! Per-sandbox relay state.
//!
//! A sandbox relay has two independent halves:
//!
//! - [`OutboundRelay`] polls the board slot and publishes changes. The store
//!   offers no change notification, so it samples on a timer and coalesces
//!   equal consecutive values; values that come and go between two ticks are
//!   never published.
//! - [`InboundRelay`] takes blobs forwarded by the coordinator, drops repeats
//!   and turns the rest into `APPLY_BLOB` commands for the page bridge.
//!
//! Each half owns its own "last seen" value so several sandboxes can share a
//! process without contaminating each other.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::protocol::{
	BridgeCommand, BridgeEvent, ChangeNotification, DEFAULT_FIND_RETRY_MS, DEFAULT_POLL_INTERVAL_MS, PartitionKey,
	StateBlob, StateUpdate,
};
use crate::store::{BlobAccessor, BlobStore};

/// Relay timer periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTuning {
	pub poll_interval_ms: u64,
	pub find_retry_ms: u64,
}

impl Default for RelayTuning {
	fn default() -> Self {
		Self {
			poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
			find_retry_ms: DEFAULT_FIND_RETRY_MS,
		}
	}
}

impl RelayTuning {
	/// Outbound poll period, never shorter than 1ms.
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms.max(1))
	}

	/// Find-instance retry period, never shorter than 1ms.
	pub fn find_retry_interval(&self) -> Duration {
		Duration::from_millis(self.find_retry_ms.max(1))
	}
}

/// Change detector for the local board.
#[derive(Debug, Clone)]
pub struct OutboundRelay {
	target: PartitionKey,
	last_published: Option<StateBlob>,
}

impl OutboundRelay {
	pub fn new(target: PartitionKey) -> Self {
		Self {
			target,
			last_published: None,
		}
	}

	pub fn target(&self) -> &PartitionKey {
		&self.target
	}

	pub fn last_published(&self) -> Option<&StateBlob> {
		self.last_published.as_ref()
	}

	/// One timer tick: sample the slot and publish if it changed.
	pub fn poll<S: BlobStore>(&mut self, accessor: &BlobAccessor<S>) -> Option<ChangeNotification> {
		let notification = self.observe(accessor.read())?;
		info!(
			target_partition = %self.target,
			len = notification.blob.len(),
			"published board state"
		);
		Some(notification)
	}

	/// Feeds one sampled value through the de-duplication rule.
	pub fn observe(&mut self, current: Option<StateBlob>) -> Option<ChangeNotification> {
		let current = current?;
		if self.last_published.as_ref() == Some(&current) {
			return None;
		}
		self.last_published = Some(current.clone());
		Some(ChangeNotification {
			blob: current,
			target_partition_key: self.target.clone(),
		})
	}
}

/// De-duplicating receiver for forwarded blobs.
#[derive(Debug, Clone, Default)]
pub struct InboundRelay {
	last_applied: Option<StateBlob>,
}

impl InboundRelay {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn last_applied(&self) -> Option<&StateBlob> {
		self.last_applied.as_ref()
	}

	/// Handles a coordinator update.
	pub fn receive(&mut self, update: &StateUpdate) -> Option<BridgeCommand> {
		info!(
			len = update.blob.len(),
			timestamp = update.timestamp,
			"received remote blob"
		);
		self.accept(Some(update.blob.as_str()))
	}

	/// Returns the `APPLY_BLOB` command for a new blob, `None` for empty input
	/// or a repeat of the last applied blob.
	pub fn accept(&mut self, blob: Option<&str>) -> Option<BridgeCommand> {
		let blob = StateBlob::new(blob?).ok()?;
		if self.last_applied.as_ref() == Some(&blob) {
			return None;
		}
		self.last_applied = Some(blob.clone());
		Some(BridgeCommand::ApplyBlob {
			blob: Some(blob.into_string()),
		})
	}

	pub fn find_request(&self) -> BridgeCommand {
		BridgeCommand::FindRequest
	}

	/// Logs a report coming back from the page bridge.
	pub fn observe_event(&self, event: &BridgeEvent) {
		match event {
			BridgeEvent::InstanceStatus(status) => info!(?status, "instance status from page"),
			BridgeEvent::ApplyResult(result) if !result.ok => warn!(
				reason = ?result.reason,
				message = result.message.as_deref().unwrap_or(""),
				"page failed to apply blob"
			),
			BridgeEvent::ApplyResult(_) => {}
		}
	}
}
