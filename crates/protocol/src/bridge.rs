//! Same-origin message protocol between a sandbox relay and its page bridge.
//!
//! Both sides share one `postMessage` channel, so every message is wrapped in
//! a [`BridgeEnvelope`] carrying [`PAGE_BRIDGE_CHANNEL`]. Traffic is split into
//! two one-way vocabularies:
//!
//! - [`BridgeCommand`]: relay → page (`FIND_REQUEST`, `APPLY_BLOB`)
//! - [`BridgeEvent`]: page → relay (`INSTANCE_STATUS`, `APPLY_RESULT`)
//!
//! Each side parses only its own vocabulary and ignores the rest, including
//! its own echoes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Channel identifier stamped on every bridge message.
pub const PAGE_BRIDGE_CHANNEL: &str = "board-mirror-bridge";

/// Channel-stamped wrapper around a bridge message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEnvelope<M> {
	pub channel: String,
	#[serde(flatten)]
	pub message: M,
}

impl<M> BridgeEnvelope<M> {
	pub fn new(message: M) -> Self {
		Self {
			channel: PAGE_BRIDGE_CHANNEL.to_string(),
			message,
		}
	}

	/// Unwraps the message when it was sent on the bridge channel.
	pub fn open(self) -> Option<M> {
		(self.channel == PAGE_BRIDGE_CHANNEL).then_some(self.message)
	}
}

impl<M: DeserializeOwned> BridgeEnvelope<M> {
	/// Parses a raw posted value, yielding `None` for foreign channels and
	/// message types outside `M`.
	pub fn parse(value: serde_json::Value) -> Option<M> {
		serde_json::from_value::<Self>(value).ok()?.open()
	}
}

/// Request from the relay to the page bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeCommand {
	/// Search the render graph and report [`InstanceStatus`].
	FindRequest,
	/// Persist `blob` and ask the application to restore from it.
	ApplyBlob {
		#[serde(default)]
		blob: Option<String>,
	},
}

/// Report from the page bridge to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeEvent {
	InstanceStatus(InstanceStatus),
	ApplyResult(ApplyResult),
}

/// Outcome of one instance search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum InstanceStatus {
	Captured {
		duration_ms: u64,
		fibers_checked: usize,
		nodes_visited: usize,
	},
	Missing {
		/// Host elements scanned for framework metadata.
		nodes_checked: usize,
		fibers_checked: usize,
		nodes_visited: usize,
		duration_ms: u64,
	},
}

impl InstanceStatus {
	pub fn is_captured(&self) -> bool {
		matches!(self, Self::Captured { .. })
	}
}

/// Why an apply did not take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyFailure {
	/// No controller could be located.
	InstanceUnavailable,
	/// Persisting the blob or the restore call itself failed.
	RestoreFailed,
}

/// Outcome of an `APPLY_BLOB` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
	pub ok: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<ApplyFailure>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl ApplyResult {
	pub fn applied() -> Self {
		Self {
			ok: true,
			reason: None,
			message: None,
		}
	}

	pub fn instance_unavailable() -> Self {
		Self {
			ok: false,
			reason: Some(ApplyFailure::InstanceUnavailable),
			message: None,
		}
	}

	pub fn restore_failed(message: impl Into<String>) -> Self {
		Self {
			ok: false,
			reason: Some(ApplyFailure::RestoreFailed),
			message: Some(message.into()),
		}
	}
}
