//! Messages on the `state-update` channel between sandbox relays and the
//! coordinator.
//!
//! A relay opens a WebSocket to the coordinator and speaks first:
//!
//! 1. Relay sends [`SandboxMessage::Register`] naming its partition
//! 2. Coordinator answers [`CoordinatorMessage::Registered`] or
//!    [`CoordinatorMessage::Rejected`] when that partition is already live
//! 3. Relay sends [`SandboxMessage::StateUpdate`] whenever its board changes
//! 4. Coordinator pushes [`CoordinatorMessage::StateUpdate`] to the target
//!
//! Nothing is acknowledged after registration. Sends are fire-and-forget.

use serde::{Deserialize, Serialize};

use crate::types::{ChangeNotification, PartitionKey, StateUpdate};

/// Route of the relay channel on the coordinator.
pub const STATE_UPDATE_CHANNEL: &str = "state-update";

/// Message sent from a sandbox relay to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SandboxMessage {
	/// Claims the partition for this connection.
	Register { partition: PartitionKey },
	/// The local board changed.
	StateUpdate(ChangeNotification),
}

/// Message sent from the coordinator to a sandbox relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorMessage {
	Registered { partition: PartitionKey },
	Rejected { reason: String },
	/// A blob published by another sandbox for this one.
	StateUpdate(StateUpdate),
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::StateBlob;

	#[test]
	fn sandbox_state_update_carries_type_tag() {
		let msg = SandboxMessage::StateUpdate(ChangeNotification {
			blob: StateBlob::new("AAA").unwrap(),
			target_partition_key: "persist:remote-board".into(),
		});
		let json = serde_json::to_value(&msg).unwrap();
		assert_eq!(json["type"], "state_update");
		assert_eq!(json["blob"], "AAA");
		assert_eq!(json["targetPartitionKey"], "persist:remote-board");
	}

	#[test]
	fn register_parses_from_relay_json() {
		let msg: SandboxMessage =
			serde_json::from_str(r#"{"type":"register","partition":"persist:local-board"}"#).unwrap();
		assert_eq!(
			msg,
			SandboxMessage::Register {
				partition: "persist:local-board".into()
			}
		);
	}

	#[test]
	fn coordinator_update_has_blob_and_timestamp() {
		let msg = CoordinatorMessage::StateUpdate(StateUpdate {
			blob: StateBlob::new("AAA").unwrap(),
			timestamp: 1_700_000_000_000,
		});
		let json = serde_json::to_string(&msg).unwrap();
		assert!(json.contains(r#""type":"state_update""#));
		assert!(json.contains(r#""timestamp":1700000000000"#));
	}

	#[test]
	fn state_update_with_empty_blob_is_rejected() {
		let parsed = serde_json::from_str::<SandboxMessage>(
			r#"{"type":"state_update","blob":"","targetPartitionKey":"persist:remote-board"}"#,
		);
		assert!(parsed.is_err());
	}
}
