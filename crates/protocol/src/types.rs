//! Core value types shared by every context.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when constructing a [`StateBlob`] from an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("state blob must not be empty")]
pub struct BlobError;

/// Opaque serialized application state.
///
/// Always non-empty. The relay never looks inside it; the only operations are
/// equality and moving it around unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateBlob(String);

impl StateBlob {
	/// Wraps `value`, rejecting the empty string.
	pub fn new(value: impl Into<String>) -> Result<Self, BlobError> {
		let value = value.into();
		if value.is_empty() {
			return Err(BlobError);
		}
		Ok(Self(value))
	}

	/// Wraps an optional raw value, treating `None` and `""` alike.
	pub fn from_raw(value: Option<String>) -> Option<Self> {
		value.and_then(|v| Self::new(v).ok())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl TryFrom<String> for StateBlob {
	type Error = BlobError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<StateBlob> for String {
	fn from(blob: StateBlob) -> Self {
		blob.0
	}
}

impl PartialEq<str> for StateBlob {
	fn eq(&self, other: &str) -> bool {
		self.0 == other
	}
}

impl AsRef<str> for StateBlob {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// Storage partition identifying one sandbox, e.g. `persist:remote-board`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Filesystem-safe form: the `persist:` scheme is dropped and anything
	/// outside `[A-Za-z0-9_-]` becomes `_`.
	pub fn sanitized(&self) -> String {
		let bare = self.0.strip_prefix("persist:").unwrap_or(&self.0);
		bare.chars()
			.map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
			.collect()
	}
}

impl fmt::Display for PartitionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for PartitionKey {
	fn from(key: &str) -> Self {
		Self(key.to_string())
	}
}

impl From<String> for PartitionKey {
	fn from(key: String) -> Self {
		Self(key)
	}
}

/// A changed blob travelling from a sandbox relay to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
	pub blob: StateBlob,
	/// Partition of the sandbox that should receive the blob.
	#[serde(alias = "targetPartition")]
	pub target_partition_key: PartitionKey,
}

/// A blob forwarded by the coordinator to the target sandbox relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
	pub blob: StateBlob,
	/// Coordinator wall clock in Unix milliseconds. Diagnostic only.
	pub timestamp: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_blob_is_rejected() {
		assert_eq!(StateBlob::new(""), Err(BlobError));
		assert!(StateBlob::from_raw(Some(String::new())).is_none());
		assert!(StateBlob::from_raw(None).is_none());
	}

	#[test]
	fn blob_deserialization_rejects_empty_string() {
		let err = serde_json::from_str::<StateBlob>(r#""""#);
		assert!(err.is_err());
		let ok: StateBlob = serde_json::from_str(r#""AAA""#).unwrap();
		assert_eq!(ok.as_str(), "AAA");
	}

	#[test]
	fn change_notification_uses_target_partition_key_field() {
		let note = ChangeNotification {
			blob: StateBlob::new("AAA").unwrap(),
			target_partition_key: PartitionKey::from("persist:remote-board"),
		};
		let json = serde_json::to_value(&note).unwrap();
		assert_eq!(json["blob"], "AAA");
		assert_eq!(json["targetPartitionKey"], "persist:remote-board");
	}

	#[test]
	fn change_notification_accepts_historical_field_name() {
		let note: ChangeNotification =
			serde_json::from_str(r#"{"blob":"BBB","targetPartition":"persist:remote-board"}"#).unwrap();
		assert_eq!(note.target_partition_key.as_str(), "persist:remote-board");
	}

	#[test]
	fn partition_key_sanitizes_for_paths() {
		assert_eq!(PartitionKey::from("persist:remote-board").sanitized(), "remote-board");
		assert_eq!(PartitionKey::from("temp/../x y").sanitized(), "temp____x_y");
	}
}
