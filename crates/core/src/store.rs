//! Sandbox-scoped key/value storage and the board slot accessor.
//!
//! [`BlobStore`] is the minimal `localStorage`-shaped surface the pipeline
//! needs. [`BlobAccessor`] binds a store to the application's save-state key
//! and applies the read policy: every failure reads as "absent".

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::protocol::{DecodedState, PartitionKey, SAVE_STATE_KEY, StateBlob, decode_state};

/// String key/value storage private to one sandbox.
pub trait BlobStore {
	fn get_item(&self, key: &str) -> std::result::Result<Option<String>, StoreError>;
	fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), StoreError>;
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
	fn get_item(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
		(**self).get_item(key)
	}

	fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
		(**self).set_item(key, value)
	}
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
	fn get_item(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
		(**self).get_item(key)
	}

	fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
		(**self).set_item(key, value)
	}
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
	items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl BlobStore for MemoryStore {
	fn get_item(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
		Ok(self.items.lock().get(key).cloned())
	}

	fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
		self.items.lock().insert(key.to_string(), value.to_string());
		Ok(())
	}
}

/// File-backed store, one JSON object per partition at
/// `<root>/<sanitized-partition>/local-storage.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
	path: PathBuf,
}

impl FileStore {
	pub const FILE_NAME: &'static str = "local-storage.json";

	pub fn new(root: &Path, partition: &PartitionKey) -> Self {
		Self {
			path: root.join(partition.sanitized()).join(Self::FILE_NAME),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load(&self) -> std::result::Result<BTreeMap<String, String>, StoreError> {
		let content = match fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
			Err(source) => {
				return Err(StoreError::Io {
					path: self.path.clone(),
					source,
				});
			}
		};
		serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
			path: self.path.clone(),
			source,
		})
	}

	fn io_error(&self, source: std::io::Error) -> StoreError {
		StoreError::Io {
			path: self.path.clone(),
			source,
		}
	}
}

impl BlobStore for FileStore {
	fn get_item(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
		Ok(self.load()?.remove(key))
	}

	fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
		let mut items = self.load()?;
		items.insert(key.to_string(), value.to_string());

		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
		}
		let json = serde_json::to_string_pretty(&items).map_err(|source| StoreError::Corrupt {
			path: self.path.clone(),
			source,
		})?;
		let tmp = self.path.with_extension("json.tmp");
		fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
		fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
	}
}

/// The application's persisted board slot in one sandbox.
#[derive(Debug, Clone)]
pub struct BlobAccessor<S> {
	store: S,
	key: String,
}

impl<S: BlobStore> BlobAccessor<S> {
	/// Accessor for [`SAVE_STATE_KEY`].
	pub fn new(store: S) -> Self {
		Self::with_key(store, SAVE_STATE_KEY)
	}

	pub fn with_key(store: S, key: impl Into<String>) -> Self {
		Self {
			store,
			key: key.into(),
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	/// Current blob, or `None` when the slot is empty or unreadable.
	pub fn read(&self) -> Option<StateBlob> {
		match self.store.get_item(&self.key) {
			Ok(raw) => StateBlob::from_raw(raw),
			Err(err) => {
				warn!(key = %self.key, error = %err, "unable to read board state");
				None
			}
		}
	}

	pub fn write(&self, blob: &StateBlob) -> std::result::Result<(), StoreError> {
		self.store.set_item(&self.key, blob.as_str())
	}

	/// Decodes the stored value, surfacing storage and decode failures.
	pub fn decode_current(&self) -> Result<Option<DecodedState>> {
		let Some(raw) = StateBlob::from_raw(self.store.get_item(&self.key)?) else {
			return Ok(None);
		};
		Ok(Some(decode_state(raw.as_str())?))
	}

	/// Decoded board, or `None` when absent or undecodable.
	pub fn read_decoded(&self) -> Option<DecodedState> {
		match self.decode_current() {
			Ok(decoded) => decoded,
			Err(err) => {
				warn!(key = %self.key, error = %err, "failed to decode board state");
				None
			}
		}
	}
}
