use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::{DecodeError, PartitionKey};

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a sandbox storage back-end.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("storage unavailable: {0}")]
	Unavailable(String),

	#[error("storage I/O failed at {}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("storage file {} is corrupt", path.display())]
	Corrupt {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("restore call failed: {0}")]
	Restore(String),

	#[error("partition {0} already has a live sandbox")]
	AlreadyRegistered(PartitionKey),

	#[error("coordinator is not running")]
	CoordinatorClosed,

	#[error("invalid render graph snapshot: {0}")]
	Snapshot(String),

	#[error(transparent)]
	Decode(#[from] DecodeError),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}
