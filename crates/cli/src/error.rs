use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to bind coordinator to {addr}")]
	Bind {
		addr: String,
		#[source]
		source: std::io::Error,
	},

	#[error("no board state stored in {0}")]
	NoState(String),

	#[error(transparent)]
	Mirror(#[from] mirror::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl MirrorError {
	pub fn code(&self) -> ErrorCode {
		match self {
			MirrorError::Config(_) => ErrorCode::InvalidConfig,
			MirrorError::Bind { .. } => ErrorCode::BindFailed,
			MirrorError::NoState(_) => ErrorCode::NoState,
			MirrorError::Mirror(mirror::Error::Decode(_)) => ErrorCode::DecodeFailed,
			MirrorError::Mirror(mirror::Error::Snapshot(_) | mirror::Error::Json(_)) => ErrorCode::InvalidSnapshot,
			MirrorError::Mirror(mirror::Error::Io(_) | mirror::Error::Store(_)) | MirrorError::Io(_) => ErrorCode::IoError,
			MirrorError::Mirror(_) | MirrorError::Json(_) | MirrorError::Anyhow(_) => ErrorCode::InternalError,
		}
	}

	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let message = match self {
			MirrorError::Bind { addr, source } => format!("failed to bind coordinator to {addr}: {source}"),
			MirrorError::Anyhow(err) => format!("{err:#}"),
			other => other.to_string(),
		};
		CommandError {
			code: self.code(),
			message,
		}
	}
}
