//! Result envelope printed by every command.
//!
//! With `-f json` stdout carries exactly one envelope:
//!
//! ```json
//! { "ok": true, "command": "decode", "data": { ... } }
//! ```
//!
//! and on failure
//!
//! ```json
//! { "ok": false, "command": "decode", "error": { "code": "DECODE_FAILED", "message": "..." } }
//! ```
//!
//! Text output is for people: each command renders its own data, and
//! failures go to stderr only.


use std::io::{self, Write};

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON envelope
	Json,
	/// Human-readable text
	#[default]
	Text,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
}

impl<T> CommandResult<T> {
	pub fn success(command: &str, data: T) -> Self {
		Self {
			ok: true,
			command: command.to_string(),
			data: Some(data),
			error: None,
		}
	}

	pub fn failure(command: &str, error: CommandError) -> Self {
		Self {
			ok: false,
			command: command.to_string(),
			data: None,
			error: Some(error),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Config file, environment or flags rejected
	InvalidConfig,
	/// Coordinator address unavailable
	BindFailed,
	/// Nothing stored under the save-state key
	NoState,
	/// Stored value is not a recoverable board
	DecodeFailed,
	/// Render-graph snapshot malformed
	InvalidSnapshot,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::InvalidConfig => "INVALID_CONFIG",
			ErrorCode::BindFailed => "BIND_FAILED",
			ErrorCode::NoState => "NO_STATE",
			ErrorCode::DecodeFailed => "DECODE_FAILED",
			ErrorCode::InvalidSnapshot => "INVALID_SNAPSHOT",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}

/// Text rendering of a command's data.
pub trait TextOutput {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Prints a successful result in the requested format.
pub fn print_success<T: Serialize + TextOutput>(command: &str, data: &T, format: OutputFormat) -> Result<()> {
	let mut stdout = io::stdout().lock();
	write_success(&mut stdout, command, data, format)?;
	stdout.flush()?;
	Ok(())
}

pub(crate) fn write_success<T: Serialize + TextOutput>(
	out: &mut dyn Write,
	command: &str,
	data: &T,
	format: OutputFormat,
) -> Result<()> {
	match format {
		OutputFormat::Json => {
			let json = serde_json::to_string_pretty(&CommandResult::success(command, data))?;
			writeln!(out, "{json}")?;
		}
		OutputFormat::Text => data.write_text(out)?,
	}
	Ok(())
}

/// Reports a failure on stderr and, for JSON output, as an envelope on stdout.
pub fn print_failure(command: &str, error: &CommandError, format: OutputFormat) {
	eprintln!("{} [{}]: {}", "error".red().bold(), error.code, error.message);

	if format == OutputFormat::Json {
		let result: CommandResult<()> = CommandResult::failure(command, error.clone());
		if let Ok(json) = serde_json::to_string_pretty(&result) {
			println!("{json}");
		}
	}
}
