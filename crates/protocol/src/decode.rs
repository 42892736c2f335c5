//! Two-stage decoder for the application's persisted board state.
//!
//! The stored value is historically base64 of a JSON document, but real
//! entries have been seen with stray bytes before and after the document.
//! [`decode_state`] therefore runs:
//!
//! 1. a strict pass: standard base64, UTF-8, JSON;
//! 2. a recovery pass: lenient base64, lossy UTF-8, then the outermost
//!    `{`..`}` span, then each balanced top-level `{...}` window in order.
//!
//! The result says which pass produced the value so callers can tell clean
//! data from salvaged data.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use serde_json::Value;
use thiserror::Error;

/// Upper bound on balanced windows tried during recovery.
pub const MAX_RECOVERY_WINDOWS: usize = 64;

const LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::STANDARD,
	GeneralPurposeConfig::new()
		.with_decode_padding_mode(DecodePaddingMode::Indifferent)
		.with_decode_allow_trailing_bits(true),
);

/// A successfully decoded state document.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedState {
	/// The stored value decoded cleanly.
	Strict(Value),
	/// The value was salvaged from a noisy payload.
	Recovered(Value),
}

impl DecodedState {
	pub fn value(&self) -> &Value {
		match self {
			Self::Strict(v) | Self::Recovered(v) => v,
		}
	}

	pub fn into_value(self) -> Value {
		match self {
			Self::Strict(v) | Self::Recovered(v) => v,
		}
	}

	pub fn is_recovered(&self) -> bool {
		matches!(self, Self::Recovered(_))
	}

	/// `"strict"` or `"recovered"`.
	pub fn stage(&self) -> &'static str {
		match self {
			Self::Strict(_) => "strict",
			Self::Recovered(_) => "recovered",
		}
	}
}

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("stored value is empty")]
	Empty,

	#[error("stored value is not base64: {0}")]
	Base64(#[from] base64::DecodeError),

	#[error("no JSON object could be recovered from the decoded payload")]
	NoObject,
}

/// Decodes a stored board value.
pub fn decode_state(raw: &str) -> Result<DecodedState, DecodeError> {
	if raw.is_empty() {
		return Err(DecodeError::Empty);
	}

	if let Ok(bytes) = STANDARD.decode(raw) {
		if let Ok(text) = std::str::from_utf8(&bytes) {
			if let Ok(value) = serde_json::from_str(text) {
				return Ok(DecodedState::Strict(value));
			}
		}
	}

	let bytes = lenient_base64(raw)?;
	let text = String::from_utf8_lossy(&bytes);
	recover_object(&text)
		.map(DecodedState::Recovered)
		.ok_or(DecodeError::NoObject)
}

/// Parses already-decoded text, falling back to window recovery.
pub fn parse_permissive(text: &str) -> Result<DecodedState, DecodeError> {
	if let Ok(value) = serde_json::from_str(text) {
		return Ok(DecodedState::Strict(value));
	}
	recover_object(text)
		.map(DecodedState::Recovered)
		.ok_or(DecodeError::NoObject)
}

/// Decodes base64 the way browsers and Node tolerate it: characters outside
/// the alphabet are skipped, URL-safe digits are accepted, padding is
/// optional and a dangling sextet is dropped.
fn lenient_base64(raw: &str) -> Result<Vec<u8>, DecodeError> {
	let mut cleaned: String = raw
		.chars()
		.filter_map(|c| match c {
			'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' => Some(c),
			'-' => Some('+'),
			'_' => Some('/'),
			_ => None,
		})
		.collect();
	if cleaned.len() % 4 == 1 {
		cleaned.pop();
	}
	Ok(LENIENT.decode(cleaned)?)
}

fn recover_object(text: &str) -> Option<Value> {
	if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
		if end > start {
			if let Ok(value) = serde_json::from_str(&text[start..=end]) {
				return Some(value);
			}
		}
	}

	balanced_windows(text)
		.into_iter()
		.take(MAX_RECOVERY_WINDOWS)
		.find_map(|window| serde_json::from_str(window).ok())
}

/// Top-level `{...}` spans with balanced braces. Quotes are only tracked
/// inside a span, so stray quotes in leading noise do not derail the scan.
fn balanced_windows(text: &str) -> Vec<&str> {
	let bytes = text.as_bytes();
	let mut windows = Vec::new();
	let mut depth = 0usize;
	let mut start = 0usize;
	let mut in_string = false;
	let mut escaped = false;

	for (i, &b) in bytes.iter().enumerate() {
		if depth == 0 {
			if b == b'{' {
				depth = 1;
				start = i;
				in_string = false;
				escaped = false;
			}
			continue;
		}

		if in_string {
			match b {
				_ if escaped => escaped = false,
				b'\\' => escaped = true,
				b'"' => in_string = false,
				_ => {}
			}
			continue;
		}

		match b {
			b'"' => in_string = true,
			b'{' => depth += 1,
			b'}' => {
				depth -= 1;
				if depth == 0 {
					windows.push(&text[start..=i]);
				}
			}
			_ => {}
		}
	}

	windows
}
