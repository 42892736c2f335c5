//! Static sandbox presets and the start-up target URL.

use serde::{Deserialize, Serialize};

use crate::protocol::{DEFAULT_TARGET_PARTITION, PartitionKey};

/// Landing page when neither a deck nor a URL is configured.
pub const DEFAULT_SANDBOX_URL: &str = "https://moxfield.com/decks/public";

pub const LOCAL_PARTITION: &str = "persist:local-board";
pub const REMOTE_PARTITION: &str = DEFAULT_TARGET_PARTITION;

/// What a sandbox does with requests to open new windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowOpenPolicy {
	#[default]
	Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
	pub x: i32,
	pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
	pub width: u32,
	pub height: u32,
}

/// Which relay halves the injected bridge runs in a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRole {
	/// Partition that receives this sandbox's board changes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub publish_to: Option<PartitionKey>,
	/// Apply boards forwarded from other sandboxes.
	#[serde(default)]
	pub mirror_incoming: bool,
}

/// One sandbox window, fixed at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxDescriptor {
	pub label: String,
	pub partition: PartitionKey,
	pub relay: RelayRole,
	pub position: Position,
	pub size: Size,
	pub window_open: WindowOpenPolicy,
}

impl SandboxDescriptor {
	pub fn title(&self) -> String {
		format!("Moxfield – {}", self.label)
	}

	/// Decision for a window-open request raised inside the sandbox.
	pub fn window_open_decision(&self, _url: &str) -> WindowOpenPolicy {
		self.window_open
	}
}

/// The local board (publisher) and the remote board (mirror).
pub fn presets() -> Vec<SandboxDescriptor> {
	vec![
		SandboxDescriptor {
			label: "Local Board".into(),
			partition: LOCAL_PARTITION.into(),
			relay: RelayRole {
				publish_to: Some(REMOTE_PARTITION.into()),
				mirror_incoming: false,
			},
			position: Position { x: 0, y: 0 },
			size: Size {
				width: 1280,
				height: 800,
			},
			window_open: WindowOpenPolicy::Deny,
		},
		SandboxDescriptor {
			label: "Remote Board".into(),
			partition: REMOTE_PARTITION.into(),
			relay: RelayRole {
				publish_to: None,
				mirror_incoming: true,
			},
			position: Position { x: 1280, y: 0 },
			size: Size {
				width: 900,
				height: 600,
			},
			window_open: WindowOpenPolicy::Deny,
		},
	]
}

/// Picks the page every sandbox loads: a deck's goldfish view, then an
/// explicit URL, then the public deck list. Blank values count as unset.
pub fn resolve_target_url(deck_id: Option<&str>, url_override: Option<&str>) -> String {
	fn non_blank(v: Option<&str>) -> Option<&str> {
		v.map(str::trim).filter(|v| !v.is_empty())
	}

	if let Some(deck) = non_blank(deck_id) {
		return format!("https://www.moxfield.com/decks/{deck}/goldfish");
	}
	if let Some(url) = non_blank(url_override) {
		return url.to_string();
	}
	DEFAULT_SANDBOX_URL.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deck_id_takes_priority() {
		assert_eq!(
			resolve_target_url(Some("abc123"), Some("https://example.com")),
			"https://www.moxfield.com/decks/abc123/goldfish"
		);
	}

	#[test]
	fn url_override_beats_default() {
		assert_eq!(resolve_target_url(None, Some("https://example.com/x")), "https://example.com/x");
		assert_eq!(resolve_target_url(Some("  "), Some("https://example.com/x")), "https://example.com/x");
	}

	#[test]
	fn surrounding_whitespace_is_trimmed() {
		assert_eq!(
			resolve_target_url(Some(" abc123 "), None),
			"https://www.moxfield.com/decks/abc123/goldfish"
		);
		assert_eq!(resolve_target_url(None, Some("  https://example.com/x\n")), "https://example.com/x");
	}

	#[test]
	fn default_url_when_unset() {
		assert_eq!(resolve_target_url(None, None), DEFAULT_SANDBOX_URL);
		assert_eq!(resolve_target_url(Some(""), Some("")), DEFAULT_SANDBOX_URL);
	}

	#[test]
	fn presets_have_unique_partitions_and_deny_popups() {
		let presets = presets();
		assert_eq!(presets.len(), 2);
		assert_ne!(presets[0].partition, presets[1].partition);
		assert!(presets
			.iter()
			.all(|p| p.window_open_decision("https://example.com") == WindowOpenPolicy::Deny));
	}

	#[test]
	fn local_board_publishes_to_remote_board() {
		let presets = presets();
		assert_eq!(presets[0].relay.publish_to, Some(presets[1].partition.clone()));
		assert!(presets[1].relay.mirror_incoming);
		assert_eq!(presets[1].title(), "Moxfield – Remote Board");
	}
}
