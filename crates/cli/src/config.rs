//! Layered configuration for the CLI.
//!
//! Built-in defaults, then the optional JSON config file, then the
//! environment, then command-line flags. Each layer only overrides the
//! fields it sets.

use std::fs;
use std::path::{Path, PathBuf};

use mirror::RelayTuning;
use mirror::protocol::{COORDINATOR_HOST, COORDINATOR_PORT, STATE_UPDATE_CHANNEL};
use mirror::sandbox::resolve_target_url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MirrorError, Result};

pub const DECK_ID_ENV: &str = "MOXFIELD_DECK_ID";
pub const PLAYTEST_URL_ENV: &str = "MOXFIELD_PLAYTEST_URL";

/// On-disk config file shape; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
	pub host: Option<String>,
	pub port: Option<u16>,
	pub poll_interval_ms: Option<u64>,
	pub find_retry_ms: Option<u64>,
	pub deck_id: Option<String>,
	pub url: Option<String>,
}

/// Values given as flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub host: Option<String>,
	pub port: Option<u16>,
	pub deck_id: Option<String>,
	pub url: Option<String>,
}

/// Effective configuration after all layers are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
	pub host: String,
	pub port: u16,
	pub tuning: RelayTuning,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub deck_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
}

impl Default for MirrorConfig {
	fn default() -> Self {
		Self {
			host: COORDINATOR_HOST.to_string(),
			port: COORDINATOR_PORT,
			tuning: RelayTuning::default(),
			deck_id: None,
			url: None,
		}
	}
}

impl MirrorConfig {
	/// Loads the config file (explicit path or the default location) and
	/// merges it with the process environment and `flags`.
	pub fn load(path: Option<&Path>, flags: Overrides) -> Result<Self> {
		let file = match path {
			Some(path) => Some(read_file(path)?.ok_or_else(|| {
				MirrorError::Config(format!("config file {} does not exist", path.display()))
			})?),
			None => match default_config_path() {
				Some(path) => read_file(&path)?,
				None => None,
			},
		};
		Self::resolve(file, |name| std::env::var(name).ok(), flags)
	}

	/// Merges the layers. `env` looks up an environment variable by name.
	pub fn resolve(file: Option<FileConfig>, env: impl Fn(&str) -> Option<String>, flags: Overrides) -> Result<Self> {
		let mut config = Self::default();

		if let Some(file) = file {
			config.host = file.host.unwrap_or(config.host);
			config.port = file.port.unwrap_or(config.port);
			if let Some(ms) = file.poll_interval_ms {
				config.tuning.poll_interval_ms = ms;
			}
			if let Some(ms) = file.find_retry_ms {
				config.tuning.find_retry_ms = ms;
			}
			config.deck_id = file.deck_id;
			config.url = file.url;
		}

		let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
		if let Some(deck_id) = env(DECK_ID_ENV) {
			config.deck_id = Some(deck_id);
		}
		if let Some(url) = env(PLAYTEST_URL_ENV) {
			config.url = Some(url);
		}

		config.host = flags.host.unwrap_or(config.host);
		config.port = flags.port.unwrap_or(config.port);
		if flags.deck_id.is_some() {
			config.deck_id = flags.deck_id;
		}
		if flags.url.is_some() {
			config.url = flags.url;
		}

		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		if self.host.trim().is_empty() {
			return Err(MirrorError::Config("host must not be empty".into()));
		}
		if self.tuning.poll_interval_ms == 0 {
			return Err(MirrorError::Config("pollIntervalMs must be positive".into()));
		}
		if self.tuning.find_retry_ms == 0 {
			return Err(MirrorError::Config("findRetryMs must be positive".into()));
		}
		if let Some(raw) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
			let url = url::Url::parse(raw.trim())
				.map_err(|err| MirrorError::Config(format!("invalid URL override {raw:?}: {err}")))?;
			if !matches!(url.scheme(), "http" | "https") {
				return Err(MirrorError::Config(format!("URL override {raw:?} must be http or https")));
			}
		}
		Ok(())
	}

	/// Page every sandbox loads.
	pub fn target_url(&self) -> String {
		resolve_target_url(self.deck_id.as_deref(), self.url.as_deref())
	}

	/// Address sandbox relays connect to.
	pub fn coordinator_url(&self) -> String {
		format!("ws://{}:{}/{STATE_UPDATE_CHANNEL}", self.host, self.port)
	}
}

/// `$XDG_CONFIG_HOME/board-mirror/config.json`, falling back to the platform
/// config directory.
pub fn default_config_path() -> Option<PathBuf> {
	std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.filter(|p| p.is_absolute())
		.or_else(dirs::config_dir)
		.map(|dir| dir.join("board-mirror").join("config.json"))
}

/// Reads a config file; a missing file is `None`, a malformed one an error.
fn read_file(path: &Path) -> Result<Option<FileConfig>> {
	let content = match fs::read_to_string(path) {
		Ok(content) => content,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(err) => return Err(err.into()),
	};
	debug!(path = %path.display(), "loaded config file");
	serde_json::from_str(&content)
		.map(Some)
		.map_err(|err| MirrorError::Config(format!("{}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn no_env(_: &str) -> Option<String> {
		None
	}

	#[test]
	fn defaults_without_any_layer() {
		let config = MirrorConfig::resolve(None, no_env, Overrides::default()).unwrap();
		assert_eq!(config, MirrorConfig::default());
		assert_eq!(config.coordinator_url(), "ws://127.0.0.1:19989/state-update");
		assert_eq!(config.target_url(), "https://moxfield.com/decks/public");
	}

	#[test]
	fn layers_override_in_order() {
		let file = FileConfig {
			host: Some("0.0.0.0".into()),
			port: Some(20000),
			poll_interval_ms: Some(250),
			deck_id: Some("from-file".into()),
			..FileConfig::default()
		};
		let env: HashMap<&str, &str> = [(DECK_ID_ENV, "from-env")].into();
		let flags = Overrides {
			port: Some(20001),
			..Overrides::default()
		};

		let config = MirrorConfig::resolve(Some(file), |k| env.get(k).map(|v| v.to_string()), flags).unwrap();

		assert_eq!(config.host, "0.0.0.0");
		assert_eq!(config.port, 20001);
		assert_eq!(config.tuning.poll_interval_ms, 250);
		assert_eq!(config.tuning.find_retry_ms, 1000);
		assert_eq!(config.deck_id.as_deref(), Some("from-env"));
	}

	#[test]
	fn flags_beat_environment() {
		let env: HashMap<&str, &str> = [(PLAYTEST_URL_ENV, "https://env.example/x")].into();
		let flags = Overrides {
			url: Some("https://flag.example/y".into()),
			..Overrides::default()
		};

		let config = MirrorConfig::resolve(None, |k| env.get(k).map(|v| v.to_string()), flags).unwrap();
		assert_eq!(config.target_url(), "https://flag.example/y");
	}

	#[test]
	fn blank_environment_is_unset() {
		let env: HashMap<&str, &str> = [(DECK_ID_ENV, "  ")].into();
		let config = MirrorConfig::resolve(None, |k| env.get(k).map(|v| v.to_string()), Overrides::default()).unwrap();
		assert_eq!(config.deck_id, None);
	}

	#[test]
	fn rejects_relative_url() {
		let flags = Overrides {
			url: Some("decks/public".into()),
			..Overrides::default()
		};
		let err = MirrorConfig::resolve(None, no_env, flags).unwrap_err();
		assert!(matches!(err, MirrorError::Config(_)), "{err}");
	}

	#[test]
	fn rejects_zero_interval() {
		let file = FileConfig {
			find_retry_ms: Some(0),
			..FileConfig::default()
		};
		assert!(MirrorConfig::resolve(Some(file), no_env, Overrides::default()).is_err());
	}

	#[test]
	fn missing_file_is_not_an_error() {
		let dir = tempfile::tempdir().unwrap();
		assert_eq!(read_file(&dir.path().join("config.json")).unwrap(), None);
	}

	#[test]
	fn reads_camel_case_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(&path, r#"{"port": 4000, "findRetryMs": 50}"#).unwrap();

		let file = read_file(&path).unwrap().unwrap();
		assert_eq!(file.port, Some(4000));
		assert_eq!(file.find_retry_ms, Some(50));
	}

	#[test]
	fn malformed_file_is_a_config_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(&path, "{ not json").unwrap();
		assert!(matches!(read_file(&path), Err(MirrorError::Config(_))));
	}

	#[test]
	fn explicit_missing_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = MirrorConfig::load(Some(&dir.path().join("absent.json")), Overrides::default()).unwrap_err();
		assert!(matches!(err, MirrorError::Config(_)));
	}
}
