use std::path::Path;

use mirror::sandbox::presets;
use tracing::info;

use crate::cli::ServeArgs;
use crate::config::{MirrorConfig, Overrides};
use crate::error::Result;
use crate::server;

pub async fn run(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
	let config = MirrorConfig::load(
		config_path,
		Overrides {
			host: args.host,
			port: args.port,
			..Overrides::default()
		},
	)?;

	info!(url = %config.target_url(), "sandbox target");
	for sandbox in presets() {
		info!(
			label = %sandbox.label,
			partition = %sandbox.partition,
			publish_to = ?sandbox.relay.publish_to.as_ref().map(|p| p.as_str()),
			mirror_incoming = sandbox.relay.mirror_incoming,
			"sandbox preset"
		);
	}

	let listener = server::bind(&config.host, config.port).await?;
	server::serve(listener).await?;
	Ok(())
}
