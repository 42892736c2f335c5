//! Command implementations, one module per subcommand.

mod decode;
mod locate;
mod sandboxes;
mod serve;

use crate::cli::{Cli, Commands};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let Cli {
		format,
		config,
		command,
		..
	} = cli;
	let config = config.as_deref();

	match command {
		Commands::Serve(args) => serve::run(args, config).await,
		Commands::Sandboxes(args) => sandboxes::run(args, config, format),
		Commands::Decode(args) => decode::run(args, format),
		Commands::Locate(args) => locate::run(args, format),
	}
}
