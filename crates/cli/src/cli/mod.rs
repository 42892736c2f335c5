#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Mirror a board between two sandboxed browser sessions.
#[derive(Parser, Debug)]
#[command(name = "board-mirror")]
#[command(about = "Coordinator and diagnostics for mirrored playtest boards")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Config file (default: $XDG_CONFIG_HOME/board-mirror/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the coordinator that routes board changes between sandboxes.
	Serve(ServeArgs),
	/// Print the sandbox launch plan for a window host.
	Sandboxes(SandboxesArgs),
	/// Decode a stored board value.
	Decode(DecodeArgs),
	/// Run the instance locator over a render-graph snapshot.
	Locate(LocateArgs),
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Serve(_) => "serve",
			Commands::Sandboxes(_) => "sandboxes",
			Commands::Decode(_) => "decode",
			Commands::Locate(_) => "locate",
		}
	}
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
	/// Address to listen on
	#[arg(long, value_name = "HOST")]
	pub host: Option<String>,

	/// Port to listen on
	#[arg(long, value_name = "PORT")]
	pub port: Option<u16>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SandboxesArgs {
	/// Load this deck's goldfish view (overrides MOXFIELD_DECK_ID)
	#[arg(long, value_name = "ID")]
	pub deck_id: Option<String>,

	/// Load this page instead (overrides MOXFIELD_PLAYTEST_URL)
	#[arg(long, value_name = "URL")]
	pub url: Option<String>,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("input").required(true).args(["value", "file", "store"])))]
pub struct DecodeArgs {
	/// Stored value as found in the save-state slot
	#[arg(value_name = "VALUE")]
	pub value: Option<String>,

	/// Read the stored value from a file
	#[arg(long, value_name = "PATH")]
	pub file: Option<PathBuf>,

	/// Read from a partition store rooted at this directory
	#[arg(long, value_name = "DIR", requires = "partition")]
	pub store: Option<PathBuf>,

	/// Partition key inside the store, e.g. persist:remote-board
	#[arg(long, value_name = "KEY", requires = "store")]
	pub partition: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LocateArgs {
	/// JSON render-graph snapshot
	#[arg(long, value_name = "FILE")]
	pub snapshot: PathBuf,
}
