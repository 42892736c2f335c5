use std::io::{self, Write};

use colored::Colorize;
use mirror::clock::MonotonicClock;
use mirror::find_controller_capability;
use mirror::locator::arena::ArenaGraph;
use mirror::protocol::InstanceStatus;
use serde::Serialize;

use crate::cli::LocateArgs;
use crate::error::Result;
use crate::output::{self, OutputFormat, TextOutput};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocateOutput {
	snapshot: String,
	node_count: usize,
	#[serde(flatten)]
	status: InstanceStatus,
}

impl TextOutput for LocateOutput {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		match &self.status {
			InstanceStatus::Captured {
				duration_ms,
				fibers_checked,
				nodes_visited,
			} => writeln!(
				out,
				"{} after {fibers_checked} fiber roots, {nodes_visited}/{} nodes ({duration_ms}ms)",
				"captured".green().bold(),
				self.node_count
			),
			InstanceStatus::Missing {
				nodes_checked,
				fibers_checked,
				nodes_visited,
				duration_ms,
			} => writeln!(
				out,
				"{}: {nodes_checked} hosts, {fibers_checked} fiber roots, {nodes_visited}/{} nodes ({duration_ms}ms)",
				"missing".red().bold(),
				self.node_count
			),
		}
	}
}

pub fn run(args: LocateArgs, format: OutputFormat) -> Result<()> {
	let graph = ArenaGraph::from_snapshot_file(&args.snapshot)?;
	let located = find_controller_capability(&graph, &MonotonicClock::default());

	let result = LocateOutput {
		snapshot: args.snapshot.display().to_string(),
		node_count: graph.node_count(),
		status: located.status(),
	};
	output::print_success("locate", &result, format)
}
