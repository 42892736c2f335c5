use std::io::{self, Write};
use std::path::Path;

use colored::Colorize;
use mirror::sandbox::presets;
use mirror::{RelayTuning, SandboxDescriptor};
use serde::Serialize;

use crate::cli::SandboxesArgs;
use crate::config::{MirrorConfig, Overrides};
use crate::error::Result;
use crate::output::{self, OutputFormat, TextOutput};

/// What a window host needs to open the sandboxes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchPlan {
	target_url: String,
	coordinator_url: String,
	tuning: RelayTuning,
	sandboxes: Vec<SandboxPlan>,
}

#[derive(Debug, Serialize)]
struct SandboxPlan {
	title: String,
	#[serde(flatten)]
	descriptor: SandboxDescriptor,
}

impl TextOutput for LaunchPlan {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		writeln!(out, "{} {}", "target:".bold(), self.target_url)?;
		writeln!(out, "{} {}", "coordinator:".bold(), self.coordinator_url)?;
		writeln!(
			out,
			"{} poll {}ms, find retry {}ms",
			"tuning:".bold(),
			self.tuning.poll_interval_ms,
			self.tuning.find_retry_ms
		)?;
		for plan in &self.sandboxes {
			let d = &plan.descriptor;
			let role = match (&d.relay.publish_to, d.relay.mirror_incoming) {
				(Some(target), _) => format!("publishes to {target}"),
				(None, true) => "mirrors incoming".to_string(),
				(None, false) => "no relay".to_string(),
			};
			writeln!(
				out,
				"  {} {} at ({}, {}) {}x{}, {}",
				plan.title.green(),
				d.partition.to_string().cyan(),
				d.position.x,
				d.position.y,
				d.size.width,
				d.size.height,
				role
			)?;
		}
		Ok(())
	}
}

pub fn run(args: SandboxesArgs, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
	let config = MirrorConfig::load(
		config_path,
		Overrides {
			deck_id: args.deck_id,
			url: args.url,
			..Overrides::default()
		},
	)?;

	let plan = LaunchPlan {
		target_url: config.target_url(),
		coordinator_url: config.coordinator_url(),
		tuning: config.tuning,
		sandboxes: presets()
			.into_iter()
			.map(|descriptor| SandboxPlan {
				title: descriptor.title(),
				descriptor,
			})
			.collect(),
	};

	output::print_success("sandboxes", &plan, format)
}
