use std::fs;
use std::io::{self, Write};

use colored::Colorize;
use mirror::protocol::{PartitionKey, decode_state};
use mirror::{BlobAccessor, FileStore};
use serde::Serialize;
use serde_json::Value;

use crate::cli::DecodeArgs;
use crate::error::{MirrorError, Result};
use crate::output::{self, OutputFormat, TextOutput};

#[derive(Debug, Serialize)]
struct DecodeReport {
	source: String,
	length: usize,
	stage: &'static str,
	state: Value,
}

impl TextOutput for DecodeReport {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		let stage = match self.stage {
			"strict" => self.stage.green(),
			other => other.yellow(),
		};
		writeln!(out, "{} {} ({} chars, {stage})", "source:".bold(), self.source, self.length)?;
		let pretty = serde_json::to_string_pretty(&self.state).map_err(io::Error::other)?;
		writeln!(out, "{pretty}")
	}
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> Result<()> {
	let (source, raw) = read_input(args)?;
	let decoded = decode_state(&raw).map_err(mirror::Error::from)?;

	let report = DecodeReport {
		source,
		length: raw.len(),
		stage: decoded.stage(),
		state: decoded.into_value(),
	};
	output::print_success("decode", &report, format)
}

fn read_input(args: DecodeArgs) -> Result<(String, String)> {
	if let Some(value) = args.value {
		return Ok(("argument".to_string(), value));
	}
	if let Some(path) = args.file {
		let content = fs::read_to_string(&path)?;
		return Ok((path.display().to_string(), content.trim().to_string()));
	}
	if let (Some(root), Some(partition)) = (args.store, args.partition) {
		let partition = PartitionKey::from(partition);
		let store = FileStore::new(&root, &partition);
		let source = store.path().display().to_string();
		let accessor = BlobAccessor::new(store);
		return match accessor.read() {
			Some(blob) => Ok((source, blob.into_string())),
			None => Err(MirrorError::NoState(source)),
		};
	}
	Err(MirrorError::Config("nothing to decode".into()))
}
