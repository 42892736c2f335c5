use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_serve_defaults() {
	let cli = Cli::try_parse_from(["board-mirror", "serve"]).unwrap();

	match cli.command {
		Commands::Serve(args) => {
			assert_eq!(args.host, None);
			assert_eq!(args.port, None);
		}
		_ => panic!("Expected Serve command"),
	}
	assert_eq!(cli.format, OutputFormat::Text);
}

#[test]
fn parse_serve_with_address() {
	let cli = Cli::try_parse_from(["board-mirror", "serve", "--host", "0.0.0.0", "--port", "20000"]).unwrap();

	match cli.command {
		Commands::Serve(args) => {
			assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
			assert_eq!(args.port, Some(20000));
		}
		_ => panic!("Expected Serve command"),
	}
}

#[test]
fn parse_sandboxes_overrides() {
	let cli = Cli::try_parse_from(["board-mirror", "sandboxes", "--deck-id", "abc", "--url", "https://example.com"]).unwrap();

	match cli.command {
		Commands::Sandboxes(args) => {
			assert_eq!(args.deck_id.as_deref(), Some("abc"));
			assert_eq!(args.url.as_deref(), Some("https://example.com"));
		}
		_ => panic!("Expected Sandboxes command"),
	}
}

#[test]
fn parse_decode_value() {
	let cli = Cli::try_parse_from(["board-mirror", "decode", "eyJhIjoxfQ=="]).unwrap();

	match cli.command {
		Commands::Decode(args) => {
			assert_eq!(args.value.as_deref(), Some("eyJhIjoxfQ=="));
			assert_eq!(args.file, None);
		}
		_ => panic!("Expected Decode command"),
	}
}

#[test]
fn parse_decode_store() {
	let cli = Cli::try_parse_from([
		"board-mirror",
		"decode",
		"--store",
		"/tmp/partitions",
		"--partition",
		"persist:remote-board",
	])
	.unwrap();

	match cli.command {
		Commands::Decode(args) => {
			assert_eq!(args.store, Some(PathBuf::from("/tmp/partitions")));
			assert_eq!(args.partition.as_deref(), Some("persist:remote-board"));
		}
		_ => panic!("Expected Decode command"),
	}
}

#[test]
fn decode_requires_an_input() {
	assert!(Cli::try_parse_from(["board-mirror", "decode"]).is_err());
}

#[test]
fn decode_inputs_are_exclusive() {
	assert!(Cli::try_parse_from(["board-mirror", "decode", "abc", "--file", "x.txt"]).is_err());
}

#[test]
fn decode_store_requires_partition() {
	assert!(Cli::try_parse_from(["board-mirror", "decode", "--store", "/tmp"]).is_err());
}

#[test]
fn locate_requires_snapshot() {
	assert!(Cli::try_parse_from(["board-mirror", "locate"]).is_err());

	let cli = Cli::try_parse_from(["board-mirror", "locate", "--snapshot", "graph.json"]).unwrap();
	match cli.command {
		Commands::Locate(args) => assert_eq!(args.snapshot, PathBuf::from("graph.json")),
		_ => panic!("Expected Locate command"),
	}
}

#[test]
fn verbose_and_format_are_global() {
	let cli = Cli::try_parse_from(["board-mirror", "sandboxes", "-vv", "-f", "json"]).unwrap();
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.format, OutputFormat::Json);
	assert_eq!(cli.command.name(), "sandboxes");
}

#[test]
fn unknown_format_is_rejected() {
	assert!(Cli::try_parse_from(["board-mirror", "-f", "yaml", "sandboxes"]).is_err());
}
