use board_mirror_cli::cli::Cli;
use board_mirror_cli::{commands, logging, output};
use clap::Parser;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = cli.command.name();

	if let Err(err) = commands::dispatch(cli).await {
		output::print_failure(command, &err.to_command_error(), format);
		std::process::exit(1);
	}
}
