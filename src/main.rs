//! flickstream - find, rank and stream torrent releases
//!
//! # Usage
//!
//! ```bash
//! flickstream streams tt1877830 --quality 1080p
//! flickstream play tt1877830
//! RUST_LOG=flickstream=debug flickstream play "magnet:?xt=urn:btih:..."
//! ```

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flickstream::cli::{Cli, Command, ExitCode, Output};
use flickstream::commands;
use flickstream::config::Config;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = run_cli(cli).await;
    // stdin reads during `play` would otherwise hold the runtime open
    std::process::exit(exit_code.into());
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose {
        "flickstream=debug"
    } else {
        "flickstream=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match &cli.config {
        Some(path) => match Config::load_from(path) {
            Ok(config) => config,
            Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
        },
        None => Config::load(),
    };

    match cli.command {
        Command::Streams(cmd) => commands::streams_cmd(cmd, &config, &output).await,
        Command::Rank(cmd) => commands::rank_cmd(cmd, &config, &output),
        Command::Magnet(cmd) => commands::magnet_cmd(cmd, &output),
        Command::Play(cmd) => commands::play_cmd(cmd, &config, &output).await,
    }
}
