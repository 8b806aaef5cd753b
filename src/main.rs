use clap::Parser;
use ordo::cli::commands::Cli;
use ordo::cli::handlers;
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr so --json output stays parseable
    let filter = EnvFilter::try_from_env("ORDO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
