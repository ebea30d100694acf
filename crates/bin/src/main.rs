use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands {
    pub mod info;
    pub mod resolve;
}
mod output;

use cli::{Cli, Commands};
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("docmesh=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(&args).await,
        Commands::Info(args) => {
            let format = if args.json {
                OutputFormat::Json
            } else {
                OutputFormat::Human
            };
            commands::info::run(&args, format).await
        }
    }
}
