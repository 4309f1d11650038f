mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ccunpack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bundle { bundle, pipeline } => {
            commands::bundle::handle_bundle(&bundle, &pipeline)?;
        }

        Commands::Batch { root, pipeline } => {
            commands::bundle::handle_batch(&root, &pipeline)?;
        }

        Commands::Atlas(command) => {
            commands::atlas::handle(command)?;
        }

        Commands::Decode { dir, decoder } => {
            commands::decode::handle(&dir, decoder.as_deref())?;
        }

        Commands::Uuid { ids } => {
            commands::uuid::expand(&ids)?;
        }

        Commands::Configure {
            decoder,
            output_root,
            strict,
            show,
        } => {
            commands::configure::handle(decoder, output_root, strict, show)?;
        }
    }

    Ok(())
}
