//! Churn MLOps - Main Entry Point

use clap::Parser;
use churn_mlops::cli::{cmd_pipeline, cmd_predict, cmd_serve, cmd_train, cmd_tune, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn=info,churn_mlops=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pipeline { config, input, output } => {
            cmd_pipeline(&config, input.as_deref(), output.as_deref())?;
        }
        Commands::Train { config, model, no_tracking } => {
            cmd_train(&config, model, no_tracking)?;
        }
        Commands::Predict { config, input, output } => {
            cmd_predict(&config, input.as_deref(), output.as_deref())?;
        }
        Commands::Tune { config, output } => {
            cmd_tune(&config, output.as_deref())?;
        }
        Commands::Serve { config, port, host } => {
            cmd_serve(&config, host, port).await?;
        }
    }

    Ok(())
}
