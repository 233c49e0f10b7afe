mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::process::ExitCode;

use clipfetch::api::{self, AppState};
use clipfetch::config::Config;
use clipfetch::observability;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    observability::init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve(args) => {
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            if let Some(data_dir) = args.data_dir {
                config.server.data_dir = data_dir;
            }
            api::run(AppState::from_config(config)).await?;
        }
        Commands::Info(args) => cli::info(AppState::from_config(config), args).await?,
        Commands::Download(args) => {
            if !cli::download(AppState::from_config(config), args).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config => print!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(ExitCode::SUCCESS)
}
