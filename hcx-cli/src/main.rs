use anyhow::Result;
use clap::Parser;

use hcx_cli::{commands, Cli};
use logger_redacted::{init_tracing, LoggerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Warnings only unless verbose
    let logger = LoggerConfig {
        log_level: if cli.verbose { "debug" } else { "warn" }.to_string(),
        ..LoggerConfig::from_env(cli.verbose)
    };
    init_tracing(&logger, "hcx_cli={level},insurance_service={level}")?;

    let mut stdout = std::io::stdout().lock();
    commands::run(cli, &mut stdout).await
}
