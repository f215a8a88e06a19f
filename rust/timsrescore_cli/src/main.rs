mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use std::time::Instant;
use tabled::Table;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), errors::CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    // Parse command line arguments
    let args = Cli::parse();

    // Load the configuration, command line arguments win over the file
    let config = match args.config.as_ref() {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = config.with_cli_args(args)?;
    info!("Parsed configuration: {:#?}", config);

    let output_config = match config.output {
        Some(ref x) => x.clone(),
        None => {
            return Err(errors::CliError::Config {
                source: "No output directory provided".to_string(),
            });
        }
    };

    // Create output directory
    if let Err(e) = std::fs::create_dir_all(&output_config.directory) {
        return Err(errors::CliError::Io {
            source: e.to_string(),
            path: Some(output_config.directory.to_string_lossy().to_string()),
        });
    }

    let start = Instant::now();
    let summary = processing::process_pins(&config.input, &config.analysis, &output_config)?;
    println!("{}", Table::new(summary));
    println!("Finished rescoring in {:?}", start.elapsed());

    Ok(())
}
