use clap::Parser;
use dstools_cli::args::OutputFormat;
use dstools_cli::{execute, output, Cli};
use dstools_core::{ErrorMetadata, Settings};
use dstools_storage::UnifiedDispatcher;
use std::process::ExitCode;

/// Settings could not be loaded; same code as a validation error.
const EXIT_BAD_SETTINGS: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_BAD_SETTINGS);
        }
    };

    // Results go to stdout; keep stderr quiet unless asked.
    let log_level = if cli.verbose {
        settings.log_level.as_str()
    } else {
        "warn"
    };
    if let Err(e) = dstools_infra::init_telemetry(log_level, settings.log_format) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let format = cli.output;
    match execute(cli.command, format, &UnifiedDispatcher::new(), &settings).await {
        Ok(outcome) => {
            println!("{}", outcome.stdout);
            ExitCode::from(outcome.exit_code as u8)
        }
        Err(e) => {
            match format {
                OutputFormat::Text => eprintln!("{}", output::error_text(&e)),
                OutputFormat::Json => println!("{}", output::error_json(&e)),
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
