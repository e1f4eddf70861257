use clap::Parser;
use console::{Style, Term};

use std::error::Error;

mod args;
use crate::commands::*;
use crate::errors::AppError;
use crate::pipeline::RunOutcome;
use args::*;

mod reporter;

mod devices;

mod errors;

mod commands;

mod uploaders;

mod extractors;

mod pipeline;

pub type AppResult<T> = Result<T, AppError>;

mod common_types;

pub fn config_env_var(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|e| format!("{}: {}", name, e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let term = Term::stdout();
    let bold_style = Style::new().bold();

    term.write_line(
        format!(
            "{} v{}",
            bold_style.clone().green().apply_to("Snaptext"),
            bold_style.apply_to(env!("CARGO_PKG_VERSION"))
        )
        .as_str(),
    )?;

    let cli = CliArgs::parse();
    if let Err(err) = handle_args(cli, &term).await {
        term.write_line(
            format!(
                "{}: {}\nDetails: {:?}",
                bold_style.clone().red().apply_to("Error"),
                err,
                err.source()
            )
            .as_str(),
        )?;
    }

    Ok(())
}

async fn handle_args(cli: CliArgs, term: &Term) -> AppResult<()> {
    let bold_style = Style::new().bold();

    match cli.command {
        CliCommand::Scan {
            source,
            copy,
            service_args,
        } => {
            let options = ScanCommandOptions::new(service_args.try_into()?, copy);
            let scan_result = command_scan(term, &source, options).await?;
            match scan_result.outcome {
                RunOutcome::Succeeded(text) => {
                    term.write_line(
                        format!(
                            "{} {} characters extracted.",
                            bold_style.clone().green().apply_to("✓ Done."),
                            bold_style.clone().apply_to(text.chars().count()),
                        )
                        .as_str(),
                    )?;
                }
                RunOutcome::Failed(failure) => {
                    term.write_line(
                        format!("{} {}", bold_style.clone().red().apply_to("✗"), failure)
                            .as_str(),
                    )?;
                }
                RunOutcome::Cancelled => {
                    term.write_line(
                        format!("{}", Style::new().yellow().apply_to("Scan cancelled."))
                            .as_str(),
                    )?;
                }
            }
        }
    }

    Ok(())
}
