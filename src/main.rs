mod cli;
mod commands;
mod error;
mod extractor;
mod license;
mod mcp;
mod page_range;
mod pdf;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, LicenseArgs};
use error::{exit_code_for, SectionError};
use license::{FromEnvironment, FromPrompt, FromSecretStore, FromValue, License, LicenseSource};
use page_range::PageRange;
use std::io::IsTerminal;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version come through here as well
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(SectionError::ArgumentInvalid(String::new()).exit_code())
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli, FromEnvironment::default()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run(cli: Cli, env: FromEnvironment) -> Result<()> {
    match cli.command {
        Commands::Section {
            path,
            from,
            till,
            output,
        } => {
            let license = provision_license(&cli.license, env, true)?;
            let range = PageRange::new(from, till);
            commands::section::run(&license, &path, range, output.as_deref())?;
        }
        Commands::Info { path } => {
            commands::info::run(&path)?;
        }
        Commands::Mcp => {
            // stdio carries the protocol, so never prompt here
            let license = provision_license(&cli.license, env, false)?;
            mcp::run_server(license).await?;
        }
    }

    Ok(())
}

/// Resolve and register the license key once, before any licensed work.
fn provision_license(
    args: &LicenseArgs,
    env: FromEnvironment,
    interactive: bool,
) -> Result<License, SectionError> {
    let mut sources = license_sources(args, env, interactive);
    License::register(license::resolve(&mut sources)?)
}

/// Sources in lookup order: flag, environment, license file, prompt.
fn license_sources(
    args: &LicenseArgs,
    env: FromEnvironment,
    interactive: bool,
) -> Vec<Box<dyn LicenseSource>> {
    let store = args
        .license_file
        .clone()
        .or_else(FromSecretStore::default_path)
        .map(FromSecretStore::new);

    let mut sources: Vec<Box<dyn LicenseSource>> = vec![
        Box::new(FromValue(args.license_key.clone())),
        Box::new(env),
    ];
    if let Some(store) = &store {
        sources.push(Box::new(store.clone()));
    }
    if interactive && !args.no_prompt && std::io::stdin().is_terminal() {
        sources.push(Box::new(FromPrompt::new(
            std::io::stdin().lock(),
            std::io::stderr(),
            store,
        )));
    }
    sources
}
