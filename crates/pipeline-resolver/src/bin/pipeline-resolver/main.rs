mod cli;

use anyhow::Context;
use pipeline_resolver::config::ResolverConfig;
use pipeline_resolver::fetch::Credentials;
use pipeline_resolver::platform::Platform;
use pipeline_resolver::resolve::{ResolveOptions, Resolver};
use serde::Serialize;
use std::path::PathBuf;

/// Exit code when the document was resolved but some imports failed
const PARTIAL_FAILURE: i32 = 2;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("PIPELINE_RESOLVER_LOG"))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = change_directories(&cli.directory) {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }

    let command_result = match cli.command {
        cli::Command::Resolve(resolve_cli) => resolve(resolve_cli),
        cli::Command::Sites(sites_cli) => sites(sites_cli),
    };

    match command_result {
        Ok(true) => {}
        Ok(false) => std::process::exit(PARTIAL_FAILURE),
        Err(e) => {
            for error in e.chain() {
                eprintln!("{error}")
            }
            std::process::exit(1);
        }
    }
}

/// `cd` into each directory in turn, later ones relative to earlier ones
fn change_directories(directories: &[PathBuf]) -> anyhow::Result<()> {
    for directory in directories {
        let cwd = directory.canonicalize().with_context(|| {
            format!("Failed to resolve path for -C/--directory {}", directory.display())
        })?;
        std::env::set_current_dir(&cwd)
            .with_context(|| format!("Failed to set work directory to {}", cwd.display()))?;

        tracing::info!(directory=%cwd.display(), "Changed working directory");
    }

    Ok(())
}

/// Returns whether every import resolved
pub fn resolve(cli: cli::ResolveCommand) -> anyhow::Result<bool> {
    let platform = platform(&cli.input)?;

    let config = match &cli.config {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };

    let options = ResolveOptions {
        root: match cli.root {
            Some(root) => root,
            None => std::env::current_dir()?,
        },
        organization: cli.organization,
    };

    let credentials = match (std::env::var("PIPELINE_RESOLVER_TOKEN").ok(), &cli.basic_user) {
        (Some(token), Some(user)) => Some(Credentials::basic(user, &token)),
        (Some(token), None) => Some(Credentials::new(token)),
        (None, _) => None,
    };

    let resolver = Resolver::from_config(&config, options)?;
    let (document, errors) = resolver.resolve_file(&cli.input.file, platform, credentials.as_ref())?;

    output(&cli.output, &document)?;

    let Some(errors) = errors else {
        return Ok(true);
    };

    eprintln!("{errors}");
    Ok(false)
}

pub fn sites(cli: cli::SitesCommand) -> anyhow::Result<bool> {
    let platform = platform(&cli.input)?;
    let bytes = pipeline_resolver::fetch::fetch_local(&cli.input.file)?;
    let document = platform.parse(&bytes)?;

    output(&cli.output, &pipeline_resolver::scan::scan(&document))?;
    Ok(true)
}

fn platform(input: &cli::InputArgs) -> anyhow::Result<Platform> {
    match input.platform {
        Some(platform) => Ok(platform.into()),
        None => Platform::detect(&input.file).ok_or_else(|| {
            anyhow::anyhow!(
                "Unable to tell the platform of {}, use --platform",
                input.file.display()
            )
        }),
    }
}

fn output(output: &cli::OutputArgs, value: &impl Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let error = change_directories(&[missing.clone()]).unwrap_err();
        assert_eq!(
            error.to_string(),
            format!("Failed to resolve path for -C/--directory {}", missing.display())
        );
    }
}
