//! pipeline-resolver cli interface

use clap::{Parser, Subcommand, ValueEnum};
use pipeline_resolver::platform::Platform;
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; pipeline-resolver ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve all imports of a pipeline file and print the merged document
    ///
    /// Credentials for remote repositories are read from PIPELINE_RESOLVER_TOKEN.
    Resolve(ResolveCommand),

    /// List the import sites of a pipeline file without resolving them
    Sites(SitesCommand),
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Repository root local imports are resolved against
    ///
    /// Defaults to the work directory.
    #[clap(short = 'r', long = "root")]
    pub root: Option<PathBuf>,

    /// Resolver configuration (yaml or json)
    #[clap(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Azure DevOps organization of the pipeline's repository
    #[clap(short = 'o', long = "organization")]
    pub organization: Option<String>,

    /// Encode PIPELINE_RESOLVER_TOKEN as `user:token` for basic auth
    #[clap(short = 'u', long = "basic-user")]
    pub basic_user: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SitesCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Pipeline file
    pub file: PathBuf,

    /// Pipeline dialect, guessed from the file name when absent
    #[arg(short = 'p', long = "platform")]
    pub platform: Option<PlatformArg>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PlatformArg {
    Github,
    Azure,
    Gitlab,
    Bitbucket,
}

impl From<PlatformArg> for Platform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Github => Platform::GitHub,
            PlatformArg::Azure => Platform::Azure,
            PlatformArg::Gitlab => Platform::GitLab,
            PlatformArg::Bitbucket => Platform::Bitbucket,
        }
    }
}
