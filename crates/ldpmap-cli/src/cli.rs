use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ldpmap",
    about = "ldpmap: objects and files on an LDP repository",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true, env = "LDPMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Repository host, e.g. http://localhost:8983
    #[arg(long, global = true, env = "LDPMAP_HOST")]
    pub host: Option<String>,

    /// Base path below the host, e.g. /fedora/rest
    #[arg(long, global = true, env = "LDPMAP_BASE_PATH")]
    pub base_path: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "LDPMAP_TIMEOUT")]
    pub timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show size, type and name of a stored file without downloading it
    Head(TargetArgs),
    /// Download a stored file
    Get(GetArgs),
    /// Attach a local file to an object, creating the object if needed
    Put(PutArgs),
    /// Store a local file as a standalone resource
    Upload(UploadArgs),
    /// List the files attached to an object
    List(TargetArgs),
    /// Delete a file, or an object with all its files
    Delete(DeleteArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

/// A resource given as an absolute URI or as a path below the base URI
/// (`1234` or `1234/DS1`).
#[derive(Args)]
pub struct TargetArgs {
    pub target: String,
}

#[derive(Args)]
pub struct GetArgs {
    pub target: String,
    /// Write to this path instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct PutArgs {
    /// Object id or URI
    pub object: String,
    pub path: PathBuf,
    /// File key; allocated under --prefix when omitted
    #[arg(long)]
    pub dsid: Option<String>,
    #[arg(long, conflicts_with = "dsid")]
    pub prefix: Option<String>,
    #[command(flatten)]
    pub describe: DescribeArgs,
}

#[derive(Args)]
pub struct UploadArgs {
    pub path: PathBuf,
    #[command(flatten)]
    pub describe: DescribeArgs,
}

#[derive(Args)]
pub struct DescribeArgs {
    /// MIME type sent with the content
    #[arg(long)]
    pub mime: Option<String>,
    /// Original file name; defaults to the local file name
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub target: String,
    /// Treat the target as an object and delete its files with it
    #[arg(long)]
    pub object: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Ignore the config file and overrides
    #[arg(long)]
    pub default: bool,
}
