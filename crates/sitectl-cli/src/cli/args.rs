use clap::{Args, Parser, Subcommand};
use sitectl_core::auth::{TagAlgorithm, DEFAULT_WINDOW_SECS};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sitectl",
    version,
    about = "Authenticated single-shot command endpoint for a managed site"
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the endpoint over HTTP
    Serve(ServeArgs),
    /// Run one request locally and print the reply
    Exec(ExecArgs),
    /// Write a config with a fresh secret
    Provision(ProvisionArgs),
    /// Compute the tag for a counter value
    Tag(TagArgs),
    /// Search and replace across the site's tables
    Rewrite(RewriteArgs),
    /// Show the credential state and validity window
    Status(StatusArgs),
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    /// Endpoint config file
    #[arg(long, default_value = "sitectl.yaml", env = "SITECTL_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Authentication tag for the current counter
    #[arg(long)]
    pub tag: Option<String>,

    /// Command line, e.g. `ping` or `optget:siteurl`
    pub command: Option<String>,

    /// Set the debug flag on the request
    #[arg(long)]
    pub debug: bool,
}

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Where to write the config
    #[arg(long, default_value = "sitectl.yaml", env = "SITECTL_CONFIG")]
    pub config: PathBuf,

    /// Root of the managed site
    #[arg(long, default_value = ".")]
    pub site_root: PathBuf,

    /// SQLite database of the managed site
    #[arg(long, default_value = "site.db")]
    pub database: PathBuf,

    #[arg(long, default_value = sitectl_core::config::DEFAULT_TABLE_PREFIX)]
    pub table_prefix: String,

    /// Validity window in seconds, starting now
    #[arg(long, default_value_t = DEFAULT_WINDOW_SECS)]
    pub window_secs: u64,

    /// Tag digest: md5 or sha256
    #[arg(long, default_value = "md5")]
    pub algorithm: TagAlgorithm,

    /// Create the application tables in the database
    #[arg(long)]
    pub install_schema: bool,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct TagArgs {
    /// Shared secret
    #[arg(long, env = "SITECTL_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Counter value the endpoint currently holds
    #[arg(long, default_value_t = 0)]
    pub counter: i64,

    /// Tag digest: md5 or sha256
    #[arg(long, default_value = "md5")]
    pub algorithm: TagAlgorithm,
}

#[derive(Args, Debug)]
pub struct RewriteArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    #[arg(long)]
    pub search: String,

    #[arg(long, default_value = "")]
    pub replace: String,

    /// Unprefixed table names; all prefixed tables when omitted
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Also rewrite primary key columns
    #[arg(long)]
    pub include_primary_keys: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}
