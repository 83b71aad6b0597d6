use super::args::{Cli, Command, ConfigArg};
use anyhow::Context;
use sitectl_core::{EndpointConfig, EndpointContext};

pub mod exec;
pub mod provision;
pub mod rewrite;
pub mod serve;
pub mod status;
pub mod tag;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Serve(args) => serve::run(args).await,
        Command::Exec(args) => exec::run(args).await,
        Command::Provision(args) => provision::run(args),
        Command::Tag(args) => tag::run(args),
        Command::Rewrite(args) => rewrite::run(args).await,
        Command::Status(args) => status::run(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(crate::exit_codes::SUCCESS)
        }
    }
}

/// Load the config and open the stores it names.
pub(crate) fn open_context(arg: &ConfigArg) -> anyhow::Result<EndpointContext> {
    let config = EndpointConfig::load(&arg.config)
        .with_context(|| format!("cannot load {}", arg.config.display()))?;
    tracing::debug!(
        site_root = %config.site_root_path().display(),
        database = %config.database_path().display(),
        "config loaded"
    );
    EndpointContext::open(config).context("cannot open site stores")
}
