use super::open_context;
use crate::cli::args::ServeArgs;
use crate::exit_codes;
use sitectl_core::Endpoint;
use std::sync::Arc;

pub async fn run(args: ServeArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;
    match ctx.window() {
        Some(window) => tracing::info!(closes_at = %window.end(), "validity window"),
        None => tracing::warn!("no validity window; every request will be refused"),
    }
    if ctx.config().secret.is_none() {
        tracing::warn!("no secret provisioned; every request will be refused");
    }

    let endpoint = Arc::new(Endpoint::new(ctx));
    sitectl_server::run(args.bind, endpoint).await?;
    Ok(exit_codes::SUCCESS)
}
