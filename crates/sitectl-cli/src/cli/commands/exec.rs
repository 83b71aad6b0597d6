use super::open_context;
use crate::cli::args::ExecArgs;
use crate::exit_codes;
use chrono::Utc;
use sitectl_core::{Endpoint, Request};
use std::io::Write;

/// Run one request through the endpoint and print the reply verbatim.
pub async fn run(args: ExecArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;
    let endpoint = Endpoint::new(ctx);
    let request = Request {
        tag: args.tag,
        command: args.command,
        debug: args.debug,
    };

    let handled = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let handled = endpoint.handle(&request, Utc::now(), &mut out)?;
        out.flush()?;
        Ok(handled)
    })
    .await??;

    tracing::debug!(?handled, "request handled");
    Ok(if handled.is_authorized() {
        exit_codes::SUCCESS
    } else {
        exit_codes::COMMAND_FAILED
    })
}
