use super::open_context;
use crate::cli::args::RewriteArgs;
use crate::exit_codes;
use sitectl_core::rewrite::{RewriteEngine, RewriteSpec};

/// Run a rewrite directly against the site database, without a tag.
pub async fn run(args: RewriteArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;
    let mut spec = RewriteSpec::new(args.search, args.replace).with_tables(args.tables);
    spec.include_primary_keys = args.include_primary_keys;

    let report = tokio::task::spawn_blocking(move || {
        RewriteEngine::new(ctx.datastore(), ctx.table_prefix()).rewrite(&spec)
    })
    .await??;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.fatal {
        exit_codes::COMMAND_FAILED
    } else {
        exit_codes::SUCCESS
    })
}
