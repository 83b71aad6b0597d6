use super::{Invocation, OpResult};
use crate::config::DEFAULT_CONTENT_DIR;
use crate::dispatch::Operation;
use crate::response::{pong, Reply};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Seconds after which a maintenance marker is considered abandoned.
pub const MAINTENANCE_STALE_SECS: i64 = 600;

/// `w<app>,m<db>` plus `,wpcd=<dir>` when the content directory moved.
fn version_info(inv: &Invocation<'_>) -> String {
    let mut info = format!("w{},m", inv.ctx.app_version());
    match inv.ctx.datastore().server_version() {
        Ok(v) => info.push_str(&v),
        Err(e) => tracing::warn!(error = %e, "datastore version unavailable"),
    }
    let content_dir = inv.ctx.files().content_dir();
    if content_dir != Path::new(DEFAULT_CONTENT_DIR) {
        info.push_str(",wpcd=");
        info.push_str(&content_dir.to_string_lossy());
    }
    info
}

pub fn ping(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    reply.text(&pong(&version_info(inv)))?;
    Ok(())
}

pub fn help(_inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    reply.line(&format!(
        "Program version: {}, interface version: {}",
        crate::AGENT_VERSION,
        crate::PROTO_VERSION
    ))?;
    reply.line("")?;
    for op in Operation::ALL {
        reply.line(&format!("{} - {}", op.usage(), op.summary()))?;
    }
    Ok(())
}

pub fn die(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    inv.session.revoke(inv.now)?;
    reply.text("DIED")?;
    Ok(())
}

pub fn app_version(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    reply.text(&format!("WPVERSION:{}", inv.ctx.app_version()))?;
    Ok(())
}

pub fn datastore_version(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let version = inv.ctx.datastore().server_version()?;
    reply.text(&format!("MYSQLVERSION:{version}"))?;
    Ok(())
}

fn upgrading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$upgrading\s*=\s*(\d+)").expect("static pattern"))
}

/// Unix timestamp recorded in a maintenance marker; 0 when absent.
fn upgrading_since(marker: &str) -> i64 {
    upgrading_pattern()
        .captures(marker)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

pub fn maintenance_state(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let marker = inv.ctx.files().maintenance_file();
    if !marker.is_file() {
        reply.text("NONOFILE")?;
        return Ok(());
    }
    let since = std::fs::read_to_string(&marker)
        .map(|text| upgrading_since(&text))
        .unwrap_or(0);
    if inv.now.timestamp() - since >= MAINTENANCE_STALE_SECS {
        reply.text("NOBUTFILE")?;
    } else {
        reply.text("YES")?;
    }
    Ok(())
}
