use super::open_context;
use crate::cli::args::StatusArgs;
use crate::exit_codes;
use chrono::Utc;
use sitectl_core::auth::GateState;

pub async fn run(args: StatusArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;
    let now = Utc::now();
    let state = tokio::task::spawn_blocking(move || {
        let gate = ctx.gate();
        gate.state(now).map(|state| (state, gate.window().copied()))
    })
    .await??;

    let (state, window) = state;
    println!("state: {}", label(state));
    match window {
        Some(window) => {
            println!("issued_at: {}", window.issued_at.to_rfc3339());
            println!("closes_at: {}", window.end().to_rfc3339());
            println!("remaining_secs: {}", window.remaining(now).num_seconds().max(0));
        }
        None => println!("window: none"),
    }
    Ok(exit_codes::SUCCESS)
}

fn label(state: GateState) -> &'static str {
    match state {
        GateState::Fresh => "fresh",
        GateState::Authenticated => "authenticated",
        GateState::Revoked => "revoked",
        GateState::Expired => "expired",
    }
}
