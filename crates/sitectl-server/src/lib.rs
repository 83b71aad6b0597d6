//! HTTP transport for the sitectl endpoint.
//!
//! One route, `POST /`, taking the form fields `auth-tag`, `command` and
//! `debug-flag`. Authentication and the command itself run on the blocking
//! pool; the reply is streamed back as `text/plain`.

pub mod routes;
pub mod stream;

use axum::routing::post;
use axum::Router;
use sitectl_core::Endpoint;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub fn router(endpoint: Arc<Endpoint>) -> Router {
    Router::new()
        .route("/", post(routes::endpoint))
        .with_state(endpoint)
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, endpoint: Arc<Endpoint>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(endpoint))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
pub async fn run(addr: SocketAddr, endpoint: Arc<Endpoint>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "sitectl endpoint listening");
    serve(listener, endpoint, shutdown_signal()).await?;
    tracing::info!("sitectl endpoint stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
