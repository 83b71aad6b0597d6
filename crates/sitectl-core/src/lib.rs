//! sitectl core: an authenticated, single-shot command endpoint for a
//! managed site.
//!
//! ## Request lifecycle
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Endpoint                                │
//! │  ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐   │
//! │  │ Precheck │──▶│ AuthGate │──▶│  Command  │──▶│ Dispatcher  │   │
//! │  │ (window) │   │ (counter)│   │  parser   │   │ (Operation) │   │
//! │  └────┬─────┘   └────┬─────┘   └───────────┘   └──────┬──────┘   │
//! │       │ earlyping     │                               │          │
//! │       ▼               ▼                               ▼          │
//! │   PONG reply   CredentialStore            ops::* / RewriteEngine │
//! │                  (SQLite)                  Datastore (SQLite)    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every request is authenticated against a counter that advances on every
//! attempt, so a tag is usable at most once and the whole credential dies
//! when its validity window closes or the `die` command revokes it.

pub mod app;
pub mod auth;
pub mod command;
pub mod config;
pub mod context;
pub mod datastore;
pub mod dispatch;
pub mod endpoint;
pub mod errors;
pub mod ops;
pub mod phpser;
pub mod response;
pub mod rewrite;

pub use config::EndpointConfig;
pub use context::EndpointContext;
pub use endpoint::{Admission, Endpoint, Handled, Request};
pub use errors::{EndpointError, ErrorKind};

/// Interface version announced by `ping`; bumped when the command set changes.
pub const PROTO_VERSION: &str = "23";

/// Agent version announced by `ping` and `help`.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime identifier announced by `ping`.
pub const RUNTIME_VERSION: &str = concat!("rust-", env!("CARGO_PKG_RUST_VERSION"));
