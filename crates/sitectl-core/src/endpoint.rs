//! Request lifecycle: precheck, early ping, authenticate, dispatch.

use crate::auth::{AuthError, AuthFailure, AuthGate, Session};
use crate::command;
use crate::context::EndpointContext;
use crate::dispatch::{Dispatcher, Operation};
use crate::errors::{EndpointError, ErrorKind};
use crate::response::{noauth, pong, Reply, AUTH_OK};
use chrono::{DateTime, Utc};
use std::io::Write;

/// Command answered before authentication, without touching the counter.
pub const EARLY_PING: &str = "earlyping";

/// One posted request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub tag: Option<String>,
    pub command: Option<String>,
    pub debug: bool,
}

impl Request {
    pub fn new(tag: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            command: Some(command.into()),
            debug: false,
        }
    }

    fn command_line(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.is_empty())
    }
}

/// Outcome of the pre-dispatch stage.
#[derive(Debug)]
pub enum Admission {
    /// Complete reply for the pre-auth `earlyping`.
    EarlyPing(String),
    Denied(AuthFailure),
    Granted(Session),
}

/// What happened to a request, once its reply is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    EarlyPing,
    Denied(AuthFailure),
    NoCommand,
    Dispatched(Operation),
    /// Authenticated, but the command failed with an `ERROR:` reply.
    Failed(ErrorKind),
}

impl Handled {
    /// The caller proved knowledge of the secret (or sent `earlyping`).
    pub fn is_authorized(&self) -> bool {
        !matches!(self, Self::Denied(_))
    }
}

/// The authenticated command endpoint.
pub struct Endpoint {
    ctx: EndpointContext,
    gate: AuthGate,
}

impl Endpoint {
    pub fn new(ctx: EndpointContext) -> Self {
        let gate = ctx.gate();
        Self { ctx, gate }
    }

    pub fn context(&self) -> &EndpointContext {
        &self.ctx
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Decide whether `request` may dispatch. Every `Granted` consumed one
    /// counter value; so did every `Denied(BadCredential)`.
    pub fn admit(&self, request: &Request, now: DateTime<Utc>) -> Result<Admission, EndpointError> {
        if let Err(failure) = self.gate.precheck(now, request.tag.as_deref()) {
            tracing::info!(reason = failure.code(), "request refused before authentication");
            return Ok(Admission::Denied(failure));
        }

        if request.command.as_deref() == Some(EARLY_PING) {
            let info = format!("w{}", self.ctx.app_version());
            return Ok(Admission::EarlyPing(format!("{AUTH_OK}{}", pong(&info))));
        }

        match self.gate.authenticate(now, request.tag.as_deref()) {
            Ok(session) => Ok(Admission::Granted(session)),
            Err(AuthError::Denied(failure)) => Ok(Admission::Denied(failure)),
            Err(e) => Err(e.into()),
        }
    }

    /// Dispatch the request's command for an authenticated session.
    ///
    /// Domain failures become `ERROR:` replies; only store and transport
    /// failures are returned.
    pub fn execute(
        &self,
        session: &Session,
        request: &Request,
        now: DateTime<Utc>,
        out: &mut dyn Write,
    ) -> Result<Handled, EndpointError> {
        let Some(line) = request.command_line() else {
            Reply::new(out).text("AUTHOK:ERROR:No command sent")?;
            return Ok(Handled::NoCommand);
        };

        let command = command::parse(line);
        let dispatcher = Dispatcher::new(&self.ctx, session, now);
        match dispatcher.dispatch(&command, out) {
            Ok(operation) => Ok(Handled::Dispatched(operation)),
            Err(e) if e.is_transport() => Err(e),
            Err(e) => {
                let kind = e.kind();
                if kind == ErrorKind::FatalStoreError {
                    tracing::error!(verb = %command.verb, error = %e, "command failed");
                } else {
                    tracing::info!(verb = %command.verb, %kind, "command rejected");
                }
                Reply::new(out).error(&e.to_string())?;
                Ok(Handled::Failed(kind))
            }
        }
    }

    /// Admit and execute, writing the whole reply to `out`.
    pub fn handle(
        &self,
        request: &Request,
        now: DateTime<Utc>,
        out: &mut dyn Write,
    ) -> Result<Handled, EndpointError> {
        match self.admit(request, now)? {
            Admission::EarlyPing(body) => {
                Reply::new(out).text(&body)?;
                Ok(Handled::EarlyPing)
            }
            Admission::Denied(failure) => {
                Reply::new(out).text(&noauth(failure))?;
                Ok(Handled::Denied(failure))
            }
            Admission::Granted(session) => self.execute(&session, request, now, out),
        }
    }
}
