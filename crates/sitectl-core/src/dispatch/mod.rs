//! Verb lookup and the `AUTHOK:` prefix rule.

mod operation;

pub use operation::{Handler, Operation, ALIASES};

use crate::auth::Session;
use crate::command::Command;
use crate::context::EndpointContext;
use crate::errors::EndpointError;
use crate::ops::Invocation;
use crate::response::Reply;
use chrono::{DateTime, Utc};
use std::io::Write;

/// Runs one authenticated command against the context.
pub struct Dispatcher<'a> {
    invocation: Invocation<'a>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(ctx: &'a EndpointContext, session: &'a Session, now: DateTime<Utc>) -> Self {
        Self {
            invocation: Invocation::new(ctx, session, now),
        }
    }

    /// Write the reply for `command` to `out`.
    ///
    /// `AUTHOK:` goes out before the handler runs unless the operation
    /// streams raw bytes. Unknown verbs still get the prefix; the caller
    /// follows it with the `ERROR:` token for the returned error.
    pub fn dispatch(&self, command: &Command, out: &mut dyn Write) -> Result<Operation, EndpointError> {
        let mut reply = Reply::new(out);
        let operation = Operation::resolve(&command.verb, command.form);

        if !operation.is_some_and(|op| op.streams_raw()) {
            reply.auth_ok()?;
        }

        let Some(operation) = operation else {
            tracing::info!(verb = %command.verb, "unknown command");
            return Err(EndpointError::UnknownCommand {
                verb: command.verb.clone(),
                form: command.form,
            });
        };

        tracing::info!(verb = %operation, "dispatching");
        (operation.handler())(&self.invocation, &command.argument, &mut reply)?;
        reply.flush()?;
        tracing::debug!(verb = %operation, bytes = reply.bytes_written(), "reply written");
        Ok(operation)
    }
}
