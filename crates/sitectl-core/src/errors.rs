use crate::app::PluginError;
use crate::auth::AuthError;
use crate::command::CommandForm;
use crate::config::ConfigError;
use crate::datastore::DatastoreError;
use crate::rewrite::RewriteError;
use thiserror::Error;

/// Stable classification of every failure the endpoint can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthExpired,
    AuthRevoked,
    AuthBadCredential,
    AuthMissingCredential,
    UnknownCommand,
    SyntaxError,
    NotFound,
    PartialFailure,
    FatalStoreError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthExpired => "AuthExpired",
            Self::AuthRevoked => "AuthRevoked",
            Self::AuthBadCredential => "AuthBadCredential",
            Self::AuthMissingCredential => "AuthMissingCredential",
            Self::UnknownCommand => "UnknownCommand",
            Self::SyntaxError => "SyntaxError",
            Self::NotFound => "NotFound",
            Self::PartialFailure => "PartialFailure",
            Self::FatalStoreError => "FatalStoreError",
        }
    }

    /// Authentication failures end the request before any dispatch.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthExpired
                | Self::AuthRevoked
                | Self::AuthBadCredential
                | Self::AuthMissingCredential
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error for one endpoint invocation.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Bare unknown verbs are reported without the verb, matching the
    /// historical reply.
    #[error("{}", unknown_command_message(.verb, *.form))]
    UnknownCommand { verb: String, form: CommandForm },

    #[error(transparent)]
    Datastore(#[from] DatastoreError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn unknown_command_message(verb: &str, form: CommandForm) -> String {
    match form {
        CommandForm::Bare => "Unknown command".to_string(),
        CommandForm::WithArgument => format!("Unknown command:{verb}"),
    }
}

impl EndpointError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(e) => e.kind(),
            Self::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            Self::Datastore(e) => e.kind(),
            Self::Rewrite(e) => e.kind(),
            Self::Plugin(PluginError::Datastore(e)) => e.kind(),
            Self::Plugin(PluginError::Io(_)) => ErrorKind::FatalStoreError,
            Self::Config(_) => ErrorKind::FatalStoreError,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Self::Io(_) => ErrorKind::FatalStoreError,
        }
    }

    /// True when the reply channel itself failed; nothing more can be written.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(e) if matches!(
            e.kind(),
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
        ))
    }
}
