//! Operation handlers.
//!
//! Each handler writes its own reply body through [`Reply`](crate::response::Reply)
//! and reports domain failures as reply tokens. Only store and transport
//! failures come back as `Err`.

pub mod database;
pub mod files;
pub mod options;
pub mod plugins;
pub mod system;
pub mod users;

use crate::auth::Session;
use crate::context::EndpointContext;
use crate::errors::EndpointError;
use chrono::{DateTime, Utc};

/// Result of one handler.
pub type OpResult = Result<(), EndpointError>;

/// What a handler may consult besides its argument.
pub struct Invocation<'a> {
    pub ctx: &'a EndpointContext,
    pub session: &'a Session,
    pub now: DateTime<Utc>,
}

impl<'a> Invocation<'a> {
    pub fn new(ctx: &'a EndpointContext, session: &'a Session, now: DateTime<Utc>) -> Self {
        Self { ctx, session, now }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixture shared by the handler tests.

    use super::Invocation;
    use crate::app::install_schema;
    use crate::auth::{compute_tag, Secret, Session, SqliteCredentialStore, TagAlgorithm};
    use crate::config::EndpointConfig;
    use crate::context::EndpointContext;
    use crate::datastore::SqliteDatastore;
    use crate::response::Reply;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    pub struct Fixture {
        pub dir: tempfile::TempDir,
        pub ctx: EndpointContext,
        pub datastore: SqliteDatastore,
        pub session: Session,
        pub now: DateTime<Utc>,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let now = Utc::now();
            let config = EndpointConfig {
                secret: Some("fixture-secret".into()),
                issued_at: Some(now),
                site_root: dir.path().to_path_buf(),
                ..Default::default()
            };
            let datastore = SqliteDatastore::memory().unwrap();
            install_schema(&datastore, &config.table_prefix).unwrap();
            let ctx = EndpointContext::with_stores(
                config,
                Arc::new(SqliteCredentialStore::memory().unwrap()),
                datastore.clone(),
            );
            let tag = compute_tag(TagAlgorithm::Md5, &Secret::new("fixture-secret"), 0);
            let session = ctx.gate().authenticate(now, Some(&tag)).unwrap();
            Self {
                dir,
                ctx,
                datastore,
                session,
                now,
            }
        }

        pub fn invocation(&self) -> Invocation<'_> {
            Invocation::new(&self.ctx, &self.session, self.now)
        }

        /// Run `handler` and return what it wrote.
        pub fn run<F>(&self, handler: F, arg: &str) -> String
        where
            F: Fn(&Invocation<'_>, &str, &mut Reply<'_>) -> super::OpResult,
        {
            String::from_utf8(self.run_bytes(handler, arg)).unwrap()
        }

        pub fn run_bytes<F>(&self, handler: F, arg: &str) -> Vec<u8>
        where
            F: Fn(&Invocation<'_>, &str, &mut Reply<'_>) -> super::OpResult,
        {
            let mut out = Vec::new();
            let mut reply = Reply::new(&mut out);
            handler(&self.invocation(), arg, &mut reply).unwrap();
            out
        }

        pub fn write(&self, rel: &str, contents: &str) {
            let path = self.dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
    }
}
