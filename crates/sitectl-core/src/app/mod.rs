//! Services of the managed application: options, accounts, plugins and the
//! site's file tree.

pub mod accounts;
pub mod files;
pub mod options;
pub mod plugins;

pub use accounts::{Account, AccountStore, Reassign, SqliteAccounts};
pub use files::SiteFiles;
pub use options::{OptionStore, SqliteOptions};
pub use plugins::{Plugin, PluginError, PluginRegistry};

use crate::datastore::{DatastoreError, SqliteDatastore};

/// Option holding the serialized list of active plugin files.
pub const ACTIVE_PLUGINS_OPTION: &str = "active_plugins";

/// DDL for the application tables a fresh site needs.
pub fn site_schema(prefix: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS `{prefix}options` (
    option_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    option_name      TEXT NOT NULL UNIQUE,
    option_value     TEXT NOT NULL,
    autoload         TEXT NOT NULL DEFAULT 'yes'
);

CREATE TABLE IF NOT EXISTS `{prefix}users` (
    ID               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_login       TEXT NOT NULL UNIQUE,
    user_pass        TEXT NOT NULL,
    user_nicename    TEXT NOT NULL DEFAULT '',
    user_email       TEXT NOT NULL DEFAULT '',
    user_registered  TEXT NOT NULL DEFAULT (datetime('now')),
    role             TEXT NOT NULL DEFAULT 'subscriber'
);

CREATE TABLE IF NOT EXISTS `{prefix}posts` (
    ID               INTEGER PRIMARY KEY AUTOINCREMENT,
    post_author      INTEGER NOT NULL DEFAULT 0,
    post_title       TEXT NOT NULL DEFAULT '',
    post_content     TEXT NOT NULL DEFAULT '',
    guid             TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS `idx_{prefix}posts_author` ON `{prefix}posts`(post_author);
"#
    )
}

/// Create the application tables if they are missing.
pub fn install_schema(datastore: &SqliteDatastore, prefix: &str) -> Result<(), DatastoreError> {
    datastore.execute_batch(&site_schema(prefix))
}
