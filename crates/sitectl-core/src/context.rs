use crate::app::{
    AccountStore, OptionStore, PluginRegistry, SiteFiles, SqliteAccounts, SqliteOptions,
};
use crate::auth::{AuthGate, CredentialStore, SqliteCredentialStore, ValidityWindow};
use crate::config::EndpointConfig;
use crate::datastore::{Datastore, SqliteDatastore};
use crate::errors::EndpointError;
use std::sync::Arc;

/// Everything one request may touch. Built once per process; handlers get
/// it by reference.
pub struct EndpointContext {
    config: EndpointConfig,
    credentials: Arc<dyn CredentialStore>,
    datastore: Arc<dyn Datastore>,
    options: Arc<dyn OptionStore>,
    accounts: Arc<dyn AccountStore>,
    files: SiteFiles,
    window: Option<ValidityWindow>,
}

impl EndpointContext {
    /// Open the stores named by `config`.
    pub fn open(config: EndpointConfig) -> Result<Self, EndpointError> {
        let credentials = SqliteCredentialStore::open(&config.state_db_path())
            .map_err(crate::auth::AuthError::from)?;
        match credentials.purge_expired(chrono::Utc::now()) {
            Ok(0) => {}
            Ok(n) => tracing::debug!(purged = n, "expired credential records removed"),
            Err(e) => tracing::warn!(error = %e, "cannot purge expired credential records"),
        }
        let datastore = SqliteDatastore::open(&config.database_path())?;
        Ok(Self::with_stores(config, Arc::new(credentials), datastore))
    }

    /// Assemble from already-open stores; options and accounts live in
    /// `datastore`.
    pub fn with_stores(
        config: EndpointConfig,
        credentials: Arc<dyn CredentialStore>,
        datastore: SqliteDatastore,
    ) -> Self {
        let prefix = config.table_prefix.clone();
        let options = Arc::new(SqliteOptions::new(datastore.clone(), &prefix));
        let accounts = Arc::new(SqliteAccounts::new(datastore.clone(), &prefix));
        let files = SiteFiles::new(
            config.site_root_path(),
            config.content_dir.clone(),
            config.endpoint_file.clone(),
        );
        let window = config.window();
        Self {
            config,
            credentials,
            datastore: Arc::new(datastore),
            options,
            accounts,
            files,
            window,
        }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn table_prefix(&self) -> &str {
        &self.config.table_prefix
    }

    pub fn datastore(&self) -> &dyn Datastore {
        self.datastore.as_ref()
    }

    pub fn options(&self) -> &dyn OptionStore {
        self.options.as_ref()
    }

    pub fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }

    pub fn files(&self) -> &SiteFiles {
        &self.files
    }

    pub fn window(&self) -> Option<&ValidityWindow> {
        self.window.as_ref()
    }

    pub fn plugins(&self) -> PluginRegistry<'_> {
        PluginRegistry::new(self.files.plugins_dir(), self.options.as_ref())
    }

    /// Configured version, else the site's `VERSION` file, else `?`.
    pub fn app_version(&self) -> String {
        self.config
            .app_version
            .clone()
            .or_else(|| self.files.app_version())
            .unwrap_or_else(|| "?".to_string())
    }

    pub fn gate(&self) -> AuthGate {
        AuthGate::new(
            Arc::clone(&self.credentials),
            self.config.secret(),
            self.window,
            self.config.tag_algorithm,
        )
    }
}
