use crate::datastore::{backquote, DatastoreError, SqliteDatastore};
use rusqlite::{params, OptionalExtension};

/// Named configuration values of the managed application.
pub trait OptionStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<String>, DatastoreError>;

    /// Insert a new option. `false` if the name is taken.
    fn add(&self, name: &str, value: &str) -> Result<bool, DatastoreError>;

    /// Set an option, creating it when missing. `false` if the stored value
    /// already equals `value`.
    fn update(&self, name: &str, value: &str) -> Result<bool, DatastoreError>;

    /// `false` if there was nothing to delete.
    fn delete(&self, name: &str) -> Result<bool, DatastoreError>;
}

/// Options kept in the `<prefix>options` table.
#[derive(Clone)]
pub struct SqliteOptions {
    datastore: SqliteDatastore,
    table: String,
}

impl SqliteOptions {
    pub fn new(datastore: SqliteDatastore, table_prefix: &str) -> Self {
        Self {
            datastore,
            table: backquote(&format!("{table_prefix}options")),
        }
    }
}

impl OptionStore for SqliteOptions {
    fn get(&self, name: &str) -> Result<Option<String>, DatastoreError> {
        let sql = format!("SELECT option_value FROM {} WHERE option_name = ?1", self.table);
        self.datastore
            .with_connection(|conn| conn.query_row(&sql, [name], |row| row.get(0)).optional())
    }

    fn add(&self, name: &str, value: &str) -> Result<bool, DatastoreError> {
        let sql = format!(
            "INSERT INTO {} (option_name, option_value) VALUES (?1, ?2) ON CONFLICT(option_name) DO NOTHING",
            self.table
        );
        let inserted = self
            .datastore
            .with_connection(|conn| conn.execute(&sql, params![name, value]))?;
        Ok(inserted > 0)
    }

    fn update(&self, name: &str, value: &str) -> Result<bool, DatastoreError> {
        match self.get(name)? {
            Some(current) if current == value => Ok(false),
            Some(_) => {
                let sql = format!("UPDATE {} SET option_value = ?2 WHERE option_name = ?1", self.table);
                let n = self
                    .datastore
                    .with_connection(|conn| conn.execute(&sql, params![name, value]))?;
                Ok(n > 0)
            }
            None => self.add(name, value),
        }
    }

    fn delete(&self, name: &str) -> Result<bool, DatastoreError> {
        let sql = format!("DELETE FROM {} WHERE option_name = ?1", self.table);
        let n = self
            .datastore
            .with_connection(|conn| conn.execute(&sql, [name]))?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::install_schema;

    fn options() -> SqliteOptions {
        let ds = SqliteDatastore::memory().unwrap();
        install_schema(&ds, "app_").unwrap();
        SqliteOptions::new(ds, "app_")
    }

    #[test]
    fn test_add_get_delete() {
        let opts = options();
        assert_eq!(opts.get("blogname").unwrap(), None);
        assert!(opts.add("blogname", "My Site").unwrap());
        assert!(!opts.add("blogname", "Other").unwrap());
        assert_eq!(opts.get("blogname").unwrap().as_deref(), Some("My Site"));
        assert!(opts.delete("blogname").unwrap());
        assert!(!opts.delete("blogname").unwrap());
    }

    #[test]
    fn test_update_semantics() {
        let opts = options();
        assert!(opts.update("siteurl", "http://a").unwrap());
        assert!(!opts.update("siteurl", "http://a").unwrap());
        assert!(opts.update("siteurl", "http://b").unwrap());
        assert_eq!(opts.get("siteurl").unwrap().as_deref(), Some("http://b"));
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let ds = SqliteDatastore::memory().unwrap();
        let opts = SqliteOptions::new(ds, "app_");
        assert!(opts.get("x").is_err());
    }
}
