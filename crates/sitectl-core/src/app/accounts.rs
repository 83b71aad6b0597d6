use crate::datastore::{backquote, DatastoreError, SqliteDatastore};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};

/// Length of generated passwords.
pub const PASSWORD_LEN: usize = 12;

pub const ADMIN_ROLE: &str = "administrator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub login: String,
    pub email: String,
    pub nicename: String,
    pub role: String,
}

/// What happens to content owned by a deleted account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassign {
    Delete,
    To(i64),
}

/// User accounts of the managed application.
pub trait AccountStore: Send + Sync {
    /// Every account, ordered by display name.
    fn list(&self) -> Result<Vec<Account>, DatastoreError>;

    fn find_by_login(&self, login: &str) -> Result<Option<Account>, DatastoreError>;

    fn find_by_email(&self, email: &str) -> Result<Option<Account>, DatastoreError>;

    fn find_by_id(&self, id: i64) -> Result<Option<Account>, DatastoreError>;

    /// Returns the new account id.
    fn create(&self, login: &str, email: &str, role: &str, password: &str) -> Result<i64, DatastoreError>;

    fn set_password(&self, id: i64, password: &str) -> Result<(), DatastoreError>;

    /// `false` if no such account existed.
    fn delete(&self, id: i64, reassign: Reassign) -> Result<bool, DatastoreError>;

    /// Administrator with the lowest id.
    fn first_admin(&self) -> Result<Option<Account>, DatastoreError>;
}

/// Login first, then email when `who` looks like an address.
pub fn lookup(store: &dyn AccountStore, who: &str) -> Result<Option<Account>, DatastoreError> {
    if let Some(account) = store.find_by_login(who)? {
        return Ok(Some(account));
    }
    if who.contains('@') {
        return store.find_by_email(who);
    }
    Ok(None)
}

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// `sha256$<salt>$<hex digest of salt || password>`
pub fn hash_password(password: &str) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let digest = Sha256::digest(format!("{salt}{password}").as_bytes());
    format!("sha256${salt}${}", hex::encode(digest))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("sha256"), Some(salt), Some(digest)) => {
            hex::encode(Sha256::digest(format!("{salt}{password}").as_bytes())) == digest
        }
        _ => false,
    }
}

/// Accounts kept in `<prefix>users`; content in `<prefix>posts`.
#[derive(Clone)]
pub struct SqliteAccounts {
    datastore: SqliteDatastore,
    users: String,
    posts: String,
    posts_table: String,
}

const ACCOUNT_COLUMNS: &str = "ID, user_login, user_email, user_nicename, role";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        login: row.get(1)?,
        email: row.get(2)?,
        nicename: row.get(3)?,
        role: row.get(4)?,
    })
}

impl SqliteAccounts {
    pub fn new(datastore: SqliteDatastore, table_prefix: &str) -> Self {
        let posts_table = format!("{table_prefix}posts");
        Self {
            datastore,
            users: backquote(&format!("{table_prefix}users")),
            posts: backquote(&posts_table),
            posts_table,
        }
    }

    fn find_where(&self, clause: &str, value: &dyn rusqlite::ToSql) -> Result<Option<Account>, DatastoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM {} WHERE {clause} LIMIT 1", self.users);
        self.datastore.with_connection(|conn| {
            conn.query_row(&sql, [value], account_from_row).optional()
        })
    }

    fn delete_in(&self, conn: &Connection, id: i64, reassign: Reassign) -> rusqlite::Result<usize> {
        if crate::datastore::table_exists(conn, &self.posts_table)? {
            match reassign {
                Reassign::To(target) => {
                    conn.execute(
                        &format!("UPDATE {} SET post_author = ?1 WHERE post_author = ?2", self.posts),
                        params![target, id],
                    )?;
                }
                Reassign::Delete => {
                    conn.execute(
                        &format!("DELETE FROM {} WHERE post_author = ?1", self.posts),
                        [id],
                    )?;
                }
            }
        }
        conn.execute(&format!("DELETE FROM {} WHERE ID = ?1", self.users), [id])
    }
}

impl AccountStore for SqliteAccounts {
    fn list(&self) -> Result<Vec<Account>, DatastoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} ORDER BY user_nicename, ID",
            self.users
        );
        self.datastore.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], account_from_row)?;
            rows.collect()
        })
    }

    fn find_by_login(&self, login: &str) -> Result<Option<Account>, DatastoreError> {
        self.find_where("user_login = ?1", &login)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>, DatastoreError> {
        self.find_where("user_email = ?1", &email)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<Account>, DatastoreError> {
        self.find_where("ID = ?1", &id)
    }

    fn create(&self, login: &str, email: &str, role: &str, password: &str) -> Result<i64, DatastoreError> {
        let sql = format!(
            "INSERT INTO {} (user_login, user_pass, user_nicename, user_email, role) VALUES (?1, ?2, ?3, ?4, ?5)",
            self.users
        );
        let hashed = hash_password(password);
        let nicename = login.to_ascii_lowercase();
        self.datastore.with_connection(|conn| {
            conn.execute(&sql, params![login, hashed, nicename, email, role])?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn set_password(&self, id: i64, password: &str) -> Result<(), DatastoreError> {
        let sql = format!("UPDATE {} SET user_pass = ?1 WHERE ID = ?2", self.users);
        let hashed = hash_password(password);
        self.datastore
            .with_connection(|conn| conn.execute(&sql, params![hashed, id]))?;
        Ok(())
    }

    fn delete(&self, id: i64, reassign: Reassign) -> Result<bool, DatastoreError> {
        self.datastore.with_connection(|conn| {
            conn.execute("BEGIN IMMEDIATE", [])?;
            match self.delete_in(conn, id, reassign) {
                Ok(n) => {
                    conn.execute("COMMIT", [])?;
                    Ok(n > 0)
                }
                Err(e) => {
                    let _ = conn.execute("ROLLBACK", []);
                    Err(e)
                }
            }
        })
    }

    fn first_admin(&self) -> Result<Option<Account>, DatastoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE role = ?1 ORDER BY ID LIMIT 1",
            self.users
        );
        self.datastore.with_connection(|conn| {
            conn.query_row(&sql, [ADMIN_ROLE], account_from_row).optional()
        })
    }
}
