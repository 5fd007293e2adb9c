use chrono::{DateTime, Utc};
use rusqlite::{Connection, ToSql};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("database connection lock poisoned")]
    Poisoned,
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> Result<Self, PersistenceError> {
        if let Some(parent) = std::path::Path::new(&config.database_url).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&config.database_url)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::Poisoned)
    }

    pub fn execute_init(&self) -> Result<(), PersistenceError> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS runtime (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                login DATETIME NOT NULL,
                logout DATETIME NOT NULL
            );
        ";
        self.lock()?.execute_batch(sql)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs a single statement and returns the number of affected rows.
    pub fn execute(&self, statement: &str, params: &[&dyn ToSql]) -> Result<usize, PersistenceError> {
        let conn = self.lock()?;
        Ok(conn.execute(statement, params)?)
    }

    /// Moves a closure over the database onto the blocking pool.
    pub async fn run_blocking<F, T>(&self, f: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&Database) -> Result<T, PersistenceError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    /// Records one bot session (login and logout timestamps, UTC).
    pub async fn record_runtime(
        &self,
        login: DateTime<Utc>,
        logout: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let login = login.format(TIMESTAMP_FORMAT).to_string();
        let logout = logout.format(TIMESTAMP_FORMAT).to_string();
        debug!("Database: Recording runtime {} -> {}", login, logout);
        self.run_blocking(move |db| {
            db.execute(
                "INSERT INTO runtime (login, logout) VALUES (?1, ?2)",
                &[&login, &logout],
            )
            .map(|_| ())
        })
        .await
    }
}
