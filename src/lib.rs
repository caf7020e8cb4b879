use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tera::Tera;

use crate::helper::email_helpers::ContactNotifier;
use crate::helper::storage_helpers::ObjectStorage;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Collaborators shared by every worker.
pub struct AppState {
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Arc<dyn ContactNotifier>,
}

/// Opens a pool on the site database with foreign keys enforced on every connection.
pub fn build_pool(db_path: &Path) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
    Pool::builder().build(manager)
}

/// Loads every page and email template under `templates_dir`.
pub fn load_templates(templates_dir: &str) -> Result<Tera, tera::Error> {
    Tera::new(&format!("{}/**/*.html", templates_dir.trim_end_matches('/')))
}

#[cfg(test)]
#[macro_use]
pub(crate) mod test_support;

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
