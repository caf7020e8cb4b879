use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Creates every table the site needs. Safe to run against an existing database.
pub fn setup_site_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    log::info!("Creating 'identities' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS identities (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    log::info!("Creating 'profiles' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            email TEXT,
            full_name TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES identities(id) ON DELETE CASCADE
        )",
        [],
    )?;

    log::info!("Creating 'user_roles' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS user_roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin')),
            UNIQUE (user_id, role),
            FOREIGN KEY (user_id) REFERENCES identities(id) ON DELETE CASCADE
        )",
        [],
    )?;

    log::info!("Creating 'blog_posts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS blog_posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            excerpt TEXT,
            content TEXT NOT NULL,
            featured_image_url TEXT,
            category TEXT,
            author_name TEXT,
            author_id TEXT,
            published INTEGER NOT NULL DEFAULT 0,
            published_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            CHECK ((published = 0 AND published_at IS NULL) OR (published = 1 AND published_at IS NOT NULL))
        )",
        [],
    )?;

    log::info!("Creating 'insights_reports' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS insights_reports (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            file_url TEXT NOT NULL,
            file_name TEXT NOT NULL,
            category TEXT,
            published INTEGER NOT NULL DEFAULT 0,
            published_at TEXT,
            created_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            CHECK ((published = 0 AND published_at IS NULL) OR (published = 1 AND published_at IS NOT NULL))
        )",
        [],
    )?;

    log::info!("Creating 'contact_submissions' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS contact_submissions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            organization TEXT NOT NULL,
            phone TEXT,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    tx.commit()?;
    Ok(())
}
