use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Result as RusqliteResult};
use std::path::Path;
use thiserror::Error;

use crate::DbPool;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Every pooled connection enforces foreign keys so `post_tag` rows follow their post.
fn enable_foreign_keys(conn: &mut Connection) -> RusqliteResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

pub fn build_pool(db_path: &Path) -> Result<DbPool, SetupError> {
    let manager = SqliteConnectionManager::file(db_path).with_init(enable_foreign_keys);
    Ok(r2d2::Pool::builder().build(manager)?)
}

pub fn setup_blog_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    println!("- Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin', 'member')),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'topics' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name_topic TEXT NOT NULL,
            slug_topic TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    println!("- Creating 'tags' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'posts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER,
            topic_id INTEGER,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            body TEXT NOT NULL,
            meta_des TEXT NOT NULL,
            meta_keyword TEXT NOT NULL,
            seo_title TEXT NOT NULL,
            type TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE SET NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS posts_active_created ON posts (active, created_at)",
        [],
    )?;
    tx.execute("CREATE INDEX IF NOT EXISTS posts_type ON posts (type)", [])?;

    println!("- Creating 'post_tag' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS post_tag (
            post_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (post_id, tag_id),
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
        )",
        [],
    )?;

    tx.commit()?;
    Ok(())
}

/// Single-connection in-memory pool with the full schema applied.
#[cfg(test)]
pub fn test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory().with_init(enable_foreign_keys);
    let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
    {
        let mut conn = pool.get().unwrap();
        setup_blog_db(&mut conn).unwrap();
    }
    pool
}
