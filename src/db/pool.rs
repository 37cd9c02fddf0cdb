//! SQLite connection pooling.
//!
//! Every pooled connection enforces foreign keys, so an image can only
//! reference an existing device. Migrations run once when the pool is built.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use super::migrations;
use crate::Result;

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const POOL_SIZE: u32 = 4;

/// Open (creating if needed) the database file at `db_path`.
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    build(manager, POOL_SIZE)
}

/// In-memory database for tests.
///
/// Each SQLite in-memory connection is its own database, so the pool is
/// capped at one connection.
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    build(manager, 1)
}

fn build(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    let pool = Pool::builder().max_size(max_size).build(manager)?;

    let conn = pool.get()?;
    migrations::run_migrations(&conn)?;

    Ok(pool)
}

pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    Ok(pool.get()?)
}
