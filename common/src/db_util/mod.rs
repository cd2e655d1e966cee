//! Interfaces between the application code and database.

use crate::*;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use serde_json::Value;
use std::env;

mod conversions;
mod drivers;
mod lead_drivers;
mod picks;
mod race_results;
mod races;
mod standings;
mod store;
mod users;

pub use drivers::*;
pub use lead_drivers::*;
pub use picks::*;
pub use race_results::*;
pub use races::*;
pub use standings::*;
pub use store::{PgPickStore, PgStandingsStore};
pub use users::*;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

const DEFAULT_POOL_SIZE: u32 = 10;

/// Read `DATABASE_URL`, honouring a `.env` file if one is present.
pub fn get_database_url() -> Result<String> {
    dotenvy::dotenv().ok();
    env::var("DATABASE_URL").context("DATABASE_URL must be set")
}

/// Open a single connection. Used by jobs and scripts.
pub fn get_database_connection() -> Result<PgConnection> {
    let database_url = get_database_url()?;
    PgConnection::establish(&database_url)
        .with_context(|| "Error connecting to database".to_string())
}

/// Build a connection pool sized by `DATABASE_POOL_SIZE` (default 10).
pub fn get_database_pool() -> Result<PgPool> {
    let database_url = get_database_url()?;
    let pool_size = match env::var("DATABASE_POOL_SIZE") {
        Ok(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("Invalid DATABASE_POOL_SIZE: {raw}"))?,
        Err(_) => DEFAULT_POOL_SIZE,
    };
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(pool_size)
        .build(manager)
        .context("Error building database pool")
}

pub fn get_pooled_database_connection(pool: &PgPool) -> Result<PgPooledConnection> {
    pool.get().context("Error getting a connection from the pool")
}

/// Run `f` in a transaction, rolling back if it returns an error.
pub fn run_in_transaction<T, F>(conn: &mut PgConnection, f: F) -> Result<T>
where
    F: FnOnce(&mut PgConnection) -> Result<T>,
{
    conn.transaction(f)
}

/// Round-trip a trivial query to confirm the database is reachable.
pub fn check_connection(conn: &mut PgConnection) -> Result<()> {
    diesel::sql_query("SELECT 1")
        .execute(conn)
        .context("Database connection check failed")?;
    Ok(())
}

/// True if the error came from a unique constraint.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<DieselError>(),
        Some(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
    )
}

/// True if the error came from a lookup that found no row.
#[must_use]
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<DieselError>(), Some(DieselError::NotFound))
}
