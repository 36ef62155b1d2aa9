//! Collection tables and their versioning.
//!
//! Every collection is a table of JSON records keyed by id. The schema
//! version lives in `PRAGMA user_version`. Steps are additive: a later step
//! may add a collection but never drops one.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;
use crate::repository::Collection;

/// Collections introduced by each schema version, in order.
const STEPS: &[(i32, &[Collection])] = &[
    (1, &[Collection::Settings, Collection::Models]),
    (2, &[Collection::Users, Collection::Processes]),
];

/// Version the store is at once every step has run.
pub const SCHEMA_VERSION: i32 = 2;

/// Bring the store up to [`SCHEMA_VERSION`]. Safe to call on every open.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let from = stored_version(conn)?;
    if from >= SCHEMA_VERSION {
        return Ok(());
    }

    info!("Upgrading store from version {} to {}", from, SCHEMA_VERSION);
    let tx = conn.unchecked_transaction()?;
    for (version, collections) in STEPS.iter().filter(|(v, _)| *v > from) {
        for collection in collections.iter() {
            debug!(version, table = collection.table(), "Creating collection");
            create_collection(&tx, *collection)?;
        }
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(())
}

fn stored_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn create_collection(conn: &Connection, collection: Collection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY,
            record TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
        collection.table()
    ))?;
    Ok(())
}
