//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        apply(conn, 1, MIGRATION_V1)?;
    }
    if version < 2 {
        apply(conn, 2, MIGRATION_V2)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten()
        .unwrap_or(0);

    Ok(version)
}

/// Apply one migration atomically and record its version
fn apply(conn: &mut Connection, version: i32, statements: &[&str]) -> Result<()> {
    let tx = conn.transaction()?;
    for stmt in statements {
        tx.execute_batch(stmt)?;
    }
    tx.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version} of {CURRENT_VERSION}");
    Ok(())
}

/// Version 1: items, collections and the preference slot
const MIGRATION_V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    // collection_id is deliberately not a foreign key: deleting a
    // collection leaves its items pointing at the removed id
    "CREATE TABLE IF NOT EXISTS items (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        collection_id TEXT,
        text TEXT,
        source_url TEXT,
        source_domain TEXT,
        image_url TEXT,
        note TEXT,
        status TEXT NOT NULL DEFAULT 'ready',
        sync_status TEXT NOT NULL DEFAULT 'pending',
        last_error TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_items_created ON items(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection_id)",
    "CREATE TABLE IF NOT EXISTS collections (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL CHECK (length(trim(name)) > 0),
        is_default INTEGER NOT NULL DEFAULT 0,
        sync_status TEXT NOT NULL DEFAULT 'pending',
        last_error TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_collections_created ON collections(created_at DESC)",
    "CREATE TABLE IF NOT EXISTS preferences (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

/// Version 2: the sync ledger
const MIGRATION_V2: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sync_ledger (
        sequence INTEGER PRIMARY KEY AUTOINCREMENT,
        operation TEXT NOT NULL CHECK (operation IN ('create', 'update', 'delete')),
        entity_type TEXT NOT NULL CHECK (entity_type IN ('item', 'collection')),
        target_id TEXT NOT NULL,
        payload TEXT,
        enqueued_at INTEGER NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        next_attempt_at INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        state TEXT NOT NULL DEFAULT 'pending' CHECK (state IN ('pending', 'parked'))
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_ledger_lane
        ON sync_ledger(entity_type, target_id, sequence)",
    "CREATE INDEX IF NOT EXISTS idx_sync_ledger_state ON sync_ledger(state, sequence)",
];
