//! Sync ledger: ordered, durable log of mutations the remote store has not
//! confirmed yet.
//!
//! The ledger shares the local database with the item and collection
//! tables. Callers append entries on the same transaction as the matching
//! store write, so a row never exists without its entry or the other way
//! around.

use rusqlite::{params, Connection, OptionalExtension};

use super::row::parse_column;
use crate::error::Result;
use crate::models::{now_millis, Entity, EntityType, EntryState, LedgerEntry, Operation};

const ENTRY_COLUMNS: &str = "sequence, operation, entity_type, target_id, payload, enqueued_at, \
     attempts, next_attempt_at, last_error, state";

/// Ledger size summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    /// Entries eligible for replay
    pub pending: usize,
    /// Entries removed from automatic retry
    pub parked: usize,
}

/// `SQLite`-backed sync ledger
pub struct SyncLedger<'a> {
    conn: &'a Connection,
}

impl<'a> SyncLedger<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
        let payload: Option<String> = row.get(4)?;
        let payload = payload
            .map(|raw| serde_json::from_str::<Entity>(&raw))
            .transpose()
            .map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(error),
                )
            })?;

        Ok(LedgerEntry {
            sequence: row.get(0)?,
            operation: parse_column(row, 1)?,
            entity_type: parse_column(row, 2)?,
            target_id: row.get(3)?,
            payload,
            enqueued_at: row.get(5)?,
            attempts: row.get(6)?,
            next_attempt_at: row.get(7)?,
            last_error: row.get(8)?,
            state: parse_column(row, 9)?,
        })
    }

    /// Append an entry with the next sequence number.
    pub fn enqueue(
        &self,
        operation: Operation,
        entity_type: EntityType,
        target_id: &str,
        payload: Option<&Entity>,
    ) -> Result<i64> {
        let payload = payload.map(serde_json::to_string).transpose()?;
        let now = now_millis();

        self.conn.execute(
            "INSERT INTO sync_ledger (
                operation, entity_type, target_id, payload, enqueued_at, next_attempt_at
            ) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                operation.as_str(),
                entity_type.as_str(),
                target_id,
                payload,
                now,
                now
            ],
        )?;

        let sequence = self.conn.last_insert_rowid();
        tracing::debug!(sequence, %operation, %entity_type, target_id, "Enqueued ledger entry");
        Ok(sequence)
    }

    /// Pending entries in ascending sequence order.
    ///
    /// Entries that sit behind a parked entry of the same lane are left out:
    /// they cannot be replayed until the parked one is resolved.
    #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT
    pub fn peek_pending(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        let limit = limit.map_or(-1, |limit| limit as i64);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_ledger l
             WHERE l.state = 'pending'
               AND NOT EXISTS (
                   SELECT 1 FROM sync_ledger p
                   WHERE p.state = 'parked'
                     AND p.entity_type = l.entity_type
                     AND p.target_id = l.target_id
                     AND p.sequence < l.sequence
               )
             ORDER BY l.sequence ASC
             LIMIT ?"
        ))?;
        let entries = stmt
            .query_map([limit], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Get one entry by sequence
    pub fn get(&self, sequence: i64) -> Result<Option<LedgerEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM sync_ledger WHERE sequence = ?"),
                [sequence],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Delete a confirmed entry. Returns whether it was still present.
    pub fn remove(&self, sequence: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_ledger WHERE sequence = ?", [sequence])?;
        Ok(rows > 0)
    }

    /// All entries of one lane, any state, in sequence order.
    pub fn lane(&self, entity_type: EntityType, target_id: &str) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_ledger
             WHERE entity_type = ? AND target_id = ?
             ORDER BY sequence ASC"
        ))?;
        let entries = stmt
            .query_map(params![entity_type.as_str(), target_id], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Whether any entry newer than `sequence` remains in the lane.
    pub fn has_later_in_lane(
        &self,
        entity_type: EntityType,
        target_id: &str,
        sequence: i64,
    ) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sync_ledger
                WHERE entity_type = ? AND target_id = ? AND sequence > ?
            )",
            params![entity_type.as_str(), target_id, sequence],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Ids of every entity of `entity_type` that still has entries.
    pub fn targets(&self, entity_type: EntityType) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT target_id FROM sync_ledger WHERE entity_type = ?")?;
        let ids = stmt
            .query_map([entity_type.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Drop every entry of a lane. Used when a delete supersedes them.
    pub fn discard_lane(&self, entity_type: EntityType, target_id: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM sync_ledger WHERE entity_type = ? AND target_id = ?",
            params![entity_type.as_str(), target_id],
        )?;
        Ok(rows)
    }

    /// Record a transient failure and schedule the next attempt.
    pub fn record_failure(
        &self,
        sequence: i64,
        attempts: u32,
        next_attempt_at: i64,
        error: &str,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_ledger
             SET attempts = ?, next_attempt_at = ?, last_error = ?
             WHERE sequence = ?",
            params![attempts, next_attempt_at, error, sequence],
        )?;
        Ok(())
    }

    /// Remove an entry from automatic retry, keeping it for inspection.
    pub fn park(&self, sequence: i64, attempts: u32, error: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_ledger
             SET state = ?, attempts = ?, last_error = ?
             WHERE sequence = ?",
            params![EntryState::Parked.as_str(), attempts, error, sequence],
        )?;
        Ok(())
    }

    /// Parked entries in sequence order
    pub fn parked(&self) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_ledger WHERE state = 'parked' ORDER BY sequence ASC"
        ))?;
        let entries = stmt
            .query_map([], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Put every parked entry back in the replay queue with a fresh budget.
    pub fn unpark_all(&self) -> Result<Vec<LedgerEntry>> {
        let parked = self.parked()?;
        self.conn.execute(
            "UPDATE sync_ledger
             SET state = 'pending', attempts = 0, next_attempt_at = ?
             WHERE state = 'parked'",
            [now_millis()],
        )?;
        Ok(parked)
    }

    pub fn counts(&self) -> Result<LedgerCounts> {
        let (pending, parked): (i64, i64) = self.conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN state = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN state = 'parked' THEN 1 ELSE 0 END), 0)
             FROM sync_ledger",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(LedgerCounts {
            pending: usize::try_from(pending).unwrap_or_default(),
            parked: usize::try_from(parked).unwrap_or_default(),
        })
    }

    /// Earliest `next_attempt_at` among lane heads that are still pending.
    ///
    /// Entries queued behind another entry of their lane are not due until
    /// the head is confirmed, so they never count.
    pub fn next_due_at(&self) -> Result<Option<i64>> {
        let next = self.conn.query_row(
            "SELECT MIN(l.next_attempt_at) FROM sync_ledger l
             WHERE l.state = 'pending'
               AND NOT EXISTS (
                   SELECT 1 FROM sync_ledger p
                   WHERE p.entity_type = l.entity_type
                     AND p.target_id = l.target_id
                     AND p.sequence < l.sequence
               )",
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Item, NewItem};
    use pretty_assertions::assert_eq;

    fn entity(content: &str) -> Entity {
        Entity::Item(Item::create("guest", NewItem::from_content(content)).unwrap())
    }

    #[test]
    fn test_enqueue_assigns_increasing_sequences() {
        let db = Database::open_in_memory().unwrap();
        let ledger = SyncLedger::new(db.connection());
        let payload = entity("hello");

        let first = ledger
            .enqueue(Operation::Create, EntityType::Item, &payload.id(), Some(&payload))
            .unwrap();
        let second = ledger
            .enqueue(Operation::Delete, EntityType::Item, &payload.id(), None)
            .unwrap();
        assert!(second > first);

        let pending = ledger.peek_pending(None).unwrap();
        assert_eq!(
            pending.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![first, second]
        );
        assert_eq!(pending[0].payload.as_ref(), Some(&payload));
        assert!(pending[1].payload.is_none());
        assert_eq!(pending[0].attempts, 0);
    }

    #[test]
    fn test_sequences_are_not_reused_after_remove() {
        let db = Database::open_in_memory().unwrap();
        let ledger = SyncLedger::new(db.connection());

        let first = ledger
            .enqueue(Operation::Delete, EntityType::Item, "a", None)
            .unwrap();
        assert!(ledger.remove(first).unwrap());
        assert!(!ledger.remove(first).unwrap());

        let second = ledger
            .enqueue(Operation::Delete, EntityType::Item, "b", None)
            .unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_peek_pending_limit() {
        let db = Database::open_in_memory().unwrap();
        let ledger = SyncLedger::new(db.connection());
        for id in ["a", "b", "c"] {
            ledger
                .enqueue(Operation::Delete, EntityType::Collection, id, None)
                .unwrap();
        }

        let page = ledger.peek_pending(Some(2)).unwrap();
        assert_eq!(
            page.iter().map(|e| e.target_id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_parked_entry_blocks_rest_of_lane() {
        let db = Database::open_in_memory().unwrap();
        let ledger = SyncLedger::new(db.connection());
        let payload = entity("hello");
        let id = payload.id();

        let create = ledger
            .enqueue(Operation::Create, EntityType::Item, &id, Some(&payload))
            .unwrap();
        ledger
            .enqueue(Operation::Update, EntityType::Item, &id, Some(&payload))
            .unwrap();
        let other = ledger
            .enqueue(Operation::Delete, EntityType::Item, "other", None)
            .unwrap();

        ledger.park(create, 1, "rejected").unwrap();

        let pending = ledger.peek_pending(None).unwrap();
        assert_eq!(pending.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![other]);
        assert_eq!(ledger.counts().unwrap(), LedgerCounts { pending: 2, parked: 1 });

        let parked = ledger.unpark_all().unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].last_error.as_deref(), Some("rejected"));
        assert_eq!(ledger.peek_pending(None).unwrap().len(), 3);
        assert_eq!(ledger.get(create).unwrap().unwrap().attempts, 0);
    }

    #[test]
    fn test_record_failure_and_discard_lane() {
        let db = Database::open_in_memory().unwrap();
        let ledger = SyncLedger::new(db.connection());
        let payload = entity("hello");
        let id = payload.id();

        let create = ledger
            .enqueue(Operation::Create, EntityType::Item, &id, Some(&payload))
            .unwrap();
        ledger.record_failure(create, 1, 42, "timeout").unwrap();

        let entry = ledger.get(create).unwrap().unwrap();
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.next_attempt_at, 42);
        assert_eq!(ledger.next_due_at().unwrap(), Some(42));

        assert!(!ledger.has_later_in_lane(EntityType::Item, &id, create).unwrap());
        assert_eq!(ledger.targets(EntityType::Item).unwrap(), vec![id.clone()]);
        assert_eq!(ledger.discard_lane(EntityType::Item, &id).unwrap(), 1);
        assert!(ledger.lane(EntityType::Item, &id).unwrap().is_empty());
        assert_eq!(ledger.next_due_at().unwrap(), None);
    }

    #[test]
    fn test_next_due_at_ignores_entries_behind_lane_head() {
        let db = Database::open_in_memory().unwrap();
        let ledger = SyncLedger::new(db.connection());
        let payload = entity("hello");
        let id = payload.id();
        let far_future = now_millis() + 60_000;

        let create = ledger
            .enqueue(Operation::Create, EntityType::Item, &id, Some(&payload))
            .unwrap();
        ledger
            .enqueue(Operation::Update, EntityType::Item, &id, Some(&payload))
            .unwrap();

        ledger.record_failure(create, 1, far_future, "timeout").unwrap();
        assert_eq!(ledger.next_due_at().unwrap(), Some(far_future));

        ledger.park(create, 2, "rejected").unwrap();
        assert_eq!(ledger.next_due_at().unwrap(), None);

        let other = ledger
            .enqueue(Operation::Delete, EntityType::Item, "other", None)
            .unwrap();
        let due = ledger.get(other).unwrap().unwrap().next_attempt_at;
        assert_eq!(ledger.next_due_at().unwrap(), Some(due));
    }
}
