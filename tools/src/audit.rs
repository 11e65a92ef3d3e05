//! Audit events for every tool invocation
//!
//! The dispatcher reports each outcome to an [`AuditSink`]. Two sinks ship
//! with the crate: [`TracingAudit`] writes log events, [`AuditLog`] keeps a
//! hash-chained ledger in SQLite.

use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

/// One audited action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// What happened, e.g. `tool.completed`
    pub operation: String,
    /// Who asked for it
    pub actor: String,
    /// Tool name the event concerns
    pub target: String,
    pub metadata: Value,
}

impl AuditEvent {
    pub fn new(operation: &str, actor: &str, target: &str, metadata: Value) -> Self {
        Self {
            operation: operation.to_string(),
            actor: actor.to_string(),
            target: target.to_string(),
            metadata,
        }
    }
}

/// Destination for audit events. Recording never fails the invocation.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits audit events as structured log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: AuditEvent) {
        info!(
            operation = %event.operation,
            actor = %event.actor,
            target = %event.target,
            metadata = %event.metadata,
            "audit"
        );
    }
}

struct Ledger {
    conn: Connection,
    last_hash: String,
}

/// Hash-chained audit ledger stored in SQLite
pub struct AuditLog {
    ledger: Mutex<Ledger>,
}

impl AuditLog {
    pub fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                operation TEXT NOT NULL,
                actor TEXT NOT NULL,
                target TEXT NOT NULL,
                metadata TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                prev_hash TEXT NOT NULL,
                hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_target ON audit_log(target);
            CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_log(actor);
            CREATE INDEX IF NOT EXISTS idx_audit_time ON audit_log(timestamp);",
        )?;

        // Continue the chain from the newest entry
        let last_hash = conn
            .query_row(
                "SELECT hash FROM audit_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .unwrap_or_else(|_| "genesis".to_string());

        Ok(Self {
            ledger: Mutex::new(Ledger { conn, last_hash }),
        })
    }

    /// Verify the audit chain integrity
    pub fn verify_chain(&self) -> Result<bool> {
        let ledger = self
            .ledger
            .lock()
            .map_err(|e| anyhow::anyhow!("Audit ledger lock error: {e}"))?;
        let mut stmt = ledger.conn.prepare(
            "SELECT operation, actor, target, metadata, timestamp, prev_hash, hash FROM audit_log ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredEntry {
                operation: row.get(0)?,
                actor: row.get(1)?,
                target: row.get(2)?,
                metadata: row.get(3)?,
                timestamp: row.get(4)?,
                prev_hash: row.get(5)?,
                hash: row.get(6)?,
            })
        })?;

        let mut expected_prev = "genesis".to_string();
        for row in rows {
            let entry = row?;
            if entry.prev_hash != expected_prev {
                return Ok(false);
            }
            let computed = chain_hash(
                &entry.prev_hash,
                &entry.operation,
                &entry.actor,
                &entry.target,
                &entry.metadata,
                &entry.timestamp,
            );
            if computed != entry.hash {
                return Ok(false);
            }
            expected_prev = entry.hash;
        }

        Ok(true)
    }

    pub fn entry_count(&self) -> Result<u64> {
        let ledger = self
            .ledger
            .lock()
            .map_err(|e| anyhow::anyhow!("Audit ledger lock error: {e}"))?;
        let count: i64 = ledger
            .conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event: AuditEvent) {
        let Ok(mut ledger) = self.ledger.lock() else {
            tracing::error!("Audit ledger lock poisoned, dropping {}", event.operation);
            return;
        };
        let timestamp = chrono::Utc::now().to_rfc3339();
        let metadata = event.metadata.to_string();
        let hash = chain_hash(
            &ledger.last_hash,
            &event.operation,
            &event.actor,
            &event.target,
            &metadata,
            &timestamp,
        );

        let result = ledger.conn.execute(
            "INSERT INTO audit_log (operation, actor, target, metadata, timestamp, prev_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                event.operation,
                event.actor,
                event.target,
                metadata,
                timestamp,
                &ledger.last_hash,
                &hash,
            ],
        );

        match result {
            Ok(_) => {
                ledger.last_hash = hash;
                info!(
                    "Audit: {} target={} actor={}",
                    event.operation, event.target, event.actor
                );
            }
            Err(e) => {
                tracing::error!("Failed to write audit log: {e}");
            }
        }
    }
}

struct StoredEntry {
    operation: String,
    actor: String,
    target: String,
    metadata: String,
    timestamp: String,
    prev_hash: String,
    hash: String,
}

/// SHA256(prev_hash + operation + actor + target + metadata + timestamp)
fn chain_hash(
    prev_hash: &str,
    operation: &str,
    actor: &str,
    target: &str,
    metadata: &str,
    timestamp: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash);
    hasher.update(operation);
    hasher.update(actor);
    hasher.update(target);
    hasher.update(metadata);
    hasher.update(timestamp);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn event(op: &str, target: &str) -> AuditEvent {
        AuditEvent::new(op, "api-key", target, json!({"executionId": "exec-1"}))
    }

    fn last_hash(log: &AuditLog) -> String {
        log.ledger.lock().unwrap().last_hash.clone()
    }

    #[test]
    fn test_audit_log_chain() {
        let tmp = NamedTempFile::new().unwrap();
        let log = AuditLog::new(tmp.path().to_str().unwrap()).unwrap();

        log.record(event("tool.completed", "anf_accounts_list"));
        log.record(event("tool.rejected", "anf_pools_create_or_update"));

        assert!(log.verify_chain().unwrap());
        assert_eq!(log.entry_count().unwrap(), 2);
    }

    #[test]
    fn test_audit_log_empty_chain() {
        let tmp = NamedTempFile::new().unwrap();
        let log = AuditLog::new(tmp.path().to_str().unwrap()).unwrap();
        assert!(log.verify_chain().unwrap());
        assert_eq!(last_hash(&log), "genesis");
    }

    #[test]
    fn test_audit_log_hash_changes_after_record() {
        let tmp = NamedTempFile::new().unwrap();
        let log = AuditLog::new(tmp.path().to_str().unwrap()).unwrap();

        let before = last_hash(&log);
        log.record(event("tool.completed", "anf_volumes_get"));
        let after = last_hash(&log);

        assert_ne!(before, after);
        assert_ne!(after, "genesis");
    }

    #[test]
    fn test_audit_log_chain_persistence() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        {
            let log = AuditLog::new(&path).unwrap();
            log.record(event("tool.completed", "anf_accounts_list"));
            log.record(event("tool.failed", "anf_volumes_delete"));
        }

        {
            let log = AuditLog::new(&path).unwrap();
            log.record(event("tool.placeholder", "anf_volumes_break_replication"));
            assert!(log.verify_chain().unwrap());
            assert_eq!(log.entry_count().unwrap(), 3);
        }
    }

    #[test]
    fn test_audit_log_detects_tampering() {
        let tmp = NamedTempFile::new().unwrap();
        let log = AuditLog::new(tmp.path().to_str().unwrap()).unwrap();
        log.record(event("tool.completed", "anf_accounts_list"));
        log.record(event("tool.completed", "anf_pools_list"));

        log.ledger
            .lock()
            .unwrap()
            .conn
            .execute("UPDATE audit_log SET actor = 'intruder' WHERE id = 1", [])
            .unwrap();

        assert!(!log.verify_chain().unwrap());
    }

    #[test]
    fn test_audit_log_many_entries() {
        let tmp = NamedTempFile::new().unwrap();
        let log = AuditLog::new(tmp.path().to_str().unwrap()).unwrap();
        for i in 0..50 {
            log.record(AuditEvent::new(
                if i % 7 == 0 { "tool.failed" } else { "tool.completed" },
                &format!("actor-{}", i % 3),
                &format!("anf_tool_{}", i % 5),
                json!({"i": i}),
            ));
        }
        assert!(log.verify_chain().unwrap());
    }
}
