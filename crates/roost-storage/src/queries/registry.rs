// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-server identity registry operations.
//!
//! `try_claim` is the one operation whose correctness crosses process
//! boundaries: it relies on the PRIMARY KEY on `registry.identity` and an
//! `INSERT ... ON CONFLICT DO NOTHING`, so exactly one of any set of
//! concurrent claims succeeds, decided by SQLite, never by in-process logic.

use roost_core::FleetError;
use roost_core::types::{ClaimOutcome, RegistryEntry};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Atomically claim `identity` for `server_name`.
pub async fn try_claim(
    db: &Database,
    identity: &str,
    server_name: &str,
    now: &str,
) -> Result<ClaimOutcome, FleetError> {
    let identity = identity.to_string();
    let server_name = server_name.to_string();
    let now = now.to_string();
    let owner = db
        .connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO registry (identity, server_name, claimed_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(identity) DO NOTHING",
                params![identity, server_name, now],
            )?;
            if inserted == 1 {
                return Ok(None);
            }
            // Lost the race (or the entry pre-existed): read the owner.
            let result = conn.query_row(
                "SELECT server_name FROM registry WHERE identity = ?1",
                params![identity],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(owner) => Ok(Some(owner)),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)?;

    match owner {
        None => Ok(ClaimOutcome::Claimed),
        Some(owner) => Ok(ClaimOutcome::AlreadyOwned { owner }),
    }
}

/// Look up the entry for one identity.
pub async fn get_entry(
    db: &Database,
    identity: &str,
) -> Result<Option<RegistryEntry>, FleetError> {
    let identity = identity.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT identity, server_name, claimed_at FROM registry WHERE identity = ?1",
                params![identity],
                |row| {
                    Ok(RegistryEntry {
                        identity: row.get(0)?,
                        server_name: row.get(1)?,
                        claimed_at: row.get(2)?,
                    })
                },
            );
            match result {
                Ok(entry) => Ok(Some(entry)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List all registry entries.
pub async fn list_entries(db: &Database) -> Result<Vec<RegistryEntry>, FleetError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT identity, server_name, claimed_at FROM registry ORDER BY identity",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(RegistryEntry {
                    identity: row.get(0)?,
                    server_name: row.get(1)?,
                    claimed_at: row.get(2)?,
                })
            })?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Manually reassign an identity to another server.
pub async fn set_owner(
    db: &Database,
    identity: &str,
    server_name: &str,
) -> Result<(), FleetError> {
    let identity_param = identity.to_string();
    let server_name = server_name.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE registry SET server_name = ?1 WHERE identity = ?2",
                params![server_name, identity_param],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(FleetError::not_found("registry entry", identity));
    }
    Ok(())
}

/// Delete a registry entry.
pub async fn delete_entry(db: &Database, identity: &str) -> Result<(), FleetError> {
    let identity = identity.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM registry WHERE identity = ?1", params![identity])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("registry.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn first_claim_wins_second_sees_owner() {
        let (db, _dir) = setup_db().await;
        let outcome = try_claim(&db, "254700000000", "S1", "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);

        let outcome = try_claim(&db, "254700000000", "S2", "2026-01-01T00:00:01.000Z")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::AlreadyOwned {
                owner: "S1".to_string()
            }
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reclaim_by_owner_reports_owner_name() {
        let (db, _dir) = setup_db().await;
        try_claim(&db, "1555", "S1", "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();
        // The store reports ownership; idempotency is decided by the caller.
        let outcome = try_claim(&db, "1555", "S1", "2026-01-01T00:00:01.000Z")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::AlreadyOwned {
                owner: "S1".to_string()
            }
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_claims_yield_exactly_one_winner() {
        let (db, _dir) = setup_db().await;
        let db = std::sync::Arc::new(db);

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = std::sync::Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                try_claim(
                    &db,
                    "254711111111",
                    &format!("S{i}"),
                    "2026-01-01T00:00:00.000Z",
                )
                .await
                .unwrap()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() == ClaimOutcome::Claimed {
                wins += 1;
            }
        }
        assert_eq!(wins, 1, "exactly one concurrent claim may succeed");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reassign_changes_owner_and_requires_existing_entry() {
        let (db, _dir) = setup_db().await;
        try_claim(&db, "1555", "S1", "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();

        set_owner(&db, "1555", "S2").await.unwrap();
        let entry = get_entry(&db, "1555").await.unwrap().unwrap();
        assert_eq!(entry.server_name, "S2");

        let missing = set_owner(&db, "1556", "S2").await;
        assert!(matches!(missing, Err(FleetError::NotFound { .. })));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_and_delete() {
        let (db, _dir) = setup_db().await;
        try_claim(&db, "100", "S1", "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();
        try_claim(&db, "200", "S2", "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();

        let entries = list_entries(&db).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identity, "100");

        delete_entry(&db, "100").await.unwrap();
        assert!(get_entry(&db, "100").await.unwrap().is_none());

        // Identity is claimable again after deletion.
        let outcome = try_claim(&db, "100", "S3", "2026-01-01T00:00:02.000Z")
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
        db.close().await.unwrap();
    }
}
