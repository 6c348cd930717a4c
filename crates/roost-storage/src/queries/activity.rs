// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only activity log operations.

use roost_core::FleetError;
use roost_core::types::ActivityRecord;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Append one activity row.
pub async fn append(
    db: &Database,
    bot_id: &str,
    kind: &str,
    detail: &str,
    now: &str,
) -> Result<(), FleetError> {
    let bot_id = bot_id.to_string();
    let kind = kind.to_string();
    let detail = detail.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO activity_log (bot_id, kind, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![bot_id, kind, detail, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent activity for a bot, newest first.
pub async fn recent(
    db: &Database,
    bot_id: &str,
    limit: i64,
) -> Result<Vec<ActivityRecord>, FleetError> {
    let bot_id = bot_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, bot_id, kind, detail, created_at FROM activity_log
                 WHERE bot_id = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![bot_id, limit], |row| {
                Ok(ActivityRecord {
                    id: row.get(0)?,
                    bot_id: row.get(1)?,
                    kind: row.get(2)?,
                    detail: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}
