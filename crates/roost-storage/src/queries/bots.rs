// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot record CRUD and credential blob operations.

use std::str::FromStr;

use roost_core::FleetError;
use roost_core::types::{ApprovalState, BotRecord, BotStatus, FeatureFlags};
use rusqlite::{Row, params};

use crate::database::{Database, column_decode_err, map_tr_err};

const BOT_COLUMNS: &str = "id, server_name, external_identity, status, features, \
     messages_handled, commands_handled, approval, approval_expires_at, \
     last_seen_at, created_at, updated_at";

fn bot_from_row(row: &Row<'_>) -> rusqlite::Result<BotRecord> {
    let status_raw: String = row.get(3)?;
    let features_raw: String = row.get(4)?;
    let approval_raw: String = row.get(7)?;
    Ok(BotRecord {
        id: row.get(0)?,
        server_name: row.get(1)?,
        external_identity: row.get(2)?,
        status: BotStatus::from_str(&status_raw).map_err(|e| column_decode_err(3, e))?,
        features: serde_json::from_str::<FeatureFlags>(&features_raw)
            .map_err(|e| column_decode_err(4, e))?,
        messages_handled: row.get(5)?,
        commands_handled: row.get(6)?,
        approval: ApprovalState::from_str(&approval_raw)
            .map_err(|e| column_decode_err(7, e))?,
        approval_expires_at: row.get(8)?,
        last_seen_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Insert a new bot record.
pub async fn create_bot(db: &Database, bot: &BotRecord) -> Result<(), FleetError> {
    let bot = bot.clone();
    let features = serde_json::to_string(&bot.features).map_err(|e| FleetError::Storage {
        source: Box::new(e),
    })?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bots (id, server_name, external_identity, status, features,
                     messages_handled, commands_handled, approval, approval_expires_at,
                     last_seen_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    bot.id,
                    bot.server_name,
                    bot.external_identity,
                    bot.status.to_string(),
                    features,
                    bot.messages_handled,
                    bot.commands_handled,
                    bot.approval.to_string(),
                    bot.approval_expires_at,
                    bot.last_seen_at,
                    bot.created_at,
                    bot.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a bot record by id.
pub async fn get_bot(db: &Database, id: &str) -> Result<Option<BotRecord>, FleetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {BOT_COLUMNS} FROM bots WHERE id = ?1"))?;
            let result = stmt.query_row(params![id], bot_from_row);
            match result {
                Ok(bot) => Ok(Some(bot)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List bots owned by `server_name`, optionally filtered by approval state.
pub async fn list_bots(
    db: &Database,
    server_name: &str,
    approval: Option<ApprovalState>,
) -> Result<Vec<BotRecord>, FleetError> {
    let server_name = server_name.to_string();
    let approval = approval.map(|a| a.to_string());
    db.connection()
        .call(move |conn| {
            let mut bots = Vec::new();
            match &approval {
                Some(filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {BOT_COLUMNS} FROM bots
                         WHERE server_name = ?1 AND approval = ?2
                         ORDER BY created_at"
                    ))?;
                    let rows = stmt.query_map(params![server_name, filter], bot_from_row)?;
                    for row in rows {
                        bots.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {BOT_COLUMNS} FROM bots
                         WHERE server_name = ?1 ORDER BY created_at"
                    ))?;
                    let rows = stmt.query_map(params![server_name], bot_from_row)?;
                    for row in rows {
                        bots.push(row?);
                    }
                }
            }
            Ok(bots)
        })
        .await
        .map_err(map_tr_err)
}

/// Update a bot's lifecycle status.
pub async fn update_bot_status(
    db: &Database,
    id: &str,
    status: BotStatus,
    now: &str,
) -> Result<(), FleetError> {
    let id = id.to_string();
    let status = status.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Set or clear a bot's linked external identity.
pub async fn set_bot_identity(
    db: &Database,
    id: &str,
    identity: Option<&str>,
    now: &str,
) -> Result<(), FleetError> {
    let id = id.to_string();
    let identity = identity.map(str::to_string);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET external_identity = ?1, updated_at = ?2 WHERE id = ?3",
                params![identity, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Set a bot's approval state and optional expiry.
pub async fn set_bot_approval(
    db: &Database,
    id: &str,
    approval: ApprovalState,
    expires_at: Option<&str>,
    now: &str,
) -> Result<(), FleetError> {
    let id = id.to_string();
    let approval = approval.to_string();
    let expires_at = expires_at.map(str::to_string);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET approval = ?1, approval_expires_at = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![approval, expires_at, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Replace a bot's feature flag document.
pub async fn set_bot_features(
    db: &Database,
    id: &str,
    features: &FeatureFlags,
    now: &str,
) -> Result<(), FleetError> {
    let id = id.to_string();
    let features = serde_json::to_string(features).map_err(|e| FleetError::Storage {
        source: Box::new(e),
    })?;
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET features = ?1, updated_at = ?2 WHERE id = ?3",
                params![features, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Add to a bot's usage counters.
pub async fn bump_bot_counters(
    db: &Database,
    id: &str,
    messages: i64,
    commands: i64,
) -> Result<(), FleetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET messages_handled = messages_handled + ?1,
                     commands_handled = commands_handled + ?2
                 WHERE id = ?3",
                params![messages, commands, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Heartbeat touch of `last_seen_at`.
pub async fn touch_bot_seen(db: &Database, id: &str, at: &str) -> Result<(), FleetError> {
    let id = id.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET last_seen_at = ?1 WHERE id = ?2",
                params![at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a bot record (credentials cascade).
pub async fn delete_bot(db: &Database, id: &str) -> Result<(), FleetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM bots WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Load a bot's credential blob.
pub async fn load_credential(db: &Database, bot_id: &str) -> Result<Option<Vec<u8>>, FleetError> {
    let bot_id = bot_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT blob FROM credentials WHERE bot_id = ?1",
                params![bot_id],
                |row| row.get::<_, Vec<u8>>(0),
            );
            match result {
                Ok(blob) => Ok(Some(blob)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert a bot's credential blob.
pub async fn save_credential(
    db: &Database,
    bot_id: &str,
    blob: &[u8],
    now: &str,
) -> Result<(), FleetError> {
    let bot_id = bot_id.to_string();
    let blob = blob.to_vec();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO credentials (bot_id, blob, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(bot_id) DO UPDATE SET blob = ?2, updated_at = ?3",
                params![bot_id, blob, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove a bot's credential blob.
pub async fn clear_credential(db: &Database, bot_id: &str) -> Result<(), FleetError> {
    let bot_id = bot_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM credentials WHERE bot_id = ?1", params![bot_id])?;
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
        let db_path = dir.path().join("bots.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_bot(id: &str, server: &str) -> BotRecord {
        BotRecord {
            id: id.to_string(),
            server_name: server.to_string(),
            external_identity: None,
            status: BotStatus::Offline,
            features: FeatureFlags::default(),
            messages_handled: 0,
            commands_handled: 0,
            approval: ApprovalState::Pending,
            approval_expires_at: None,
            last_seen_at: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_bot_round_trips() {
        let (db, _dir) = setup_db().await;
        let bot = make_bot("b1", "S1");
        create_bot(&db, &bot).await.unwrap();

        let fetched = get_bot(&db, "b1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "b1");
        assert_eq!(fetched.server_name, "S1");
        assert_eq!(fetched.status, BotStatus::Offline);
        assert_eq!(fetched.approval, ApprovalState::Pending);
        assert!(fetched.external_identity.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_bot_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_bot(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_bots_filters_by_server_and_approval() {
        let (db, _dir) = setup_db().await;
        create_bot(&db, &make_bot("b1", "S1")).await.unwrap();
        create_bot(&db, &make_bot("b2", "S1")).await.unwrap();
        create_bot(&db, &make_bot("b3", "S2")).await.unwrap();
        set_bot_approval(
            &db,
            "b1",
            ApprovalState::Approved,
            None,
            "2026-01-02T00:00:00.000Z",
        )
        .await
        .unwrap();

        let all_s1 = list_bots(&db, "S1", None).await.unwrap();
        assert_eq!(all_s1.len(), 2);

        let approved = list_bots(&db, "S1", Some(ApprovalState::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, "b1");

        let pending_s2 = list_bots(&db, "S2", Some(ApprovalState::Pending))
            .await
            .unwrap();
        assert_eq!(pending_s2.len(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_identity_and_features_update() {
        let (db, _dir) = setup_db().await;
        create_bot(&db, &make_bot("b1", "S1")).await.unwrap();

        update_bot_status(&db, "b1", BotStatus::Online, "2026-01-02T00:00:00.000Z")
            .await
            .unwrap();
        set_bot_identity(&db, "b1", Some("254700000000"), "2026-01-02T00:00:00.000Z")
            .await
            .unwrap();
        let features = FeatureFlags {
            anti_delete: true,
            ..Default::default()
        };
        set_bot_features(&db, "b1", &features, "2026-01-02T00:00:00.000Z")
            .await
            .unwrap();

        let bot = get_bot(&db, "b1").await.unwrap().unwrap();
        assert_eq!(bot.status, BotStatus::Online);
        assert_eq!(bot.external_identity.as_deref(), Some("254700000000"));
        assert!(bot.features.anti_delete);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn counters_accumulate() {
        let (db, _dir) = setup_db().await;
        create_bot(&db, &make_bot("b1", "S1")).await.unwrap();
        bump_bot_counters(&db, "b1", 3, 1).await.unwrap();
        bump_bot_counters(&db, "b1", 2, 0).await.unwrap();

        let bot = get_bot(&db, "b1").await.unwrap().unwrap();
        assert_eq!(bot.messages_handled, 5);
        assert_eq!(bot.commands_handled, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn credential_blob_round_trips_and_cascades() {
        let (db, _dir) = setup_db().await;
        create_bot(&db, &make_bot("b1", "S1")).await.unwrap();

        assert!(load_credential(&db, "b1").await.unwrap().is_none());

        save_credential(&db, "b1", b"blob-v1", "2026-01-01T00:00:01.000Z")
            .await
            .unwrap();
        assert_eq!(
            load_credential(&db, "b1").await.unwrap().unwrap(),
            b"blob-v1"
        );

        // Upsert replaces.
        save_credential(&db, "b1", b"blob-v2", "2026-01-01T00:00:02.000Z")
            .await
            .unwrap();
        assert_eq!(
            load_credential(&db, "b1").await.unwrap().unwrap(),
            b"blob-v2"
        );

        // Deleting the bot removes the credential.
        delete_bot(&db, "b1").await.unwrap();
        assert!(load_credential(&db, "b1").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn clear_credential_removes_blob() {
        let (db, _dir) = setup_db().await;
        create_bot(&db, &make_bot("b1", "S1")).await.unwrap();
        save_credential(&db, "b1", b"blob", "2026-01-01T00:00:01.000Z")
            .await
            .unwrap();
        clear_credential(&db, "b1").await.unwrap();
        assert!(load_credential(&db, "b1").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn touch_seen_updates_timestamp() {
        let (db, _dir) = setup_db().await;
        create_bot(&db, &make_bot("b1", "S1")).await.unwrap();
        touch_bot_seen(&db, "b1", "2026-01-03T00:00:00.000Z")
            .await
            .unwrap();
        let bot = get_bot(&db, "b1").await.unwrap().unwrap();
        assert_eq!(bot.last_seen_at.as_deref(), Some("2026-01-03T00:00:00.000Z"));
        db.close().await.unwrap();
    }
}
