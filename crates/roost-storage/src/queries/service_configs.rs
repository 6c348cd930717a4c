// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(bot, service) JSON config documents.
//!
//! Each reactive feature service persists its settings and throttle
//! timestamps in its own document; services never share state across bots.

use roost_core::FleetError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Fetch a service's document for one bot.
pub async fn get_document(
    db: &Database,
    bot_id: &str,
    service: &str,
) -> Result<Option<String>, FleetError> {
    let bot_id = bot_id.to_string();
    let service = service.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT document FROM service_configs WHERE bot_id = ?1 AND service = ?2",
                params![bot_id, service],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(doc) => Ok(Some(doc)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert a service's document for one bot.
pub async fn put_document(
    db: &Database,
    bot_id: &str,
    service: &str,
    document: &str,
    now: &str,
) -> Result<(), FleetError> {
    let bot_id = bot_id.to_string();
    let service = service.to_string();
    let document = document.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO service_configs (bot_id, service, document, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(bot_id, service) DO UPDATE SET document = ?3, updated_at = ?4",
                params![bot_id, service, document, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
