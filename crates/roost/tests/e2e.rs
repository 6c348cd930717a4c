// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: two server processes sharing one SQLite datastore,
//! each with its own gateway, exercising registration, the identity claim
//! protocol, and the cross-tenancy relay over real HTTP.

use std::collections::BTreeMap;
use std::sync::Arc;

use roost_commands::default_registry;
use roost_config::model::{FeaturesConfig, StorageConfig};
use roost_core::traits::{FleetStore, Transport};
use roost_core::types::{ConnectionState, MessageKey, MessagePayload, OutboundContent, TransportEvent, TransportMessage};
use roost_features::FeatureSet;
use roost_gateway::{AuthConfig, GatewayState, build_router};
use roost_isolation::IsolationLayer;
use roost_registry::{IdentityRegistry, TenancyRouter};
use roost_session::{FleetManager, SessionDeps, SessionSettings};
use roost_storage::SqliteStore;
use roost_test_utils::MockTransport;
use tempfile::TempDir;

const TOKEN: &str = "fleet-token";

struct TestServer {
    name: String,
    base_url: String,
    store: Arc<SqliteStore>,
    transport: Arc<MockTransport>,
    _scratch: TempDir,
}

fn settings() -> SessionSettings {
    SessionSettings {
        command_prefix: ".".to_string(),
        reconnect_base: std::time::Duration::from_secs(5),
        reconnect_cap: std::time::Duration::from_secs(30),
        settle_delay: std::time::Duration::from_millis(10),
        heartbeat_interval: std::time::Duration::from_secs(60),
        send_timeout: std::time::Duration::from_secs(10),
    }
}

/// Boot one "server process": its own store handle on the shared database,
/// fleet manager, and gateway on an ephemeral port.
async fn spawn_server(
    name: &str,
    db_path: &std::path::Path,
    peers: BTreeMap<String, String>,
) -> TestServer {
    let store = Arc::new(SqliteStore::new(
        StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        },
        name,
    ));
    store.initialize().await.unwrap();

    let transport = Arc::new(MockTransport::new());
    let scratch = TempDir::new().unwrap();
    let mut features_config = FeaturesConfig::default();
    features_config.scratch_dir = scratch
        .path()
        .join("scratch")
        .to_string_lossy()
        .into_owned();

    let deps = SessionDeps {
        store: store.clone() as Arc<dyn FleetStore>,
        transport: transport.clone() as Arc<dyn Transport>,
        commands: default_registry(),
        isolation: IsolationLayer::new(),
        features: Arc::new(FeatureSet::new(
            store.clone() as Arc<dyn FleetStore>,
            &features_config,
        )),
        ai_reply: None,
    };

    let state = GatewayState {
        server_name: name.to_string(),
        fleet: Arc::new(FleetManager::new(deps, settings())),
        store: store.clone() as Arc<dyn FleetStore>,
        identity: Arc::new(IdentityRegistry::new(
            store.clone() as Arc<dyn FleetStore>,
            name,
        )),
        router: Arc::new(TenancyRouter::new(name, peers, Some(TOKEN.to_string())).unwrap()),
        auth: AuthConfig {
            bearer_token: Some(TOKEN.to_string()),
        },
        start_time: std::time::Instant::now(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        name: name.to_string(),
        base_url,
        store,
        transport,
        _scratch: scratch,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn post(
    client: &reqwest::Client,
    server: &TestServer,
    path: &str,
    body: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}{path}", server.base_url))
        .bearer_auth(TOKEN)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn full_lifecycle_on_one_server() {
    let dir = TempDir::new().unwrap();
    let s1 = spawn_server("S1", &dir.path().join("fleet.db"), BTreeMap::new()).await;
    let client = client();

    // Register, approve, start.
    let created = post(&client, &s1, "/v1/bots", serde_json::json!({"id": "bot-a"})).await;
    assert_eq!(created.status(), 201);
    let approved = post(&client, &s1, "/v1/bots/bot-a/approve", serde_json::json!({})).await;
    assert_eq!(approved.status(), 200);
    let started = post(&client, &s1, "/v1/bots/bot-a/start", serde_json::json!({})).await;
    assert_eq!(started.status(), 200);
    let body: serde_json::Value = started.json().await.unwrap();
    assert_eq!(body["status"], "connecting");

    // The transport session comes up and serves a command.
    let conn = s1.transport.last_connection().await.unwrap();
    conn.inject_event(TransportEvent::ConnectionStateChanged(ConnectionState::Open))
        .await;
    conn.inject_event(TransportEvent::MessageReceived(TransportMessage {
        key: MessageKey::new("m1", "chat-1", Some("alice")),
        sender_name: Some("Alice".to_string()),
        from_self: false,
        payload: MessagePayload::text(".ping"),
        timestamp: "2026-01-01T00:00:00Z".to_string(),
    }))
    .await;

    // Wait for the pump to process both events.
    for _ in 0..50 {
        if conn.sent_count().await > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let sent = conn.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, OutboundContent::Text("pong".to_string()));

    // The persisted record reflects it all.
    let bot = s1.store.get_bot("bot-a").await.unwrap().unwrap();
    assert_eq!(bot.status.to_string(), "online");
    assert_eq!(bot.messages_handled, 1);
    assert_eq!(bot.commands_handled, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn identity_registration_is_unique_across_servers() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("fleet.db");
    let s1 = spawn_server("S1", &db, BTreeMap::new()).await;
    let s2 = spawn_server("S2", &db, BTreeMap::new()).await;
    let client = client();

    for (server, bot) in [(&s1, "bot-1"), (&s2, "bot-2")] {
        let created = post(
            &client,
            server,
            "/v1/bots",
            serde_json::json!({"id": bot}),
        )
        .await;
        assert_eq!(created.status(), 201);
    }

    // S1 claims the number.
    let response = post(
        &client,
        &s1,
        "/v1/bots/bot-1/register",
        serde_json::json!({"identity": "254700000000"}),
    )
    .await;
    assert_eq!(response.status(), 200);

    // S2 loses and is told who won.
    let response = post(
        &client,
        &s2,
        "/v1/bots/bot-2/register",
        serde_json::json!({"identity": "254700000000"}),
    )
    .await;
    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["owner"], "S1");

    // The shared registry names exactly one owner.
    let entry = s2
        .store
        .get_registry_entry("254700000000")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.server_name, "S1");
    assert_eq!(s1.name, "S1");
}

#[tokio::test(flavor = "multi_thread")]
async fn cross_tenancy_action_is_relayed_to_the_owner() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("fleet.db");

    // S2 first so S1 can point at its URL.
    let s2 = spawn_server("S2", &db, BTreeMap::new()).await;
    let mut peers = BTreeMap::new();
    peers.insert("S2".to_string(), s2.base_url.clone());
    let s1 = spawn_server("S1", &db, peers).await;
    let client = client();

    // A bot owned by S2, approved.
    let created = post(&client, &s2, "/v1/bots", serde_json::json!({"id": "remote-bot"})).await;
    assert_eq!(created.status(), 201);
    let approved = post(&client, &s2, "/v1/bots/remote-bot/approve", serde_json::json!({})).await;
    assert_eq!(approved.status(), 200);

    // Submitted to S1, executed by S2.
    let response = post(
        &client,
        &s1,
        "/v1/actions",
        serde_json::json!({
            "bot_id": "remote-bot",
            "action": "start",
            "owning_server": "S2"
        }),
    )
    .await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["bot_id"], "remote-bot");
    assert_eq!(body["status"], "connecting");

    // The owner's transport connected; the caller's never did.
    assert_eq!(s2.transport.credentials_seen().await.len(), 1);
    assert_eq!(s1.transport.credentials_seen().await.len(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_for_unknown_owner_fails_typed() {
    let dir = TempDir::new().unwrap();
    let s1 = spawn_server("S1", &dir.path().join("fleet.db"), BTreeMap::new()).await;
    let client = client();

    let response = post(
        &client,
        &s1,
        "/v1/actions",
        serde_json::json!({
            "bot_id": "whatever",
            "action": "stop",
            "owning_server": "S9"
        }),
    )
    .await;
    assert_eq!(response.status(), 404);
}
