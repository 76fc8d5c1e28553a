//! Integration tests that replay small journals through the engine.
//!
//! Each test opens an engine on a temp data directory, feeds it journal
//! lines, and inspects the JSON lines it emitted.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use kisel_core::KiselConfig;
use kisel_engine::{Engine, InboundEvent, OutboundLine};
use kisel_types::RoleId;

async fn engine(dir: &tempfile::TempDir) -> (Engine, UnboundedReceiver<OutboundLine>) {
    let mut config = KiselConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.catalog.promotion.from_role = Some(RoleId::new(10));
    config.catalog.promotion.to_role = Some(RoleId::new(20));
    config.catalog.promotion.price = 100;
    let (tx, rx) = mpsc::unbounded_channel();
    (Engine::open(&config, tx).await.unwrap(), rx)
}

async fn feed(engine: &Engine, journal: &str) {
    for (i, line) in journal.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        engine
            .handle(InboundEvent::parse(i.saturating_add(1), line).unwrap())
            .await;
    }
}

fn drain(rx: &mut UnboundedReceiver<OutboundLine>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(line) = rx.try_recv() {
        out.push(serde_json::to_value(&line).unwrap());
    }
    out
}

fn results(lines: &[Value]) -> Vec<&Value> {
    lines.iter().filter(|l| l["type"] == "result").collect()
}

#[tokio::test]
async fn call_voice_sends_to_reachable_friends_with_channel_link() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut rx) = engine(&dir).await;

    feed(
        &engine,
        r#"
        {"type":"presence","user":"2","guild":"1","status":"online"}
        {"type":"presence","user":"3","guild":"1","status":"offline"}
        {"type":"presence","user":"4","guild":"1","status":"dnd","activity":{"kind":"playing","name":"Chess"}}
        {"type":"add_friend","owner":"1","friend":"2"}
        {"type":"add_friend","owner":"1","friend":"3"}
        {"type":"add_friend","owner":"1","friend":"4"}
        {"type":"voice_state","user":"1","guild":"1","after":"55","at":"2026-03-01T20:00:00Z"}
        {"type":"call_voice","owner":"1","mode":"online_only"}
        "#,
    )
    .await;

    let lines = drain(&mut rx);
    let dms: Vec<&Value> = lines
        .iter()
        .filter(|l| l["type"] == "direct_message")
        .collect();
    assert_eq!(dms.len(), 2);
    assert!(dms.iter().all(|dm| dm["channel_url"] == "https://discord.com/channels/1/55"));

    let call = results(&lines).into_iter().last().unwrap();
    assert_eq!(call["command"], "call_voice");
    assert_eq!(call["data"]["sent_count"], 2);
    assert_eq!(call["data"]["skipped_count"], 1);
}

#[tokio::test]
async fn voice_minutes_are_credited_and_leftovers_forfeited() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut rx) = engine(&dir).await;

    feed(
        &engine,
        r#"
        {"type":"voice_state","user":"7","guild":"1","after":"5","at":"2999-03-01T20:00:00Z"}
        {"type":"voice_state","user":"7","guild":"1","before":"5","after":"6","at":"2999-03-01T20:01:30Z"}
        {"type":"voice_state","user":"7","before":"6","at":"2999-03-01T20:02:30Z"}
        {"type":"voice_state","user":"8","guild":"1","after":"5","at":"2999-03-01T20:03:00Z"}
        {"type":"voice_state","user":"9","guild":"1","after":"5","at":"2999-03-01T20:10:00Z"}
        {"type":"score","user":"7"}
        "#,
    )
    .await;

    let lines = drain(&mut rx);
    let score = results(&lines).into_iter().last().unwrap();
    assert_eq!(score["data"]["score"], 2);

    // Stamps lie ahead of the wall clock, so shutdown ends sessions at the
    // last event; user 9 has no whole minute.
    let forfeited = engine.shutdown();
    assert_eq!(forfeited.len(), 1);
    let user8 = forfeited.first().unwrap();
    assert_eq!(user8.user.get(), 8);
    assert_eq!(user8.minutes, 7);
}

#[tokio::test]
async fn unstamped_voice_events_use_the_wall_clock() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut rx) = engine(&dir).await;

    feed(
        &engine,
        r#"
        {"type":"voice_state","user":"7","guild":"1","after":"5","at":"2020-01-01T00:00:00Z"}
        {"type":"voice_state","user":"7","before":"5"}
        {"type":"voice_state","user":"8","guild":"1","after":"5","at":"2020-01-01T00:00:00Z"}
        {"type":"voice_state","user":"9","guild":"1","after":"5"}
        {"type":"voice_state","user":"9","before":"5"}
        {"type":"score","user":"7"}
        "#,
    )
    .await;

    // Years have passed since the stamped entry.
    let lines = drain(&mut rx);
    let score = results(&lines).into_iter().last().unwrap();
    assert!(score["data"]["score"].as_u64().unwrap() > 1_000_000);

    let forfeited = engine.shutdown();
    assert_eq!(forfeited.len(), 1);
    assert_eq!(forfeited[0].user.get(), 8);
    assert!(forfeited[0].minutes > 1_000_000);
}

#[tokio::test]
async fn list_friends_prunes_deleted_accounts() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut rx) = engine(&dir).await;

    feed(
        &engine,
        r#"
        {"type":"profile","user":"2","name":"anna"}
        {"type":"profile","user":"3","name":"boris"}
        {"type":"add_friend","owner":"1","friend":"2"}
        {"type":"add_friend","owner":"1","friend":"3"}
        {"type":"add_friend","owner":"1","friend":"4"}
        {"type":"profile_deleted","user":"3"}
        {"type":"list_friends","owner":"1"}
        {"type":"list_friends","owner":"1"}
        "#,
    )
    .await;

    let lines = drain(&mut rx);
    let listings: Vec<&Value> = results(&lines)
        .into_iter()
        .filter(|r| r["command"] == "list_friends")
        .collect();
    assert_eq!(listings.len(), 2);
    let friends = listings[1]["data"]["friends"].as_array().unwrap();
    let labels: Vec<&str> = friends.iter().map(|f| f["label"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["anna", "unknown user"]);

    let raw = std::fs::read_to_string(dir.path().join("friends.json")).unwrap();
    let doc: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc, serde_json::json!({ "1": ["2", "4"] }));
}

#[tokio::test]
async fn promotion_swaps_roles_once() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut rx) = engine(&dir).await;

    feed(
        &engine,
        r#"
        {"type":"grant_role","user":"5","role":"10"}
        {"type":"credit","user":"5","amount":250}
        {"type":"buy_promotion","user":"5"}
        {"type":"buy_promotion","user":"5"}
        {"type":"score","user":"5"}
        "#,
    )
    .await;

    let lines = drain(&mut rx);
    let swaps = lines
        .iter()
        .filter(|l| l["type"] == "role_exchanged")
        .count();
    assert_eq!(swaps, 1);

    let outcomes: Vec<&Value> = results(&lines);
    assert_eq!(outcomes[1]["ok"], true);
    assert_eq!(outcomes[1]["data"]["balance"], 150);
    assert_eq!(outcomes[2]["ok"], false);
    assert_eq!(outcomes[3]["data"]["score"], 150);
}

#[tokio::test]
async fn custom_role_rejects_blank_name_without_charge() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut rx) = engine(&dir).await;

    feed(
        &engine,
        r##"
        {"type":"credit","user":"5","amount":3000}
        {"type":"buy_custom_role","user":"5","name":"   "}
        {"type":"buy_custom_role","user":"5","name":"Owls","color":"#00ff00"}
        {"type":"score","user":"5"}
        "##,
    )
    .await;

    let lines = drain(&mut rx);
    let created: Vec<&Value> = lines
        .iter()
        .filter(|l| l["type"] == "role_created")
        .collect();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["color"], "#00FF00");

    let outcomes = results(&lines);
    assert_eq!(outcomes[1]["ok"], false);
    assert_eq!(outcomes[2]["ok"], true);
    assert_eq!(outcomes[3]["data"]["score"], 500);
}
