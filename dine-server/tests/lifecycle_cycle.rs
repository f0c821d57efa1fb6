//! 生命周期引擎端到端：下单到送达再到隐藏/桌台重置的完整链路，
//! 只通过公开 API 驱动。

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use dine_server::lifecycle::{ProtocolConfigCache, ProtocolManager, ProtocolRegistry};
use dine_server::store::{MemoryStore, OrderStore};
use dine_server::{ChannelBroadcaster, Topic};
use shared::message::ServerMessage;
use shared::order::{Order, OrderDraft, OrderStatus};
use shared::table::TenantProtocolSettings;

fn build_engine(
    store: Arc<MemoryStore>,
) -> (ProtocolManager, tokio::sync::broadcast::Receiver<(Topic, ServerMessage)>) {
    let broadcaster = Arc::new(ChannelBroadcaster::new(32));
    let events = broadcaster.subscribe();
    let registry = Arc::new(ProtocolRegistry::new());
    let cache = ProtocolConfigCache::new(store.clone(), registry.clone(), Duration::from_secs(60));
    (
        ProtocolManager::new(registry, cache, store, broadcaster),
        events,
    )
}

fn served_minutes_ago(id: i64, table_id: i64, restaurant_id: i64, minutes: i64) -> Order {
    let now = Utc::now();
    Order {
        id,
        order_number: format!("#{id}"),
        table_id,
        restaurant_id,
        status: OrderStatus::Served,
        hidden: false,
        served_at: Some(now - ChronoDuration::minutes(minutes)),
        created_at: now - ChronoDuration::minutes(minutes + 20),
        updated_at: now,
        session_id: None,
    }
}

#[tokio::test]
async fn order_survives_until_the_delay_elapses() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _events) = build_engine(store.clone());

    // a freshly created and served order is untouchable for 10 minutes
    let order = store
        .create(
            4,
            7,
            OrderDraft {
                order_number: None,
                items: serde_json::json!([{"name": "noodles", "qty": 1}]),
                session_id: None,
            },
        )
        .await
        .unwrap();
    store
        .update_status(order.id, OrderStatus::Served)
        .await
        .unwrap();

    let report = manager.run_cleanup_cycle().await;
    assert!(report.is_empty());
    assert!(!store.get_order(order.id).unwrap().hidden);
}

#[tokio::test]
async fn expired_order_is_hidden_and_the_table_reset_is_announced() {
    let store = Arc::new(MemoryStore::new());
    let (manager, mut events) = build_engine(store.clone());

    store.insert_order(served_minutes_ago(1, 4, 7, 11));

    let report = manager.run_cleanup_cycle().await;
    assert_eq!(report.orders_hidden, 1);
    assert_eq!(report.tables_reset, 1);
    assert!(store.get_order(1).unwrap().hidden);

    // order_hidden reaches the table first
    let (topic, event) = events.recv().await.unwrap();
    assert_eq!(topic, Topic::table(4));
    match event {
        ServerMessage::OrderHidden {
            order_id, reason, ..
        } => {
            assert_eq!(order_id, 1);
            assert_eq!(reason, "expired");
        }
        other => panic!("expected order_hidden, got {other:?}"),
    }

    // then table_reset, to the table and to the tenant's staff
    let (topic, event) = events.recv().await.unwrap();
    assert_eq!(topic, Topic::table(4));
    assert!(matches!(
        event,
        ServerMessage::TableReset { table_id: 4, .. }
    ));
    let (topic, _) = events.recv().await.unwrap();
    assert_eq!(topic, Topic::tenant(7));
}

#[tokio::test]
async fn quick_turn_tenant_uses_the_shorter_delay_and_its_reason() {
    let store = Arc::new(MemoryStore::new());
    store.insert_tenant_settings(
        7,
        TenantProtocolSettings {
            protocol: Some("quick_turn".into()),
            hide_delay_minutes: None,
        },
    );
    // 6 minutes: past quick_turn's 5 but inside default's 10
    store.insert_order(served_minutes_ago(1, 4, 7, 6));

    let (manager, mut events) = build_engine(store.clone());
    let report = manager.run_cleanup_cycle().await;
    assert_eq!(report.orders_hidden, 1);

    let (_, event) = events.recv().await.unwrap();
    match event {
        ServerMessage::OrderHidden { reason, .. } => assert_eq!(reason, "quick_turn_expired"),
        other => panic!("expected order_hidden, got {other:?}"),
    }
}

#[tokio::test]
async fn rerunning_the_cycle_emits_nothing_new() {
    let store = Arc::new(MemoryStore::new());
    let (manager, mut events) = build_engine(store.clone());

    store.insert_order(served_minutes_ago(1, 4, 7, 15));

    assert_eq!(manager.run_cleanup_cycle().await.orders_hidden, 1);
    assert!(manager.run_cleanup_cycle().await.is_empty());

    // exactly three events total: hidden + reset to table + reset to tenant
    for _ in 0..3 {
        events.recv().await.unwrap();
    }
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn unknown_protocol_name_falls_back_to_default_behavior() {
    let store = Arc::new(MemoryStore::new());
    store.insert_tenant_settings(
        7,
        TenantProtocolSettings {
            protocol: Some("vip_lounge".into()),
            hide_delay_minutes: None,
        },
    );
    store.insert_order(served_minutes_ago(1, 4, 7, 11));

    let (manager, _events) = build_engine(store.clone());
    let report = manager.run_cleanup_cycle().await;
    assert_eq!(report.orders_hidden, 1);
}
