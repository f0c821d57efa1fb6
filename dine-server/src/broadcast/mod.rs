//! Event Broadcaster (事件广播)
//!
//! 把“清理引擎做了一个决定”与“怎么送达客户端”解耦：ProtocolManager
//! 只依赖 [`EventBroadcaster`]，不知道连接管理器的存在。
//!
//! Delivery decision: every event type is published explicitly through
//! this trait. The store is a collaborator interface with no change
//! feed, so nothing is left to be inferred by watchers — `table_reset`
//! in particular has no store row at all and can only exist as an
//! explicit publish.
//!
//! Publishing is never on the order-correctness path: zero subscribers
//! is fine, and a slow transport is cut off by [`PUBLISH_TIMEOUT`].

use std::time::Duration;

use async_trait::async_trait;
use shared::message::ServerMessage;

use crate::realtime::ConnectionRegistry;
use crate::utils::AppResult;

/// Upper bound on a single publish call
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

/// Delivery scope of an event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every table-side connection of one table
    Table(i64),
    /// Every staff connection of one tenant
    Tenant(i64),
}

impl Topic {
    pub fn table(table_id: i64) -> Self {
        Topic::Table(table_id)
    }

    pub fn tenant(restaurant_id: i64) -> Self {
        Topic::Tenant(restaurant_id)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Table(id) => write!(f, "table:{id}"),
            Topic::Tenant(id) => write!(f, "restaurant:{id}"),
        }
    }
}

/// Best-effort event delivery
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    /// Deliver `event` to every subscriber of `topic`. Absence of
    /// subscribers is not an error; implementations log transport
    /// trouble and return.
    async fn publish(&self, topic: &Topic, event: ServerMessage) -> AppResult<()>;
}

/// Routes topics onto the realtime connection registries
pub struct RealtimeBroadcaster {
    registry: std::sync::Arc<ConnectionRegistry>,
}

impl RealtimeBroadcaster {
    pub fn new(registry: std::sync::Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventBroadcaster for RealtimeBroadcaster {
    async fn publish(&self, topic: &Topic, event: ServerMessage) -> AppResult<()> {
        let delivery = async {
            match topic {
                Topic::Table(table_id) => self.registry.publish_to_table(*table_id, &event).await,
                Topic::Tenant(restaurant_id) => {
                    self.registry
                        .publish_to_tenant(*restaurant_id, &event, None)
                        .await
                }
            }
        };

        match tokio::time::timeout(PUBLISH_TIMEOUT, delivery).await {
            Ok(delivered) => {
                tracing::debug!(topic = %topic, delivered, "Event published");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(topic = %topic, "Publish timed out, event dropped");
                Ok(())
            }
        }
    }
}

/// Captures published events on a tokio broadcast channel (test support
/// and a seam for external pub/sub backends)
pub struct ChannelBroadcaster {
    tx: tokio::sync::broadcast::Sender<(Topic, ServerMessage)>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<(Topic, ServerMessage)> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventBroadcaster for ChannelBroadcaster {
    async fn publish(&self, topic: &Topic, event: ServerMessage) -> AppResult<()> {
        // a send error only means nobody is listening
        let _ = self.tx.send((topic.clone(), event));
        Ok(())
    }
}
