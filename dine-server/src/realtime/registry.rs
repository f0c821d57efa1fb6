//! Connection registries (连接注册表)
//!
//! 显式持有、注入式的注册表对象，替代进程级全局连接表。员工连接按
//! 租户分组，桌台连接按桌台分组；fan-out 全部 best-effort，一条慢
//! 连接不会阻塞其他连接的投递。

use std::sync::Arc;

use dashmap::DashMap;
use shared::message::ServerMessage;
use uuid::Uuid;

use super::connection::{Connection, ConnectionState};

/// Tenant- and table-scoped connection lists
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// restaurant_id → staff connections
    staff: DashMap<i64, Vec<Arc<Connection>>>,
    /// table_id → table-side connections
    tables: DashMap<i64, Vec<Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_staff(&self, conn: Arc<Connection>, restaurant_id: i64) {
        conn.set_state(ConnectionState::Staff { restaurant_id });
        self.staff.entry(restaurant_id).or_default().push(conn);
    }

    pub fn register_table(&self, conn: Arc<Connection>, table_id: i64, restaurant_id: i64) {
        conn.set_state(ConnectionState::Table {
            table_id,
            restaurant_id,
        });
        self.tables.entry(table_id).or_default().push(conn);
    }

    /// Remove a connection from whichever list its state placed it in
    pub fn remove(&self, conn: &Connection) {
        match conn.state() {
            ConnectionState::Staff { restaurant_id } => {
                self.remove_from(&self.staff, restaurant_id, conn.id);
            }
            ConnectionState::Table { table_id, .. } => {
                self.remove_from(&self.tables, table_id, conn.id);
            }
            // Closed 状态已经丢了注册位置，两边都扫一遍
            ConnectionState::Closed => {
                self.staff.iter_mut().for_each(|mut entry| {
                    entry.retain(|c| c.id != conn.id);
                });
                self.tables.iter_mut().for_each(|mut entry| {
                    entry.retain(|c| c.id != conn.id);
                });
            }
            ConnectionState::Connected => {}
        }
    }

    fn remove_from(&self, map: &DashMap<i64, Vec<Arc<Connection>>>, key: i64, id: Uuid) {
        if let Some(mut entry) = map.get_mut(&key) {
            entry.retain(|c| c.id != id);
        }
        map.remove_if(&key, |_, v| v.is_empty());
    }

    /// Fan out to a tenant's staff connections, optionally excluding the
    /// originator. Returns how many connections were reached.
    pub async fn publish_to_tenant(
        &self,
        restaurant_id: i64,
        msg: &ServerMessage,
        exclude: Option<Uuid>,
    ) -> usize {
        // clone the list out so no map guard is held across awaits
        let targets: Vec<Arc<Connection>> = self
            .staff
            .get(&restaurant_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        self.fan_out(targets, msg, exclude).await
    }

    /// Fan out to every table-side connection of one table
    pub async fn publish_to_table(&self, table_id: i64, msg: &ServerMessage) -> usize {
        let targets: Vec<Arc<Connection>> = self
            .tables
            .get(&table_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        self.fan_out(targets, msg, None).await
    }

    async fn fan_out(
        &self,
        targets: Vec<Arc<Connection>>,
        msg: &ServerMessage,
        exclude: Option<Uuid>,
    ) -> usize {
        let mut delivered = 0;
        for conn in targets {
            if Some(conn.id) == exclude || !conn.is_authenticated() {
                continue;
            }
            match conn.send(msg).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    // 顺手清掉送不到的连接
                    tracing::debug!(conn_id = %conn.id, error = %e, "Fan-out send failed, dropping connection");
                    conn.close().await;
                    self.remove(&conn);
                }
            }
        }
        delivered
    }

    /// Every authenticated connection (heartbeat sweep working set)
    pub fn authenticated_connections(&self) -> Vec<Arc<Connection>> {
        let mut conns: Vec<Arc<Connection>> = Vec::new();
        for entry in self.staff.iter() {
            conns.extend(entry.iter().cloned());
        }
        for entry in self.tables.iter() {
            conns.extend(entry.iter().cloned());
        }
        conns
    }

    pub fn staff_count(&self, restaurant_id: i64) -> usize {
        self.staff.get(&restaurant_id).map(|v| v.len()).unwrap_or(0)
    }

    pub fn table_count(&self, table_id: i64) -> usize {
        self.tables.get(&table_id).map(|v| v.len()).unwrap_or(0)
    }
}
