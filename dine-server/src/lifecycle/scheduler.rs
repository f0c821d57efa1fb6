//! Cleanup Scheduler (清理定时器)
//!
//! 单个固定间隔的定时任务驱动 ProtocolManager 的清理周期。启动即刻
//! 跑一次（不等第一个间隔），start/stop 幂等。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ProtocolManager;

/// Single recurring timer for the cleanup cycle
pub struct CleanupScheduler {
    manager: Arc<ProtocolManager>,
    interval: Duration,
    started: AtomicBool,
    shutdown: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupScheduler {
    pub fn new(manager: Arc<ProtocolManager>, interval: Duration) -> Self {
        Self {
            manager,
            interval,
            started: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Start the timer. The first cycle runs immediately; a duplicate
    /// start is a logged no-op, never a second timer.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Cleanup scheduler already running, ignoring start");
            return;
        }

        let token = CancellationToken::new();
        *self.shutdown.lock() = Some(token.clone());

        let manager = self.manager.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            // MissedTickBehavior 默认 Burst 会补跑积压的 tick，清理
            // 周期是幂等扫描，跳过更合适
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("Cleanup scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        manager.run_cleanup_cycle().await;
                    }
                }
            }
        });

        *self.handle.lock() = Some(handle);
        tracing::info!(interval_secs = self.interval.as_secs(), "Cleanup scheduler started");
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Cancel the timer and wait for the in-flight cycle to finish.
    /// Safe to call when not running.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(token) = self.shutdown.lock().take() {
            token.cancel();
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("Cleanup scheduler stopped");
    }
}
