//! Drives the pool's periodic [`TransactionPool::reorganize`] and [`TransactionPool::expire`]
//! sweeps on their own tickers, and stops them cleanly.

use std::sync::Arc;

use dpos_mempool_types::ApplyTransactions;
use dpos_time::ticker::Ticker;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::pool::TransactionPool;

/// Owns the reorganize and expire background tasks for a [`TransactionPool`].
///
/// `start` is idempotent: calling it on an already-running runner is a no-op. `stop` cancels both
/// tickers' future ticks and waits for any reorganize execution already in flight to finish; it
/// does not force-cancel a pending `apply` call.
pub struct PoolRunner<A: ApplyTransactions + 'static> {
    pool: Arc<TransactionPool<A>>,
    tasks: Option<(JoinHandle<()>, JoinHandle<()>)>,
}

impl<A: ApplyTransactions + 'static> PoolRunner<A> {
    /// Builds a runner for `pool`. Call [`Self::start`] to begin ticking.
    pub fn new(pool: Arc<TransactionPool<A>>) -> Self {
        PoolRunner { pool, tasks: None }
    }

    /// Spawns the reorganize and expire tickers. No-op if already started.
    pub fn start(
        &mut self,
        reorganize_interval: std::time::Duration,
        expiry_check_interval: std::time::Duration,
    ) {
        if self.tasks.is_some() {
            debug!("runner already started, ignoring");
            return;
        }

        let reorganize_pool = Arc::clone(&self.pool);
        let reorganize_task = tokio::spawn(async move {
            let mut ticker = Ticker::new(reorganize_interval);
            loop {
                ticker.tick().await;
                reorganize_pool.reorganize().await;
            }
        });

        let expire_pool = Arc::clone(&self.pool);
        let expire_task = tokio::spawn(async move {
            let mut ticker = Ticker::new(expiry_check_interval);
            loop {
                ticker.tick().await;
                expire_pool.expire();
            }
        });

        self.tasks = Some((reorganize_task, expire_task));
    }

    /// Cancels both tickers. An in-flight reorganize is allowed to finish rather than being
    /// aborted mid-`apply`. No-op if not started.
    pub async fn stop(&mut self) {
        let Some((reorganize_task, expire_task)) = self.tasks.take() else {
            debug!("runner not started, ignoring stop");
            return;
        };
        reorganize_task.abort();
        expire_task.abort();
        let _ = reorganize_task.await;
        let _ = expire_task.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dpos_mempool_config::MempoolConfig;

    use super::PoolRunner;
    use crate::test_utils::{test_pool, test_transaction};

    #[tokio::test]
    async fn test_start_runs_reorganize_and_promotes() {
        let config = MempoolConfig {
            transaction_reorganization_interval: Duration::from_millis(5),
            transaction_expiry_check_interval: Duration::from_secs(3600),
            ..MempoolConfig::default()
        };
        let (pool, _apply, _clock) = test_pool(config);
        pool.add(test_transaction("a", "alice", 0, 100, 0)).await.unwrap();

        let pool = Arc::new(pool);
        let mut runner = PoolRunner::new(Arc::clone(&pool));
        runner.start(Duration::from_millis(5), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(50)).await;
        runner.stop().await;

        assert_eq!(pool.get_processable_transactions().get("alice").map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_double_start_is_noop() {
        let (pool, _apply, _clock) = test_pool(MempoolConfig::default());
        let mut runner = PoolRunner::new(Arc::new(pool));
        runner.start(Duration::from_secs(1), Duration::from_secs(1));
        runner.start(Duration::from_secs(1), Duration::from_secs(1));
        runner.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let (pool, _apply, _clock) = test_pool(MempoolConfig::default());
        let mut runner = PoolRunner::new(Arc::new(pool));
        runner.stop().await;
    }
}
