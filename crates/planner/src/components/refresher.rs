//! 轮询刷新器
//!
//! 固定节奏驱动快照拉取：立即执行一次，然后按间隔触发。
//! 在途拉取未返回时跳过本拍，任何时刻最多一个并发请求；
//! stop() 取消计时器，停止后到达的在途结果一律丢弃。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use workbench_domain::ProductionOrder;
use workbench_errors::{WorkbenchError, WorkbenchResult};

pub type FetchFuture = Pin<Box<dyn Future<Output = WorkbenchResult<Vec<ProductionOrder>>> + Send>>;
pub type FetchFn = Arc<dyn Fn() -> FetchFuture + Send + Sync>;
pub type ApplyFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type ApplyFn = Arc<dyn Fn(Vec<ProductionOrder>) -> ApplyFuture + Send + Sync>;

pub struct PollingRefresher {
    interval_ms: u64,
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    in_flight: Arc<Mutex<()>>,
}

impl PollingRefresher {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            shutdown_tx: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// 手动刷新与轮询共用的在途闸门
    pub fn gate(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.in_flight)
    }

    pub async fn is_running(&self) -> bool {
        self.shutdown_tx.read().await.is_some()
    }

    pub async fn start(&self, fetch: FetchFn, apply: ApplyFn) -> WorkbenchResult<()> {
        let mut shutdown_tx = self.shutdown_tx.write().await;
        if shutdown_tx.is_some() {
            return Err(WorkbenchError::Internal(
                "轮询刷新器已在运行".to_string(),
            ));
        }
        let (tx, mut shutdown_rx) = broadcast::channel(1);
        *shutdown_tx = Some(tx);

        let interval_ms = self.interval_ms;
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(interval_ms));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        // 手动刷新占着闸门时跳过本拍
                        let Ok(_guard) = in_flight.try_lock() else {
                            debug!("已有拉取在途，跳过本次轮询");
                            continue;
                        };
                        tokio::select! {
                            result = fetch() => match result {
                                Ok(orders) => apply(orders).await,
                                // 单次失败不中断节奏，下一拍照常拉取
                                Err(e) => warn!("拉取排产快照失败: {e}"),
                            },
                            _ = shutdown_rx.recv() => {
                                debug!("轮询停止，丢弃在途拉取结果");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("轮询刷新已停止");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// 取消计时器。幂等；之后不再有任何拉取结果被合并。
    pub async fn stop(&self) {
        let mut shutdown_tx = self.shutdown_tx.write().await;
        if let Some(tx) = shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
