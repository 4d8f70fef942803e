use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use workbench_config::AppConfig;
use workbench_domain::{NoticeLevel, PlannerEvent};
use workbench_planner::{PlannerService, SimalClient, TimelineConfig};

/// 主应用程序
///
/// 把配置装配成后端客户端和工作台服务，并把核心广播的
/// 事件落到日志上（渲染协作方不在本进程内时的默认出口）。
pub struct Application {
    service: Arc<PlannerService>,
}

impl Application {
    /// 创建新的应用实例
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = SimalClient::new(
            config.backend_base(),
            &config.backend.operator_id,
            config.backend.request_timeout_seconds,
        )
        .context("创建后端客户端失败")?;

        let options = TimelineConfig {
            editable: config.timeline.editable,
            refresh_interval_ms: config.refresh.interval_ms,
            show_current_time: config.timeline.show_current_time,
        };

        let service = Arc::new(PlannerService::new(Arc::new(client), options));
        Ok(Self { service })
    }

    /// 运行应用程序，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut events = self.service.subscribe();

        self.service
            .start()
            .await
            .context("启动排产工作台服务失败")?;

        // 启动后顺带报告一次未排产订单，失败不致命
        match self.service.unscheduled_orders().await {
            Ok(orders) => info!("当前未排产订单: {} 个", orders.len()),
            Err(e) => warn!("获取未排产订单失败: {e}"),
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(PlannerEvent::ScheduleUpdated) => {
                        let rows = self.service.tasks_for_display().await;
                        let conflicts = rows.iter().filter(|r| r.conflict).count();
                        debug!("排产视图已更新: {} 个任务，{} 个带冲突标注", rows.len(), conflicts);
                    }
                    Ok(PlannerEvent::Notice(notice)) => {
                        if notice.level == NoticeLevel::Error {
                            warn!("通知: {}", notice.message);
                        } else {
                            info!("通知: {}", notice.message);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("事件消费滞后，丢弃了 {n} 条");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => {
                    info!("应用收到关闭信号");
                    break;
                }
            }
        }

        self.service.stop().await;
        Ok(())
    }
}
