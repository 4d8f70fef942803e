//! 排产工作台服务
//!
//! 把存储、协调器、轮询刷新器和后端客户端组装成一个
//! 有 start/stop 生命周期的门面。渲染协作方只跟这里打交道：
//! 读展示快照、发交互事件、订阅通知。

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use workbench_domain::{
    EditOrigin, PlannerEvent, ProductionOrder, ProductionOrderSummary, RescheduleInput,
    ScheduledTask, SchedulingBackend, TimelineEvent, WorkbenchError, WorkbenchResult,
};

use crate::components::coordinator::{EditForm, RescheduleCoordinator};
use crate::components::refresher::{ApplyFn, ApplyFuture, FetchFn, FetchFuture, PollingRefresher};
use crate::components::store::SchedulingStore;
use crate::components::timeline::{TimelineConfig, TimelineTask};

pub struct PlannerService {
    backend: Arc<dyn SchedulingBackend>,
    store: Arc<RwLock<SchedulingStore>>,
    coordinator: Arc<RescheduleCoordinator>,
    refresher: Arc<PollingRefresher>,
    events: broadcast::Sender<PlannerEvent>,
    options: TimelineConfig,
    is_running: Arc<RwLock<bool>>,
}

impl PlannerService {
    pub fn new(backend: Arc<dyn SchedulingBackend>, options: TimelineConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        let store = Arc::new(RwLock::new(SchedulingStore::new()));
        let refresher = Arc::new(PollingRefresher::new(options.refresh_interval_ms));
        let coordinator = Arc::new(RescheduleCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&backend),
            events.clone(),
        ));

        Self {
            backend,
            store,
            coordinator,
            refresher,
            events,
            options,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// 渲染协作方接受的配置
    pub fn timeline_config(&self) -> TimelineConfig {
        self.options.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlannerEvent> {
        self.events.subscribe()
    }

    /// 启动轮询刷新。重复启动返回错误。
    pub async fn start(&self) -> WorkbenchResult<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(WorkbenchError::Internal(
                "排产工作台服务已在运行".to_string(),
            ));
        }
        info!(
            "启动排产工作台服务，刷新间隔 {} ms",
            self.options.refresh_interval_ms
        );

        let backend = Arc::clone(&self.backend);
        let fetch: FetchFn = Arc::new(move || {
            let backend = Arc::clone(&backend);
            Box::pin(async move { backend.fetch_scheduled_orders().await }) as FetchFuture
        });

        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let apply: ApplyFn = Arc::new(move |orders: Vec<ProductionOrder>| {
            let store = Arc::clone(&store);
            let events = events.clone();
            Box::pin(async move {
                store.write().await.merge_server_snapshot(orders);
                let _ = events.send(PlannerEvent::ScheduleUpdated);
            }) as ApplyFuture
        });

        self.refresher.start(fetch, apply).await?;
        *is_running = true;
        Ok(())
    }

    /// 停止轮询；在途的拉取结果与编辑提交按既定规则各自收尾。
    pub async fn stop(&self) {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return;
        }
        self.refresher.stop().await;
        *is_running = false;
        info!("排产工作台服务已停止");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// 渲染协作方上抛的交互事件入口
    pub async fn handle_timeline_event(&self, event: TimelineEvent) {
        match event {
            TimelineEvent::TaskClicked { task_id } => {
                if self.coordinator.select_task(&task_id).await.is_none() {
                    debug!("点击事件指向的任务 {task_id} 已不存在");
                }
            }
            TimelineEvent::TaskDragged {
                task_id,
                proposed_start,
            } => {
                if !self.options.editable {
                    debug!("时间轴为只读模式，忽略拖拽事件");
                    return;
                }
                let Some(task) = self.store.read().await.task(&task_id).cloned() else {
                    debug!("拖拽事件指向的任务 {task_id} 已不存在");
                    return;
                };
                // 拖拽只改开始时间，工位和工时沿用当前值
                let input = RescheduleInput {
                    workstation_id: task.workstation_id,
                    start_time: proposed_start.to_rfc3339(),
                    duration_minutes: task.duration_minutes,
                    reason: None,
                };
                // 失败已通过通知面板透出，这里不再上抛
                let _ = self
                    .coordinator
                    .reschedule(&task_id, input, EditOrigin::Drag)
                    .await;
            }
        }
    }

    /// 表单提交入口
    pub async fn submit_edit_form(&self, form: EditForm) -> WorkbenchResult<ScheduledTask> {
        if !self.options.editable {
            return Err(WorkbenchError::validation_error(
                "时间轴处于只读模式，不能改期",
            ));
        }
        let task_id = form.task_id.clone();
        self.coordinator
            .reschedule(&task_id, form.into_input(), EditOrigin::Form)
            .await
    }

    /// 当前选中任务的预填表单
    pub async fn edit_form(&self) -> Option<EditForm> {
        self.coordinator.current_form().await
    }

    pub async fn selected_task(&self) -> Option<String> {
        self.coordinator.selected_task().await
    }

    pub async fn clear_selection(&self) {
        self.coordinator.clear_selection().await;
    }

    /// 渲染协作方唯一的读取路径
    pub async fn tasks_for_display(&self) -> Vec<TimelineTask> {
        self.store.read().await.tasks_for_display()
    }

    /// 协作方 onRefresh 钩子的落点：立即拉取并合并一次。
    /// 与轮询共用在途闸门，已有拉取在途时本次刷新直接跳过。
    pub async fn refresh_once(&self) -> WorkbenchResult<()> {
        let gate = self.refresher.gate();
        let Ok(_guard) = gate.try_lock() else {
            debug!("已有拉取在途，跳过手动刷新");
            return Ok(());
        };
        let orders = self.backend.fetch_scheduled_orders().await?;
        self.store.write().await.merge_server_snapshot(orders);
        let _ = self.events.send(PlannerEvent::ScheduleUpdated);
        Ok(())
    }

    /// 未排产订单：生产订单中尚无任务进入排产计划的部分
    pub async fn unscheduled_orders(&self) -> WorkbenchResult<Vec<ProductionOrderSummary>> {
        let all = self.backend.fetch_production_orders().await?;
        let store = self.store.read().await;
        Ok(all
            .into_iter()
            .filter(|order| !store.has_order(&order.order_id))
            .collect())
    }
}
