//! 改期协调器
//!
//! 持有每个任务的编辑生命周期：
//! Idle → PendingSubmit → {Confirmed | Failed} → Idle。
//! 点击只做选中与表单预填，状态保持 Idle；拖拽结束和表单提交
//! 都汇入 `reschedule`。本地校验不通过的输入不会发起网络请求；
//! 同一任务在提交在途时的二次编辑被直接拒绝。

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};

use serde::{Deserialize, Serialize};
use workbench_domain::{
    EditOrigin, PlannerEvent, PlannerNotice, RescheduleInput, ScheduledTask, SchedulingBackend,
    WorkbenchError, WorkbenchResult,
};

use super::store::SchedulingStore;

/// 点击任务后预填的编辑表单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditForm {
    pub task_id: String,
    pub workstation_id: String,
    /// `YYYY-MM-DDTHH:MM`，datetime-local 控件格式
    pub start_time: String,
    pub duration_minutes: i64,
    pub reason: String,
}

impl EditForm {
    fn seed(task: &ScheduledTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            workstation_id: task.workstation_id.clone(),
            start_time: task.start_time.format("%Y-%m-%dT%H:%M").to_string(),
            duration_minutes: task.duration_minutes,
            reason: String::new(),
        }
    }

    pub fn into_input(self) -> RescheduleInput {
        RescheduleInput {
            workstation_id: self.workstation_id,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            reason: if self.reason.trim().is_empty() {
                None
            } else {
                Some(self.reason)
            },
        }
    }
}

pub struct RescheduleCoordinator {
    store: Arc<RwLock<SchedulingStore>>,
    backend: Arc<dyn SchedulingBackend>,
    events: broadcast::Sender<PlannerEvent>,
    selected: RwLock<Option<String>>,
}

impl RescheduleCoordinator {
    pub fn new(
        store: Arc<RwLock<SchedulingStore>>,
        backend: Arc<dyn SchedulingBackend>,
        events: broadcast::Sender<PlannerEvent>,
    ) -> Self {
        Self {
            store,
            backend,
            events,
            selected: RwLock::new(None),
        }
    }

    /// 点击选中：返回按当前任务值预填的表单。状态保持 Idle。
    pub async fn select_task(&self, task_id: &str) -> Option<EditForm> {
        let store = self.store.read().await;
        match store.task(task_id) {
            Some(task) => {
                let mut selected = self.selected.write().await;
                *selected = Some(task_id.to_string());
                Some(EditForm::seed(task))
            }
            None => {
                debug!("点击的任务 {task_id} 已不存在");
                None
            }
        }
    }

    pub async fn selected_task(&self) -> Option<String> {
        self.selected.read().await.clone()
    }

    /// 当前选中任务的表单，按存储里的最新值重新预填
    pub async fn current_form(&self) -> Option<EditForm> {
        let selected = self.selected.read().await.clone()?;
        let store = self.store.read().await;
        store.task(&selected).map(EditForm::seed)
    }

    pub async fn clear_selection(&self) {
        let mut selected = self.selected.write().await;
        *selected = None;
    }

    /// 改期入口，拖拽结束与表单提交共用。
    ///
    /// 成功返回后端确认的权威任务；失败时存储已回滚，
    /// 错误消息同时通过通知面板透出。
    pub async fn reschedule(
        &self,
        task_id: &str,
        input: RescheduleInput,
        origin: EditOrigin,
    ) -> WorkbenchResult<ScheduledTask> {
        // 本地校验失败直接返回，不进入 PendingSubmit
        let proposal = input.into_proposal(origin)?;

        {
            let mut store = self.store.write().await;
            store.apply_optimistic(task_id, &proposal)?;
        }
        self.emit(PlannerEvent::ScheduleUpdated);
        info!(
            "提交改期: 任务 {} -> 工位 {} @ {}（{} 分钟）",
            task_id, proposal.workstation_id, proposal.start_time, proposal.duration_minutes
        );

        match self.backend.reschedule_task(task_id, &proposal).await {
            Ok(mut server_task) => {
                {
                    let mut store = self.store.write().await;
                    // 改期响应缺省订单号时沿用本地值
                    if server_task.order_id.is_empty() {
                        if let Some(edit) = store.pending_edit(task_id) {
                            server_task.order_id = edit.previous.order_id.clone();
                        }
                    }
                    store.confirm_edit(task_id, server_task.clone());
                }
                self.clear_selection_for(task_id).await;
                self.emit(PlannerEvent::ScheduleUpdated);
                self.notify(PlannerNotice::success(format!(
                    "任务已改期至 {}",
                    server_task.start_time.format("%m-%d %H:%M")
                )));
                Ok(server_task)
            }
            Err(e @ WorkbenchError::TaskNotFound { .. }) => {
                {
                    let mut store = self.store.write().await;
                    store.remove_task(task_id);
                }
                self.clear_selection_for(task_id).await;
                self.emit(PlannerEvent::ScheduleUpdated);
                self.notify(PlannerNotice::info(e.user_message()));
                Err(e)
            }
            Err(e) => {
                {
                    let mut store = self.store.write().await;
                    if let Err(rollback_err) = store.rollback_edit(task_id) {
                        error!("改期失败后的回滚异常: {rollback_err}");
                    }
                }
                self.emit(PlannerEvent::ScheduleUpdated);
                self.notify(PlannerNotice::error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn clear_selection_for(&self, task_id: &str) {
        let mut selected = self.selected.write().await;
        if selected.as_deref() == Some(task_id) {
            *selected = None;
        }
    }

    fn notify(&self, notice: PlannerNotice) {
        self.emit(PlannerEvent::Notice(notice));
    }

    fn emit(&self, event: PlannerEvent) {
        // 没有订阅者时发送失败是正常情况
        let _ = self.events.send(event);
    }
}
