//! 排产状态存储
//!
//! 任务/订单状态的唯一持有者。服务端快照与本地乐观编辑在这里
//! 按优先级合并：在途编辑在确认或回滚前对外保持权威。
//! 所有变更方法都是同步完成的完整状态迁移，调用方通过
//! `Arc<RwLock<SchedulingStore>>` 共享。

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use tracing::{debug, warn};

use workbench_domain::{
    conflicted_task_ids, detect_conflicts, ConflictPair, PendingEdit, ProductionOrder,
    RescheduleProposal, ScheduledTask, WorkbenchError, WorkbenchResult,
};

use super::timeline::TimelineTask;

#[derive(Debug, Default)]
pub struct SchedulingStore {
    tasks: HashMap<String, ScheduledTask>,
    pending_edits: HashMap<String, PendingEdit>,
}

impl SchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并服务端快照。
    ///
    /// 无在途编辑的任务被快照整体替换（服务端是事实源）；
    /// 有在途编辑的任务保持乐观值对外可见，服务端值只记录在
    /// 编辑上；快照中消失的任务被移除，除非其编辑在途
    /// （由编辑收尾清理）。
    pub fn merge_server_snapshot(&mut self, orders: Vec<ProductionOrder>) {
        let mut next: HashMap<String, ScheduledTask> = HashMap::new();

        for order in orders {
            for incoming in order.tasks {
                let task_id = incoming.task_id.clone();
                if let Some(edit) = self.pending_edits.get_mut(&task_id) {
                    edit.last_seen_server = Some(incoming);
                    if let Some(current) = self.tasks.get(&task_id) {
                        next.insert(task_id, current.clone());
                    }
                } else {
                    next.insert(task_id, incoming);
                }
            }
        }

        for task_id in self.pending_edits.keys() {
            if !next.contains_key(task_id) {
                if let Some(current) = self.tasks.get(task_id) {
                    next.insert(task_id.clone(), current.clone());
                }
            }
        }

        debug!("合并服务端快照: {} 个任务", next.len());
        self.tasks = next;
    }

    /// 乐观应用改期提案。
    ///
    /// 记录调用时刻的任务快照供回滚，然后立即把可见状态改为
    /// 提案值；`manually_adjusted` 保持原值，待后端确认后才置位。
    pub fn apply_optimistic(
        &mut self,
        task_id: &str,
        proposal: &RescheduleProposal,
    ) -> WorkbenchResult<()> {
        if self.pending_edits.contains_key(task_id) {
            return Err(WorkbenchError::edit_in_progress(task_id));
        }
        let Some(previous) = self.tasks.get(task_id).cloned() else {
            return Err(WorkbenchError::task_not_found(task_id));
        };
        if !previous.is_editable() {
            return Err(WorkbenchError::validation_error(format!(
                "{} 已处于终态，不能改期",
                previous.entity_description()
            )));
        }

        let workstation_name = if previous.workstation_id == proposal.workstation_id {
            previous.workstation_name.clone()
        } else {
            // 跨工位移动时借用目标工位上已知任务的名称，下一次快照会带来准确值
            self.workstation_name_for(&proposal.workstation_id)
                .unwrap_or_else(|| proposal.workstation_id.clone())
        };

        let mut updated = previous.clone();
        updated.workstation_id = proposal.workstation_id.clone();
        updated.workstation_name = workstation_name;
        updated.start_time = proposal.start_time;
        updated.duration_minutes = proposal.duration_minutes;
        self.tasks.insert(task_id.to_string(), updated);

        self.pending_edits.insert(
            task_id.to_string(),
            PendingEdit {
                task_id: task_id.to_string(),
                submitted_at: Utc::now(),
                proposal: proposal.clone(),
                previous,
                last_seen_server: None,
            },
        );
        Ok(())
    }

    /// 编辑确认：清除在途记录，以后端返回的权威任务为准
    /// （后端可能顺带调整了提案未预期的字段）。
    pub fn confirm_edit(&mut self, task_id: &str, server_task: ScheduledTask) {
        if self.pending_edits.remove(task_id).is_none() {
            warn!("确认了一个没有在途记录的编辑: {task_id}");
        }
        self.tasks.insert(task_id.to_string(), server_task);
    }

    /// 编辑回滚：精确恢复 apply_optimistic 时刻的快照，不做部分恢复
    pub fn rollback_edit(&mut self, task_id: &str) -> WorkbenchResult<()> {
        match self.pending_edits.remove(task_id) {
            Some(edit) => {
                self.tasks.insert(task_id.to_string(), edit.previous);
                Ok(())
            }
            None => Err(WorkbenchError::Internal(format!(
                "任务 {task_id} 没有在途改期可回滚"
            ))),
        }
    }

    /// 任务在服务端已不存在时的本地清理
    pub fn remove_task(&mut self, task_id: &str) {
        self.pending_edits.remove(task_id);
        self.tasks.remove(task_id);
    }

    pub fn task(&self, task_id: &str) -> Option<&ScheduledTask> {
        self.tasks.get(task_id)
    }

    pub fn pending_edit(&self, task_id: &str) -> Option<&PendingEdit> {
        self.pending_edits.get(task_id)
    }

    pub fn has_pending_edit(&self, task_id: &str) -> bool {
        self.pending_edits.contains_key(task_id)
    }

    pub fn has_order(&self, order_id: &str) -> bool {
        self.tasks.values().any(|t| t.order_id == order_id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// 当前任务集的工位冲突对，每次调用全量重算
    pub fn conflicts(&self) -> BTreeSet<ConflictPair> {
        detect_conflicts(self.tasks.values())
    }

    /// 渲染协作方唯一的读取路径：标准化、排序、带冲突标注的任务行
    pub fn tasks_for_display(&self) -> Vec<TimelineTask> {
        let conflicted = conflicted_task_ids(&self.conflicts());

        let mut rows: Vec<TimelineTask> = self
            .tasks
            .values()
            .map(|t| TimelineTask {
                task_id: t.task_id.clone(),
                order_id: t.order_id.clone(),
                workstation_id: t.workstation_id.clone(),
                workstation_name: t.workstation_name.clone(),
                label: format!("{} · {}", t.item_name, t.task_type),
                start_time: t.start_time,
                end_time: t.end_time(),
                status: t.status,
                manually_adjusted: t.manually_adjusted,
                pending: self.pending_edits.contains_key(&t.task_id),
                conflict: conflicted.contains(&t.task_id),
            })
            .collect();

        rows.sort_by(|a, b| {
            a.workstation_id
                .cmp(&b.workstation_id)
                .then_with(|| a.start_time.cmp(&b.start_time))
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        rows
    }

    fn workstation_name_for(&self, workstation_id: &str) -> Option<String> {
        self.tasks
            .values()
            .find(|t| t.workstation_id == workstation_id)
            .map(|t| t.workstation_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use workbench_domain::{EditOrigin, RescheduleInput, TaskStatus};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, 0).unwrap()
    }

    fn task(id: &str, ws: &str, hour: u32, duration: i64) -> ScheduledTask {
        ScheduledTask {
            task_id: id.to_string(),
            order_id: format!("order-{id}"),
            workstation_id: ws.to_string(),
            workstation_name: format!("Station {ws}"),
            item_name: "housing".to_string(),
            task_type: "drilling".to_string(),
            start_time: at(hour, 0),
            duration_minutes: duration,
            status: TaskStatus::Scheduled,
            manually_adjusted: false,
        }
    }

    fn order(id: &str, tasks: Vec<ScheduledTask>) -> ProductionOrder {
        ProductionOrder {
            order_id: id.to_string(),
            status: TaskStatus::Scheduled,
            tasks,
        }
    }

    fn proposal(ws: &str, hour: u32, duration: i64) -> RescheduleProposal {
        RescheduleInput {
            workstation_id: ws.to_string(),
            start_time: at(hour, 0).to_rfc3339(),
            duration_minutes: duration,
            reason: None,
        }
        .into_proposal(EditOrigin::Form)
        .unwrap()
    }

    #[test]
    fn test_merge_replaces_unedited_tasks_wholesale() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        assert_eq!(store.task("t1").unwrap().start_time, at(9, 0));

        let mut moved = task("t1", "W1", 9, 60);
        moved.start_time = at(11, 0);
        store.merge_server_snapshot(vec![order("o1", vec![moved])]);
        assert_eq!(store.task("t1").unwrap().start_time, at(11, 0));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut store = SchedulingStore::new();
        let snapshot = vec![order(
            "o1",
            vec![task("t1", "W1", 9, 60), task("t2", "W2", 10, 30)],
        )];
        store.merge_server_snapshot(snapshot.clone());
        let first = store.tasks_for_display();
        store.merge_server_snapshot(snapshot);
        assert_eq!(store.tasks_for_display(), first);
    }

    #[test]
    fn test_merge_removes_vanished_tasks() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order(
            "o1",
            vec![task("t1", "W1", 9, 60), task("t2", "W1", 11, 60)],
        )]);
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        assert!(store.task("t2").is_none());
        assert_eq!(store.task_count(), 1);
    }

    #[test]
    fn test_pending_edit_survives_merge_and_stale_snapshot() {
        // 竞态性质：乐观应用后到达的陈旧快照不得覆盖可见状态
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        store.apply_optimistic("t1", &proposal("W1", 10, 60)).unwrap();
        assert_eq!(store.task("t1").unwrap().start_time, at(10, 0));

        // 陈旧快照仍带着 09:00
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        assert_eq!(store.task("t1").unwrap().start_time, at(10, 0));
        // 服务端值被记录在编辑上
        let edit = store.pending_edit("t1").unwrap();
        assert_eq!(edit.last_seen_server.as_ref().unwrap().start_time, at(9, 0));
    }

    #[test]
    fn test_task_with_pending_edit_not_dropped_by_merge() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        store.apply_optimistic("t1", &proposal("W1", 10, 60)).unwrap();

        // 快照里任务消失了，但编辑在途，任务保留
        store.merge_server_snapshot(vec![]);
        assert!(store.task("t1").is_some());
        assert!(store.has_pending_edit("t1"));
    }

    #[test]
    fn test_apply_then_rollback_restores_exact_snapshot() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        let before = store.task("t1").unwrap().clone();

        store.apply_optimistic("t1", &proposal("W2", 14, 90)).unwrap();
        assert_ne!(store.task("t1").unwrap(), &before);

        store.rollback_edit("t1").unwrap();
        assert_eq!(store.task("t1").unwrap(), &before);
        assert!(!store.has_pending_edit("t1"));
    }

    #[test]
    fn test_second_optimistic_apply_rejected() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        store.apply_optimistic("t1", &proposal("W1", 10, 60)).unwrap();

        let err = store
            .apply_optimistic("t1", &proposal("W1", 12, 60))
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::EditInProgress { .. }));
        // 第二次调用不得改动可见状态
        assert_eq!(store.task("t1").unwrap().start_time, at(10, 0));
    }

    #[test]
    fn test_apply_on_unknown_task_fails() {
        let mut store = SchedulingStore::new();
        let err = store
            .apply_optimistic("ghost", &proposal("W1", 10, 60))
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::TaskNotFound { .. }));
    }

    #[test]
    fn test_apply_on_terminal_task_fails() {
        let mut store = SchedulingStore::new();
        let mut done = task("t1", "W1", 9, 60);
        done.status = TaskStatus::Completed;
        store.merge_server_snapshot(vec![order("o1", vec![done])]);

        let err = store
            .apply_optimistic("t1", &proposal("W1", 10, 60))
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::Validation(_)));
    }

    #[test]
    fn test_confirm_takes_server_value() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        store.apply_optimistic("t1", &proposal("W1", 10, 60)).unwrap();

        // 后端确认时顺带调整了工时
        let mut confirmed = task("t1", "W1", 10, 45);
        confirmed.manually_adjusted = true;
        store.confirm_edit("t1", confirmed);

        let t = store.task("t1").unwrap();
        assert_eq!(t.start_time, at(10, 0));
        assert_eq!(t.duration_minutes, 45);
        assert!(t.manually_adjusted);
        assert!(!store.has_pending_edit("t1"));
    }

    #[test]
    fn test_next_snapshot_authoritative_after_resolution() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        store.apply_optimistic("t1", &proposal("W1", 10, 60)).unwrap();
        store.rollback_edit("t1").unwrap();

        // 编辑已决出，快照重新成为事实源
        let mut moved = task("t1", "W1", 9, 60);
        moved.start_time = at(13, 0);
        store.merge_server_snapshot(vec![order("o1", vec![moved])]);
        assert_eq!(store.task("t1").unwrap().start_time, at(13, 0));
    }

    #[test]
    fn test_optimistic_apply_does_not_set_manually_adjusted() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        store.apply_optimistic("t1", &proposal("W1", 10, 60)).unwrap();
        assert!(!store.task("t1").unwrap().manually_adjusted);
    }

    #[test]
    fn test_cross_workstation_move_borrows_known_name() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order(
            "o1",
            vec![task("t1", "W1", 9, 60), task("t2", "W2", 13, 60)],
        )]);
        store.apply_optimistic("t1", &proposal("W2", 10, 60)).unwrap();
        assert_eq!(store.task("t1").unwrap().workstation_name, "Station W2");

        // 完全未知的工位退回原始ID作为名称
        store.rollback_edit("t1").unwrap();
        store.apply_optimistic("t1", &proposal("W9", 10, 60)).unwrap();
        assert_eq!(store.task("t1").unwrap().workstation_name, "W9");
    }

    #[test]
    fn test_display_rows_sorted_and_annotated() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order(
            "o1",
            vec![
                task("t2", "W1", 9, 120),
                task("t1", "W1", 10, 60),
                task("t3", "W2", 9, 60),
            ],
        )]);
        let rows = store.tasks_for_display();
        let ids: Vec<&str> = rows.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t1", "t3"]);

        assert!(rows[0].conflict);
        assert!(rows[1].conflict);
        assert!(!rows[2].conflict);
        assert_eq!(rows[1].end_time, at(11, 0));
        assert_eq!(rows[0].label, "housing · drilling");
    }

    #[test]
    fn test_display_marks_pending_tasks() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        store.apply_optimistic("t1", &proposal("W1", 10, 60)).unwrap();
        let rows = store.tasks_for_display();
        assert!(rows[0].pending);
    }

    #[test]
    fn test_remove_task_clears_pending_edit() {
        let mut store = SchedulingStore::new();
        store.merge_server_snapshot(vec![order("o1", vec![task("t1", "W1", 9, 60)])]);
        store.apply_optimistic("t1", &proposal("W1", 10, 60)).unwrap();
        store.remove_task("t1");
        assert!(store.task("t1").is_none());
        assert!(!store.has_pending_edit("t1"));
    }

    #[test]
    fn test_rollback_without_pending_edit_is_an_error() {
        let mut store = SchedulingStore::new();
        assert!(store.rollback_edit("t1").is_err());
    }
}
