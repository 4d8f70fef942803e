use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 排产任务
///
/// 时间轴上的一个时间盒：某个工位在某段时间内执行的一道工序。
/// 任务只由后端调度器创建和销毁，本核心只能对其提出改期建议。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub task_id: String,
    pub order_id: String,
    pub workstation_id: String,
    pub workstation_name: String,
    pub item_name: String,
    pub task_type: String, // 工序类型，如 "milling"、"assembly"
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64, // 严格为正
    pub status: TaskStatus,
    pub manually_adjusted: bool, // 人工改期被后端接受后置位
}

/// 任务/订单状态
///
/// 任务默认继承所属订单的状态，除非后端为单个任务下发了自己的状态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl ScheduledTask {
    /// 结束时间恒等于开始时间加工时
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes)
    }

    /// 与另一任务在同一工位上时间区间重叠（区间为 [start, end)，相邻不算重叠）
    pub fn overlaps(&self, other: &ScheduledTask) -> bool {
        self.workstation_id == other.workstation_id
            && self.start_time < other.end_time()
            && other.start_time < self.end_time()
    }

    pub fn is_editable(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn entity_description(&self) -> String {
        format!(
            "任务 '{}' (ID: {}, 工位: {})",
            self.item_name, self.task_id, self.workstation_name
        )
    }
}

/// 生产订单
///
/// 一组任务的归属单位。任务按 task_id 索引，列表内顺序无意义。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub order_id: String,
    pub status: TaskStatus,
    pub tasks: Vec<ScheduledTask>,
}

impl ProductionOrder {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// 未排产订单概要（侧栏展示用，外围页面只读消费）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrderSummary {
    pub order_id: String,
    pub item_name: String,
    pub status: TaskStatus,
}
