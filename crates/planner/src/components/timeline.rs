//! 渲染协作方的数据契约
//!
//! 时间轴控件由外围应用实现；核心只负责喂给它标准化的任务行，
//! 并接收它上抛的交互事件（见 `workbench_domain::events`）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use workbench_domain::TaskStatus;

/// 标准化任务行，渲染协作方唯一的读取路径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineTask {
    pub task_id: String,
    pub order_id: String,
    pub workstation_id: String,
    pub workstation_name: String,
    pub label: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: TaskStatus,
    pub manually_adjusted: bool,
    /// 改期在途，渲染方应禁用该任务的再次编辑
    pub pending: bool,
    pub conflict: bool,
}

/// 核心下发给渲染协作方的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    pub editable: bool,
    pub refresh_interval_ms: u64,
    pub show_current_time: bool,
}
