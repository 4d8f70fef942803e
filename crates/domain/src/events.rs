//! 时间轴协作方与工作台核心之间的消息接口
//!
//! 渲染侧只发事件、只读快照，不直接持有核心状态。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 渲染协作方上抛的交互事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TimelineEvent {
    /// 点击选中任务，预填编辑表单
    TaskClicked { task_id: String },
    /// 拖拽结束，提出新的开始时间
    TaskDragged {
        task_id: String,
        proposed_start: DateTime<Utc>,
    },
}

/// 核心对外广播的事件
#[derive(Debug, Clone)]
pub enum PlannerEvent {
    /// 任务集发生变化，渲染方应重新读取展示快照
    ScheduleUpdated,
    Notice(PlannerNotice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// 面向排产员的通知条
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerNotice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl PlannerNotice {
    fn new(level: NoticeLevel, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message,
            occurred_at: Utc::now(),
        }
    }

    pub fn success<S: Into<String>>(message: S) -> Self {
        Self::new(NoticeLevel::Success, message.into())
    }

    pub fn info<S: Into<String>>(message: S) -> Self {
        Self::new(NoticeLevel::Info, message.into())
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::new(NoticeLevel::Error, message.into())
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_constructors() {
        let n = PlannerNotice::success("任务已改期");
        assert_eq!(n.level, NoticeLevel::Success);
        assert!(!n.is_error());

        let n = PlannerNotice::error("workstation occupied");
        assert!(n.is_error());
        assert_eq!(n.message, "workstation occupied");
    }

    #[test]
    fn test_notice_ids_are_unique() {
        let a = PlannerNotice::info("a");
        let b = PlannerNotice::info("b");
        assert_ne!(a.id, b.id);
    }
}
