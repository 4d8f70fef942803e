use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::ScheduledTask;
use workbench_errors::{WorkbenchError, WorkbenchResult};

/// 改期请求的来源：拖拽与表单给出不同的默认原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOrigin {
    Drag,
    Form,
}

impl EditOrigin {
    pub fn default_reason(&self) -> &'static str {
        match self {
            EditOrigin::Drag => "Rescheduled by dragging on the timeline",
            EditOrigin::Form => "Rescheduled via the task edit form",
        }
    }
}

/// 未经校验的改期输入（表单原始值，或由拖拽事件拼装）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleInput {
    pub workstation_id: String,
    /// RFC 3339 或 `YYYY-MM-DDTHH:MM`（表单 datetime-local 格式）
    pub start_time: String,
    pub duration_minutes: i64,
    pub reason: Option<String>,
}

impl RescheduleInput {
    /// 本地校验：工位非空、时间可解析、工时为正整数。
    /// 任何一项不满足都在发起网络请求前失败。
    pub fn into_proposal(self, origin: EditOrigin) -> WorkbenchResult<RescheduleProposal> {
        if self.workstation_id.trim().is_empty() {
            return Err(WorkbenchError::validation_error("工位不能为空"));
        }
        if self.duration_minutes <= 0 {
            return Err(WorkbenchError::validation_error(format!(
                "工时必须为正整数分钟，收到 {}",
                self.duration_minutes
            )));
        }
        let start_time = parse_instant(&self.start_time)?;

        let reason = match self.reason {
            Some(r) if !r.trim().is_empty() => r,
            _ => origin.default_reason().to_string(),
        };

        Ok(RescheduleProposal {
            workstation_id: self.workstation_id,
            start_time: truncate_to_minute(start_time),
            duration_minutes: self.duration_minutes,
            reason,
        })
    }
}

/// 校验通过的改期提案，分钟精度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleProposal {
    pub workstation_id: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub reason: String,
}

/// 乐观更新期间挂在任务上的在途改期记录
///
/// 每个任务同一时刻至多存在一条；在确认或回滚之前，
/// 提案值对外可见，轮询快照只记录不覆盖。
#[derive(Debug, Clone)]
pub struct PendingEdit {
    pub task_id: String,
    pub submitted_at: DateTime<Utc>,
    pub proposal: RescheduleProposal,
    /// apply_optimistic 时刻的任务快照，回滚时精确恢复
    pub previous: ScheduledTask,
    /// 编辑在途期间收到的服务端值，仅记录，不展示
    pub last_seen_server: Option<ScheduledTask>,
}

fn parse_instant(raw: &str) -> WorkbenchResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Ok(naive.and_utc());
    }
    Err(WorkbenchError::validation_error(format!(
        "开始时间无法解析: '{raw}'"
    )))
}

fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}
