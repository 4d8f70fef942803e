use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkbenchError {
    #[error("输入校验失败: {0}")]
    Validation(String),
    #[error("任务 {task_id} 已有未完成的改期操作")]
    EditInProgress { task_id: String },
    #[error("任务未找到: {task_id}")]
    TaskNotFound { task_id: String },
    #[error("排产冲突被拒绝: {0}")]
    ConflictRejected(String),
    #[error("网络错误: {0}")]
    Network(String),
    #[error("后端返回错误: HTTP {status} - {message}")]
    Backend { status: u16, message: String },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type WorkbenchResult<T> = Result<T, WorkbenchError>;

impl WorkbenchError {
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn edit_in_progress<S: Into<String>>(task_id: S) -> Self {
        Self::EditInProgress {
            task_id: task_id.into(),
        }
    }
    pub fn task_not_found<S: Into<String>>(task_id: S) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }
    pub fn network_error<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 校验类错误在提交前就被拦截，不会发起网络请求
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            WorkbenchError::Validation(_) | WorkbenchError::EditInProgress { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkbenchError::Network(_))
            || matches!(self, WorkbenchError::Backend { status, .. } if *status >= 500)
    }

    /// 展示给排产员的文案：后端给出的原因原样透出，其余给通用提示
    pub fn user_message(&self) -> String {
        match self {
            WorkbenchError::Validation(msg) => msg.clone(),
            WorkbenchError::EditInProgress { .. } => {
                "该任务的改期正在提交中，请等待其完成".to_string()
            }
            WorkbenchError::TaskNotFound { .. } => {
                "该任务已不在排产计划中，可能已被后端调度器移除".to_string()
            }
            WorkbenchError::ConflictRejected(reason) => reason.clone(),
            WorkbenchError::Backend { message, .. } if !message.is_empty() => message.clone(),
            _ => "改期提交失败，请稍后重试".to_string(),
        }
    }
}

impl From<serde_json::Error> for WorkbenchError {
    fn from(err: serde_json::Error) -> Self {
        WorkbenchError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for WorkbenchError {
    fn from(err: anyhow::Error) -> Self {
        WorkbenchError::Internal(err.to_string())
    }
}
