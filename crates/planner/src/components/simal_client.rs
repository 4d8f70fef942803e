//! simal 后端调度器的 REST 客户端
//!
//! 薄胶水层：把权威后端的 camelCase 线上格式转换成领域实体，
//! 把 HTTP 失败映射到统一错误分类。排产语义全部在后端，
//! 这里不做任何调度决策。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use workbench_domain::{
    ProductionOrder, ProductionOrderSummary, RescheduleProposal, ScheduledTask, SchedulingBackend,
    TaskStatus, WorkbenchError, WorkbenchResult,
};

pub struct SimalClient {
    base_url: String,
    operator_id: String,
    http_client: reqwest::Client,
}

impl SimalClient {
    pub fn new(
        base_url: &str,
        operator_id: &str,
        request_timeout_seconds: u64,
    ) -> WorkbenchResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_seconds))
            .build()
            .map_err(|e| WorkbenchError::Internal(format!("构建HTTP客户端失败: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            operator_id: operator_id.to_string(),
            http_client,
        })
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    async fn error_from_response(response: reqwest::Response) -> WorkbenchError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        WorkbenchError::Backend {
            status,
            message: extract_message(&body),
        }
    }
}

#[async_trait]
impl SchedulingBackend for SimalClient {
    async fn fetch_scheduled_orders(&self) -> WorkbenchResult<Vec<ProductionOrder>> {
        let url = format!("{}/simal/scheduled-orders", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    let err = Self::error_from_response(response).await;
                    error!("拉取已排产订单失败: {err}");
                    return Err(err);
                }
                let orders: Vec<ScheduledOrderDto> = response
                    .json()
                    .await
                    .map_err(|e| WorkbenchError::Serialization(e.to_string()))?;
                debug!("拉取到 {} 个已排产订单", orders.len());
                Ok(orders.into_iter().map(ScheduledOrderDto::into_order).collect())
            }
            Err(e) => Err(WorkbenchError::Network(format!("无法连接后端调度器: {e}"))),
        }
    }

    async fn fetch_production_orders(&self) -> WorkbenchResult<Vec<ProductionOrderSummary>> {
        let url = format!("{}/production-orders", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    return Err(Self::error_from_response(response).await);
                }
                let orders: Vec<ProductionOrderDto> = response
                    .json()
                    .await
                    .map_err(|e| WorkbenchError::Serialization(e.to_string()))?;
                Ok(orders.into_iter().map(ProductionOrderDto::into_summary).collect())
            }
            Err(e) => Err(WorkbenchError::Network(format!("无法连接后端调度器: {e}"))),
        }
    }

    async fn reschedule_task(
        &self,
        task_id: &str,
        proposal: &RescheduleProposal,
    ) -> WorkbenchResult<ScheduledTask> {
        let url = format!("{}/simal/tasks/{}/reschedule", self.base_url, task_id);
        // 整记录上送：即使只改了一个字段也带全工位/开始时间/工时
        let request = RescheduleRequestDto::from_proposal(proposal);

        match self
            .http_client
            .put(&url)
            .header("X-User-Id", &self.operator_id)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let dto: ScheduledTaskDto = response
                        .json()
                        .await
                        .map_err(|e| WorkbenchError::Serialization(e.to_string()))?;
                    info!("任务 {task_id} 改期已被后端接受");
                    return Ok(dto.into_standalone_task());
                }

                let body = response.text().await.unwrap_or_default();
                let message = extract_message(&body);
                match status.as_u16() {
                    404 => Err(WorkbenchError::task_not_found(task_id)),
                    409 => Err(WorkbenchError::ConflictRejected(if message.is_empty() {
                        "后端拒绝了该改期请求".to_string()
                    } else {
                        message
                    })),
                    s => {
                        error!("改期请求被拒绝: HTTP {s} - {message}");
                        Err(WorkbenchError::Backend { status: s, message })
                    }
                }
            }
            Err(e) => Err(WorkbenchError::Network(format!("改期请求发送失败: {e}"))),
        }
    }
}

/// 错误响应体里提取人类可读的原因，格式不识别时原样透出
fn extract_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<String>,
    }
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(msg) = parsed.message.or(parsed.error) {
            return msg;
        }
    }
    body.trim().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduledOrderDto {
    order_id: String,
    status: TaskStatus,
    #[serde(default)]
    tasks: Vec<ScheduledTaskDto>,
}

impl ScheduledOrderDto {
    fn into_order(self) -> ProductionOrder {
        let order_id = self.order_id;
        let status = self.status;
        let tasks = self
            .tasks
            .into_iter()
            .map(|t| t.into_task(&order_id, status))
            .collect();
        ProductionOrder {
            order_id,
            status,
            tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduledTaskDto {
    task_id: String,
    workstation_id: String,
    #[serde(default)]
    workstation_name: Option<String>,
    scheduled_start_time: DateTime<Utc>,
    duration: i64,
    /// 任务自己的状态；缺省继承所属订单
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    item_name: Option<String>,
    #[serde(default)]
    task_type: Option<String>,
    #[serde(default)]
    manually_adjusted: bool,
}

impl ScheduledTaskDto {
    fn into_task(self, order_id: &str, order_status: TaskStatus) -> ScheduledTask {
        ScheduledTask {
            task_id: self.task_id,
            order_id: self.order_id.unwrap_or_else(|| order_id.to_string()),
            workstation_name: self
                .workstation_name
                .unwrap_or_else(|| self.workstation_id.clone()),
            workstation_id: self.workstation_id,
            item_name: self.item_name.unwrap_or_default(),
            task_type: self.task_type.unwrap_or_default(),
            start_time: self.scheduled_start_time,
            duration_minutes: self.duration,
            status: self.status.unwrap_or(order_status),
            manually_adjusted: self.manually_adjusted,
        }
    }

    /// 改期响应里的权威任务没有订单上下文，状态缺省视为已排产
    fn into_standalone_task(self) -> ScheduledTask {
        let order_id = self.order_id.clone().unwrap_or_default();
        self.into_task(&order_id, TaskStatus::Scheduled)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleRequestDto<'a> {
    workstation_id: &'a str,
    /// ISO-8601，分钟精度
    scheduled_start_time: String,
    duration: i64,
    reason: &'a str,
}

impl<'a> RescheduleRequestDto<'a> {
    fn from_proposal(proposal: &'a RescheduleProposal) -> Self {
        Self {
            workstation_id: &proposal.workstation_id,
            scheduled_start_time: proposal.start_time.format("%Y-%m-%dT%H:%MZ").to_string(),
            duration: proposal.duration_minutes,
            reason: &proposal.reason,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductionOrderDto {
    order_id: String,
    status: TaskStatus,
    #[serde(default)]
    item_name: Option<String>,
}

impl ProductionOrderDto {
    fn into_summary(self) -> ProductionOrderSummary {
        ProductionOrderSummary {
            order_id: self.order_id,
            item_name: self.item_name.unwrap_or_default(),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use workbench_domain::{EditOrigin, RescheduleInput};

    #[test]
    fn test_client_creation() {
        let client = SimalClient::new("http://localhost:8081/", "planner-1", 30).unwrap();
        assert_eq!(client.base_url, "http://localhost:8081");
        assert_eq!(client.operator_id(), "planner-1");
    }

    #[test]
    fn test_order_dto_normalization_inherits_status() {
        let json = r#"{
            "orderId": "o-1",
            "status": "IN_PROGRESS",
            "tasks": [
                {
                    "taskId": "t-1",
                    "workstationId": "W1",
                    "workstationName": "CNC mill",
                    "scheduledStartTime": "2024-03-04T09:00:00Z",
                    "duration": 60,
                    "itemName": "bracket",
                    "taskType": "milling"
                },
                {
                    "taskId": "t-2",
                    "workstationId": "W2",
                    "scheduledStartTime": "2024-03-04T10:00:00Z",
                    "duration": 30,
                    "status": "COMPLETED",
                    "manuallyAdjusted": true
                }
            ]
        }"#;
        let dto: ScheduledOrderDto = serde_json::from_str(json).unwrap();
        let order = dto.into_order();

        assert_eq!(order.order_id, "o-1");
        assert_eq!(order.tasks.len(), 2);

        // 没有自身状态的任务继承订单状态
        let t1 = &order.tasks[0];
        assert_eq!(t1.status, TaskStatus::InProgress);
        assert_eq!(t1.order_id, "o-1");
        assert_eq!(t1.workstation_name, "CNC mill");
        assert_eq!(
            t1.start_time,
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
        );

        // 自带状态的任务保留自己的值，缺失的工位名退回工位ID
        let t2 = &order.tasks[1];
        assert_eq!(t2.status, TaskStatus::Completed);
        assert_eq!(t2.workstation_name, "W2");
        assert!(t2.manually_adjusted);
    }

    #[test]
    fn test_reschedule_request_wire_format() {
        let proposal = RescheduleInput {
            workstation_id: "W3".to_string(),
            start_time: "2024-03-04T10:30:00Z".to_string(),
            duration_minutes: 45,
            reason: Some("rush order".to_string()),
        }
        .into_proposal(EditOrigin::Form)
        .unwrap();

        let request = RescheduleRequestDto::from_proposal(&proposal);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["workstationId"], "W3");
        assert_eq!(json["scheduledStartTime"], "2024-03-04T10:30Z");
        assert_eq!(json["duration"], 45);
        assert_eq!(json["reason"], "rush order");
    }

    #[test]
    fn test_extract_message_variants() {
        assert_eq!(
            extract_message(r#"{"message": "workstation occupied"}"#),
            "workstation occupied"
        );
        assert_eq!(
            extract_message(r#"{"error": "invalid duration"}"#),
            "invalid duration"
        );
        assert_eq!(extract_message("plain text failure\n"), "plain text failure");
        assert_eq!(extract_message(""), "");
    }

    #[test]
    fn test_production_order_summary_mapping() {
        let json = r#"[{"orderId": "o-9", "status": "SCHEDULED"}]"#;
        let dtos: Vec<ProductionOrderDto> = serde_json::from_str(json).unwrap();
        let summary = dtos.into_iter().next().unwrap().into_summary();
        assert_eq!(summary.order_id, "o-9");
        assert_eq!(summary.status, TaskStatus::Scheduled);
        assert_eq!(summary.item_name, "");
    }
}
