//! 面向后端调度器的端口
//!
//! 核心通过该trait访问权威后端，网络实现与测试替身都在这条缝上接入。

use async_trait::async_trait;

use crate::entities::{ProductionOrder, ProductionOrderSummary, ScheduledTask};
use crate::value_objects::RescheduleProposal;
use workbench_errors::WorkbenchResult;

/// 权威后端调度器的访问接口
///
/// 本核心从不创建或删除任务，只读取快照并提交改期提案；
/// 后端可以接受、拒绝或改写提案。
#[async_trait]
pub trait SchedulingBackend: Send + Sync {
    /// 拉取已排产订单（含嵌套任务列表）
    async fn fetch_scheduled_orders(&self) -> WorkbenchResult<Vec<ProductionOrder>>;

    /// 拉取生产订单概要，用于未排产订单侧栏
    async fn fetch_production_orders(&self) -> WorkbenchResult<Vec<ProductionOrderSummary>>;

    /// 提交整记录改期提案，返回后端确认后的权威任务
    async fn reschedule_task(
        &self,
        task_id: &str,
        proposal: &RescheduleProposal,
    ) -> WorkbenchResult<ScheduledTask>;
}
