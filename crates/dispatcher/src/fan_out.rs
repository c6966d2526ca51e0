use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use netpulse_core::{
    CheckCreated, CheckStatusReport, CheckType, HubRelay, QueueOverview, RelayedResult,
    StatusCounts, SubTaskStatus, Task, TaskRepository,
};
use netpulse_errors::{NetpulseError, NetpulseResult};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics;

pub const AUTO_REGION: &str = "auto";

/// 创建检测请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateCheckRequest {
    pub target: String,
    /// 为空或 `auto` 时随机选择区域
    #[serde(default)]
    pub region: Option<String>,
    /// 为空时使用完整检测目录
    #[serde(default)]
    pub checks: Option<Vec<String>>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// 检测任务登记与扇出（协调器侧）
pub struct CheckService {
    tasks: Arc<dyn TaskRepository>,
    relay: Arc<dyn HubRelay>,
    regions: Vec<String>,
}

impl CheckService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        relay: Arc<dyn HubRelay>,
        regions: Vec<String>,
    ) -> Self {
        Self {
            tasks,
            relay,
            regions,
        }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// 解析区域，`auto` 在已配置区域中均匀随机选择
    pub fn resolve_region(&self, requested: Option<&str>) -> NetpulseResult<String> {
        let requested = requested.map(str::trim).filter(|r| !r.is_empty());
        match requested {
            None => self.pick_random_region(),
            Some(region) if region.eq_ignore_ascii_case(AUTO_REGION) => self.pick_random_region(),
            Some(region) => self
                .regions
                .iter()
                .find(|configured| configured.as_str() == region)
                .cloned()
                .ok_or_else(|| NetpulseError::unknown_region(region)),
        }
    }

    fn pick_random_region(&self) -> NetpulseResult<String> {
        self.regions
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| NetpulseError::unknown_region(AUTO_REGION))
    }

    /// 创建检测任务并扇出子任务
    ///
    /// 向区域节点转发失败只记录日志，不回滚已登记的子任务。
    pub async fn create_check(&self, request: CreateCheckRequest) -> NetpulseResult<CheckCreated> {
        let target = request.target.trim();
        if target.is_empty() {
            return Err(NetpulseError::invalid_argument("检测目标不能为空"));
        }
        let check_types = match &request.checks {
            Some(names) if !names.is_empty() => CheckType::parse_selection(names)?,
            _ => CheckType::CATALOG.to_vec(),
        };
        let region = self.resolve_region(request.region.as_deref())?;

        let task = Task::new(
            Uuid::new_v4().to_string(),
            target,
            region.clone(),
            check_types,
            request.port,
        );
        self.tasks.save_task(&task).await?;

        for sub_task in task.fan_out() {
            self.tasks.save_sub_task(&sub_task).await?;
            self.tasks.enqueue(&region, &sub_task.id).await?;

            if let Err(e) = self.relay.assign_sub_task(&region, &sub_task).await {
                metrics::record_relay_failure("coordinator_to_hub");
                warn!("子任务 {} 转发到区域 {} 失败: {}", sub_task.id, region, e);
            }
        }

        metrics::record_check_created(&region);
        info!(
            "创建检测任务 {}: 目标 {}，区域 {}，子任务 {} 个",
            task.id,
            task.target,
            region,
            task.sub_task_ids.len()
        );

        Ok(CheckCreated {
            task_id: task.id,
            target: task.target,
            region,
            sub_tasks: task.sub_task_ids,
        })
    }

    pub async fn get_check_status(&self, task_id: &str) -> NetpulseResult<CheckStatusReport> {
        let sub_tasks = self.tasks.list_sub_tasks(task_id).await?;
        CheckStatusReport::aggregate(task_id, sub_tasks)
            .ok_or_else(|| NetpulseError::task_not_found(task_id))
    }

    pub async fn queue_overview(&self) -> NetpulseResult<QueueOverview> {
        let mut queues = BTreeMap::new();
        for region in &self.regions {
            queues.insert(region.clone(), self.tasks.queue_len(region).await?);
        }
        for region in self.tasks.queue_regions().await? {
            if !queues.contains_key(&region) {
                let len = self.tasks.queue_len(&region).await?;
                queues.insert(region, len);
            }
        }

        let sub_tasks = self.tasks.list_all_sub_tasks().await?;
        let counts = StatusCounts::tally(sub_tasks.iter().map(|s| &s.status));
        Ok(QueueOverview {
            queues,
            counts,
            total_sub_tasks: sub_tasks.len(),
        })
    }

    /// 应用区域节点上报的结果
    ///
    /// 与提交结果遵循相同的终态规则，不涉及Agent负载。只接受子任务所属区域的上报。
    /// 返回是否首次进入终态。
    pub async fn record_relayed_result(
        &self,
        reporting_region: &str,
        sub_task_id: &str,
        relayed: RelayedResult,
    ) -> NetpulseResult<bool> {
        let mut sub_task = self
            .tasks
            .get_sub_task(sub_task_id)
            .await?
            .ok_or_else(|| NetpulseError::task_not_found(sub_task_id))?;
        if sub_task.region != reporting_region {
            return Err(NetpulseError::unauthorized(format!(
                "区域 {reporting_region} 无权上报区域 {} 的子任务",
                sub_task.region
            )));
        }

        let now = Utc::now();
        if sub_task.status == SubTaskStatus::Pending {
            sub_task.assign(&relayed.agent_id, now);
        }
        if sub_task.assigned_agent.as_deref() != Some(relayed.agent_id.as_str()) {
            return Err(NetpulseError::invalid_argument(format!(
                "子任务 {sub_task_id} 未分配给Agent {}",
                relayed.agent_id
            )));
        }

        let first_terminal = sub_task.record_outcome(relayed.outcome, now);
        self.tasks.save_sub_task(&sub_task).await?;
        self.tasks.dequeue(&sub_task.region, &sub_task.id).await?;

        if first_terminal {
            info!(
                "区域 {} 上报子任务 {} 结果: {}",
                sub_task.region, sub_task.id, sub_task.status
            );
        } else {
            debug!("子任务 {} 重复上报结果", sub_task.id);
        }
        Ok(first_terminal)
    }
}
