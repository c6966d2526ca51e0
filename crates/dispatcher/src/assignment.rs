use std::sync::Arc;

use chrono::Utc;
use netpulse_core::{
    AgentRepository, CheckOutcome, CoordinatorRelay, PollOutcome, RelayedResult, SubTask,
    SubTaskStatus, SubmitAck, TaskRepository, TaskResultView,
};
use netpulse_errors::{NetpulseError, NetpulseResult};
use tracing::{debug, info, warn};

use crate::agent_registry::AgentRegistry;
use crate::locks::DispatchLocks;
use crate::metrics;

pub const AGENT_LOST_ERROR: &str = "agent lost";

/// 拉取式任务分配（区域节点侧）
///
/// Agent按区域队列的入队顺序领取第一个能力匹配的子任务。
/// 同一区域的扫描和分配由区域锁保证原子性，Agent负载由Agent锁串行化。
pub struct AssignmentService {
    tasks: Arc<dyn TaskRepository>,
    agents: Arc<dyn AgentRepository>,
    registry: Arc<AgentRegistry>,
    locks: Arc<DispatchLocks>,
    upstream: Option<Arc<dyn CoordinatorRelay>>,
}

impl AssignmentService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        registry: Arc<AgentRegistry>,
        locks: Arc<DispatchLocks>,
        upstream: Option<Arc<dyn CoordinatorRelay>>,
    ) -> Self {
        Self {
            tasks,
            agents: registry.repository(),
            registry,
            locks,
            upstream,
        }
    }

    pub fn region(&self) -> &str {
        self.registry.region()
    }

    /// 拉取任务
    pub async fn poll_task(&self, agent_id: &str, token: &str) -> NetpulseResult<PollOutcome> {
        self.registry.verify(agent_id, token).await?;

        let _agent_guard = self.locks.agent(agent_id).await;
        let mut agent = self.registry.get(agent_id).await?;

        if !agent.is_online() {
            debug!("Agent {} 状态为 {}，拒绝分配", agent_id, agent.status.as_str());
            return Ok(PollOutcome::Offline);
        }
        if agent.is_at_capacity() {
            debug!(
                "Agent {} 已满载 ({}/{})",
                agent_id, agent.current_tasks, agent.max_tasks
            );
            return Ok(PollOutcome::Busy);
        }

        let now = Utc::now();
        let assigned = {
            let _region_guard = self.locks.region(&agent.region).await;
            let mut assigned: Option<SubTask> = None;

            for sub_task_id in self.tasks.queue_ids(&agent.region).await? {
                let Some(mut sub_task) = self.tasks.get_sub_task(&sub_task_id).await? else {
                    debug!("清理队列中已过期的子任务: {}", sub_task_id);
                    self.tasks.dequeue(&agent.region, &sub_task_id).await?;
                    continue;
                };
                if !sub_task.is_pending() {
                    debug!(
                        "清理队列中状态为 {} 的子任务: {}",
                        sub_task.status, sub_task_id
                    );
                    self.tasks.dequeue(&agent.region, &sub_task_id).await?;
                    continue;
                }
                if !agent.can_take(&sub_task) {
                    continue;
                }

                sub_task.assign(agent_id, now);
                self.tasks.save_sub_task(&sub_task).await?;
                self.tasks.dequeue(&agent.region, &sub_task_id).await?;
                assigned = Some(sub_task);
                break;
            }
            assigned
        };

        agent.touch(now);
        let Some(sub_task) = assigned else {
            self.agents.save(&agent).await?;
            return Ok(PollOutcome::NoTasks);
        };

        agent.current_tasks += 1;
        self.agents.save(&agent).await?;
        metrics::record_sub_task_assigned(&agent.region);
        info!(
            "子任务 {} ({}) 分配给Agent {} ({}/{})",
            sub_task.id, sub_task.check_type, agent_id, agent.current_tasks, agent.max_tasks
        );
        Ok(PollOutcome::Assigned { task: sub_task })
    }

    /// 提交结果
    ///
    /// 首次提交推进到终态并释放负载；重复提交只覆盖结果。
    pub async fn submit_result(
        &self,
        task_id: &str,
        agent_id: &str,
        token: &str,
        outcome: CheckOutcome,
    ) -> NetpulseResult<SubmitAck> {
        self.registry.verify(agent_id, token).await?;

        let region = self
            .tasks
            .get_sub_task(task_id)
            .await?
            .ok_or_else(|| NetpulseError::task_not_found(task_id))?
            .region;

        let success = outcome.success;
        let (sub_task, first_terminal) = {
            let _region_guard = self.locks.region(&region).await;
            let mut sub_task = self
                .tasks
                .get_sub_task(task_id)
                .await?
                .ok_or_else(|| NetpulseError::task_not_found(task_id))?;
            if !sub_task.is_assigned_to(agent_id) {
                return Err(NetpulseError::invalid_argument(format!(
                    "子任务 {task_id} 未分配给Agent {agent_id}"
                )));
            }
            let first_terminal = sub_task.record_outcome(outcome, Utc::now());
            self.tasks.save_sub_task(&sub_task).await?;
            (sub_task, first_terminal)
        };

        if first_terminal {
            let _agent_guard = self.locks.agent(agent_id).await;
            if let Some(mut agent) = self.agents.get(agent_id).await? {
                agent.release_slot();
                agent.touch(Utc::now());
                self.agents.save(&agent).await?;
            }
            metrics::record_result_submitted(success);
            info!(
                "Agent {} 提交子任务 {} 结果: {}",
                agent_id, task_id, sub_task.status
            );
            self.relay_upstream(&sub_task, agent_id).await;
        } else {
            debug!("子任务 {} 重复提交结果，保留状态 {}", task_id, sub_task.status);
        }

        Ok(SubmitAck {
            task_id: sub_task.id,
            status: sub_task.status,
            first_submission: first_terminal,
        })
    }

    pub async fn get_result(&self, task_id: &str) -> NetpulseResult<TaskResultView> {
        let sub_task = self
            .tasks
            .get_sub_task(task_id)
            .await?
            .ok_or_else(|| NetpulseError::task_not_found(task_id))?;
        Ok(TaskResultView::from(&sub_task))
    }

    /// 接收协调器转发的子任务
    ///
    /// 注册表中已有该记录时不重复入队，返回 `false`。
    pub async fn accept_relayed(&self, sub_task: SubTask) -> NetpulseResult<bool> {
        if sub_task.region != self.region() {
            return Err(NetpulseError::unknown_region(sub_task.region));
        }
        if sub_task.status != SubTaskStatus::Pending {
            return Err(NetpulseError::invalid_argument(format!(
                "只能接收待处理的子任务，当前状态: {}",
                sub_task.status
            )));
        }

        let _region_guard = self.locks.region(&sub_task.region).await;
        if self.tasks.get_sub_task(&sub_task.id).await?.is_some() {
            debug!("子任务 {} 已存在，跳过入队", sub_task.id);
            return Ok(false);
        }
        self.tasks.save_sub_task(&sub_task).await?;
        self.tasks.enqueue(&sub_task.region, &sub_task.id).await?;
        debug!("接收子任务 {} 入队 {}", sub_task.id, sub_task.region);
        Ok(true)
    }

    pub async fn pending_count(&self) -> NetpulseResult<usize> {
        self.tasks.queue_len(self.region()).await
    }

    /// 将失联Agent上仍处于分配状态的子任务标记为失败，返回处理数量
    pub async fn fail_orphans(&self, agent_id: &str) -> NetpulseResult<usize> {
        let orphans = self.orphans_of(agent_id).await?;
        let mut failed = Vec::new();

        for orphan in orphans {
            let _region_guard = self.locks.region(&orphan.region).await;
            let Some(mut sub_task) = self.tasks.get_sub_task(&orphan.id).await? else {
                continue;
            };
            if sub_task.status != SubTaskStatus::Assigned || !sub_task.is_assigned_to(agent_id) {
                continue;
            }
            sub_task.record_outcome(CheckOutcome::failure(AGENT_LOST_ERROR), Utc::now());
            self.tasks.save_sub_task(&sub_task).await?;
            failed.push(sub_task);
        }

        if failed.is_empty() {
            return Ok(0);
        }

        {
            let _agent_guard = self.locks.agent(agent_id).await;
            if let Some(mut agent) = self.agents.get(agent_id).await? {
                for _ in &failed {
                    agent.free_slot();
                }
                self.agents.save(&agent).await?;
            }
        }

        warn!(
            "Agent {} 失联，{} 个子任务标记为失败",
            agent_id,
            failed.len()
        );
        for sub_task in &failed {
            self.relay_upstream(sub_task, agent_id).await;
        }
        Ok(failed.len())
    }

    /// 仍分配给指定Agent的子任务
    pub async fn orphans_of(&self, agent_id: &str) -> NetpulseResult<Vec<SubTask>> {
        Ok(self
            .tasks
            .list_all_sub_tasks()
            .await?
            .into_iter()
            .filter(|sub| {
                sub.status == SubTaskStatus::Assigned
                    && sub.assigned_agent.as_deref() == Some(agent_id)
            })
            .collect())
    }

    async fn relay_upstream(&self, sub_task: &SubTask, agent_id: &str) {
        let Some(upstream) = &self.upstream else {
            return;
        };
        let relayed = RelayedResult {
            agent_id: agent_id.to_string(),
            outcome: CheckOutcome {
                success: sub_task.status == SubTaskStatus::Completed,
                result: sub_task.result.clone(),
                error: sub_task.error.clone(),
            },
        };
        if let Err(e) = upstream.relay_result(&sub_task.id, &relayed).await {
            metrics::record_relay_failure("hub_to_coordinator");
            warn!("向协调器上报子任务 {} 结果失败: {}", sub_task.id, e);
        }
    }
}
