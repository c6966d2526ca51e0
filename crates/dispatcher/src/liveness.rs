use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use netpulse_core::{Agent, AgentRepository, AgentStatus, LivenessConfig, OrphanPolicy};
use netpulse_errors::NetpulseResult;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::assignment::AssignmentService;
use crate::locks::DispatchLocks;
use crate::metrics;

/// 单次巡检结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 本次被标记为离线的Agent
    pub marked_offline: Vec<String>,
    /// 因Agent失联而标记失败的子任务数
    pub orphans_failed: usize,
    /// `manual` 策略下保留待人工处理的子任务
    pub orphans_reported: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.marked_offline.is_empty() && self.orphans_failed == 0 && self.orphans_reported.is_empty()
    }
}

/// Agent存活检测
///
/// 周期性巡检心跳超时的在线Agent并降级为离线，按孤儿策略处理其名下的子任务。
pub struct LivenessMonitor {
    agents: Arc<dyn AgentRepository>,
    assignment: Arc<AssignmentService>,
    locks: Arc<DispatchLocks>,
    config: LivenessConfig,
}

impl LivenessMonitor {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        assignment: Arc<AssignmentService>,
        locks: Arc<DispatchLocks>,
        config: LivenessConfig,
    ) -> Self {
        Self {
            agents,
            assignment,
            locks,
            config,
        }
    }

    /// 在线且心跳超时
    pub fn is_agent_stale(&self, agent: &Agent, now: DateTime<Utc>) -> bool {
        agent.status == AgentStatus::Online
            && agent.heartbeat_expired(now, self.config.heartbeat_timeout_seconds)
    }

    /// 离线且沉默超过超时加宽限期
    pub fn should_fail_orphans(&self, agent: &Agent, now: DateTime<Utc>) -> bool {
        self.config.orphan_policy == OrphanPolicy::Fail
            && agent.status == AgentStatus::Offline
            && agent.heartbeat_expired(
                now,
                self.config
                    .heartbeat_timeout_seconds
                    .saturating_add(self.config.orphan_grace_seconds),
            )
    }

    /// 执行一次巡检
    pub async fn sweep(&self) -> NetpulseResult<SweepReport> {
        let now = Utc::now();
        let mut report = SweepReport::default();

        for agent in self.agents.list().await? {
            if self.is_agent_stale(&agent, now) && self.mark_offline(&agent.id, now).await? {
                report.marked_offline.push(agent.id.clone());
            }
        }

        if !report.marked_offline.is_empty() {
            metrics::record_agents_marked_offline(report.marked_offline.len());
        }

        match self.config.orphan_policy {
            OrphanPolicy::Fail => {
                for agent in self.agents.list().await? {
                    if self.should_fail_orphans(&agent, now) {
                        report.orphans_failed += self.assignment.fail_orphans(&agent.id).await?;
                    }
                }
            }
            OrphanPolicy::Manual => {
                for agent_id in &report.marked_offline {
                    let orphans = self.assignment.orphans_of(agent_id).await?;
                    if !orphans.is_empty() {
                        warn!(
                            "离线Agent {} 仍持有 {} 个子任务，等待人工处理: {:?}",
                            agent_id,
                            orphans.len(),
                            orphans.iter().map(|s| s.id.as_str()).collect::<Vec<_>>()
                        );
                    }
                    report
                        .orphans_reported
                        .extend(orphans.into_iter().map(|s| s.id));
                }
            }
        }

        Ok(report)
    }

    /// 在Agent锁内复查后降级，期间收到心跳则放弃
    async fn mark_offline(&self, agent_id: &str, now: DateTime<Utc>) -> NetpulseResult<bool> {
        let _agent_guard = self.locks.agent(agent_id).await;
        let Some(mut agent) = self.agents.get(agent_id).await? else {
            return Ok(false);
        };
        if !self.is_agent_stale(&agent, now) {
            return Ok(false);
        }

        agent.status = AgentStatus::Offline;
        self.agents.save(&agent).await?;
        self.agents.mark_inactive(agent_id).await?;
        warn!(
            "Agent {} 心跳超时，标记为离线 (上次心跳: {})",
            agent_id,
            agent.last_heartbeat.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(true)
    }

    /// 巡检循环，单次失败只记录日志
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let period = Duration::from_secs(self.config.sweep_interval_seconds.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("启动Agent存活检测，巡检间隔 {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(report) if report.is_empty() => debug!("存活巡检完成，无变化"),
                        Ok(report) => info!(
                            "存活巡检: {} 个Agent离线，{} 个子任务标记失败，{} 个子任务待处理",
                            report.marked_offline.len(),
                            report.orphans_failed,
                            report.orphans_reported.len()
                        ),
                        Err(e) => error!("存活巡检失败: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("收到停止信号，退出Agent存活检测");
                    break;
                }
            }
        }
    }
}
