use std::collections::BTreeMap;
use std::sync::Arc;

use netpulse_core::{
    AgentListing, AgentRepository, AgentStatus, AgentView, CreateAgentRequest, CreatedAgent,
    HubHealth, HubRelay,
};
use netpulse_errors::{NetpulseError, NetpulseResult};
use tracing::{info, warn};

use crate::metrics;

/// 协调器侧的Agent管理
///
/// Agent由区域节点创建并持有真实凭证，协调器只保存不含凭证的镜像记录。
pub struct AgentAdminService {
    agents: Arc<dyn AgentRepository>,
    relay: Arc<dyn HubRelay>,
    regions: Vec<String>,
}

impl AgentAdminService {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        relay: Arc<dyn HubRelay>,
        regions: Vec<String>,
    ) -> Self {
        Self {
            agents,
            relay,
            regions,
        }
    }

    fn ensure_region(&self, region: &str) -> NetpulseResult<()> {
        if self.regions.iter().any(|r| r == region) {
            Ok(())
        } else {
            Err(NetpulseError::unknown_region(region))
        }
    }

    /// 写入镜像
    ///
    /// 已有带凭证的记录（共享注册表中区域节点写入的真实记录）时不覆盖；
    /// 本地已删除、区域节点侧处于停止状态的Agent不再恢复。
    async fn store_mirror(&self, view: AgentView) -> NetpulseResult<()> {
        match self.agents.get(&view.id).await? {
            Some(existing) if existing.token.is_some() => Ok(()),
            None if view.status == AgentStatus::Stopped => Ok(()),
            _ => self.agents.save(&view.into_mirror()).await,
        }
    }

    /// 通过区域节点创建Agent，返回一次性凭证
    pub async fn create_agent(
        &self,
        region: &str,
        request: CreateAgentRequest,
    ) -> NetpulseResult<CreatedAgent> {
        self.ensure_region(region)?;
        if request.name.trim().is_empty() {
            return Err(NetpulseError::invalid_argument("Agent名称不能为空"));
        }

        let created = self.relay.create_agent(region, &request).await?;
        self.store_mirror(created.agent.clone()).await?;
        info!("区域 {} 创建Agent {}", region, created.agent.id);
        Ok(created)
    }

    /// 列出Agent，先尝试从各区域节点刷新镜像
    pub async fn list_agents(&self) -> NetpulseResult<AgentListing> {
        for region in &self.regions {
            match self.relay.list_agents(region).await {
                Ok(listing) => {
                    for view in listing.agents {
                        self.store_mirror(view).await?;
                    }
                }
                Err(e) => {
                    metrics::record_relay_failure("coordinator_to_hub");
                    warn!("从区域 {} 刷新Agent列表失败，使用本地镜像: {}", region, e);
                }
            }
        }
        Ok(AgentListing::from_agents(self.agents.list().await?))
    }

    /// 删除Agent：先通知区域节点停止（尽力而为），再删除本地记录
    pub async fn delete_agent(&self, agent_id: &str) -> NetpulseResult<()> {
        let agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| NetpulseError::agent_not_found(agent_id))?;

        if let Err(e) = self.relay.stop_agent(&agent.region, agent_id).await {
            metrics::record_relay_failure("coordinator_to_hub");
            warn!("通知区域 {} 停止Agent {} 失败: {}", agent.region, agent_id, e);
        }

        self.agents.delete(agent_id).await?;
        info!("删除Agent {}", agent_id);
        Ok(())
    }

    /// 各区域节点状态
    pub async fn hub_statuses(&self) -> BTreeMap<String, HubHealth> {
        let mut statuses = BTreeMap::new();
        for region in &self.regions {
            let health = match self.relay.hub_status(region).await {
                Ok(status) => HubHealth::Reachable { status },
                Err(e) => {
                    warn!("区域 {} 状态查询失败: {}", region, e);
                    HubHealth::Unreachable {
                        message: e.to_string(),
                    }
                }
            };
            statuses.insert(region.clone(), health);
        }
        statuses
    }
}
