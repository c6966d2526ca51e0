use std::sync::Arc;

use async_trait::async_trait;
use netpulse_core::{Agent, AgentRepository, KvRegistry};
use netpulse_errors::NetpulseResult;
use tracing::warn;

use crate::keys;

/// 基于键值注册表的Agent仓储，在线索引保存在 `active_agents` 集合
pub struct KvAgentRepository {
    registry: Arc<dyn KvRegistry>,
}

impl KvAgentRepository {
    pub fn new(registry: Arc<dyn KvRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl AgentRepository for KvAgentRepository {
    async fn save(&self, agent: &Agent) -> NetpulseResult<()> {
        let payload = serde_json::to_string(agent)?;
        self.registry
            .set(&keys::agent_key(&agent.id), &payload, None)
            .await
    }

    async fn get(&self, id: &str) -> NetpulseResult<Option<Agent>> {
        match self.registry.get(&keys::agent_key(id)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> NetpulseResult<bool> {
        self.registry.set_remove(keys::ACTIVE_AGENTS, id).await?;
        self.registry.delete(&keys::agent_key(id)).await
    }

    async fn list(&self) -> NetpulseResult<Vec<Agent>> {
        let entries = self.registry.scan_prefix(keys::AGENT_PREFIX).await?;
        let mut agents: Vec<Agent> = entries
            .into_iter()
            .filter_map(|(key, payload)| match serde_json::from_str::<Agent>(&payload) {
                Ok(agent) => Some(agent),
                Err(e) => {
                    warn!("跳过无法解析的Agent记录 {}: {}", key, e);
                    None
                }
            })
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(agents)
    }

    async fn mark_active(&self, id: &str) -> NetpulseResult<()> {
        self.registry.set_add(keys::ACTIVE_AGENTS, id).await?;
        Ok(())
    }

    async fn mark_inactive(&self, id: &str) -> NetpulseResult<()> {
        self.registry.set_remove(keys::ACTIVE_AGENTS, id).await?;
        Ok(())
    }

    async fn active_ids(&self) -> NetpulseResult<Vec<String>> {
        self.registry.set_members(keys::ACTIVE_AGENTS).await
    }
}
