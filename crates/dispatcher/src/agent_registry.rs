use std::sync::Arc;

use chrono::Utc;
use netpulse_core::{
    Agent, AgentCredentials, AgentListing, AgentRegistration, AgentRepository, AgentStatus,
    Capability, HeartbeatAck,
};
use netpulse_errors::{NetpulseError, NetpulseResult};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::locks::DispatchLocks;

/// Agent注册配置
#[derive(Debug, Clone)]
pub struct AgentRegistryConfig {
    /// 本节点负责的区域
    pub region: String,
    pub default_capabilities: Vec<Capability>,
    pub default_max_tasks: u32,
    /// 参与凭证派生的本层密钥
    pub token_secret: String,
}

/// Agent注册与生命周期管理（区域节点侧）
pub struct AgentRegistry {
    agents: Arc<dyn AgentRepository>,
    locks: Arc<DispatchLocks>,
    config: AgentRegistryConfig,
}

/// 派生Agent凭证：SHA-256(name || salt || secret)，十六进制编码
pub fn derive_token(name: &str, salt: &[u8], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_agent_id(region: &str) -> String {
    format!("agent-{region}-{:08x}", rand::random::<u32>())
}

impl AgentRegistry {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        locks: Arc<DispatchLocks>,
        config: AgentRegistryConfig,
    ) -> Self {
        Self {
            agents,
            locks,
            config,
        }
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    pub fn repository(&self) -> Arc<dyn AgentRepository> {
        self.agents.clone()
    }

    /// 注册Agent，凭证只在返回值中出现一次
    pub async fn register(
        &self,
        registration: AgentRegistration,
    ) -> NetpulseResult<(Agent, AgentCredentials)> {
        let name = registration.name.trim();
        if name.is_empty() {
            return Err(NetpulseError::invalid_argument("Agent名称不能为空"));
        }
        if registration.region != self.config.region {
            return Err(NetpulseError::unknown_region(registration.region));
        }

        let capabilities = if registration.capabilities.is_empty() {
            self.config.default_capabilities.clone()
        } else {
            Capability::parse_list(&registration.capabilities)?
        };
        let max_tasks = registration
            .max_tasks
            .unwrap_or(self.config.default_max_tasks);
        if max_tasks == 0 {
            return Err(NetpulseError::invalid_argument("max_tasks 必须大于0"));
        }

        let mut id = generate_agent_id(&self.config.region);
        while self.agents.get(&id).await?.is_some() {
            id = generate_agent_id(&self.config.region);
        }

        let salt: [u8; 16] = rand::random();
        let token = derive_token(name, &salt, &self.config.token_secret);

        let agent = Agent::new(
            id.clone(),
            name,
            self.config.region.clone(),
            capabilities,
            Some(token.clone()),
            max_tasks,
        );
        self.agents.save(&agent).await?;
        self.agents.mark_active(&agent.id).await?;

        info!(
            "注册Agent: {} (名称: {}, 区域: {}, 能力: {:?}, 并发上限: {})",
            agent.id,
            agent.name,
            agent.region,
            agent.capabilities.iter().map(Capability::as_str).collect::<Vec<_>>(),
            agent.max_tasks
        );

        Ok((agent, AgentCredentials { agent_id: id, token }))
    }

    /// 校验凭证，未知Agent与凭证不匹配都返回 `Unauthorized`
    pub async fn verify(&self, agent_id: &str, token: &str) -> NetpulseResult<Agent> {
        match self.agents.get(agent_id).await? {
            Some(agent) if agent.verify_token(token) => Ok(agent),
            Some(_) => {
                warn!("Agent {} 凭证校验失败", agent_id);
                Err(NetpulseError::unauthorized("Agent凭证无效"))
            }
            None => {
                warn!("未知Agent尝试访问: {}", agent_id);
                Err(NetpulseError::unauthorized("Agent凭证无效"))
            }
        }
    }

    pub async fn get(&self, agent_id: &str) -> NetpulseResult<Agent> {
        self.agents
            .get(agent_id)
            .await?
            .ok_or_else(|| NetpulseError::agent_not_found(agent_id))
    }

    /// 心跳：刷新时间并恢复在线，已停止的Agent只返回 `stopped`
    pub async fn heartbeat(&self, agent_id: &str, token: &str) -> NetpulseResult<HeartbeatAck> {
        self.verify(agent_id, token).await?;

        let _agent_guard = self.locks.agent(agent_id).await;
        let mut agent = self.get(agent_id).await?;
        if agent.status == AgentStatus::Stopped {
            debug!("已停止的Agent {} 发送心跳", agent_id);
            return Ok(HeartbeatAck::Stopped);
        }

        let was_offline = agent.status == AgentStatus::Offline;
        agent.touch(Utc::now());
        agent.status = AgentStatus::Online;
        self.agents.save(&agent).await?;
        self.agents.mark_active(agent_id).await?;

        if was_offline {
            info!("Agent {} 恢复在线", agent_id);
        } else {
            debug!("Agent {} 心跳", agent_id);
        }
        Ok(HeartbeatAck::Online)
    }

    /// 停止Agent，执行循环在下一次拉取时感知
    pub async fn stop(&self, agent_id: &str) -> NetpulseResult<Agent> {
        let _agent_guard = self.locks.agent(agent_id).await;
        let mut agent = self.get(agent_id).await?;
        agent.status = AgentStatus::Stopped;
        self.agents.save(&agent).await?;
        self.agents.mark_inactive(agent_id).await?;
        info!("Agent {} 已停止", agent_id);
        Ok(agent)
    }

    pub async fn delete(&self, agent_id: &str) -> NetpulseResult<()> {
        let _agent_guard = self.locks.agent(agent_id).await;
        if !self.agents.delete(agent_id).await? {
            return Err(NetpulseError::agent_not_found(agent_id));
        }
        info!("Agent {} 已删除", agent_id);
        Ok(())
    }

    pub async fn list(&self) -> NetpulseResult<AgentListing> {
        Ok(AgentListing::from_agents(self.agents.list().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_core::CheckType;
    use netpulse_infrastructure::{InMemoryRegistry, KvAgentRepository};

    fn registry() -> AgentRegistry {
        let repo = Arc::new(KvAgentRepository::new(Arc::new(InMemoryRegistry::new())));
        AgentRegistry::new(
            repo,
            Arc::new(DispatchLocks::new()),
            AgentRegistryConfig {
                region: "ru".to_string(),
                default_capabilities: vec![Capability::Check(CheckType::Http)],
                default_max_tasks: 3,
                token_secret: "hub-secret".to_string(),
            },
        )
    }

    fn registration(name: &str, caps: &[&str]) -> AgentRegistration {
        AgentRegistration {
            name: name.to_string(),
            region: "ru".to_string(),
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            max_tasks: None,
        }
    }

    #[test]
    fn test_derive_token_depends_on_salt_and_secret() {
        let a = derive_token("probe", &[1; 16], "s1");
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, derive_token("probe", &[2; 16], "s1"));
        assert_ne!(a, derive_token("probe", &[1; 16], "s2"));
        assert_eq!(a, derive_token("probe", &[1; 16], "s1"));
    }

    #[test]
    fn test_derive_token_is_lowercase_sha256_hex() {
        // SHA-256("abc")
        assert_eq!(
            derive_token("a", b"b", "c"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_register_and_verify() {
        let registry = registry();
        let (agent, creds) = registry
            .register(registration("probe-1", &[]))
            .await
            .unwrap();

        assert!(agent.id.starts_with("agent-ru-"));
        assert_eq!(agent.id.len(), "agent-ru-".len() + 8);
        assert_eq!(agent.capabilities, vec![Capability::Check(CheckType::Http)]);
        assert_eq!(agent.max_tasks, 3);
        assert_eq!(agent.current_tasks, 0);

        assert!(registry.verify(&creds.agent_id, &creds.token).await.is_ok());
        let err = registry.verify(&creds.agent_id, "wrong").await.unwrap_err();
        assert!(matches!(err, NetpulseError::Unauthorized(_)));
        let err = registry.verify("agent-ru-missing", &creds.token).await.unwrap_err();
        assert!(matches!(err, NetpulseError::Unauthorized(_)));

        let active = registry.repository().active_ids().await.unwrap();
        assert_eq!(active, vec![creds.agent_id.clone()]);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let registry = registry();
        assert!(matches!(
            registry.register(registration("p", &["icmp"])).await,
            Err(NetpulseError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.register(registration("  ", &[])).await,
            Err(NetpulseError::InvalidArgument(_))
        ));
        let mut other_region = registration("p", &[]);
        other_region.region = "eu".into();
        assert!(matches!(
            registry.register(other_region).await,
            Err(NetpulseError::UnknownRegion { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_then_heartbeat_answers_stopped() {
        let registry = registry();
        let (_, creds) = registry.register(registration("p", &["dns"])).await.unwrap();

        assert_eq!(
            registry.heartbeat(&creds.agent_id, &creds.token).await.unwrap(),
            HeartbeatAck::Online
        );

        registry.stop(&creds.agent_id).await.unwrap();
        assert_eq!(
            registry.heartbeat(&creds.agent_id, &creds.token).await.unwrap(),
            HeartbeatAck::Stopped
        );
        let agent = registry.get(&creds.agent_id).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Stopped);
        assert!(registry.repository().active_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_restores_offline_agent() {
        let registry = registry();
        let (mut agent, creds) = registry.register(registration("p", &[])).await.unwrap();
        agent.status = AgentStatus::Offline;
        registry.repository().save(&agent).await.unwrap();
        registry.repository().mark_inactive(&agent.id).await.unwrap();

        registry.heartbeat(&creds.agent_id, &creds.token).await.unwrap();
        let agent = registry.get(&creds.agent_id).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Online);
        assert_eq!(
            registry.repository().active_ids().await.unwrap(),
            vec![agent.id]
        );
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let registry = registry();
        let (a, _) = registry.register(registration("a", &[])).await.unwrap();
        registry.register(registration("b", &[])).await.unwrap();

        let listing = registry.list().await.unwrap();
        assert_eq!(listing.stats.total, 2);
        assert_eq!(listing.stats.online, 2);

        registry.delete(&a.id).await.unwrap();
        assert!(registry.delete(&a.id).await.unwrap_err().is_not_found());
        assert_eq!(registry.list().await.unwrap().stats.total, 1);
    }
}
