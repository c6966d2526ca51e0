use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use netpulse_core::{Agent, AgentLauncher, ProbeExecutor};
use netpulse_dispatcher::{AgentRegistry, AssignmentService};
use netpulse_errors::NetpulseResult;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::agent::{AgentExit, AgentWorker};
use crate::backoff::BackoffPolicy;
use crate::client::LocalDispatchClient;

/// 在区域节点进程内为每个新建Agent启动一个执行循环
pub struct InProcessAgentLauncher {
    assignment: Arc<AssignmentService>,
    registry: Arc<AgentRegistry>,
    probe: Arc<dyn ProbeExecutor>,
    policy: BackoffPolicy,
    heartbeat_every_polls: u32,
    shutdown: broadcast::Sender<()>,
    handles: Mutex<HashMap<String, JoinHandle<AgentExit>>>,
}

impl InProcessAgentLauncher {
    pub fn new(
        assignment: Arc<AssignmentService>,
        registry: Arc<AgentRegistry>,
        probe: Arc<dyn ProbeExecutor>,
        policy: BackoffPolicy,
        heartbeat_every_polls: u32,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            assignment,
            registry,
            probe,
            policy,
            heartbeat_every_polls,
            shutdown,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// 等待全部执行循环退出（需先发送停止信号）
    pub async fn join_all(&self) {
        let handles: Vec<_> = self.handles.lock().await.drain().collect();
        for (agent_id, handle) in handles {
            match handle.await {
                Ok(exit) => debug!("Agent {} 循环已结束: {:?}", agent_id, exit),
                Err(e) => debug!("Agent {} 循环异常结束: {}", agent_id, e),
            }
        }
    }
}

#[async_trait]
impl AgentLauncher for InProcessAgentLauncher {
    async fn launch(&self, agent: &Agent, token: &str) -> NetpulseResult<()> {
        let client = Arc::new(LocalDispatchClient::new(
            agent.id.clone(),
            token,
            self.assignment.clone(),
            self.registry.clone(),
        ));
        let worker = AgentWorker::new(
            client,
            self.probe.clone(),
            self.policy.clone(),
            self.heartbeat_every_polls,
        );
        let shutdown = self.shutdown.subscribe();
        let handle = tokio::spawn(async move { worker.run(shutdown).await });

        let mut handles = self.handles.lock().await;
        handles.retain(|_, h| !h.is_finished());
        handles.insert(agent.id.clone(), handle);
        info!("为Agent {} 启动进程内执行循环", agent.id);
        Ok(())
    }

    async fn running(&self) -> usize {
        self.handles
            .lock()
            .await
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }
}
