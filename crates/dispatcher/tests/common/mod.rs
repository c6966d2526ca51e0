#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use netpulse_core::{
    Agent, AgentCredentials, AgentListing, AgentRegistration, AgentStatus, Capability,
    CheckOutcome, CoordinatorRelay, CreateAgentRequest, CreatedAgent, HubRelay, HubStatus,
    LivenessConfig, RelayedResult, SubTask,
};
use netpulse_dispatcher::{
    AgentRegistry, AgentRegistryConfig, AssignmentService, CheckService, DispatchLocks,
    LivenessMonitor,
};
use netpulse_errors::{NetpulseError, NetpulseResult};
use netpulse_infrastructure::{InMemoryRegistry, KvAgentRepository, KvTaskRepository};

/// 记录调用的区域节点转发桩
#[derive(Default)]
pub struct RecordingHubRelay {
    pub assigned: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<String>>,
    pub listing: Mutex<Vec<Agent>>,
    pub unreachable: AtomicBool,
}

impl RecordingHubRelay {
    pub fn set_unreachable(&self, value: bool) {
        self.unreachable.store(value, Ordering::SeqCst);
    }

    fn check(&self) -> NetpulseResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(NetpulseError::upstream("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HubRelay for RecordingHubRelay {
    async fn assign_sub_task(&self, _region: &str, sub_task: &SubTask) -> NetpulseResult<()> {
        self.check()?;
        self.assigned.lock().unwrap().push(sub_task.id.clone());
        Ok(())
    }

    async fn create_agent(
        &self,
        region: &str,
        request: &CreateAgentRequest,
    ) -> NetpulseResult<CreatedAgent> {
        self.check()?;
        let id = format!("agent-{region}-{:08x}", self.listing.lock().unwrap().len() + 1);
        let capabilities = Capability::parse_list(&request.capabilities)?;
        let agent = Agent::new(
            id.clone(),
            request.name.clone(),
            region,
            capabilities,
            Some("hub-held-token".to_string()),
            request.max_tasks.unwrap_or(5),
        );
        self.listing.lock().unwrap().push(agent.clone());
        Ok(CreatedAgent {
            credentials: AgentCredentials {
                agent_id: id,
                token: "hub-held-token".to_string(),
            },
            agent: agent.view(),
        })
    }

    async fn stop_agent(&self, _region: &str, agent_id: &str) -> NetpulseResult<()> {
        self.check()?;
        self.stopped.lock().unwrap().push(agent_id.to_string());
        for agent in self.listing.lock().unwrap().iter_mut() {
            if agent.id == agent_id {
                agent.status = AgentStatus::Stopped;
            }
        }
        Ok(())
    }

    async fn list_agents(&self, _region: &str) -> NetpulseResult<AgentListing> {
        self.check()?;
        Ok(AgentListing::from_agents(self.listing.lock().unwrap().clone()))
    }

    async fn hub_status(&self, region: &str) -> NetpulseResult<HubStatus> {
        self.check()?;
        let listing = AgentListing::from_agents(self.listing.lock().unwrap().clone());
        Ok(HubStatus {
            hub_id: format!("hub-{region}-1"),
            region: region.to_string(),
            agents: listing.stats,
            pending_tasks: 0,
        })
    }
}

/// 记录上报结果的协调器转发桩
#[derive(Default)]
pub struct RecordingCoordinatorRelay {
    pub relayed: Mutex<Vec<(String, RelayedResult)>>,
}

#[async_trait]
impl CoordinatorRelay for RecordingCoordinatorRelay {
    async fn relay_result(&self, sub_task_id: &str, result: &RelayedResult) -> NetpulseResult<()> {
        self.relayed
            .lock()
            .unwrap()
            .push((sub_task_id.to_string(), result.clone()));
        Ok(())
    }
}

/// 单区域（ru）共享注册表上的完整调度环境
pub struct Harness {
    pub tasks: Arc<KvTaskRepository>,
    pub agents: Arc<KvAgentRepository>,
    pub locks: Arc<DispatchLocks>,
    pub registry: Arc<AgentRegistry>,
    pub assignment: Arc<AssignmentService>,
    pub checks: CheckService,
    pub hub_relay: Arc<RecordingHubRelay>,
    pub upstream: Arc<RecordingCoordinatorRelay>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryRegistry::new());
        let tasks = Arc::new(KvTaskRepository::new(store.clone(), None));
        let agents = Arc::new(KvAgentRepository::new(store));
        let locks = Arc::new(DispatchLocks::new());
        let registry = Arc::new(AgentRegistry::new(
            agents.clone(),
            locks.clone(),
            AgentRegistryConfig {
                region: "ru".to_string(),
                default_capabilities: Capability::parse_list(&["http", "ping"])
                    .expect("默认能力"),
                default_max_tasks: 5,
                token_secret: "hub-secret".to_string(),
            },
        ));
        let upstream = Arc::new(RecordingCoordinatorRelay::default());
        let assignment = Arc::new(AssignmentService::new(
            tasks.clone(),
            registry.clone(),
            locks.clone(),
            Some(upstream.clone()),
        ));
        let hub_relay = Arc::new(RecordingHubRelay::default());
        let checks = CheckService::new(
            tasks.clone(),
            hub_relay.clone(),
            vec!["ru".to_string(), "eu".to_string()],
        );
        Self {
            tasks,
            agents,
            locks,
            registry,
            assignment,
            checks,
            hub_relay,
            upstream,
        }
    }

    pub async fn register(&self, name: &str, caps: &[&str], max_tasks: u32) -> AgentCredentials {
        let (_, credentials) = self
            .registry
            .register(AgentRegistration {
                name: name.to_string(),
                region: "ru".to_string(),
                capabilities: caps.iter().map(|c| c.to_string()).collect(),
                max_tasks: Some(max_tasks),
            })
            .await
            .expect("注册Agent");
        credentials
    }

    pub fn liveness(&self, config: LivenessConfig) -> LivenessMonitor {
        LivenessMonitor::new(
            self.agents.clone(),
            self.assignment.clone(),
            self.locks.clone(),
            config,
        )
    }

    pub async fn poll(&self, creds: &AgentCredentials) -> netpulse_core::PollOutcome {
        self.assignment
            .poll_task(&creds.agent_id, &creds.token)
            .await
            .expect("拉取任务")
    }

    pub async fn submit_ok(&self, creds: &AgentCredentials, task_id: &str) -> netpulse_core::SubmitAck {
        self.assignment
            .submit_result(
                task_id,
                &creds.agent_id,
                &creds.token,
                CheckOutcome::success(serde_json::json!({"status_code": 200})),
            )
            .await
            .expect("提交结果")
    }
}
