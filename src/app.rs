use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use netpulse_api::{
    create_coordinator_app, create_hub_app, AdminCredentials, CoordinatorState, HubState,
    TierVerifier,
};
use netpulse_core::{
    AgentLauncher, AgentRepository, AgentStatus, AppConfig, CoordinatorRelay, HubRelay,
    KvRegistry, ProbeExecutor, ProbeKind, TierTokenService, ISSUER_COORDINATOR, ISSUER_HUB,
};
use netpulse_dispatcher::{
    AgentAdminService, AgentRegistry, AgentRegistryConfig, AssignmentService, CheckService,
    DispatchLocks, HttpCoordinatorRelay, HttpHubRelay, LivenessMonitor,
};
use netpulse_infrastructure::{create_registry, KvAgentRepository, KvTaskRepository};
use netpulse_worker::{BackoffPolicy, HttpProbe, InProcessAgentLauncher, SimulatedProbe};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

use crate::shutdown::ShutdownManager;

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AppMode {
    /// 仅运行协调器
    Coordinator,
    /// 仅运行区域节点
    Hub,
    /// 协调器与区域节点同进程，共享注册表
    All,
}

/// 区域节点运行所需的组件
pub struct HubRuntime {
    pub state: HubState,
    pub launcher: Arc<InProcessAgentLauncher>,
    pub liveness: Arc<LivenessMonitor>,
    agents: Arc<dyn AgentRepository>,
}

impl HubRuntime {
    /// 为注册表中本区域未停止的Agent重新启动执行循环
    pub async fn resume_agents(&self) -> Result<usize> {
        let region = self.state.registry.region();
        let mut resumed = 0;
        for agent in self.agents.list().await.context("读取Agent列表失败")? {
            if agent.region != region || agent.status == AgentStatus::Stopped {
                continue;
            }
            let Some(token) = agent.token.clone() else {
                continue;
            };
            match self.launcher.launch(&agent, &token).await {
                Ok(()) => resumed += 1,
                Err(e) => warn!("恢复Agent {} 的执行循环失败: {}", agent.id, e),
            }
        }
        Ok(resumed)
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    registry: Arc<dyn KvRegistry>,
    locks: Arc<DispatchLocks>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);
        let registry = create_registry(&config.registry)
            .await
            .context("创建注册表失败")?;
        Ok(Self::with_registry(config, mode, registry))
    }

    pub fn with_registry(config: AppConfig, mode: AppMode, registry: Arc<dyn KvRegistry>) -> Self {
        Self {
            config,
            mode,
            registry,
            locks: Arc::new(DispatchLocks::new()),
        }
    }

    fn task_repository(&self) -> Arc<KvTaskRepository> {
        Arc::new(KvTaskRepository::new(
            self.registry.clone(),
            self.config.registry.task_ttl(),
        ))
    }

    fn agent_repository(&self) -> Arc<KvAgentRepository> {
        Arc::new(KvAgentRepository::new(self.registry.clone()))
    }

    /// 组装协调器
    pub fn coordinator_state(&self) -> Result<CoordinatorState> {
        let config = &self.config.coordinator;
        let relay: Arc<dyn HubRelay> =
            Arc::new(HttpHubRelay::new(config).context("创建区域节点客户端失败")?);
        let regions = config.region_names();

        let tier = TierVerifier::new(
            config
                .regions
                .iter()
                .map(|(name, region)| {
                    TierTokenService::new(name.clone(), &region.secret, config.token_ttl_seconds)
                })
                .collect(),
            ISSUER_HUB,
        );

        Ok(CoordinatorState {
            checks: Arc::new(CheckService::new(
                self.task_repository(),
                relay.clone(),
                regions.clone(),
            )),
            admin: Arc::new(AgentAdminService::new(
                self.agent_repository(),
                relay,
                regions,
            )),
            admin_credentials: Arc::new(AdminCredentials::new(
                config.admin_username.clone(),
                config.admin_password.clone(),
            )),
            tier,
        })
    }

    /// 组装区域节点
    pub fn hub_runtime(&self, shutdown: broadcast::Sender<()>) -> Result<HubRuntime> {
        let hub = &self.config.hub;
        let agents = self.agent_repository();
        let registry = Arc::new(AgentRegistry::new(
            agents.clone(),
            self.locks.clone(),
            AgentRegistryConfig {
                region: hub.region.clone(),
                default_capabilities: hub
                    .default_capability_set()
                    .context("解析默认能力失败")?,
                default_max_tasks: hub.default_max_tasks,
                token_secret: hub.agent_token_secret.clone(),
            },
        ));

        let upstream: Option<Arc<dyn CoordinatorRelay>> = match &hub.coordinator_url {
            Some(url) => Some(Arc::new(
                HttpCoordinatorRelay::new(
                    url.clone(),
                    hub,
                    self.config.coordinator.request_timeout(),
                    self.config.coordinator.token_ttl_seconds,
                )
                .context("创建协调器客户端失败")?,
            )),
            None => {
                warn!("未配置 hub.coordinator_url，子任务结果不会上报协调器");
                None
            }
        };

        let assignment = Arc::new(AssignmentService::new(
            self.task_repository(),
            registry.clone(),
            self.locks.clone(),
            upstream,
        ));

        let probe: Arc<dyn ProbeExecutor> = match self.config.agent.probe {
            ProbeKind::Simulated => Arc::new(SimulatedProbe::new()),
            ProbeKind::Http => Arc::new(
                HttpProbe::new(self.config.agent.probe_timeout())
                    .context("创建HTTP探测执行器失败")?,
            ),
        };
        let launcher = Arc::new(InProcessAgentLauncher::new(
            assignment.clone(),
            registry.clone(),
            probe,
            BackoffPolicy::from(&self.config.agent),
            self.config.agent.heartbeat_every_polls,
            shutdown,
        ));

        let liveness = Arc::new(LivenessMonitor::new(
            agents.clone(),
            assignment.clone(),
            self.locks.clone(),
            self.config.liveness.clone(),
        ));

        let tier = TierVerifier::new(
            vec![TierTokenService::new(
                hub.region.clone(),
                &hub.secret,
                self.config.coordinator.token_ttl_seconds,
            )],
            ISSUER_COORDINATOR,
        );

        Ok(HubRuntime {
            state: HubState {
                hub_id: hub.hub_id.clone(),
                assignment,
                registry,
                launcher: Some(launcher.clone() as Arc<dyn AgentLauncher>),
                tier,
            },
            launcher,
            liveness,
            agents,
        })
    }

    pub async fn run(&self, shutdown: ShutdownManager) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);
        match self.mode {
            AppMode::Coordinator => self.run_coordinator(&shutdown).await,
            AppMode::Hub => self.run_hub(&shutdown).await,
            AppMode::All => {
                tokio::try_join!(self.run_coordinator(&shutdown), self.run_hub(&shutdown))?;
                Ok(())
            }
        }
    }

    async fn run_coordinator(&self, shutdown: &ShutdownManager) -> Result<()> {
        let app = create_coordinator_app(self.coordinator_state()?);
        let served = serve(
            "协调器",
            &self.config.coordinator.bind_address,
            app,
            shutdown.subscribe(),
        )
        .await;
        if served.is_err() {
            shutdown.shutdown();
        }
        served
    }

    async fn run_hub(&self, shutdown: &ShutdownManager) -> Result<()> {
        let runtime = self.hub_runtime(shutdown.sender())?;
        let resumed = runtime.resume_agents().await?;
        if resumed > 0 {
            info!("恢复 {} 个Agent的执行循环", resumed);
        }

        let liveness_handle = {
            let liveness = runtime.liveness.clone();
            let rx = shutdown.subscribe();
            tokio::spawn(async move { liveness.run(rx).await })
        };

        let launcher = runtime.launcher.clone();
        let app = create_hub_app(runtime.state);
        let served = serve(
            "区域节点",
            &self.config.hub.bind_address,
            app,
            shutdown.subscribe(),
        )
        .await;
        if served.is_err() {
            shutdown.shutdown();
        }

        launcher.join_all().await;
        if let Err(e) = liveness_handle.await {
            warn!("存活检测任务异常结束: {}", e);
        }
        info!("区域节点 {} 已停止", self.config.hub.hub_id);
        served
    }
}

async fn serve(
    name: &str,
    bind_address: &str,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("{name} 绑定地址失败: {bind_address}"))?;
    info!("{} 启动在 http://{}", name, bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .with_context(|| format!("{name} 运行失败"))?;

    info!("{} 已停止", name);
    Ok(())
}
