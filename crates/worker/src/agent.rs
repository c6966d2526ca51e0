use std::sync::Arc;
use std::time::Duration;

use netpulse_core::{DispatchClient, HeartbeatAck, PollOutcome, ProbeExecutor, SubTask};
use netpulse_errors::{NetpulseError, NetpulseResult};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;

/// 执行循环退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentExit {
    /// 管理员停止，心跳应答 `stopped`
    Stopped,
    /// 凭证失效（Agent被删除）
    Revoked,
    Shutdown,
}

/// 单个Agent的拉取循环：拉取 -> 执行 -> 提交，串行进行
pub struct AgentWorker {
    client: Arc<dyn DispatchClient>,
    probe: Arc<dyn ProbeExecutor>,
    policy: BackoffPolicy,
    heartbeat_every_polls: u32,
}

enum Step {
    Continue(Duration),
    Exit(AgentExit),
}

impl AgentWorker {
    pub fn new(
        client: Arc<dyn DispatchClient>,
        probe: Arc<dyn ProbeExecutor>,
        policy: BackoffPolicy,
        heartbeat_every_polls: u32,
    ) -> Self {
        Self {
            client,
            probe,
            policy,
            heartbeat_every_polls: heartbeat_every_polls.max(1),
        }
    }

    pub fn agent_id(&self) -> &str {
        self.client.agent_id()
    }

    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> AgentExit {
        info!("Agent {} 执行循环启动 (执行器: {})", self.agent_id(), self.probe.name());
        let mut polls: u32 = 0;
        let mut failures: u32 = 0;

        let exit = loop {
            polls = polls.wrapping_add(1);
            let step = if polls % self.heartbeat_every_polls == 0 {
                match self.heartbeat().await {
                    Ok(HeartbeatAck::Stopped) => Step::Exit(AgentExit::Stopped),
                    _ => self.cycle(&mut failures).await,
                }
            } else {
                self.cycle(&mut failures).await
            };

            let pause = match step {
                Step::Exit(exit) => break exit,
                Step::Continue(pause) => pause,
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.recv() => break AgentExit::Shutdown,
            }
        };

        info!("Agent {} 执行循环退出: {:?}", self.agent_id(), exit);
        exit
    }

    async fn heartbeat(&self) -> NetpulseResult<HeartbeatAck> {
        let ack = self.client.heartbeat().await;
        if let Err(e) = &ack {
            warn!("Agent {} 心跳失败: {}", self.agent_id(), e);
        }
        ack
    }

    async fn cycle(&self, failures: &mut u32) -> Step {
        match self.poll_once().await {
            Ok(step) => {
                *failures = 0;
                step
            }
            Err(NetpulseError::Unauthorized(msg)) => {
                warn!("Agent {} 凭证被拒绝: {}", self.agent_id(), msg);
                Step::Exit(AgentExit::Revoked)
            }
            Err(e) if !e.is_retryable() => {
                *failures = 0;
                warn!("Agent {} 本轮处理失败: {}", self.agent_id(), e);
                Step::Continue(self.policy.idle())
            }
            Err(e) => {
                *failures = failures.saturating_add(1);
                let pause = self.policy.error(*failures);
                error!(
                    "Agent {} 第 {} 次连续出错，{:?} 后重试: {}",
                    self.agent_id(),
                    failures,
                    pause,
                    e
                );
                Step::Continue(pause)
            }
        }
    }

    async fn poll_once(&self) -> NetpulseResult<Step> {
        match self.client.poll().await? {
            PollOutcome::Assigned { task } => {
                self.execute(&task).await?;
                Ok(Step::Continue(self.policy.active()))
            }
            PollOutcome::NoTasks => Ok(Step::Continue(self.policy.idle())),
            PollOutcome::Busy => Ok(Step::Continue(self.policy.busy())),
            PollOutcome::Offline => match self.client.heartbeat().await? {
                HeartbeatAck::Stopped => Ok(Step::Exit(AgentExit::Stopped)),
                HeartbeatAck::Online => {
                    info!("Agent {} 重新上线", self.agent_id());
                    Ok(Step::Continue(self.policy.active()))
                }
            },
        }
    }

    async fn execute(&self, sub_task: &SubTask) -> NetpulseResult<()> {
        debug!(
            "Agent {} 执行子任务 {} ({} {})",
            self.agent_id(),
            sub_task.id,
            sub_task.check_type,
            sub_task.target
        );
        let outcome = self.probe.execute(sub_task).await;
        let ack = self.client.submit(&sub_task.id, &outcome).await?;
        info!(
            "Agent {} 完成子任务 {}: {}",
            self.agent_id(),
            ack.task_id,
            ack.status
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use netpulse_core::{CheckOutcome, SubmitAck};

    use super::*;
    use crate::probes::SimulatedProbe;

    struct FailingClient {
        error: Mutex<Option<NetpulseError>>,
    }

    impl FailingClient {
        fn with(error: NetpulseError) -> Arc<Self> {
            Arc::new(Self {
                error: Mutex::new(Some(error)),
            })
        }
    }

    #[async_trait]
    impl DispatchClient for FailingClient {
        fn agent_id(&self) -> &str {
            "agent-ru-00000001"
        }

        async fn poll(&self) -> NetpulseResult<PollOutcome> {
            match self.error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(PollOutcome::NoTasks),
            }
        }

        async fn submit(
            &self,
            task_id: &str,
            _outcome: &CheckOutcome,
        ) -> NetpulseResult<SubmitAck> {
            Err(NetpulseError::task_not_found(task_id))
        }

        async fn heartbeat(&self) -> NetpulseResult<HeartbeatAck> {
            Ok(HeartbeatAck::Online)
        }
    }

    fn worker(client: Arc<FailingClient>) -> AgentWorker {
        let policy = BackoffPolicy::new(
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(30),
            Duration::from_millis(100),
            Duration::from_millis(1_000),
            0.0,
        );
        AgentWorker::new(client, Arc::new(SimulatedProbe::default()), policy, 6)
    }

    fn pause(step: Step) -> Duration {
        match step {
            Step::Continue(pause) => pause,
            Step::Exit(exit) => panic!("循环意外退出: {exit:?}"),
        }
    }

    #[tokio::test]
    async fn test_transient_errors_back_off_exponentially() {
        let agent = worker(FailingClient::with(NetpulseError::registry("连接断开")));
        let mut failures = 2;
        assert_eq!(pause(agent.cycle(&mut failures).await), Duration::from_millis(400));
        assert_eq!(failures, 3);
    }

    #[tokio::test]
    async fn test_terminal_errors_resume_at_idle_pace() {
        let agent = worker(FailingClient::with(NetpulseError::task_not_found("st-1")));
        let mut failures = 2;
        assert_eq!(pause(agent.cycle(&mut failures).await), Duration::from_millis(10));
        assert_eq!(failures, 0);

        let agent = worker(FailingClient::with(NetpulseError::invalid_argument("bad")));
        assert_eq!(pause(agent.cycle(&mut failures).await), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_rejected_credentials_end_the_loop() {
        let agent = worker(FailingClient::with(NetpulseError::unauthorized("revoked")));
        let mut failures = 0;
        assert!(matches!(
            agent.cycle(&mut failures).await,
            Step::Exit(AgentExit::Revoked)
        ));
    }
}
