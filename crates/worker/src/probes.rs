use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use netpulse_core::{CheckOutcome, CheckType, ProbeExecutor, SubTask};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 模拟探测执行器，按检测类型返回固定的结果记录
pub struct SimulatedProbe {
    hostname: String,
}

impl SimulatedProbe {
    pub fn new() -> Self {
        Self {
            hostname: local_hostname(),
        }
    }

    fn record(&self, sub_task: &SubTask) -> Value {
        let checked_at = Utc::now().to_rfc3339();
        let mut record = match sub_task.check_type {
            CheckType::Http | CheckType::Https => json!({
                "status": "success",
                "status_code": 200,
                "response_time": 150,
            }),
            CheckType::Ping => json!({
                "status": "success",
                "reachable": true,
                "response_time": 50,
            }),
            CheckType::Tcp => json!({
                "status": "success",
                "port_open": true,
                "port": sub_task.port,
                "response_time": 100,
            }),
            other => json!({
                "status": "success",
                "record_type": other.dns_record_type(),
                "response_time": 80,
            }),
        };
        if let Some(fields) = record.as_object_mut() {
            fields.insert("target".into(), json!(sub_task.target));
            fields.insert("checked_at".into(), json!(checked_at));
            fields.insert("agent_host".into(), json!(self.hostname));
        }
        record
    }
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeExecutor for SimulatedProbe {
    async fn execute(&self, sub_task: &SubTask) -> CheckOutcome {
        debug!("模拟执行 {} 检测: {}", sub_task.check_type, sub_task.target);
        CheckOutcome::success(self.record(sub_task))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// HTTP探测执行器
///
/// http/https 发起真实的 GET 请求，其他类型交给 [`SimulatedProbe`]。
pub struct HttpProbe {
    client: reqwest::Client,
    fallback: SimulatedProbe,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("netpulse-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            fallback: SimulatedProbe::new(),
        })
    }

    fn url_for(sub_task: &SubTask) -> String {
        let target = sub_task.target.trim();
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        let scheme = if sub_task.check_type == CheckType::Https {
            "https"
        } else {
            "http"
        };
        match sub_task.port {
            Some(port) => format!("{scheme}://{target}:{port}"),
            None => format!("{scheme}://{target}"),
        }
    }

    async fn get(&self, sub_task: &SubTask) -> CheckOutcome {
        let url = Self::url_for(sub_task);
        let started = Instant::now();

        match self.client.get(&url).send().await {
            Ok(response) => {
                let elapsed = started.elapsed().as_millis() as u64;
                let status = response.status();
                info!("GET {} -> {} ({}ms)", url, status.as_u16(), elapsed);
                CheckOutcome::success(json!({
                    "status": if status.is_success() { "success" } else { "error" },
                    "url": url,
                    "status_code": status.as_u16(),
                    "response_time": elapsed,
                    "checked_at": Utc::now().to_rfc3339(),
                }))
            }
            Err(e) => {
                warn!("GET {} 失败: {}", url, e);
                CheckOutcome::failure(format!("请求 {url} 失败: {e}"))
            }
        }
    }
}

#[async_trait]
impl ProbeExecutor for HttpProbe {
    async fn execute(&self, sub_task: &SubTask) -> CheckOutcome {
        match sub_task.check_type {
            CheckType::Http | CheckType::Https => self.get(sub_task).await,
            _ => self.fallback.execute(sub_task).await,
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
