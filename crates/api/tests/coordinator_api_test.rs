mod common;

use axum::http::StatusCode;
use common::{tier_token, Call, Cluster, EU_SECRET, RU_SECRET};
use netpulse_core::ISSUER_HUB;
use serde_json::json;

#[tokio::test]
async fn test_health_and_root() {
    let cluster = Cluster::new();

    let (status, body) = Call::get("/health").send(&cluster.coordinator).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = Call::get("/").send(&cluster.coordinator).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["regions"], json!(["ru", "eu"]));
}

#[tokio::test]
async fn test_check_end_to_end_in_ru() {
    let cluster = Cluster::new();

    let (status, body) = Call::post("/admin/agents")
        .admin()
        .json(json!({"region": "ru", "name": "probe-1", "capabilities": ["http", "https"], "max_tasks": 2}))
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"].is_string());
    let agent_id = body["data"]["credentials"]["agent_id"].as_str().unwrap().to_string();
    let token = body["data"]["credentials"]["token"].as_str().unwrap().to_string();
    assert!(agent_id.starts_with("agent-ru-"));
    assert!(body["data"]["agent"].get("token").is_none());

    let (status, body) = Call::post("/api/checks")
        .json(json!({"target": "example.com", "region": "ru", "checks": ["http", "https", "ping"]}))
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::OK);
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["region"], "ru");
    assert_eq!(body["data"]["sub_tasks"].as_array().unwrap().len(), 3);

    // 区域节点上拉取、执行、提交
    let mut done = Vec::new();
    for _ in 0..2 {
        let (status, body) = Call::post("/agent/poll")
            .agent(&agent_id, &token)
            .send(&cluster.hub)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "assigned");
        let sub_id = body["data"]["task"]["id"].as_str().unwrap().to_string();

        let (status, body) = Call::post(&format!("/agent/tasks/{sub_id}/result"))
            .agent(&agent_id, &token)
            .json(json!({"success": true, "result": {"status_code": 200}}))
            .send(&cluster.hub)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["data"]["first_submission"], true);
        done.push(sub_id);
    }
    assert_eq!(done, vec![format!("{task_id}-http"), format!("{task_id}-https")]);

    // ping 不在能力范围内
    let (_, body) = Call::post("/agent/poll")
        .agent(&agent_id, &token)
        .send(&cluster.hub)
        .await;
    assert_eq!(body["data"]["status"], "no_tasks");

    // 区域节点把上报交给协调器
    let relayed = cluster.upstream.relayed.lock().unwrap().clone();
    assert_eq!(relayed.len(), 2);
    let hub_token = tier_token("ru", RU_SECRET, ISSUER_HUB);
    for (sub_id, result) in relayed {
        let (status, body) = Call::post(&format!("/internal/results/{sub_id}"))
            .bearer(&hub_token)
            .json(serde_json::to_value(result).unwrap())
            .send(&cluster.coordinator)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["first_submission"], true);
    }

    let (status, body) = Call::get(&format!("/api/checks/{task_id}"))
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["status_summary"]["completed"], 2);
    assert_eq!(body["data"]["status_summary"]["pending"], 1);
    assert_eq!(body["data"]["completed"], false);

    let (_, body) = Call::get("/admin/queues").admin().send(&cluster.coordinator).await;
    assert_eq!(body["data"]["queues"]["ru"], 1);
    assert_eq!(body["data"]["queues"]["eu"], 0);
}

#[tokio::test]
async fn test_check_errors_use_error_envelope() {
    let cluster = Cluster::new();

    let (status, body) = Call::get("/api/checks/does-not-exist")
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "TASK_NOT_FOUND");
    assert_eq!(body["error"]["code"], 404);

    let (status, body) = Call::post("/api/checks")
        .json(json!({"target": "example.com", "region": "mars"}))
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "UNKNOWN_REGION");

    let (status, body) = Call::post("/api/checks")
        .json(json!({"target": "example.com", "checks": ["smtp"]}))
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "INVALID_ARGUMENT");

    let (status, body) = Call::post("/api/checks")
        .raw_json("{\"target\": ")
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unreachable_region_still_creates_check() {
    let cluster = Cluster::new();

    let (status, body) = Call::post("/api/checks")
        .json(json!({"target": "example.org", "region": "eu", "checks": ["ping"]}))
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::OK);
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    let (_, body) = Call::get(&format!("/api/checks/{task_id}"))
        .send(&cluster.coordinator)
        .await;
    assert_eq!(body["data"]["status_summary"]["pending"], 1);
}

#[tokio::test]
async fn test_admin_routes_require_basic_auth() {
    let cluster = Cluster::new();

    for call in [
        Call::get("/admin/agents"),
        Call::get("/admin/queues"),
        Call::get("/admin/hubs"),
        Call::delete("/admin/agents/agent-ru-00000001"),
    ] {
        let (status, body) = call.send(&cluster.coordinator).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "UNAUTHORIZED");
    }

    let (status, _) = Call::get("/admin/agents")
        .bearer("not-basic")
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_agent_lifecycle() {
    let cluster = Cluster::new();

    let (status, body) = Call::post("/admin/agents")
        .admin()
        .json(json!({"region": "atlantis", "name": "probe"}))
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "UNKNOWN_REGION");

    let (_, body) = Call::post("/admin/agents")
        .admin()
        .json(json!({"region": "ru", "name": "probe"}))
        .send(&cluster.coordinator)
        .await;
    let agent_id = body["data"]["credentials"]["agent_id"].as_str().unwrap().to_string();

    let (status, body) = Call::get("/admin/agents").admin().send(&cluster.coordinator).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["total"], 1);
    assert_eq!(body["data"]["agents"][0]["id"], agent_id.as_str());

    let (status, body) = Call::delete(&format!("/admin/agents/{agent_id}"))
        .admin()
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    // 区域节点侧已停止
    let agent = cluster.hub_registry.get(&agent_id).await.unwrap();
    assert_eq!(agent.status, netpulse_core::AgentStatus::Stopped);

    // 刷新列表不会把已删除的Agent带回来
    let (status, body) = Call::get("/admin/agents").admin().send(&cluster.coordinator).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["total"], 0);

    let (status, body) = Call::delete(&format!("/admin/agents/{agent_id}"))
        .admin()
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "AGENT_NOT_FOUND");
}

#[tokio::test]
async fn test_hub_statuses() {
    let cluster = Cluster::new();

    let (status, body) = Call::get("/admin/hubs").admin().send(&cluster.coordinator).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ru"]["state"], "reachable");
    assert_eq!(body["data"]["ru"]["status"]["hub_id"], "hub-ru-1");
    assert_eq!(body["data"]["eu"]["state"], "unreachable");
}

#[tokio::test]
async fn test_relayed_result_requires_owning_region_token() {
    let cluster = Cluster::new();

    let (_, body) = Call::post("/api/checks")
        .json(json!({"target": "example.com", "region": "ru", "checks": ["http"]}))
        .send(&cluster.coordinator)
        .await;
    let sub_id = format!("{}-http", body["data"]["task_id"].as_str().unwrap());
    let payload = json!({"agent_id": "agent-ru-00000001", "success": true, "result": {}});

    let (status, _) = Call::post(&format!("/internal/results/{sub_id}"))
        .json(payload.clone())
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // eu 的密钥签名有效，但子任务属于 ru
    let eu_token = tier_token("eu", EU_SECRET, ISSUER_HUB);
    let (status, _) = Call::post(&format!("/internal/results/{sub_id}"))
        .bearer(&eu_token)
        .json(payload.clone())
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = tier_token("ru", "guessed", ISSUER_HUB);
    let (status, _) = Call::post(&format!("/internal/results/{sub_id}"))
        .bearer(&forged)
        .json(payload.clone())
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let ru_token = tier_token("ru", RU_SECRET, ISSUER_HUB);
    let (status, body) = Call::post(&format!("/internal/results/{sub_id}"))
        .bearer(&ru_token)
        .json(payload.clone())
        .send(&cluster.coordinator)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["first_submission"], true);

    let (_, body) = Call::post(&format!("/internal/results/{sub_id}"))
        .bearer(&ru_token)
        .json(payload)
        .send(&cluster.coordinator)
        .await;
    assert_eq!(body["data"]["first_submission"], false);
}
