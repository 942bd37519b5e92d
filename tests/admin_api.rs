//! Admin API integration tests.

use std::time::Duration;

use serde_json::json;

mod common;

fn bearer() -> String {
    format!("Bearer {}", common::ADMIN_KEY)
}

#[tokio::test]
async fn test_admin_requires_token() {
    let (addr, _gateway, shutdown) = common::start_gateway(common::test_config()).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/admin/policies", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(format!("http://{}/admin/policies", addr))
        .header("Authorization", "Bearer wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    shutdown.trigger();
}

#[tokio::test]
async fn test_list_and_disable_policy() {
    let (addr, _gateway, shutdown) = common::start_gateway(common::test_config()).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/admin/policies", addr))
        .header("Authorization", bearer())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let policies: serde_json::Value = res.json().await.unwrap();
    assert!(policies.as_array().unwrap().len() >= 3);

    let res = client
        .put(format!("http://{}/admin/policies/rate-abuse", addr))
        .header("Authorization", bearer())
        .json(&json!({ "enabled": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let updated: serde_json::Value = res.json().await.unwrap();
    assert_eq!(updated["enabled"], false);

    let res = client
        .put(format!("http://{}/admin/policies/no-such-policy", addr))
        .header("Authorization", bearer())
        .json(&json!({ "enabled": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
}

#[tokio::test]
async fn test_pattern_update_rejects_bad_signature() {
    let (addr, _gateway, shutdown) = common::start_gateway(common::test_config()).await;
    let client = common::client();

    let res = client
        .put(format!("http://{}/admin/threat-patterns/sql-injection", addr))
        .header("Authorization", bearer())
        .json(&json!({ "signature": "([unclosed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);

    // Registry unchanged: the detector still fires.
    let res = client
        .get(format!("http://{}/", addr))
        .header("user-agent", "' OR 1=1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    shutdown.trigger();
}

#[tokio::test]
async fn test_block_ip_endpoint() {
    let (addr, _gateway, shutdown) = common::start_gateway(common::test_config()).await;
    let client = common::client();

    let res = client
        .post(format!("http://{}/admin/block-ip", addr))
        .header("Authorization", bearer())
        .json(&json!({
            "address": "198.51.100.4",
            "reason": "manual block",
            "duration_ms": 60000u64,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(format!("http://{}/", addr))
        .header("x-forwarded-for", "198.51.100.4")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    shutdown.trigger();
}

#[tokio::test]
async fn test_audit_query_and_export() {
    let (addr, _gateway, shutdown) = common::start_gateway(common::test_config()).await;
    let client = common::client();

    // Produce a denial to audit.
    client
        .get(format!("http://{}/", addr))
        .header("x-principal-id", "mallory")
        .header("user-agent", "wget ../../secret")
        .send()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client
        .get(format!(
            "http://{}/admin/audit-logs?principal=mallory&limit=10",
            addr
        ))
        .header("Authorization", bearer())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let page: serde_json::Value = res.json().await.unwrap();
    assert!(page["total"].as_u64().unwrap() >= 1);

    let res = client
        .post(format!("http://{}/admin/audit-logs/export?format=csv", addr))
        .header("Authorization", bearer())
        .json(&json!({ "principal": "mallory" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("content-type").unwrap().to_str().unwrap(),
        "text/csv"
    );
    assert!(res
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("audit-logs.csv"));
    let body = res.text().await.unwrap();
    assert!(body.starts_with("id,principal,"));
    assert!(body.contains("mallory"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_metrics_and_health() {
    let (addr, gateway, shutdown) = common::start_gateway(common::test_config()).await;
    let client = common::client();

    gateway.block_origin("192.0.2.50", "test fixture", None);

    let res = client
        .get(format!("http://{}/admin/metrics", addr))
        .header("Authorization", bearer())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let snapshot: serde_json::Value = res.json().await.unwrap();
    assert_eq!(snapshot["blocked_origins"], 1);
    assert!(snapshot["policies"].as_u64().unwrap() > 0);
    assert!(snapshot["threat_patterns"].as_u64().unwrap() > 0);

    let res = client
        .get(format!("http://{}/admin/health", addr))
        .header("Authorization", bearer())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let health: serde_json::Value = res.json().await.unwrap();
    assert_eq!(health["status"], "healthy");

    shutdown.trigger();
}
