//! REST control surface tests over a real listener.

use std::sync::Arc;

use serde_json::{Value as JsonValue, json};

use ignition_kernel::supervisor::Supervisor;
use ignition_kernel::web::{ApiState, router};

async fn serve(auth: Option<ignition_kernel::web::AuthValidator>) -> (String, Arc<Supervisor>) {
    let supervisor = Arc::new(Supervisor::new());
    let state = Arc::new(ApiState {
        supervisor: supervisor.clone(),
        auth,
    });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), supervisor)
}

fn launch_body(kernel_id: &str, min: u16, max: u16) -> JsonValue {
    json!({
        "kernel_id": kernel_id,
        "key": format!("KEY-{kernel_id}"),
        "signature_scheme": "hmac-sha256",
        "transport": "tcp",
        "ip": "127.0.0.1",
        "min_port": min,
        "max_port": max,
    })
}

#[tokio::test]
async fn launch_returns_connection_info_with_bound_ports() {
    let (base, supervisor) = serve(None).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/kernel"))
        .json(&launch_body("k1", 37100, 37180))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let info: JsonValue = response.json().await.unwrap();

    assert_eq!(info["ignition_kernel_id"], "k1");
    assert_eq!(info["key"], "KEY-k1");
    assert_eq!(info["signature_scheme"], "hmac-sha256");
    assert_eq!(info["transport"], "tcp");
    assert_eq!(info["ip"], "127.0.0.1");
    for port in ["shell_port", "iopub_port", "stdin_port", "control_port", "hb_port"] {
        let value = info[port].as_u64().unwrap();
        assert!(value >= 37100, "{port} = {value}");
    }

    supervisor.scram_all().await;
}

#[tokio::test]
async fn aliased_id_field_is_accepted_on_input() {
    let (base, supervisor) = serve(None).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/kernel"))
        .json(&json!({
            "ignition_kernel_id": "alias1",
            "min_port": 37200, "max_port": 37280,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let info: JsonValue = response.json().await.unwrap();
    assert_eq!(info["ignition_kernel_id"], "alias1");
    assert!(info.get("kernel_id").is_none());

    supervisor.scram_all().await;
}

#[tokio::test]
async fn list_head_get_lifecycle() {
    let (base, supervisor) = serve(None).await;
    let client = reqwest::Client::new();

    let ids: Vec<String> = client
        .get(format!("{base}/kernel"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(ids.is_empty());

    client
        .post(format!("{base}/kernel"))
        .json(&launch_body("k2", 37300, 37380))
        .send()
        .await
        .unwrap();

    let ids: Vec<String> = client
        .get(format!("{base}/kernel"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids, vec!["k2".to_string()]);

    // HEAD verifies liveness without a body
    let head = client.head(format!("{base}/kernel/k2")).send().await.unwrap();
    assert_eq!(head.status(), 200);
    let head = client.head(format!("{base}/kernel/ghost")).send().await.unwrap();
    assert_eq!(head.status(), 404);

    let info: JsonValue = client
        .get(format!("{base}/kernel/k2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["ignition_kernel_id"], "k2");

    supervisor.scram_all().await;
}

#[tokio::test]
async fn posting_an_existing_id_is_a_no_op() {
    let (base, supervisor) = serve(None).await;
    let client = reqwest::Client::new();

    let first: JsonValue = client
        .post(format!("{base}/kernel"))
        .json(&launch_body("k3", 37400, 37480))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let second: JsonValue = client
        .post(format!("{base}/kernel"))
        .json(&launch_body("k3", 37400, 37480))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(supervisor.kernel_ids().len(), 1);

    supervisor.scram_all().await;
}

#[tokio::test]
async fn delete_scrams_and_later_reads_see_404() {
    let (base, supervisor) = serve(None).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/kernel"))
        .json(&launch_body("k4", 37500, 37580))
        .send()
        .await
        .unwrap();

    let response = client
        .delete(format!("{base}/kernel/k4"))
        .send()
        .await
        .unwrap();
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body, json!({"scrammed": ["k4"]}));

    let response = client.get(format!("{base}/kernel/k4")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    // deleting again reports nothing scrammed
    let body: JsonValue = client
        .delete(format!("{base}/kernel/k4"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"scrammed": []}));

    supervisor.scram_all().await;
}

#[tokio::test]
async fn delete_with_sigterm_restarts_instead_of_scramming() {
    let (base, supervisor) = serve(None).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/kernel"))
        .json(&launch_body("k5", 37600, 37680))
        .send()
        .await
        .unwrap();

    let body: JsonValue = client
        .delete(format!("{base}/kernel/k5"))
        .json(&json!({"signal": 15}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"scrammed": []}));

    // the kernel is still there
    let response = client.get(format!("{base}/kernel/k5")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    supervisor.scram_all().await;
}

#[tokio::test]
async fn delete_all_scrams_everything() {
    let (base, supervisor) = serve(None).await;
    let client = reqwest::Client::new();

    for (id, min, max) in [("k6", 37700u16, 37780u16), ("k7", 37800, 37880)] {
        client
            .post(format!("{base}/kernel"))
            .json(&launch_body(id, min, max))
            .send()
            .await
            .unwrap();
    }

    let body: JsonValue = client
        .delete(format!("{base}/kernel"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"scrammed": ["k6", "k7"]}));
    assert!(supervisor.kernel_ids().is_empty());
}

#[tokio::test]
async fn malformed_json_yields_400_with_a_trace_body() {
    let (base, _supervisor) = serve(None).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/kernel"))
        .header("content-type", "application/json")
        .body("{not valid json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("Traceback"));
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let (base, _supervisor) = serve(None).await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{base}/definitely/not/a/route"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn auth_validator_gates_every_route() {
    let validator: ignition_kernel::web::AuthValidator =
        Arc::new(|header: &str| header == "Bearer sesame");
    let (base, _supervisor) = serve(Some(validator)).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/kernel")).send().await.unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{base}/kernel"))
        .header("authorization", "Bearer wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{base}/kernel"))
        .header("authorization", "Bearer sesame")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}
