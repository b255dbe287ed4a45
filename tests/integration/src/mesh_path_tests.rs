//! Full path: leaves → leader → router → backend.

use crate::test_utils::{test_config, Backend, Mesh};
use serde_json::{json, Value};

async fn post(client: &reqwest::Client, url: &str, body: Value) -> (u16, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

async fn get(client: &reqwest::Client, url: &str) -> (u16, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_leader_gathers_all_three_leaves() {
    let mesh = Mesh::start(test_config()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        &Mesh::url(mesh.leader, "collect"),
        json!({"key": "zolis-key"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["gps"]["lat"], json!(48.8566));
    assert_eq!(body["battery"]["batterie"], json!(100.0));
    assert!(body["temperature"]["temperature"].is_number());
    assert!(body["gps"].get("key").is_none());
    assert!(["gps", "temperature", "batterie"].contains(&body["leader_id"].as_str().unwrap()));
}

#[tokio::test]
async fn test_router_returns_canonical_reading() {
    let mesh = Mesh::start(test_config()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        &Mesh::url(mesh.router, "collect"),
        json!({"key": "zolis-key"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["latitude"], json!(48.8566));
    assert_eq!(body["longitude"], json!(2.3522));
    assert_eq!(body["battery_pct"], json!(100.0));
    assert!(body["humidity"].is_number());
    assert!(body["pressure"].is_number());
    assert!(body["timestamp"].is_number());
}

#[tokio::test]
async fn test_wrong_key_is_rejected_at_each_hop() {
    let mesh = Mesh::start(test_config()).await;
    let client = reqwest::Client::new();

    for addr in [mesh.leader, mesh.router] {
        let (status, body) =
            post(&client, &Mesh::url(addr, "collect"), json!({"key": "wrong"})).await;
        assert_eq!(status, 401);
        assert_eq!(body["category"], json!("authentication"));
        assert!(!body.to_string().contains("zolis-key"));
    }

    let response = client
        .post(Mesh::url(mesh.router, "collect"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_backend_session_accumulates_distance() {
    let mesh = Mesh::start(test_config()).await;
    let backend = Backend::start(&mesh.config).await;
    let client = reqwest::Client::new();

    let (status, session) = post(
        &client,
        &backend.url("api/sessions"),
        json!({"owner_id": "runner-1"}),
    )
    .await;
    assert_eq!(status, 201);
    let sid = session["id"].as_str().unwrap().to_string();

    let (status, first) = post(&client, &backend.url("api/collect"), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(first["session_id"], json!(sid));
    assert_eq!(first["distance_m"], json!(0.0));

    let (status, second) = post(
        &client,
        &backend.url("api/collect"),
        json!({"session_id": sid}),
    )
    .await;
    assert_eq!(status, 200);
    let distance = second["distance_m"].as_f64().unwrap();
    // one GPS step: 0.0004° north, 0.0003° east
    assert!(distance > 45.0 && distance < 55.0, "distance {distance}");

    let (_, measures) = get(&client, &backend.url(&format!("api/sessions/{sid}/measures"))).await;
    let measures = measures.as_array().unwrap();
    assert_eq!(measures.len(), 2);
    assert!(measures[0]["ts"].as_f64().unwrap() <= measures[1]["ts"].as_f64().unwrap());
    assert_eq!(measures[1]["distance_m"], json!(distance));

    let (_, stored) = get(&client, &backend.url(&format!("api/sessions/{sid}"))).await;
    assert_eq!(stored["total_distance_m"], json!(distance));

    let (_, latest) = get(&client, &backend.url("api/latest")).await;
    assert_eq!(latest["session_id"], json!(sid));
    assert_eq!(latest["distance_m"], json!(distance));
}

#[tokio::test]
async fn test_backend_with_wrong_key_persists_nothing() {
    let mesh = Mesh::start(test_config()).await;
    let mut config = mesh.config.clone();
    config.shared_key = "not-the-key".to_string();
    let backend = Backend::start(&config).await;
    let client = reqwest::Client::new();

    let (_, session) = post(
        &client,
        &backend.url("api/sessions"),
        json!({"owner_id": "runner-2"}),
    )
    .await;
    let sid = session["id"].as_str().unwrap().to_string();

    let (status, body) = post(&client, &backend.url("api/collect"), json!({})).await;
    assert_eq!(status, 401);
    assert_eq!(body["category"], json!("authentication"));

    let (_, measures) = get(&client, &backend.url(&format!("api/sessions/{sid}/measures"))).await;
    assert!(measures.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_without_router_is_unavailable() {
    let mut config = test_config();
    config.backend.collect_retries = 2;
    // nothing listens on the router target
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);
    config.backend.router = crate::test_utils::local_target(dead, "collect");

    let backend = Backend::start(&config).await;
    let client = reqwest::Client::new();
    post(
        &client,
        &backend.url("api/sessions"),
        json!({"owner_id": "runner-3"}),
    )
    .await;

    let (status, body) = post(&client, &backend.url("api/collect"), json!({})).await;
    assert_eq!(status, 503);
    assert_eq!(body["category"], json!("transport"));
}
