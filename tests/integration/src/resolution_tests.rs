//! Candidate resolution against live servers: mesh files, fallback, strict mode.

use crate::test_utils::{local_target, start_role, test_config, write_mesh_file, Backend, Mesh};
use mesh_node::Role;
use serde_json::{json, Value};

async fn collect(url: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .json(&json!({"key": "zolis-key"}))
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_missing_mesh_file_falls_back_to_hostname() {
    let dir = tempfile::tempdir().unwrap();
    let mut mesh = Mesh::start(test_config()).await;

    mesh.config.router.leader.addr_file = Some(dir.path().join("leader.addr"));
    let router = start_role(Role::Router, &mesh.config).await;

    let (status, body) = collect(&Mesh::url(router, "collect")).await;
    assert_eq!(status, 200);
    assert_eq!(body["latitude"], json!(48.8566));
}

#[tokio::test]
async fn test_blank_mesh_file_falls_back_to_hostname() {
    let dir = tempfile::tempdir().unwrap();
    let mut mesh = Mesh::start(test_config()).await;

    let gps_file = write_mesh_file(dir.path(), "gps.addr", "  \n");
    mesh.config.leader.gps.addr_file = Some(gps_file);
    let leader = start_role(Role::Leader, &mesh.config).await;

    let (status, body) = collect(&Mesh::url(leader, "collect")).await;
    assert_eq!(status, 200);
    assert!(body["gps"]["lat"].is_number());
}

#[tokio::test]
async fn test_mesh_file_address_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let mut mesh = Mesh::start(test_config()).await;

    // strict mode: only the mesh tier exists, so success proves it was used
    for (target, name) in [
        (&mut mesh.config.leader.gps, "gps.addr"),
        (&mut mesh.config.leader.battery, "battery.addr"),
        (&mut mesh.config.leader.temperature, "temperature.addr"),
    ] {
        target.host = "unresolvable.invalid".to_string();
        target.addr_file = Some(write_mesh_file(dir.path(), name, "127.0.0.1\n"));
    }
    mesh.config.resolver.strict = true;
    let leader = start_role(Role::Leader, &mesh.config).await;

    let (status, body) = collect(&Mesh::url(leader, "collect")).await;
    assert_eq!(status, 200);
    assert_eq!(body["battery"]["batterie"], json!(100.0));
}

#[tokio::test]
async fn test_strict_mode_without_mesh_files_is_configuration_error() {
    let mut mesh = Mesh::start(test_config()).await;
    mesh.config.resolver.strict = true;
    let leader = start_role(Role::Leader, &mesh.config).await;

    let (status, body) = collect(&Mesh::url(leader, "collect")).await;
    assert_eq!(status, 500);
    assert_eq!(body["category"], json!("configuration"));

    let router = start_role(Role::Router, &mesh.config).await;
    let (status, body) = collect(&Mesh::url(router, "collect")).await;
    assert_eq!(status, 500);
    assert_eq!(body["category"], json!("configuration"));
}

#[tokio::test]
async fn test_leader_configuration_error_propagates_through_router_and_backend() {
    let mut mesh = Mesh::start(test_config()).await;

    let mut strict = mesh.config.clone();
    strict.resolver.strict = true;
    let leader = start_role(Role::Leader, &strict).await;

    mesh.config.router.leader = local_target(leader, "collect");
    let router = start_role(Role::Router, &mesh.config).await;
    let (status, body) = collect(&Mesh::url(router, "collect")).await;
    assert_eq!(status, 500);
    assert_eq!(body["category"], json!("configuration"));

    mesh.config.backend.router = local_target(router, "collect");
    let backend = Backend::start(&mesh.config).await;
    let response = reqwest::Client::new()
        .post(backend.url("api/collect"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["category"], json!("configuration"));
}

#[tokio::test]
async fn test_unreachable_leaf_fails_whole_gather() {
    let mut mesh = Mesh::start(test_config()).await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    mesh.config.leader.temperature.port = listener.local_addr().unwrap().port();
    drop(listener);
    let leader = start_role(Role::Leader, &mesh.config).await;

    let (status, body) = collect(&Mesh::url(leader, "collect")).await;
    assert_eq!(status, 503);
    assert_eq!(body["category"], json!("transport"));
    assert!(body["error"].as_str().unwrap().contains("temperature"));
}
