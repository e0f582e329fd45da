mod common;

use std::time::Duration;

use campusrelay::fabric::lb::{BackendDirectory, ClientSessions, LbSettings};
use tempfile::tempdir;
use tokio::time::sleep;

fn settings_for(servers_file: &str) -> LbSettings {
    LbSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        health_check_timeout_secs: 0.2,
        servers_file: servers_file.to_string(),
        max_frame_len: 10 * 1024 * 1024,
        client_read_chunk: 4096,
    }
}

async fn write_servers_file(path: &std::path::Path, ports: &[u16]) {
    let entries: Vec<_> = ports.iter().map(|p| serde_json::json!({"host": "127.0.0.1", "port": p})).collect();
    let body = serde_json::to_string(&entries).unwrap();
    tokio::fs::write(path, body).await.unwrap();
}

#[tokio::test]
async fn reload_connects_to_every_healthy_backend() {
    let dir = tempdir().unwrap();
    let servers_path = dir.path().join("servers.json");

    let l1 = common::listener().await;
    let l2 = common::listener().await;
    let p1 = l1.local_addr().unwrap().port();
    let p2 = l2.local_addr().unwrap().port();
    common::spawn_accepting(l1);
    common::spawn_accepting(l2);

    write_servers_file(&servers_path, &[p1, p2]).await;

    let settings = settings_for(servers_path.to_str().unwrap());
    let directory = BackendDirectory::new(ClientSessions::new(), settings);
    directory.reload().await.unwrap();

    assert_eq!(directory.connected_healthy_count().await, 2);
}

#[tokio::test]
async fn losing_a_backend_drops_it_from_the_cursor_without_touching_the_survivor() {
    let dir = tempdir().unwrap();
    let servers_path = dir.path().join("servers.json");

    let l1 = common::listener().await;
    let l2 = common::listener().await;
    let p1 = l1.local_addr().unwrap().port();
    let p2 = l2.local_addr().unwrap().port();
    common::spawn_accepting(l1);
    common::spawn_accepting(l2);

    write_servers_file(&servers_path, &[p1, p2]).await;

    let settings = settings_for(servers_path.to_str().unwrap());
    let directory = BackendDirectory::new(ClientSessions::new(), settings);
    directory.reload().await.unwrap();
    assert_eq!(directory.connected_healthy_count().await, 2);

    // Drop backend 2 from the discovery file entirely (simulating it being
    // killed and removed from rotation) and reload again.
    write_servers_file(&servers_path, &[p1]).await;
    directory.reload().await.unwrap();

    assert_eq!(directory.connected_healthy_count().await, 1);
    let conn = directory.select().await.expect("survivor should still be selectable");
    assert_eq!(conn.addr.port, p1);
}

#[tokio::test]
async fn hot_add_promotes_a_newly_listed_backend_after_one_reload() {
    let dir = tempdir().unwrap();
    let servers_path = dir.path().join("servers.json");

    write_servers_file(&servers_path, &[]).await;

    let settings = settings_for(servers_path.to_str().unwrap());
    let directory = BackendDirectory::new(ClientSessions::new(), settings);
    directory.reload().await.unwrap();
    assert_eq!(directory.connected_healthy_count().await, 0);
    assert!(directory.select().await.is_none());

    let l1 = common::listener().await;
    let p1 = l1.local_addr().unwrap().port();
    common::spawn_accepting(l1);

    write_servers_file(&servers_path, &[p1]).await;
    directory.reload().await.unwrap();

    assert_eq!(directory.connected_healthy_count().await, 1);
    assert!(directory.select().await.is_some());
}

#[tokio::test]
async fn reload_on_unparseable_file_retains_the_prior_backend_set() {
    let dir = tempdir().unwrap();
    let servers_path = dir.path().join("servers.json");

    let l1 = common::listener().await;
    let p1 = l1.local_addr().unwrap().port();
    common::spawn_accepting(l1);
    write_servers_file(&servers_path, &[p1]).await;

    let settings = settings_for(servers_path.to_str().unwrap());
    let directory = BackendDirectory::new(ClientSessions::new(), settings);
    directory.reload().await.unwrap();
    assert_eq!(directory.connected_healthy_count().await, 1);

    tokio::fs::write(&servers_path, b"not json").await.unwrap();
    assert!(directory.reload().await.is_err());

    // Prior connections survive a failed reload.
    assert_eq!(directory.connected_healthy_count().await, 1);

    sleep(Duration::from_millis(10)).await; // let any spurious task settle before drop
}
