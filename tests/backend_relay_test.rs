mod common;

use campusrelay::fabric::lb::{BackendDirectory, ClientSessions, LbSettings};
use campusrelay::fabric::proto;
use tempfile::tempdir;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Exercises the LB core end to end without going through the client
/// accept loop: a client writer is registered directly in `ClientSessions`,
/// a chunk is forwarded to the selected backend via `BackendConn::send`
/// (spec §4.4/§4.5), and the backend's reply is relayed back to the client
/// by the backend reader task's `ClientSessions::deliver` call.
#[tokio::test]
async fn client_chunk_is_relayed_to_backend_and_reply_is_relayed_back() {
    let dir = tempdir().unwrap();
    let servers_path = dir.path().join("servers.json");

    let backend_listener = common::listener().await;
    let backend_port = backend_listener.local_addr().unwrap().port();

    let entries = serde_json::json!([{"host": "127.0.0.1", "port": backend_port}]);
    tokio::fs::write(&servers_path, serde_json::to_string(&entries).unwrap()).await.unwrap();

    let settings = LbSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        health_check_timeout_secs: 0.2,
        servers_file: servers_path.to_str().unwrap().to_string(),
        max_frame_len: 10 * 1024 * 1024,
        client_read_chunk: 4096,
    };

    let sessions = ClientSessions::new();
    let directory = BackendDirectory::new(sessions.clone(), settings.clone());
    directory.reload().await.unwrap();

    let (mut backend_stream, _) = backend_listener.accept().await.unwrap();

    // Stand in for the client front-end's accept: register a writer under a
    // known client_id and keep the reader half to observe pushes.
    let client_listener = common::listener().await;
    let client_addr = client_listener.local_addr().unwrap();
    let (client_side, accepted) =
        tokio::join!(TcpStream::connect(client_addr), client_listener.accept());
    let (mut client_read, _client_write) = client_side.unwrap().into_split();
    let (_server_read, server_write) = accepted.unwrap().0.into_split();
    sessions.insert("test-client".to_string(), server_write).await;

    let backend = directory.select().await.expect("backend should be selectable");
    backend.send("test-client", b"hello from client", settings.max_frame_len).await.unwrap();

    let envelope = proto::decode(&mut backend_stream, settings.max_frame_len).await.unwrap();
    assert_eq!(envelope.client_id, "test-client");
    assert_eq!(&envelope.payload[..], b"hello from client");

    // Reply on the same backend connection; the connector's reader task
    // (spawned by `directory.reload()`) should decode it and deliver it to
    // the client writer registered above.
    let reply = proto::encode("test-client", b"reply payload", settings.max_frame_len).unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut backend_stream, &reply).await.unwrap();
    tokio::io::AsyncWriteExt::flush(&mut backend_stream).await.unwrap();

    let mut got = vec![0u8; b"reply payload".len()];
    client_read.read_exact(&mut got).await.unwrap();
    assert_eq!(&got[..], b"reply payload");
}

#[tokio::test]
async fn chunk_for_an_unknown_client_is_dropped_without_error() {
    let dir = tempdir().unwrap();
    let servers_path = dir.path().join("servers.json");

    let backend_listener = common::listener().await;
    let backend_port = backend_listener.local_addr().unwrap().port();
    let entries = serde_json::json!([{"host": "127.0.0.1", "port": backend_port}]);
    tokio::fs::write(&servers_path, serde_json::to_string(&entries).unwrap()).await.unwrap();

    let settings = LbSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        health_check_timeout_secs: 0.2,
        servers_file: servers_path.to_str().unwrap().to_string(),
        max_frame_len: 10 * 1024 * 1024,
        client_read_chunk: 4096,
    };

    let sessions = ClientSessions::new();
    let directory = BackendDirectory::new(sessions.clone(), settings.clone());
    directory.reload().await.unwrap();
    let (mut backend_stream, _) = backend_listener.accept().await.unwrap();

    // No client writer is registered for "ghost" — the backend's reply
    // should be silently dropped by `ClientSessions::deliver` rather than
    // tearing down the backend connection.
    let reply = proto::encode("ghost", b"nobody home", settings.max_frame_len).unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut backend_stream, &reply).await.unwrap();
    tokio::io::AsyncWriteExt::flush(&mut backend_stream).await.unwrap();

    // Give the reader task a moment to process the frame, then confirm the
    // backend is still healthy and selectable.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(directory.connected_healthy_count().await, 1);
    assert!(directory.select().await.is_some());
}
