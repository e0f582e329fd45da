use tokio::net::TcpListener;

/// Binds an ephemeral localhost listener, mirroring the teacher's
/// `tests/common/mod.rs::listener()` helper.
pub async fn listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.expect("couldn't bind ephemeral listener")
}

/// Spawns a task that just accepts and holds connections open, standing in
/// for a healthy backend that never actually replies.
pub fn spawn_accepting(listener: TcpListener) {
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((stream, _)) => held.push(stream), // keep it open; don't read or write
                Err(_) => break,
            }
        }
    });
}
