use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::fabric::lb::backend::BackendAddr;

/// probe attempts a plain TCP connect with a bounded deadline, then closes
/// immediately. Any connect failure, timeout, reset, or host lookup error
/// yields `false`. A successful connect yields `true` even if the peer closes
/// instantly afterward. No retries — the caller re-probes on the next
/// reconfiguration cycle.
pub async fn probe(addr: &BackendAddr, deadline: Duration) -> bool {
    match timeout(deadline, TcpStream::connect(addr.socket_addr_string())).await {
        Ok(Ok(stream)) => {
            // Dropping the stream closes it; we don't need a graceful shutdown
            // for a probe connection.
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "health probe connect failed");
            false
        }
        Err(_) => {
            debug!(%addr, "health probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_succeeds_against_a_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let addr = BackendAddr { host: "127.0.0.1".to_string(), port };
        assert!(probe(&addr, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn probe_fails_against_a_closed_port() {
        // Bind then immediately drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let addr = BackendAddr { host: "127.0.0.1".to_string(), port };
        assert!(!probe(&addr, Duration::from_millis(500)).await);
    }
}
