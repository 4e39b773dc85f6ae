// Server loop module
// Accepts connections until shutdown, then drains the ones in flight

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::connection::accept_connection;
use super::listener::Listener;
use crate::config::AppState;
use crate::logger;

/// Poll interval while waiting for active connections to finish
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run the accept loop until `shutdown` is notified
pub async fn start_server_loop(
    listener: Listener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, remote_addr)) => {
                        accept_connection(stream, remote_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => {
                logger::log_info("Shutdown requested, no longer accepting connections");
                break;
            }
        }
    }

    // Release the socket before waiting so a replacement can bind immediately
    drop(listener);

    let deadline = state.config.connection_timeout();
    drain_connections(&active_connections, deadline).await;
    Ok(())
}

/// Wait for in-flight connections to finish, at most `deadline`
async fn drain_connections(active: &AtomicUsize, deadline: Duration) {
    let until = tokio::time::Instant::now() + deadline;

    loop {
        let remaining = active.load(Ordering::SeqCst);
        if remaining == 0 {
            logger::log_info("All connections closed");
            return;
        }
        if tokio::time::Instant::now() >= until {
            logger::log_warning(&format!(
                "Drain deadline reached with {remaining} connection(s) still open"
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_drain_returns_when_idle() {
        let active = AtomicUsize::new(0);
        tokio::time::timeout(
            Duration::from_secs(1),
            drain_connections(&active, Duration::from_secs(30)),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_drain_gives_up_at_deadline() {
        let active = AtomicUsize::new(2);
        let started = tokio::time::Instant::now();
        drain_connections(&active, Duration::from_millis(200)).await;
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(active.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_serves_page_then_shuts_down() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>SkySense</h1>").unwrap();

        let mut cfg = Config::defaults().unwrap();
        cfg.server.port = 0;
        cfg.logging.access_log = false;
        cfg.site.template_dir = dir.path().to_str().unwrap().to_string();
        let state = Arc::new(AppState::new(&cfg).unwrap());

        let listener = Listener::bind(&cfg).unwrap();
        let Listener::Tcp(ref tcp) = listener else {
            panic!("expected a TCP listener");
        };
        let addr = tcp.local_addr().unwrap();

        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        client.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(text.starts_with("HTTP/1.1 200 OK"));
        assert!(text.ends_with("<h1>SkySense</h1>"));

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
