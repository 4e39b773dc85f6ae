// Connection handling module
// Accepts a client stream and serves HTTP/1.1 on it in its own task

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use super::listener::Stream;
use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept and process a connection, enforcing the connection limit.
///
/// # Arguments
///
/// * `stream` - The accepted client stream
/// * `remote_addr` - Client address for the access log
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
pub fn accept_connection(
    stream: Stream,
    remote_addr: String,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_debug(&format!("Accepted connection from {remote_addr}"));

    let state = Arc::clone(state);
    let conn_counter = Arc::clone(conn_counter);
    let remote_addr: Arc<str> = Arc::from(remote_addr);

    match stream {
        Stream::Tcp(s) => spawn_connection(s, remote_addr, state, conn_counter),
        #[cfg(unix)]
        Stream::Unix(s) => spawn_connection(s, remote_addr, state, conn_counter),
    }
}

/// Serve one connection in a spawned task.
///
/// `performance.keep_alive_timeout` bounds how long the client may take to
/// send the next request's headers, so an idle keep-alive connection closes
/// after that many seconds; `0` disables keep-alive. The whole connection is
/// bounded by `max(read_timeout, write_timeout)`. The counter is decremented
/// when the task ends.
fn spawn_connection<S>(
    io: S,
    remote_addr: Arc<str>,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let io = TokioIo::new(io);
        let timeout_duration = state.config.connection_timeout();

        let keep_alive_timeout = state.config.performance.keep_alive_timeout;
        let mut builder = http1::Builder::new();
        builder.timer(TokioTimer::new());
        if keep_alive_timeout > 0 {
            builder
                .keep_alive(true)
                .header_read_timeout(Duration::from_secs(keep_alive_timeout));
        } else {
            builder.keep_alive(false);
        }

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                handler::handle_request(req, Arc::clone(&service_state), Arc::clone(&remote_addr))
            }),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => logger::log_debug(&format!(
                "Connection closed after {} seconds",
                timeout_duration.as_secs()
            )),
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
