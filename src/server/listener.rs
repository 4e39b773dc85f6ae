// Listener module
// TCP listeners with SO_REUSEADDR/SO_REUSEPORT, or a Unix domain socket

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;

/// Bound listening socket
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        path: String,
    },
}

/// Accepted client stream
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

impl Listener {
    /// Bind according to `server.unix_socket` / `server.host:port`
    pub fn bind(config: &Config) -> io::Result<Self> {
        #[cfg(unix)]
        if let Some(path) = &config.server.unix_socket {
            return bind_unix(path);
        }

        let addr = config
            .get_socket_addr()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        create_reusable_listener(addr).map(Self::Tcp)
    }

    /// Human-readable listen address for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Tcp(l) => l
                .local_addr()
                .map_or_else(|_| "tcp (unknown)".to_string(), |a| format!("http://{a}")),
            #[cfg(unix)]
            Self::Unix { path, .. } => format!("unix:{path}"),
        }
    }

    /// Accept one connection, returning the stream and a client address string
    pub async fn accept(&self) -> io::Result<(Stream, String)> {
        match self {
            Self::Tcp(l) => {
                let (stream, peer) = l.accept().await?;
                Ok((Stream::Tcp(stream), peer.ip().to_string()))
            }
            #[cfg(unix)]
            Self::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                // The fronting proxy connects over the socket; no client IP is known
                Ok((Stream::Unix(stream), "-".to_string()))
            }
        }
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Self::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path.as_str());
        }
    }
}

/// Bind a Unix domain socket, replacing a stale socket file left by a previous run
#[cfg(unix)]
fn bind_unix(path: &str) -> io::Result<Listener> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let listener = tokio::net::UnixListener::bind(path)?;
    Ok(Listener::Unix {
        listener,
        path: path.to_string(),
    })
}

/// Create a `TcpListener` with `SO_REUSEPORT` and `SO_REUSEADDR` enabled.
///
/// Lets a replacement process bind the port while the old one is still
/// draining, and allows binding a port in `TIME_WAIT`.
pub fn create_reusable_listener(addr: std::net::SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_listener_binds_ephemeral_port() {
        let mut cfg = Config::defaults().unwrap();
        cfg.server.port = 0;
        let listener = Listener::bind(&cfg).unwrap();
        assert!(listener.describe().starts_with("http://127.0.0.1:"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_listener_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("skysense.sock");
        let path_str = path.to_str().unwrap().to_string();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale").unwrap();

        let mut cfg = Config::defaults().unwrap();
        cfg.server.unix_socket = Some(path_str.clone());
        let listener = Listener::bind(&cfg).unwrap();
        assert_eq!(listener.describe(), format!("unix:{path_str}"));

        drop(listener);
        assert!(!path.exists());
    }
}
