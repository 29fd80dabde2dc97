//! Listener and stream wrappers over the three transports.
//!
//! Listeners run in non-blocking mode so the accept loop can interleave
//! accepts with shutdown checks; accepted streams are switched back to
//! blocking before they are handed to a worker. TLS connections wrap the
//! TCP stream in `rustls::StreamOwned`, so the handshake is driven by the
//! worker's first read or write.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ServerConnection, StreamOwned};

pub(crate) enum Listener {
    Tcp(TcpListener),
    Tls(TcpListener, Arc<rustls::ServerConfig>),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    pub(crate) fn bind_tcp(addr: &str) -> io::Result<Listener> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Listener::Tcp(listener))
    }

    pub(crate) fn bind_tls(addr: &str, config: Arc<rustls::ServerConfig>) -> io::Result<Listener> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Listener::Tls(listener, config))
    }

    /// Bind a Unix socket and apply `mode` (e.g. `0o700`) to it.
    #[cfg(unix)]
    pub(crate) fn bind_unix(path: &Path, mode: u32) -> io::Result<Listener> {
        let listener = UnixListener::bind(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        listener.set_nonblocking(true)?;
        Ok(Listener::Unix(listener))
    }

    /// Accept one connection. Yields `WouldBlock` when no client is
    /// pending, which the accept loop treats as a poll tick.
    pub(crate) fn accept(&self) -> io::Result<WireStream> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, _addr) = listener.accept()?;
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                Ok(WireStream::Tcp(stream))
            }
            Listener::Tls(listener, config) => {
                let (stream, _addr) = listener.accept()?;
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                let conn = ServerConnection::new(config.clone()).map_err(io::Error::other)?;
                Ok(WireStream::Tls(Box::new(StreamOwned::new(conn, stream))))
            }
            #[cfg(unix)]
            Listener::Unix(listener) => {
                let (stream, _addr) = listener.accept()?;
                stream.set_nonblocking(false)?;
                Ok(WireStream::Unix(stream))
            }
        }
    }

    /// The bound address, mostly so tests can bind port 0.
    pub(crate) fn local_addr(&self) -> Option<std::net::SocketAddr> {
        match self {
            Listener::Tcp(listener) | Listener::Tls(listener, _) => listener.local_addr().ok(),
            #[cfg(unix)]
            Listener::Unix(_) => None,
        }
    }
}

/// One accepted connection, owned by its worker.
pub(crate) enum WireStream {
    Tcp(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl WireStream {
    /// Set or clear the read deadline on the underlying socket.
    pub(crate) fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            WireStream::Tcp(stream) => stream.set_read_timeout(timeout),
            WireStream::Tls(stream) => stream.sock.set_read_timeout(timeout),
            #[cfg(unix)]
            WireStream::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }
}

impl Read for WireStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            WireStream::Tcp(stream) => stream.read(buf),
            WireStream::Tls(stream) => stream.read(buf),
            #[cfg(unix)]
            WireStream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for WireStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            WireStream::Tcp(stream) => stream.write(buf),
            WireStream::Tls(stream) => stream.write(buf),
            #[cfg(unix)]
            WireStream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            WireStream::Tcp(stream) => stream.flush(),
            WireStream::Tls(stream) => stream.flush(),
            #[cfg(unix)]
            WireStream::Unix(stream) => stream.flush(),
        }
    }
}
