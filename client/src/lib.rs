//! Blocking client for corbel servers.
//!
//! A [`Client`] owns one connection and performs one request at a time:
//! [`Client::dispatch`] writes a length-prefixed request and reads the
//! reply, decoding the 11-byte `PERRPERRddd` sentinel into a typed error.
//! After a timed-out dispatch, [`Client::read`] collects the reply the
//! server eventually sends.
//!
//! The handle is not thread-safe; `dispatch` takes `&mut self`, so one
//! outstanding request per handle is enforced at compile time.
//!
//! # Example
//!
//! ```no_run
//! use corbel_client::{Client, ClientConfig};
//!
//! let mut client = Client::connect_tcp(ClientConfig::new("127.0.0.1:60606"))?;
//! let reply = client.dispatch(b"echo it works!")?;
//! assert_eq!(reply, b"it works!");
//! client.close();
//! # Ok::<(), corbel_client::ClientError>(())
//! ```

mod config;
mod error;

pub use config::ClientConfig;
pub use error::ClientError;

use std::io::{self, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use corbel_protocol::framing::Codec;
use corbel_protocol::status::parse_sentinel;
use rustls::pki_types::ServerName;
use rustls::{ClientConnection, StreamOwned};

enum Conn {
    Tcp(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Conn {
    fn set_deadlines(&self, timeout: Option<Duration>) -> io::Result<()> {
        let sock = match self {
            Conn::Tcp(stream) => stream,
            Conn::Tls(stream) => &stream.sock,
            #[cfg(unix)]
            Conn::Unix(stream) => {
                stream.set_read_timeout(timeout)?;
                return stream.set_write_timeout(timeout);
            }
        };
        sock.set_read_timeout(timeout)?;
        sock.set_write_timeout(timeout)
    }
}

impl Read for Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Conn::Tcp(stream) => stream.read(buf),
            Conn::Tls(stream) => stream.read(buf),
            #[cfg(unix)]
            Conn::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Conn::Tcp(stream) => stream.write(buf),
            Conn::Tls(stream) => stream.write(buf),
            #[cfg(unix)]
            Conn::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Conn::Tcp(stream) => stream.flush(),
            Conn::Tls(stream) => stream.flush(),
            #[cfg(unix)]
            Conn::Unix(stream) => stream.flush(),
        }
    }
}

/// A client connection to a corbel server. One outstanding request at a
/// time.
pub struct Client {
    conn: Conn,
    timeout: i64,
}

impl Client {
    /// Dial a TCP server.
    pub fn connect_tcp(config: ClientConfig) -> Result<Client, ClientError> {
        let stream = TcpStream::connect(&config.addr)?;
        stream.set_nodelay(true)?;
        Ok(Client {
            conn: Conn::Tcp(stream),
            timeout: config.timeout,
        })
    }

    /// Dial a TLS-over-TCP server. The rustls configuration is passed
    /// through opaquely; `server_name` is the name certificates are
    /// verified against.
    pub fn connect_tls(
        config: ClientConfig,
        tls: Arc<rustls::ClientConfig>,
        server_name: &str,
    ) -> Result<Client, ClientError> {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let stream = TcpStream::connect(&config.addr)?;
        stream.set_nodelay(true)?;
        let conn = ClientConnection::new(tls, name).map_err(io::Error::other)?;
        Ok(Client {
            conn: Conn::Tls(Box::new(StreamOwned::new(conn, stream))),
            timeout: config.timeout,
        })
    }

    /// Dial a Unix domain socket server.
    #[cfg(unix)]
    pub fn connect_unix(config: ClientConfig) -> Result<Client, ClientError> {
        let stream = UnixStream::connect(&config.addr)?;
        Ok(Client {
            conn: Conn::Unix(stream),
            timeout: config.timeout,
        })
    }

    /// Send one request and return the reply payload.
    ///
    /// A reply carrying a protocol error sentinel becomes
    /// [`ClientError::Status`]. When the configured timeout is positive
    /// and expires, the error reports as a timeout
    /// ([`ClientError::is_timeout`]); the request may still complete on
    /// the server, and [`Client::read`] collects the late reply.
    pub fn dispatch(&mut self, req: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.apply_deadlines()?;
        Codec::length_prefixed().write_frame(&mut self.conn, req)?;
        self.read_reply()
    }

    /// Read one reply without sending anything. Used to collect the
    /// response after a timed-out [`Client::dispatch`].
    pub fn read(&mut self) -> Result<Vec<u8>, ClientError> {
        self.apply_deadlines()?;
        self.read_reply()
    }

    /// Close the connection.
    pub fn close(self) {}

    fn apply_deadlines(&self) -> Result<(), ClientError> {
        if self.timeout > 0 {
            let deadline = Duration::from_millis(self.timeout as u64);
            self.conn.set_deadlines(Some(deadline))?;
        }
        Ok(())
    }

    fn read_reply(&mut self) -> Result<Vec<u8>, ClientError> {
        let frame = Codec::length_prefixed().read_frame(&mut self.conn, 0)?;
        if let Some(status) = parse_sentinel(&frame) {
            return Err(ClientError::Status(status));
        }
        Ok(frame)
    }
}
