//! Server handle: construction, the accept loop, and Quit.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use corbel_protocol::Status;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;

use crate::bus::{Bus, Event};
use crate::config::ServerConfig;
use crate::dispatch::{DispatchTable, HandlerError, RegisterError};
use crate::listener::Listener;
use crate::metrics;
use crate::worker::{self, ActiveGuard, ConnSettings};

/// How long the accept loop sleeps when no client is pending.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A handle on one running server instance.
///
/// Owns the listener (through the accept thread), the dispatch table, and
/// the notification channel. Dropping the handle without calling
/// [`Server::quit`] performs the same shutdown.
pub struct Server {
    events: Receiver<Event>,
    bus: Option<Bus>,
    table: Arc<RwLock<DispatchTable>>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    accept: Option<JoinHandle<()>>,
    addr: String,
    #[cfg(unix)]
    unix_path: Option<PathBuf>,
}

impl Server {
    /// Bind a TCP listener and start serving.
    pub fn bind_tcp(config: ServerConfig) -> io::Result<Server> {
        let listener = Listener::bind_tcp(&config.addr)?;
        Ok(Server::start(config, listener, None))
    }

    /// Bind a TCP listener secured with TLS and start serving. The rustls
    /// configuration is passed through opaquely.
    pub fn bind_tls(
        config: ServerConfig,
        tls: Arc<rustls::ServerConfig>,
    ) -> io::Result<Server> {
        let listener = Listener::bind_tls(&config.addr, tls)?;
        Ok(Server::start(config, listener, None))
    }

    /// Bind a Unix domain socket, apply `mode` (e.g. `0o700`) to it, and
    /// start serving. The socket file is removed by [`Server::quit`].
    #[cfg(unix)]
    pub fn bind_unix(config: ServerConfig, mode: u32) -> io::Result<Server> {
        let path = PathBuf::from(&config.addr);
        let listener = Listener::bind_unix(&path, mode)?;
        Ok(Server::start(config, listener, Some(path)))
    }

    fn start(
        config: ServerConfig,
        listener: Listener,
        #[allow(unused_variables)] unix_path: Option<PathBuf>,
    ) -> Server {
        // Tests bind port 0; report the address the kernel actually chose.
        let addr = match listener.local_addr() {
            Some(local) => local.to_string(),
            None => config.addr.clone(),
        };

        let (bus, events) = Bus::new(config.buffer, config.msglvl);
        let table = Arc::new(RwLock::new(DispatchTable::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        // The accept loop itself counts once.
        let active = Arc::new(AtomicUsize::new(1));

        let settings = ConnSettings {
            timeout: config.timeout,
            reqlen: config.reqlen,
            framing: config.framing,
            eom: config.eom,
        };

        let accept = {
            let bus = bus.clone();
            let table = table.clone();
            let shutdown = shutdown.clone();
            let active = active.clone();
            thread::Builder::new()
                .name("corbel-accept".to_string())
                .spawn(move || accept_loop(listener, bus, table, settings, shutdown, active))
                .expect("failed to spawn accept thread")
        };

        Server {
            events,
            bus: Some(bus),
            table,
            shutdown,
            active,
            accept: Some(accept),
            addr,
            #[cfg(unix)]
            unix_path,
        }
    }

    /// The address the server is bound to. For TCP this is the resolved
    /// socket address, so binding port 0 reports the real port.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The notification channel. Emission is lossy: drain this receiver
    /// concurrently with server operation or later events will be dropped,
    /// not buffered.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Register a handler function under `name`.
    ///
    /// `mode` is `"argv"` (arguments split into tokens) or `"blob"`
    /// (argument payload passed as one token). Registration normally
    /// happens before clients connect; registering while serving is safe
    /// but briefly blocks dispatch on the table lock.
    pub fn register<F>(&self, name: &str, mode: &str, handler: F) -> Result<(), RegisterError>
    where
        F: Fn(&[Vec<u8>]) -> Result<Vec<u8>, HandlerError> + Send + Sync + 'static,
    {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(RegisterError::Terminated);
        }
        self.table.write().register(name, mode, Box::new(handler))
    }

    /// Shut the server down.
    ///
    /// Signals the accept loop, which emits the 199 event and closes the
    /// listener; waits for the accept loop and every connection worker to
    /// finish; then closes the notification channel. Buffered events stay
    /// readable from [`Server::events`] after `quit` returns, followed by
    /// a disconnect. Idempotent; a handler that never returns will hold
    /// `quit` forever.
    pub fn quit(&mut self) {
        if self.bus.is_none() {
            return;
        }
        self.shutdown.store(true, Ordering::SeqCst);

        // Drain: the accept loop exits on its next poll tick, workers as
        // their connections wind down. Each decrements the counter once.
        while self.active.load(Ordering::SeqCst) > 0 {
            thread::sleep(ACCEPT_POLL_INTERVAL);
        }
        if let Some(handle) = self.accept.take() {
            let _ = handle.join();
        }

        // Last sender drops here; the channel disconnects once buffered
        // events are drained.
        self.bus = None;

        #[cfg(unix)]
        if let Some(path) = self.unix_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.quit();
    }
}

/// Accept connections until shutdown or a listener failure.
///
/// The listener lives on this thread's stack, so it is closed exactly
/// once, when the loop returns.
fn accept_loop(
    listener: Listener,
    bus: Bus,
    table: Arc<RwLock<DispatchTable>>,
    settings: ConnSettings,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
) {
    let mut next_conn: u64 = 1;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            bus.emit(
                0,
                0,
                Status::ListenerClosed,
                "Quit called: closing listener socket",
                None,
            );
            break;
        }
        match listener.accept() {
            Ok(stream) => {
                metrics::CONNECTIONS_ACCEPTED.increment();
                let conn = next_conn;
                next_conn += 1;

                active.fetch_add(1, Ordering::SeqCst);
                let spawned = {
                    let bus = bus.clone();
                    let table = table.clone();
                    let settings = settings.clone();
                    let guard = ActiveGuard::new(active.clone());
                    thread::Builder::new()
                        .name(format!("corbel-conn-{conn}"))
                        .spawn(move || {
                            let _guard = guard;
                            worker::run(stream, conn, table, bus, settings);
                        })
                };
                if let Err(err) = spawned {
                    // The closure (and with it the guard) is dropped by the
                    // failed spawn, so the count is already undone.
                    bus.emit(0, 0, Status::InternalError, "internal error", Some(err.into()));
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                if shutdown.load(Ordering::SeqCst) {
                    bus.emit(
                        0,
                        0,
                        Status::ListenerClosed,
                        "Quit called: closing listener socket",
                        None,
                    );
                } else {
                    tracing::warn!(error = %err, "accept failed");
                    bus.emit(
                        0,
                        0,
                        Status::ListenerFailed,
                        "read from listener socket failed",
                        Some(err.into()),
                    );
                }
                break;
            }
        }
    }
    active.fetch_sub(1, Ordering::SeqCst);
}
