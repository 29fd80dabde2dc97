//! Per-connection worker: the framed read/dispatch/write loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use corbel_protocol::framing::{Codec, FrameError};
use corbel_protocol::{Status, tokens};
use parking_lot::RwLock;

use crate::bus::Bus;
use crate::config::FramingMode;
use crate::dispatch::{ArgMode, DispatchTable};
use crate::listener::WireStream;
use crate::metrics;

/// Per-connection settings copied out of the server config.
#[derive(Clone)]
pub(crate) struct ConnSettings {
    pub timeout: i64,
    pub reqlen: usize,
    pub framing: FramingMode,
    pub eom: Vec<u8>,
}

/// Decrements the active-worker counter (and the active-connections gauge)
/// on every exit path of a worker thread.
pub(crate) struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    pub(crate) fn new(counter: Arc<AtomicUsize>) -> Self {
        metrics::CONNECTIONS_ACTIVE.increment();
        ActiveGuard(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        metrics::CONNECTIONS_ACTIVE.decrement();
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serve one connection until the client goes away, a fatal framing or
/// timeout error occurs, or a one-shot session completes.
///
/// The stream is closed by drop on every exit path.
pub(crate) fn run(
    mut stream: WireStream,
    conn: u64,
    table: Arc<RwLock<DispatchTable>>,
    bus: Bus,
    settings: ConnSettings,
) {
    let mut codec = match settings.framing {
        FramingMode::LengthPrefixed => Codec::length_prefixed(),
        FramingMode::Delimited => Codec::delimited(settings.eom.clone()),
    };
    let mut req: u64 = 0;

    tracing::debug!(conn, "client connected");
    bus.emit(conn, req, Status::Connected, "client connected", None);

    loop {
        // One-shot connections end after their first completed request.
        if settings.timeout < 0 && req > 0 {
            bus.emit(conn, req, Status::SessionEnd, "ending session", None);
            break;
        }

        if settings.timeout != 0 {
            let deadline = Duration::from_millis(settings.timeout.unsigned_abs());
            if stream.set_read_timeout(Some(deadline)).is_err() {
                bus.emit(conn, req, Status::NetworkError, "network error", None);
                break;
            }
        }

        let frame = match codec.read_frame(&mut stream, settings.reqlen) {
            Ok(frame) => frame,
            Err(err @ FrameError::Eof) => {
                tracing::debug!(conn, "client disconnected");
                bus.emit(
                    conn,
                    req,
                    Status::Disconnected,
                    "client disconnected",
                    Some(err.into()),
                );
                break;
            }
            Err(err @ FrameError::TooLong(_)) => {
                metrics::PROTOCOL_ERRORS.increment();
                send_error(&codec, &mut stream, Status::ReqLenExceeded, || {
                    "request over limit".to_string()
                });
                bus.emit(
                    conn,
                    req,
                    Status::ReqLenExceeded,
                    "request over limit; closing conn",
                    Some(err.into()),
                );
                break;
            }
            Err(err) => {
                bus.emit(conn, req, Status::SessionEnd, "ending session", Some(err.into()));
                break;
            }
        };

        // A complete frame was pulled off the wire; it counts as a request
        // whether or not it dispatches.
        req += 1;

        let locations = tokens::locations(&frame);
        let Some(&(cmd_start, cmd_end)) = locations.first() else {
            // Empty (or all-whitespace) request.
            metrics::PROTOCOL_ERRORS.increment();
            let guard = table.read();
            send_error(&codec, &mut stream, Status::NilRequest, || {
                format!("Received empty request. Available commands: {}", guard.help())
            });
            drop(guard);
            bus.emit(conn, req, Status::NilRequest, "nil request", None);
            continue;
        };
        let cmd = &frame[cmd_start..cmd_end];
        let args: &[u8] = match locations.get(1) {
            Some(&(arg_start, _)) => &frame[arg_start..],
            None => &[],
        };

        let guard = table.read();
        let Some(entry) = guard.get(cmd) else {
            metrics::PROTOCOL_ERRORS.increment();
            let cmd = String::from_utf8_lossy(cmd).into_owned();
            send_error(&codec, &mut stream, Status::BadCommand, || {
                format!("Unknown command '{cmd}'. Available commands: {}", guard.help())
            });
            bus.emit(conn, req, Status::BadCommand, format!("bad command: [{cmd}]"), None);
            continue;
        };

        metrics::REQUESTS_DISPATCHED.increment();
        tracing::trace!(conn, req, cmd = %String::from_utf8_lossy(cmd), "dispatching");
        bus.emit(
            conn,
            req,
            Status::Dispatching,
            format!("dispatching: [{}]", String::from_utf8_lossy(cmd)),
            None,
        );

        let argv: Vec<Vec<u8>> = match entry.mode {
            ArgMode::Argv => tokens::to_bytes(args),
            ArgMode::Blob => vec![args.to_vec()],
        };

        match (entry.handler)(&argv) {
            Err(err) => {
                metrics::REQUESTS_FAILED.increment();
                send_error(&codec, &mut stream, Status::RequestFailed, || {
                    "Sorry, an error occurred and your request could not be completed.".to_string()
                });
                bus.emit(conn, req, Status::RequestFailed, "request failed", Some(err));
            }
            Ok(reply) => {
                if let Err(err) = codec.write_frame(&mut stream, &reply) {
                    bus.emit(conn, req, Status::NetworkError, "network error", Some(err.into()));
                    break;
                }
                bus.emit(conn, req, Status::ReplySent, "reply sent", None);
            }
        }
    }
}

/// Send an error reply. Length-prefixed connections get the bare 11-byte
/// wire sentinel; delimited connections get the legacy human-readable line.
/// Write failures are ignored here: the next read surfaces the broken
/// connection.
fn send_error<F: FnOnce() -> String>(
    codec: &Codec,
    stream: &mut WireStream,
    status: Status,
    legacy_text: F,
) {
    let reply: Vec<u8> = match codec {
        Codec::Length => match status.sentinel() {
            Some(sentinel) => sentinel.to_vec(),
            None => return,
        },
        Codec::Delimited { .. } => legacy_text().into_bytes(),
    };
    let _ = codec.write_frame(stream, &reply);
}
