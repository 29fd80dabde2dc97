//! Notification bus between the server and its host.
//!
//! Events flow over a bounded channel. Emission is non-blocking by
//! contract: an event below the configured level threshold is discarded,
//! and an event that arrives while the channel is full is dropped rather
//! than stalling the request loop. The host drains the receiver; once
//! [`Server::quit`](crate::Server::quit) returns, the channel yields any
//! buffered events and then reports disconnection.

use std::error::Error;
use std::fmt;

use corbel_protocol::{Level, Status};
use crossbeam_channel::{Receiver, Sender, bounded};

/// Error payload carried alongside an event.
pub type EventError = Box<dyn Error + Send + Sync>;

/// One notification record.
///
/// `conn` and `req` label the connection and the request within it; both
/// are zero for listener-level events.
#[derive(Debug)]
pub struct Event {
    /// Connection id, monotonic per server starting at 1.
    pub conn: u64,
    /// Request number within the connection, starting at 1.
    pub req: u64,
    /// Numeric status code.
    pub code: u16,
    /// Textual description.
    pub txt: String,
    /// Underlying error, when one caused the event.
    pub err: Option<EventError>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn {} req {} status {}", self.conn, self.req, self.code)?;
        if !self.txt.is_empty() {
            write!(f, " ({})", self.txt)?;
        }
        if let Some(err) = &self.err {
            write!(f, "; err: {err}")?;
        }
        Ok(())
    }
}

impl Error for Event {}

/// Cloneable emitter half of the notification channel.
#[derive(Clone)]
pub(crate) struct Bus {
    tx: Sender<Event>,
    threshold: Level,
}

impl Bus {
    pub(crate) fn new(capacity: usize, threshold: Level) -> (Bus, Receiver<Event>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Bus { tx, threshold }, rx)
    }

    /// Emit one event. Never blocks: below-threshold events are discarded
    /// and a full channel drops the event.
    pub(crate) fn emit(
        &self,
        conn: u64,
        req: u64,
        status: Status,
        txt: impl Into<String>,
        err: Option<EventError>,
    ) {
        if status.level() < self.threshold {
            return;
        }
        let _ = self.tx.try_send(Event {
            conn,
            req,
            code: status.code(),
            txt: txt.into(),
            err,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_formatting() {
        let mut event = Event {
            conn: 1,
            req: 1,
            code: 200,
            txt: "reply sent".into(),
            err: None,
        };
        assert_eq!(event.to_string(), "conn 1 req 1 status 200 (reply sent)");

        event.err = Some("something bad".into());
        assert_eq!(
            event.to_string(),
            "conn 1 req 1 status 200 (reply sent); err: something bad"
        );
    }

    #[test]
    fn below_threshold_is_discarded() {
        let (bus, rx) = Bus::new(8, Level::Error);
        bus.emit(1, 1, Status::Connected, "client connected", None);
        bus.emit(1, 1, Status::ReplySent, "reply sent", None);
        bus.emit(1, 1, Status::RequestFailed, "request failed", None);
        bus.emit(0, 0, Status::ListenerFailed, "listener", None);

        let codes: Vec<u16> = rx.try_iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![500, 599]);
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (bus, rx) = Bus::new(1, Level::All);
        bus.emit(1, 1, Status::Connected, "first", None);
        // Channel is full now; this emit must return immediately and lose
        // the event.
        bus.emit(1, 2, Status::Connected, "second", None);

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].txt, "first");
    }

    #[test]
    fn receiver_disconnects_after_last_sender_drops() {
        let (bus, rx) = Bus::new(4, Level::All);
        bus.emit(1, 1, Status::Connected, "client connected", None);
        drop(bus);

        assert_eq!(rx.recv().unwrap().code, 100);
        assert!(rx.recv().is_err());
    }
}
