//! Status taxonomy shared by server events and the wire sentinel.
//!
//! Every condition the server reports — to its host over the notification
//! channel, or to the client as an error reply — has a fixed numeric code.
//! Codes in the 4xx/5xx range that are visible to clients also have a wire
//! sentinel: exactly 11 bytes, the ASCII tag `PERRPERR` followed by the
//! zero-padded decimal code.

use std::fmt;
use std::str::FromStr;

/// Leading tag of every wire sentinel.
pub const SENTINEL_TAG: &[u8; 8] = b"PERRPERR";

/// Total length of a wire sentinel: tag plus three decimal digits.
pub const SENTINEL_LEN: usize = 11;

/// Notification verbosity levels, most verbose first.
///
/// An event is delivered iff its level is at or above the configured
/// threshold, so `All` passes everything and `Fatal` passes only
/// irrecoverable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Level {
    /// Every event, including per-request progress.
    #[default]
    All,
    /// Connection lifecycle only.
    Conn,
    /// Failures only.
    Error,
    /// Irrecoverable failures only.
    Fatal,
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Level::All),
            "conn" => Ok(Level::Conn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(format!("unknown message level '{other}'")),
        }
    }
}

/// Numeric status codes for server events and protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 100: a client connected.
    Connected,
    /// 101: a request is being dispatched to its handler.
    Dispatching,
    /// 196: a network error on an established connection.
    NetworkError,
    /// 197: the session is ending (timeout, one-shot done, read error).
    SessionEnd,
    /// 198: the client closed the connection.
    Disconnected,
    /// 199: the listener is closing because Quit was called.
    ListenerClosed,
    /// 200: a reply was sent.
    ReplySent,
    /// 400: unknown command word.
    BadCommand,
    /// 401: empty request.
    NilRequest,
    /// 402: request exceeded the configured length limit.
    ReqLenExceeded,
    /// 500: the handler returned an error.
    RequestFailed,
    /// 501: internal server error.
    InternalError,
    /// 599: accept on the listener failed outside of Quit.
    ListenerFailed,
}

impl Status {
    /// The numeric code for this status.
    pub const fn code(self) -> u16 {
        match self {
            Status::Connected => 100,
            Status::Dispatching => 101,
            Status::NetworkError => 196,
            Status::SessionEnd => 197,
            Status::Disconnected => 198,
            Status::ListenerClosed => 199,
            Status::ReplySent => 200,
            Status::BadCommand => 400,
            Status::NilRequest => 401,
            Status::ReqLenExceeded => 402,
            Status::RequestFailed => 500,
            Status::InternalError => 501,
            Status::ListenerFailed => 599,
        }
    }

    /// The canonical event description.
    pub const fn text(self) -> &'static str {
        match self {
            Status::Connected => "client connected",
            Status::Dispatching => "dispatching",
            Status::NetworkError => "network error",
            Status::SessionEnd => "ending session",
            Status::Disconnected => "client disconnected",
            Status::ListenerClosed => "closing listener socket",
            Status::ReplySent => "reply sent",
            Status::BadCommand => "bad command",
            Status::NilRequest => "nil request",
            Status::ReqLenExceeded => "request over limit",
            Status::RequestFailed => "request failed",
            Status::InternalError => "internal error",
            Status::ListenerFailed => "read from listener socket failed",
        }
    }

    /// The notification level this status is reported at.
    pub const fn level(self) -> Level {
        match self {
            Status::Connected
            | Status::NetworkError
            | Status::SessionEnd
            | Status::Disconnected => Level::Conn,
            Status::RequestFailed => Level::Error,
            Status::ListenerFailed => Level::Fatal,
            _ => Level::All,
        }
    }

    /// Look up a status by numeric code.
    pub fn from_code(code: u16) -> Option<Status> {
        Some(match code {
            100 => Status::Connected,
            101 => Status::Dispatching,
            196 => Status::NetworkError,
            197 => Status::SessionEnd,
            198 => Status::Disconnected,
            199 => Status::ListenerClosed,
            200 => Status::ReplySent,
            400 => Status::BadCommand,
            401 => Status::NilRequest,
            402 => Status::ReqLenExceeded,
            500 => Status::RequestFailed,
            501 => Status::InternalError,
            599 => Status::ListenerFailed,
            _ => return None,
        })
    }

    /// True if this status is sent to clients as a wire sentinel.
    pub const fn has_sentinel(self) -> bool {
        matches!(
            self,
            Status::BadCommand
                | Status::NilRequest
                | Status::ReqLenExceeded
                | Status::RequestFailed
                | Status::InternalError
        )
    }

    /// The 11-byte wire sentinel, for statuses that have one.
    pub fn sentinel(self) -> Option<[u8; SENTINEL_LEN]> {
        if !self.has_sentinel() {
            return None;
        }
        let code = self.code();
        let mut buf = [0u8; SENTINEL_LEN];
        buf[..8].copy_from_slice(SENTINEL_TAG);
        buf[8] = b'0' + (code / 100) as u8;
        buf[9] = b'0' + (code / 10 % 10) as u8;
        buf[10] = b'0' + (code % 10) as u8;
        Some(buf)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.text())
    }
}

/// Decode a reply frame as a wire sentinel.
///
/// Returns `Some` only for an exactly-11-byte frame carrying the tag, three
/// ASCII digits, and a code that is actually transmitted on the wire.
/// Anything else is an ordinary reply payload.
pub fn parse_sentinel(frame: &[u8]) -> Option<Status> {
    if frame.len() != SENTINEL_LEN || !frame.starts_with(SENTINEL_TAG) {
        return None;
    }
    let digits = &frame[8..];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let code = digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    Status::from_code(code).filter(|s| s.has_sentinel())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(Level::All < Level::Conn);
        assert!(Level::Conn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn level_from_str() {
        assert_eq!("conn".parse::<Level>().unwrap(), Level::Conn);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn sentinel_codes() {
        // Exactly the client-visible error codes carry a sentinel.
        for code in [400u16, 401, 402, 500, 501] {
            let status = Status::from_code(code).unwrap();
            let sentinel = status.sentinel().unwrap();
            assert_eq!(sentinel.len(), SENTINEL_LEN);
            assert!(sentinel.starts_with(SENTINEL_TAG));
            assert_eq!(
                std::str::from_utf8(&sentinel[8..]).unwrap(),
                format!("{code:03}")
            );
        }
        for code in [100u16, 101, 196, 197, 198, 199, 200, 599] {
            assert!(Status::from_code(code).unwrap().sentinel().is_none());
        }
    }

    #[test]
    fn sentinel_round_trip() {
        assert_eq!(parse_sentinel(b"PERRPERR400"), Some(Status::BadCommand));
        assert_eq!(parse_sentinel(b"PERRPERR500"), Some(Status::RequestFailed));
    }

    #[test]
    fn parse_rejects_non_sentinels() {
        // Wrong length, wrong tag, non-digits, and codes that never go on
        // the wire must all read as ordinary payloads.
        assert_eq!(parse_sentinel(b"PERRPERR40"), None);
        assert_eq!(parse_sentinel(b"PERRPERR4000"), None);
        assert_eq!(parse_sentinel(b"XERRPERR400"), None);
        assert_eq!(parse_sentinel(b"PERRPERR4x0"), None);
        assert_eq!(parse_sentinel(b"PERRPERR200"), None);
        assert_eq!(parse_sentinel(b"hello world"), None);
    }

    #[test]
    fn from_code_unknown() {
        assert_eq!(Status::from_code(404), None);
        assert_eq!(Status::from_code(0), None);
    }

    #[test]
    fn levels_match_taxonomy() {
        assert_eq!(Status::Connected.level(), Level::Conn);
        assert_eq!(Status::Dispatching.level(), Level::All);
        assert_eq!(Status::RequestFailed.level(), Level::Error);
        assert_eq!(Status::ListenerFailed.level(), Level::Fatal);
        assert_eq!(Status::ListenerClosed.level(), Level::All);
    }
}
