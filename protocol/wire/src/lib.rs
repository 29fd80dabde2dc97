//! Wire protocol for the corbel request/response framework.
//!
//! This crate carries everything both sides of the wire must agree on:
//!
//! - [`framing`]: the two framing disciplines (length-prefixed and
//!   delimiter-terminated) as a per-connection [`Codec`].
//! - [`status`]: the numeric status taxonomy, notification levels, and the
//!   11-byte `PERRPERRddd` error sentinel sent to clients.
//! - [`tokens`]: the quoting-aware splitter used to pull the command word
//!   and arguments out of a request payload.
//!
//! # Example
//!
//! ```
//! use corbel_protocol::{Codec, Status};
//!
//! let mut wire = Vec::new();
//! Codec::length_prefixed().write_frame(&mut wire, b"echo hi").unwrap();
//! assert_eq!(&wire[..4], &7u32.to_be_bytes());
//!
//! let sentinel = Status::BadCommand.sentinel().unwrap();
//! assert_eq!(&sentinel, b"PERRPERR400");
//! ```

pub mod framing;
pub mod status;
pub mod tokens;

pub use framing::{Codec, FrameError};
pub use status::{Level, Status};
