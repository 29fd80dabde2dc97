//! Corbel server: an embeddable request/response service over stream sockets.
//!
//! A host program binds a [`Server`] to a Unix, TCP, or TLS listener,
//! registers named handler functions, and then watches the notification
//! channel while remote clients dispatch requests. Each connection gets its
//! own worker thread running a framed read/dispatch/write loop; shutdown is
//! a single [`Server::quit`] call that drains every worker before the
//! notification channel closes.
//!
//! # Example
//!
//! ```no_run
//! use corbel_server::{Server, ServerConfig};
//!
//! let mut server = Server::bind_tcp(ServerConfig::new("127.0.0.1:60606"))?;
//! server.register("echo", "blob", |args| Ok(args[0].clone()))?;
//!
//! while let Ok(event) = server.events().recv() {
//!     println!("{event}");
//! }
//! server.quit();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bus;
pub mod config;
pub mod dispatch;
mod listener;
pub mod logging;
pub mod metrics;
mod server;
pub mod signal;
mod worker;

pub use bus::Event;
pub use config::{FramingMode, ServerConfig};
pub use corbel_protocol::{Level, Status};
pub use dispatch::{ArgMode, HandlerError, RegisterError};
pub use server::Server;
