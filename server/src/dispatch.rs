//! Dispatch table: request names mapped to handler functions.

use std::collections::HashMap;
use std::str::FromStr;

/// Error type handlers may return. Surfaced to the host in the 500 event;
/// the client sees only the wire sentinel.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A registered handler: argument tokens in, reply bytes out.
pub type Handler = Box<dyn Fn(&[Vec<u8>]) -> Result<Vec<u8>, HandlerError> + Send + Sync>;

/// How the argument payload is turned into handler arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgMode {
    /// Split the payload into whitespace/quote-delimited tokens.
    Argv,
    /// Pass the payload through as a single token.
    Blob,
}

impl FromStr for ArgMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "argv" => Ok(ArgMode::Argv),
            "blob" => Ok(ArgMode::Blob),
            _ => Err(()),
        }
    }
}

/// Registration failures.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    /// The name is already registered.
    #[error("handler '{0}' already exists")]
    DuplicateHandler(String),
    /// The argument mode string is not `argv` or `blob`.
    #[error("invalid argument mode '{0}'")]
    InvalidMode(String),
    /// The server has already been quit.
    #[error("server has shut down")]
    Terminated,
}

pub(crate) struct Entry {
    pub handler: Handler,
    pub mode: ArgMode,
}

/// Name → handler mapping plus the cached help string.
///
/// Registrations normally happen between construction and serving. The
/// table lives behind an `RwLock`, so registering after serving has begun
/// is safe but briefly blocks dispatch on every connection.
#[derive(Default)]
pub(crate) struct DispatchTable {
    entries: HashMap<Vec<u8>, Entry>,
    help: String,
}

impl DispatchTable {
    pub(crate) fn register(
        &mut self,
        name: &str,
        mode: &str,
        handler: Handler,
    ) -> Result<(), RegisterError> {
        let mode: ArgMode = mode
            .parse()
            .map_err(|()| RegisterError::InvalidMode(mode.to_string()))?;
        if self.entries.contains_key(name.as_bytes()) {
            return Err(RegisterError::DuplicateHandler(name.to_string()));
        }
        self.entries
            .insert(name.as_bytes().to_vec(), Entry { handler, mode });

        // Regenerate the help string: every registered name, sorted.
        let mut names: Vec<&[u8]> = self.entries.keys().map(Vec::as_slice).collect();
        names.sort_unstable();
        self.help = names
            .iter()
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(())
    }

    pub(crate) fn get(&self, name: &[u8]) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Space-joined list of registered names, sent to clients in delimited
    /// mode when a request cannot be dispatched.
    pub(crate) fn help(&self) -> &str {
        &self.help
    }
}
