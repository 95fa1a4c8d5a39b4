//! Error types specific to this crate.
//!
//! Everything that talks to the OS returns [`std::io::Result`]. The types here
//! describe failures detected before a system call is made, and convert into
//! [`io::Error`] so they compose with the rest of the API.

use std::fmt::Debug;
use std::io;

use thiserror::Error;

/// A socket or pipe name was rejected before reaching the OS.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name contains an interior nul byte")]
    InteriorNul,
    #[error("name is {len} bytes long, the platform limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("namespaced names are not supported on this platform")]
    NamespaceUnsupported,
    #[error("filesystem paths cannot be used as names on this platform")]
    PathsUnsupported,
}

impl NameError {
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Empty | Self::InteriorNul | Self::TooLong { .. } => io::ErrorKind::InvalidInput,
            Self::NamespaceUnsupported | Self::PathsUnsupported => io::ErrorKind::Unsupported,
        }
    }
}

impl From<NameError> for io::Error {
    fn from(err: NameError) -> Self {
        io::Error::new(err.kind(), err)
    }
}

/// Two stream halves that did not come from the same stream were passed to a
/// `reunite` function. Both halves are handed back unchanged.
#[derive(Error)]
#[error("tried to reunite halves of different streams")]
pub struct ReuniteError<R, W> {
    pub read_half: R,
    pub write_half: W,
}

impl<R, W> Debug for ReuniteError<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReuniteError").finish_non_exhaustive()
    }
}

impl<R, W> ReuniteError<R, W> {
    /// Maps both halves through the given closures.
    pub fn convert_halves<NR, NW>(
        self,
        rh: impl FnOnce(R) -> NR,
        wh: impl FnOnce(W) -> NW,
    ) -> ReuniteError<NR, NW> {
        ReuniteError {
            read_half: rh(self.read_half),
            write_half: wh(self.write_half),
        }
    }
}
