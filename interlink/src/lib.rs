//! Local interprocess communication primitives.
//!
//! This crate covers the ways two processes on one machine can talk to each
//! other through the OS:
//!
//! - **`unnamed_pipe`**: anonymous one-directional pipes, handed to children
//!   by inheritance or sent over a socket.
//! - **`local_socket`**: portable named byte streams. Unix domain sockets on
//!   Unix, named pipes on Windows.
//! - **`os::unix::udsocket`**: the full Unix domain socket API, including
//!   datagrams and ancillary data (file descriptor passing, credentials).
//! - **`os::windows::named_pipe`**: byte-mode duplex named pipes.
//!
//! Enabling the `tokio` feature adds a `tokio` submodule next to each
//! synchronous API with the same types in async form.

#![allow(clippy::missing_errors_doc)] // Every fallible call here is an OS call returning io::Result
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod macros;

pub mod error;
pub mod local_socket;
pub mod os;
pub mod unnamed_pipe;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod reliable_recv_msg;

pub use error::{NameError, ReuniteError};

use std::io;

/// Fallible duplication of an OS-level handle.
///
/// The clone refers to the same underlying pipe or socket as the original;
/// reads and writes through either one share the same kernel buffers.
pub trait TryClone: Sized {
    fn try_clone(&self) -> io::Result<Self>;
}

mod sealed {
    pub trait Sealed {}
}
#[allow(unused_imports)]
pub(crate) use sealed::Sealed;
