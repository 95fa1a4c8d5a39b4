//! Unix-specific IPC: Unix domain sockets and the fd plumbing behind the
//! portable pipe and local socket types.

pub(crate) mod c_wrappers;
mod fdops;
pub(crate) mod local_socket;
pub mod udsocket;
pub(crate) mod unnamed_pipe;

pub(crate) use fdops::FdOps;
