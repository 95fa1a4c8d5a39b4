//! Windows-specific IPC: named pipes and the handle plumbing behind the
//! portable pipe and local socket types.

pub(crate) mod c_wrappers;
mod file_handle;
pub(crate) mod local_socket;
pub mod named_pipe;
pub(crate) mod unnamed_pipe;

pub(crate) use file_handle::FileHandle;
