//! Integration test modules

#[cfg(unix)]
mod ancillary;
mod local_socket;
mod no_server;
#[cfg(feature = "tokio")]
mod tokio_local_socket;
#[cfg(unix)]
mod udsocket;
mod unnamed_pipe;
