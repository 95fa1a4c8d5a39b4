//! Tokio-based unnamed pipes (Unix only).

use std::fs::File;
use std::io;
use std::os::unix::io::{AsFd, BorrowedFd};

use ::tokio::net::unix::pipe;

use super::imp;

/// Creates a pipe registered with the current Tokio runtime, returning its
/// sending end, then its receiving end.
pub fn pipe() -> io::Result<(Sender, Recver)> {
    let (writer, reader) = imp::pipe()?;
    let sender = pipe::Sender::from_file(File::from(writer.0))?;
    let recver = pipe::Receiver::from_file(File::from(reader.0))?;
    Ok((Sender(sender), Recver(recver)))
}

/// The writing end of a Tokio unnamed pipe.
#[derive(Debug)]
pub struct Sender(pipe::Sender);

impl AsFd for Sender {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

forward_tokio_write!(Sender);

/// The reading end of a Tokio unnamed pipe.
#[derive(Debug)]
pub struct Recver(pipe::Receiver);

impl AsFd for Recver {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

forward_tokio_read!(Recver);
