//! Tokio-based local sockets. Must be used inside a Tokio runtime with I/O
//! (and on Windows, time) enabled.
//!
//! # Example
//! ```no_run
//! use interlink::local_socket::tokio::{LocalSocketListener, LocalSocketStream};
//! use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
//!
//! # async fn run() -> std::io::Result<()> {
//! let listener = LocalSocketListener::bind("@example.sock")?;
//! tokio::spawn(async move {
//!     while let Ok(conn) = listener.accept().await {
//!         tokio::spawn(async move {
//!             let (read, mut write) = conn.split();
//!             let mut line = String::new();
//!             if BufReader::new(read).read_line(&mut line).await.is_ok() {
//!                 let _ = write.write_all(line.as_bytes()).await;
//!             }
//!         });
//!     }
//! });
//!
//! let mut stream = LocalSocketStream::connect("@example.sock").await?;
//! stream.write_all(b"hello\n").await?;
//! # Ok(())
//! # }
//! ```

use std::fmt::{self, Debug, Formatter};
use std::io;

use super::imp::tokio as imp;
#[cfg(unix)]
use super::imp::peer_pid;
use super::{ListenerOptions, ToLocalSocketName};
use crate::ReuniteError;

/// A Tokio-based local socket server.
pub struct LocalSocketListener(imp::ListenerImpl);

impl LocalSocketListener {
    pub fn bind<'a>(name: impl ToLocalSocketName<'a>) -> io::Result<Self> {
        Self::bind_with_options(ListenerOptions::new().name(name.to_local_socket_name()?))
    }

    /// The `nonblocking` option is ignored.
    pub fn bind_with_options(options: ListenerOptions<'_>) -> io::Result<Self> {
        imp::bind(&options).map(Self)
    }

    pub async fn accept(&self) -> io::Result<LocalSocketStream> {
        self.0.accept().await.map(LocalSocketStream)
    }
}

impl Debug for LocalSocketListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

/// A Tokio-based local socket connection.
pub struct LocalSocketStream(imp::StreamImpl);

impl LocalSocketStream {
    /// Fails with [`NotFound`](io::ErrorKind::NotFound) or
    /// [`ConnectionRefused`](io::ErrorKind::ConnectionRefused) when nobody
    /// listens on `name`.
    pub async fn connect<'a>(name: impl ToLocalSocketName<'a>) -> io::Result<Self> {
        let name = name.to_local_socket_name()?;
        imp::connect(&name).await.map(Self)
    }

    /// Splits into halves that can be moved to different tasks.
    pub fn split(self) -> (ReadHalf, WriteHalf) {
        let (read, write) = self.0.into_split();
        (ReadHalf(read), WriteHalf(write))
    }

    /// Puts halves from [`split`](Self::split) back together.
    pub fn reunite(
        read: ReadHalf,
        write: WriteHalf,
    ) -> Result<Self, ReuniteError<ReadHalf, WriteHalf>> {
        imp::StreamImpl::reunite(read.0, write.0)
            .map(Self)
            .map_err(|e| e.convert_halves(ReadHalf, WriteHalf))
    }

    /// See [`LocalSocketStream::peer_pid`](super::LocalSocketStream::peer_pid).
    pub fn peer_pid(&self) -> io::Result<u32> {
        #[cfg(unix)]
        {
            peer_pid(self.0.peer_credentials()?)
        }
        #[cfg(windows)]
        {
            self.0.peer_process_id()
        }
    }
}

impl Debug for LocalSocketStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

forward_tokio_read!(LocalSocketStream);
forward_tokio_write!(LocalSocketStream);

/// Receiving half of a [`LocalSocketStream`].
pub struct ReadHalf(imp::ReadHalfImpl);

impl Debug for ReadHalf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("local_socket::ReadHalf").field(&self.0).finish()
    }
}

forward_tokio_read!(ReadHalf);

/// Sending half of a [`LocalSocketStream`].
pub struct WriteHalf(imp::WriteHalfImpl);

impl Debug for WriteHalf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("local_socket::WriteHalf").field(&self.0).finish()
    }
}

forward_tokio_write!(WriteHalf);

#[cfg(unix)]
forward_tokio_fd!(LocalSocketListener);
#[cfg(unix)]
forward_tokio_fd!(LocalSocketStream);

#[cfg(windows)]
impl std::os::windows::io::AsHandle for LocalSocketStream {
    #[inline]
    fn as_handle(&self) -> std::os::windows::io::BorrowedHandle<'_> {
        self.0.as_handle()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::io::{AsRawFd, OwnedFd};
    use ::tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[::tokio::test]
    async fn stream_survives_owned_fd_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokio-round-trip.sock");
        let listener = LocalSocketListener::bind(path.as_path()).unwrap();
        let (client, server) = ::tokio::join!(
            LocalSocketStream::connect(path.as_path()),
            listener.accept()
        );
        let mut server = server.unwrap();

        let client = client.unwrap();
        let raw = client.as_raw_fd();
        let fd = OwnedFd::try_from(client).unwrap();
        assert_eq!(fd.as_raw_fd(), raw);
        let mut client = LocalSocketStream::try_from(fd).unwrap();

        client.write_all(b"still here").await.unwrap();
        let mut buf = [0; 10];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"still here");
    }

    #[::tokio::test]
    async fn listener_survives_owned_fd_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokio-listener.sock");
        let listener = LocalSocketListener::bind(path.as_path()).unwrap();
        let fd = OwnedFd::try_from(listener).unwrap();
        assert!(path.exists());

        let listener = LocalSocketListener::try_from(fd).unwrap();
        let (client, server) = ::tokio::join!(
            LocalSocketStream::connect(path.as_path()),
            listener.accept()
        );
        client.unwrap();
        server.unwrap();
    }
}
