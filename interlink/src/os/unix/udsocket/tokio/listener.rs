use std::fmt::{self, Debug, Formatter};
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::net::UnixListener as StdUnixListener;

use ::tokio::net::UnixListener as TokioUnixListener;
use tracing::debug;

use super::super::{
    PathDropGuard, ToUdSocketPath, UdSocketPath, UdStreamListener as SyncUdStreamListener,
    UdStreamListenerOptions,
};
use super::UdStream;
use crate::os::unix::c_wrappers;

/// A Tokio-based Unix domain stream listener.
pub struct UdStreamListener {
    inner: TokioUnixListener,
    drop_guard: PathDropGuard,
}

impl UdStreamListener {
    pub fn bind<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        Self::bind_with_options(path, UdStreamListenerOptions::default())
    }

    /// Like [`bind`](Self::bind), and removes the socket file on drop.
    pub fn bind_with_drop_guard<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        Self::bind_with_options(
            path,
            UdStreamListenerOptions {
                drop_guard: true,
                ..UdStreamListenerOptions::default()
            },
        )
    }

    /// The `nonblocking` option is ignored: a Tokio listener always is.
    pub fn bind_with_options<'a>(
        path: impl ToUdSocketPath<'a>,
        options: UdStreamListenerOptions,
    ) -> io::Result<Self> {
        let sync = SyncUdStreamListener::bind_with_options(
            path,
            UdStreamListenerOptions {
                nonblocking: true,
                ..options
            },
        )?;
        Self::try_from(sync)
    }

    pub async fn accept(&self) -> io::Result<UdStream> {
        let (stream, _) = self.inner.accept().await?;
        debug!(fd = stream.as_raw_fd(), "Accepted Tokio Unix stream");
        Ok(UdStream(stream))
    }

    pub fn local_path(&self) -> io::Result<UdSocketPath<'static>> {
        let addr = c_wrappers::local_addr(self.inner.as_fd())?;
        Ok(UdSocketPath::from_sockaddr(&addr))
    }
}

/// Registers a synchronous listener with the current runtime, taking over
/// its drop guard.
impl TryFrom<SyncUdStreamListener> for UdStreamListener {
    type Error = io::Error;
    fn try_from(sync: SyncUdStreamListener) -> io::Result<Self> {
        sync.set_nonblocking(true)?;
        let (fd, drop_guard) = sync.into_parts();
        let inner = TokioUnixListener::from_std(StdUnixListener::from(fd.0))?;
        Ok(Self { inner, drop_guard })
    }
}

/// Takes over a listening socket; must be called inside a runtime. The
/// result has no drop guard.
impl TryFrom<OwnedFd> for UdStreamListener {
    type Error = io::Error;
    fn try_from(fd: OwnedFd) -> io::Result<Self> {
        Self::try_from(SyncUdStreamListener::from(fd))
    }
}

/// Deregisters from the runtime. The descriptor comes back in blocking mode
/// and the socket file is left in place.
impl TryFrom<UdStreamListener> for OwnedFd {
    type Error = io::Error;
    fn try_from(x: UdStreamListener) -> io::Result<Self> {
        let UdStreamListener {
            inner,
            mut drop_guard,
        } = x;
        let std = inner.into_std()?;
        drop_guard.disarm();
        std.set_nonblocking(false)?;
        Ok(OwnedFd::from(std))
    }
}

impl Debug for UdStreamListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdStreamListener")
            .field("fd", &self.inner.as_raw_fd())
            .field("has_drop_guard", &self.drop_guard.enabled())
            .finish()
    }
}

impl AsFd for UdStreamListener {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl AsRawFd for UdStreamListener {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[::tokio::test]
    async fn accept_and_echo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokio.sock");
        let listener = UdStreamListener::bind_with_drop_guard(path.as_path()).unwrap();

        let server = ::tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            let mut buf = [0; 5];
            conn.read_exact(&mut buf).await.unwrap();
            conn.write_all(&buf).await.unwrap();
            listener
        });

        let mut client = UdStream::connect(path.as_path()).await.unwrap();
        client.write_all(b"hello").await.unwrap();
        let mut buf = [0; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        drop(server.await.unwrap());
        assert!(!path.exists());
    }

    #[::tokio::test]
    async fn connect_without_listener_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = UdStream::connect(dir.path().join("nobody.sock"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
