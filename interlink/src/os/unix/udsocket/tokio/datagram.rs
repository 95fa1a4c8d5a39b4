use std::fmt::{self, Debug, Formatter};
use std::future::poll_fn;
use std::io::{self, IoSliceMut};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::net::UnixDatagram as StdUnixDatagram;
use std::task::{ready, Context, Poll};

use ::tokio::io::{Interest, ReadBuf};
use ::tokio::net::UnixDatagram as TokioUnixDatagram;

use super::super::cmsg::CmsgBuffer;
use super::super::{
    ancwrap, PathDropGuard, SockAddr, ToUdSocketPath, UdDatagram as SyncUdDatagram, UdSocketPath,
};
use crate::os::unix::c_wrappers;

/// A Tokio-based Unix domain datagram socket.
pub struct UdDatagram {
    inner: TokioUnixDatagram,
    drop_guard: PathDropGuard,
}

impl UdDatagram {
    pub fn unbound() -> io::Result<Self> {
        Self::try_from(SyncUdDatagram::unbound()?)
    }

    pub fn bound<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        Self::try_from(SyncUdDatagram::bound(path)?)
    }

    pub fn bound_with_drop_guard<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        Self::try_from(SyncUdDatagram::bound_with_drop_guard(path)?)
    }

    /// A pair of connected, unnamed sockets.
    pub fn pair() -> io::Result<(Self, Self)> {
        let (a, b) = SyncUdDatagram::pair()?;
        Ok((Self::try_from(a)?, Self::try_from(b)?))
    }

    pub fn set_destination<'a>(&self, path: impl ToUdSocketPath<'a>) -> io::Result<()> {
        let path = path.to_socket_path()?;
        let addr = path.to_sockaddr()?;
        c_wrappers::connect(self.inner.as_fd(), &addr)
    }

    /// Receives one datagram into the unfilled part of `buf`.
    pub async fn recv(&self, buf: &mut ReadBuf<'_>) -> io::Result<()> {
        poll_fn(|cx| self.poll_recv(cx, buf)).await
    }

    /// [`recv`](Self::recv) for a plain byte slice, returning the length.
    pub async fn recv_stdbuf(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.recv(buf).await
    }

    /// Receives one datagram and the address it was sent from.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, UdSocketPath<'static>)> {
        self.inner
            .async_io(Interest::READABLE, || {
                let mut addr = SockAddr::empty();
                let mut abuf = CmsgBuffer::new();
                let success = ancwrap::recvmsg(
                    self.inner.as_fd(),
                    &mut [IoSliceMut::new(&mut *buf)],
                    &mut abuf,
                    Some(&mut addr),
                )?;
                Ok((success.main, UdSocketPath::from_sockaddr(&addr)))
            })
            .await
    }

    /// Waits until a datagram can be received.
    pub async fn recv_ready(&self) -> io::Result<()> {
        self.inner.readable().await
    }

    /// Sends to the destination set by [`set_destination`](Self::set_destination).
    pub async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.send(buf).await
    }

    pub async fn send_to<'a>(
        &self,
        buf: &[u8],
        path: impl ToUdSocketPath<'a>,
    ) -> io::Result<usize> {
        let path = path.to_socket_path()?;
        let addr = path.to_sockaddr()?;
        self.inner
            .async_io(Interest::WRITABLE, || {
                ancwrap::sendto(self.inner.as_fd(), buf, &addr)
            })
            .await
    }

    /// Waits until a datagram can be sent.
    pub async fn send_ready(&self) -> io::Result<()> {
        self.inner.writable().await
    }

    pub fn poll_recv(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        self.inner.poll_recv(cx, buf)
    }

    /// [`poll_recv`](Self::poll_recv) for a plain byte slice, returning the
    /// length.
    pub fn poll_recv_stdbuf(
        &self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            ready!(self.inner.poll_recv_ready(cx))?;
            match self.inner.try_recv(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                result => return Poll::Ready(result),
            }
        }
    }

    pub fn poll_send(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.inner.poll_send(cx, buf)
    }

    /// Polling form of [`send_to`](Self::send_to). Takes the path by
    /// reference since it may be called repeatedly for the same datagram.
    pub fn poll_send_to(
        &self,
        cx: &mut Context<'_>,
        buf: &[u8],
        path: &UdSocketPath<'_>,
    ) -> Poll<io::Result<usize>> {
        let addr = path.to_sockaddr()?;
        loop {
            ready!(self.inner.poll_send_ready(cx))?;
            let sent = self.inner.try_io(Interest::WRITABLE, || {
                ancwrap::sendto(self.inner.as_fd(), buf, &addr)
            });
            match sent {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                result => return Poll::Ready(result),
            }
        }
    }

    pub fn local_path(&self) -> io::Result<UdSocketPath<'static>> {
        let addr = c_wrappers::local_addr(self.inner.as_fd())?;
        Ok(UdSocketPath::from_sockaddr(&addr))
    }
}

/// Registers a synchronous socket with the current runtime, taking over its
/// drop guard.
impl TryFrom<SyncUdDatagram> for UdDatagram {
    type Error = io::Error;
    fn try_from(sync: SyncUdDatagram) -> io::Result<Self> {
        sync.set_nonblocking(true)?;
        let (fd, drop_guard) = sync.into_parts();
        let inner = TokioUnixDatagram::from_std(StdUnixDatagram::from(fd.0))?;
        Ok(Self { inner, drop_guard })
    }
}

/// Takes over a datagram socket; must be called inside a runtime. The result
/// has no drop guard.
impl TryFrom<OwnedFd> for UdDatagram {
    type Error = io::Error;
    fn try_from(fd: OwnedFd) -> io::Result<Self> {
        Self::try_from(SyncUdDatagram::from(fd))
    }
}

/// Deregisters from the runtime. The descriptor comes back in blocking mode
/// and any socket file is left in place.
impl TryFrom<UdDatagram> for OwnedFd {
    type Error = io::Error;
    fn try_from(x: UdDatagram) -> io::Result<Self> {
        let UdDatagram {
            inner,
            mut drop_guard,
        } = x;
        let std = inner.into_std()?;
        drop_guard.disarm();
        std.set_nonblocking(false)?;
        Ok(OwnedFd::from(std))
    }
}

impl Debug for UdDatagram {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdDatagram")
            .field("fd", &self.inner.as_raw_fd())
            .field("has_drop_guard", &self.drop_guard.enabled())
            .finish()
    }
}

impl AsFd for UdDatagram {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl AsRawFd for UdDatagram {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[::tokio::test]
    async fn pair_exchanges_datagrams() {
        let (a, b) = UdDatagram::pair().unwrap();
        a.send(b"one").await.unwrap();
        let mut storage = [0; 16];
        let mut buf = ReadBuf::new(&mut storage);
        b.recv(&mut buf).await.unwrap();
        assert_eq!(buf.filled(), b"one");
    }

    #[::tokio::test]
    async fn recv_from_names_sender() {
        let dir = tempfile::tempdir().unwrap();
        let server_path = dir.path().join("server.sock");
        let client_path = dir.path().join("client.sock");
        let server = UdDatagram::bound_with_drop_guard(server_path.as_path()).unwrap();
        let client = UdDatagram::bound_with_drop_guard(client_path.as_path()).unwrap();

        client.send_ready().await.unwrap();
        client.send_to(b"hey", server_path.as_path()).await.unwrap();
        server.recv_ready().await.unwrap();
        let mut buf = [0; 8];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hey");
        assert_eq!(from.file_path(), Some(client_path.as_path()));

        server.send_to(b"ack", from).await.unwrap();
        assert_eq!(client.recv_stdbuf(&mut buf).await.unwrap(), 3);
    }

    #[::tokio::test]
    async fn poll_methods_drive_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let server_path = dir.path().join("poll-server.sock");
        let server = UdDatagram::bound_with_drop_guard(server_path.as_path()).unwrap();
        let client = UdDatagram::unbound().unwrap();
        let target = server_path.as_path().to_socket_path().unwrap();

        let sent = poll_fn(|cx| client.poll_send_to(cx, b"polled", &target))
            .await
            .unwrap();
        assert_eq!(sent, 6);

        let mut buf = [0; 16];
        let len = poll_fn(|cx| server.poll_recv_stdbuf(cx, &mut buf))
            .await
            .unwrap();
        assert_eq!(&buf[..len], b"polled");
    }

    #[::tokio::test]
    async fn poll_send_to_rejects_bad_path() {
        let client = UdDatagram::unbound().unwrap();
        let err = poll_fn(|cx| client.poll_send_to(cx, b"x", &UdSocketPath::Unnamed))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[::tokio::test]
    async fn owned_fd_round_trip() {
        let (a, b) = UdDatagram::pair().unwrap();
        let fd = OwnedFd::try_from(a).unwrap();
        let a = UdDatagram::try_from(fd).unwrap();
        a.send(b"again").await.unwrap();
        let mut buf = [0; 8];
        assert_eq!(b.recv_stdbuf(&mut buf).await.unwrap(), 5);
    }
}
