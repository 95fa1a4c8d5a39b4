use std::fmt::{self, Debug, Formatter};
use std::io::{self, IoSlice, IoSliceMut};
use std::net::Shutdown;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream as StdUnixStream;

use ::tokio::io::Interest;
use ::tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use ::tokio::net::UnixStream as TokioUnixStream;
use libc::SOCK_STREAM;
use tracing::debug;

use super::super::cmsg::{CmsgBuffer, CmsgRef};
use super::super::credentials::{self, PeerCredentials};
use super::super::{ancwrap, ReadAncillarySuccess, ToUdSocketPath};
use crate::os::unix::c_wrappers;
use crate::os::unix::udsocket::UdStream as SyncUdStream;
use crate::ReuniteError;

/// A Tokio-based Unix domain stream socket.
pub struct UdStream(pub(super) TokioUnixStream);

impl UdStream {
    /// Connects to the socket at `path`. Unlike Tokio's own `UnixStream`,
    /// abstract namespace names are accepted everywhere they exist.
    pub async fn connect<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        let path = path.to_socket_path()?;
        let addr = path.to_sockaddr()?;
        let fd = c_wrappers::create_uds(SOCK_STREAM, true)?;
        match c_wrappers::connect(fd.as_fd(), &addr) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
            Err(e) => return Err(e),
        }
        let stream = TokioUnixStream::from_std(StdUnixStream::from(OwnedFd::from(fd)))?;
        stream.writable().await?;
        if let Some(e) = stream.take_error()? {
            return Err(e);
        }
        debug!(%path, fd = stream.as_raw_fd(), "Connected Tokio Unix stream");
        Ok(Self(stream))
    }

    /// A pair of connected, unnamed sockets.
    pub fn pair() -> io::Result<(Self, Self)> {
        let (a, b) = TokioUnixStream::pair()?;
        Ok((Self(a), Self(b)))
    }

    /// Splits into owned halves that can be moved to different tasks.
    pub fn into_split(self) -> (ReadHalf, WriteHalf) {
        let (r, w) = self.0.into_split();
        (ReadHalf(r), WriteHalf(w))
    }

    /// Puts two halves back together, handing them back if they came from
    /// different streams.
    pub fn reunite(
        read: ReadHalf,
        write: WriteHalf,
    ) -> Result<Self, ReuniteError<ReadHalf, WriteHalf>> {
        read.0.reunite(write.0).map(Self).map_err(|e| ReuniteError {
            read_half: ReadHalf(e.0),
            write_half: WriteHalf(e.1),
        })
    }

    pub fn peer_credentials(&self) -> io::Result<PeerCredentials> {
        credentials::peer_credentials(self.0.as_fd())
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        c_wrappers::shutdown(self.0.as_fd(), how)
    }

    /// Sends bytes with control messages once the socket is writable.
    pub async fn send_ancillary(&self, buf: &[u8], abuf: CmsgRef<'_>) -> io::Result<usize> {
        self.send_ancillary_vectored(&[IoSlice::new(buf)], abuf).await
    }

    pub async fn send_ancillary_vectored(
        &self,
        bufs: &[IoSlice<'_>],
        abuf: CmsgRef<'_>,
    ) -> io::Result<usize> {
        self.0
            .async_io(Interest::WRITABLE, || {
                ancwrap::sendmsg(self.0.as_fd(), bufs, abuf, None)
            })
            .await
    }

    /// Receives bytes and control messages once the socket is readable.
    pub async fn recv_ancillary(
        &self,
        buf: &mut [u8],
        abuf: &mut CmsgBuffer,
    ) -> io::Result<ReadAncillarySuccess> {
        self.0
            .async_io(Interest::READABLE, || {
                ancwrap::recvmsg(self.0.as_fd(), &mut [IoSliceMut::new(&mut *buf)], abuf, None)
            })
            .await
    }

    /// Back to a blocking [`UdStream`](SyncUdStream).
    pub fn into_sync(self) -> io::Result<SyncUdStream> {
        let std = self.0.into_std()?;
        std.set_nonblocking(false)?;
        Ok(SyncUdStream::from(OwnedFd::from(std)))
    }
}

/// Registers a synchronous stream with the current runtime.
impl TryFrom<SyncUdStream> for UdStream {
    type Error = io::Error;
    fn try_from(sync: SyncUdStream) -> io::Result<Self> {
        sync.set_nonblocking(true)?;
        let std = StdUnixStream::from(OwnedFd::from(sync));
        Ok(Self(TokioUnixStream::from_std(std)?))
    }
}

/// Takes over a connected stream socket; must be called inside a runtime.
impl TryFrom<OwnedFd> for UdStream {
    type Error = io::Error;
    fn try_from(fd: OwnedFd) -> io::Result<Self> {
        Self::try_from(SyncUdStream::from(fd))
    }
}

/// Deregisters from the runtime; the descriptor comes back in blocking mode.
impl TryFrom<UdStream> for OwnedFd {
    type Error = io::Error;
    fn try_from(x: UdStream) -> io::Result<Self> {
        x.into_sync().map(OwnedFd::from)
    }
}

impl Debug for UdStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdStream")
            .field("fd", &self.0.as_raw_fd())
            .finish()
    }
}

impl AsFd for UdStream {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl AsRawFd for UdStream {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

forward_tokio_read!(UdStream);
forward_tokio_write!(UdStream);

/// Receiving half of a [`UdStream`].
#[derive(Debug)]
pub struct ReadHalf(OwnedReadHalf);

impl ReadHalf {
    pub fn peer_credentials(&self) -> io::Result<PeerCredentials> {
        credentials::peer_credentials(self.0.as_ref().as_fd())
    }
}

forward_tokio_read!(ReadHalf);

/// Sending half of a [`UdStream`]. Dropping it shuts down the write
/// direction, so the peer sees end of file.
#[derive(Debug)]
pub struct WriteHalf(OwnedWriteHalf);

impl WriteHalf {
    pub fn peer_credentials(&self) -> io::Result<PeerCredentials> {
        credentials::peer_credentials(self.0.as_ref().as_fd())
    }
}

forward_tokio_write!(WriteHalf);
