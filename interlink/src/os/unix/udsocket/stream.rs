use std::fmt::{self, Debug, Formatter};
use std::io::{self, IoSlice, IoSliceMut, Read, Write};
use std::net::Shutdown;
use std::os::unix::io::AsFd;

use libc::SOCK_STREAM;
use tracing::debug;

use super::cmsg::{CmsgBuffer, CmsgRef};
use super::credentials::{self, PeerCredentials};
use super::{ancwrap, ReadAncillarySuccess, ToUdSocketPath, UdSocketPath};
use crate::os::unix::{c_wrappers, FdOps};

/// A connected Unix domain stream socket.
///
/// Obtained from [`UdStream::connect`], [`UdStream::pair`] or
/// [`UdStreamListener::accept`](super::UdStreamListener::accept). Both
/// `UdStream` and `&UdStream` implement [`Read`] and [`Write`], so one
/// connection can be shared between a reading and a writing thread.
pub struct UdStream(pub(crate) FdOps);

impl UdStream {
    /// Connects to the socket at `path`, blocking until the server accepts or
    /// refuses.
    ///
    /// Fails with [`NotFound`](io::ErrorKind::NotFound) if no file exists at
    /// the path and [`ConnectionRefused`](io::ErrorKind::ConnectionRefused) if
    /// nothing listens on it.
    pub fn connect<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        let path = path.to_socket_path()?;
        let addr = path.to_sockaddr()?;
        let fd = c_wrappers::create_uds(SOCK_STREAM, false)?;
        c_wrappers::connect(fd.as_fd(), &addr)?;
        debug!(%path, fd = fd.as_raw(), "Connected Unix stream");
        Ok(Self(fd))
    }

    /// Creates a pair of connected, unnamed sockets.
    pub fn pair() -> io::Result<(Self, Self)> {
        let (a, b) = c_wrappers::socketpair(SOCK_STREAM)?;
        Ok((Self(a), Self(b)))
    }

    /// Receives bytes and control messages. On success `abuf` holds what the
    /// kernel delivered; check [`CmsgBuffer::truncated`] if the control buffer
    /// may have been too small.
    pub fn recv_ancillary(
        &self,
        buf: &mut [u8],
        abuf: &mut CmsgBuffer,
    ) -> io::Result<ReadAncillarySuccess> {
        self.recv_ancillary_vectored(&mut [IoSliceMut::new(buf)], abuf)
    }

    pub fn recv_ancillary_vectored(
        &self,
        bufs: &mut [IoSliceMut<'_>],
        abuf: &mut CmsgBuffer,
    ) -> io::Result<ReadAncillarySuccess> {
        ancwrap::recvmsg(self.as_fd(), bufs, abuf, None)
    }

    /// Sends bytes together with control messages.
    ///
    /// Stream sockets need at least one byte of payload for the control
    /// messages to be delivered.
    pub fn send_ancillary(&self, buf: &[u8], abuf: CmsgRef<'_>) -> io::Result<usize> {
        self.send_ancillary_vectored(&[IoSlice::new(buf)], abuf)
    }

    pub fn send_ancillary_vectored(
        &self,
        bufs: &[IoSlice<'_>],
        abuf: CmsgRef<'_>,
    ) -> io::Result<usize> {
        ancwrap::sendmsg(self.as_fd(), bufs, abuf, None)
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        c_wrappers::shutdown(self.as_fd(), how)
    }

    /// In nonblocking mode reads and writes that cannot make progress fail
    /// with [`WouldBlock`](io::ErrorKind::WouldBlock).
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        c_wrappers::set_nonblocking(self.as_fd(), nonblocking)
    }

    pub fn is_nonblocking(&self) -> io::Result<bool> {
        c_wrappers::get_nonblocking(self.as_fd())
    }

    /// Credentials of the peer as of when the connection was made.
    pub fn peer_credentials(&self) -> io::Result<PeerCredentials> {
        credentials::peer_credentials(self.as_fd())
    }

    /// Makes the kernel attach the sender's credentials to every received
    /// message as [`Ancillary::Credentials`](super::cmsg::ancillary::Ancillary::Credentials).
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn set_pass_credentials(&self, pass: bool) -> io::Result<()> {
        c_wrappers::set_bool_option(self.as_fd(), libc::SOL_SOCKET, libc::SO_PASSCRED, pass)
    }

    /// The address of the socket on the other end.
    pub fn peer_path(&self) -> io::Result<UdSocketPath<'static>> {
        let addr = c_wrappers::peer_addr(self.as_fd())?;
        Ok(UdSocketPath::from_sockaddr(&addr))
    }
}

impl Read for &UdStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.0).read(buf)
    }
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&self.0).read_vectored(bufs)
    }
}

impl Write for &UdStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&self.0).write(buf)
    }
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (&self.0).write_vectored(bufs)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for UdStream {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&*self).read_vectored(bufs)
    }
}

impl Write for UdStream {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }
    #[inline]
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (&*self).write_vectored(bufs)
    }
    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Debug for UdStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdStream").field("fd", &self.0.as_raw()).finish()
    }
}

forward_handle!(UdStream);
forward_try_clone!(UdStream);
