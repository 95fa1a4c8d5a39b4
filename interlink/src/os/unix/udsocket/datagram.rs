use std::fmt::{self, Debug, Formatter};
use std::io::{self, IoSlice, IoSliceMut, Read};
use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};

use libc::SOCK_DGRAM;
use tracing::debug;

use super::cmsg::{CmsgBuffer, CmsgRef};
use super::{ancwrap, PathDropGuard, ReadAncillarySuccess, SockAddr, ToUdSocketPath, UdSocketPath};
use crate::os::unix::{c_wrappers, FdOps};
use crate::TryClone;

/// A Unix domain datagram socket.
///
/// Message boundaries are preserved: every `recv` returns at most one
/// datagram, and the part of a datagram that does not fit into the buffer is
/// discarded. Use [`peek_msg_size`](Self::peek_msg_size) (Linux) or the
/// [`ReliableRecvMsg`](crate::reliable_recv_msg::ReliableRecvMsg) trait to
/// avoid that.
pub struct UdDatagram {
    fd: FdOps,
    drop_guard: PathDropGuard,
}

impl UdDatagram {
    /// A socket with no address. It can send to explicit destinations but
    /// only receives replies if the platform autobinds it.
    pub fn unbound() -> io::Result<Self> {
        let fd = c_wrappers::create_uds(SOCK_DGRAM, false)?;
        Ok(Self {
            fd,
            drop_guard: PathDropGuard::dummy(),
        })
    }

    /// A socket bound to `path`. The socket file is left behind on drop.
    pub fn bound<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        let socket = Self::unbound()?;
        socket.bind(path)?;
        Ok(socket)
    }

    /// A socket bound to `path` that removes its socket file when dropped.
    pub fn bound_with_drop_guard<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        let mut socket = Self::unbound()?;
        socket.bind_with_drop_guard(path)?;
        Ok(socket)
    }

    /// A pair of connected, unnamed sockets.
    pub fn pair() -> io::Result<(Self, Self)> {
        let (a, b) = c_wrappers::socketpair(SOCK_DGRAM)?;
        Ok((Self::from(a.0), Self::from(b.0)))
    }

    /// Binds an unbound socket to `path`.
    pub fn bind<'a>(&self, path: impl ToUdSocketPath<'a>) -> io::Result<()> {
        let path = path.to_socket_path()?;
        self.bind_path(&path)
    }

    /// Binds an unbound socket to `path` and arms the drop guard, replacing
    /// any previous one without removing its file.
    pub fn bind_with_drop_guard<'a>(&mut self, path: impl ToUdSocketPath<'a>) -> io::Result<()> {
        let path = path.to_socket_path()?;
        self.bind_path(&path)?;
        self.drop_guard.disarm();
        self.drop_guard = PathDropGuard::new(&path);
        Ok(())
    }

    fn bind_path(&self, path: &UdSocketPath<'_>) -> io::Result<()> {
        let addr = path.to_sockaddr()?;
        c_wrappers::bind(self.fd.as_fd(), &addr)?;
        debug!(%path, fd = self.fd.as_raw(), "Bound Unix datagram socket");
        Ok(())
    }

    /// Sets the default destination for [`send`](Self::send) and restricts
    /// receiving to datagrams from that address.
    pub fn set_destination<'a>(&self, path: impl ToUdSocketPath<'a>) -> io::Result<()> {
        let path = path.to_socket_path()?;
        let addr = path.to_sockaddr()?;
        c_wrappers::connect(self.fd.as_fd(), &addr)
    }

    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.fd).read(buf)
    }

    pub fn recv_vectored(&self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&self.fd).read_vectored(bufs)
    }

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
        ancwrap::recvmsg(self.fd.as_fd(), bufs, abuf, None)
    }

    /// Receives a datagram and reports the address it came from.
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, UdSocketPath<'static>)> {
        let mut abuf = CmsgBuffer::new();
        let (success, path) = self.recv_from_ancillary(buf, &mut abuf)?;
        Ok((success.main, path))
    }

    pub fn recv_from_vectored(
        &self,
        bufs: &mut [IoSliceMut<'_>],
    ) -> io::Result<(usize, UdSocketPath<'static>)> {
        let mut abuf = CmsgBuffer::new();
        let (success, path) = self.recv_from_ancillary_vectored(bufs, &mut abuf)?;
        Ok((success.main, path))
    }

    pub fn recv_from_ancillary(
        &self,
        buf: &mut [u8],
        abuf: &mut CmsgBuffer,
    ) -> io::Result<(ReadAncillarySuccess, UdSocketPath<'static>)> {
        self.recv_from_ancillary_vectored(&mut [IoSliceMut::new(buf)], abuf)
    }

    pub fn recv_from_ancillary_vectored(
        &self,
        bufs: &mut [IoSliceMut<'_>],
        abuf: &mut CmsgBuffer,
    ) -> io::Result<(ReadAncillarySuccess, UdSocketPath<'static>)> {
        let mut addr = SockAddr::empty();
        let success = ancwrap::recvmsg(self.fd.as_fd(), bufs, abuf, Some(&mut addr))?;
        Ok((success, UdSocketPath::from_sockaddr(&addr)))
    }

    /// Size of the next datagram, without consuming it. Blocks until one
    /// arrives unless the socket is nonblocking.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn peek_msg_size(&self) -> io::Result<usize> {
        let mut byte = [0_u8; 1];
        let ret = unsafe {
            libc::recv(
                self.fd.as_raw(),
                byte.as_mut_ptr().cast(),
                byte.len(),
                libc::MSG_PEEK | libc::MSG_TRUNC,
            )
        };
        if ret == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }

    /// Receives one datagram and returns its full length, which exceeds
    /// `buf.len()` if the tail was cut off.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub(crate) fn recv_reporting_truncation(&self, buf: &mut [u8]) -> io::Result<usize> {
        let ret = unsafe {
            libc::recv(
                self.fd.as_raw(),
                buf.as_mut_ptr().cast(),
                buf.len(),
                libc::MSG_TRUNC,
            )
        };
        if ret == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }

    /// Sends a datagram to the destination set by
    /// [`set_destination`](Self::set_destination).
    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.send_vectored(&[IoSlice::new(buf)])
    }

    pub fn send_vectored(&self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        ancwrap::sendmsg(self.fd.as_fd(), bufs, CmsgRef::empty(), None)
    }

    /// Sends a datagram to `path`, regardless of any destination set.
    pub fn send_to<'a>(&self, buf: &[u8], path: impl ToUdSocketPath<'a>) -> io::Result<usize> {
        let path = path.to_socket_path()?;
        let addr = path.to_sockaddr()?;
        ancwrap::sendto(self.fd.as_fd(), buf, &addr)
    }

    pub fn send_ancillary(&self, buf: &[u8], abuf: CmsgRef<'_>) -> io::Result<usize> {
        self.send_ancillary_vectored(&[IoSlice::new(buf)], abuf)
    }

    pub fn send_ancillary_vectored(
        &self,
        bufs: &[IoSlice<'_>],
        abuf: CmsgRef<'_>,
    ) -> io::Result<usize> {
        ancwrap::sendmsg(self.fd.as_fd(), bufs, abuf, None)
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        c_wrappers::set_nonblocking(self.fd.as_fd(), nonblocking)
    }

    pub fn is_nonblocking(&self) -> io::Result<bool> {
        c_wrappers::get_nonblocking(self.fd.as_fd())
    }

    /// See [`UdStream::set_pass_credentials`](super::UdStream::set_pass_credentials).
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn set_pass_credentials(&self, pass: bool) -> io::Result<()> {
        c_wrappers::set_bool_option(self.fd.as_fd(), libc::SOL_SOCKET, libc::SO_PASSCRED, pass)
    }

    pub fn local_path(&self) -> io::Result<UdSocketPath<'static>> {
        let addr = c_wrappers::local_addr(self.fd.as_fd())?;
        Ok(UdSocketPath::from_sockaddr(&addr))
    }

    #[cfg(feature = "tokio")]
    pub(crate) fn into_parts(self) -> (FdOps, PathDropGuard) {
        (self.fd, self.drop_guard)
    }
}

impl Debug for UdDatagram {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdDatagram")
            .field("fd", &self.fd.as_raw())
            .field("has_drop_guard", &self.drop_guard.enabled())
            .finish()
    }
}

impl TryClone for UdDatagram {
    fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            fd: self.fd.try_clone()?,
            drop_guard: PathDropGuard::dummy(),
        })
    }
}

impl AsFd for UdDatagram {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl From<UdDatagram> for OwnedFd {
    fn from(mut x: UdDatagram) -> Self {
        x.drop_guard.disarm();
        x.fd.0
    }
}

impl From<OwnedFd> for UdDatagram {
    fn from(fd: OwnedFd) -> Self {
        Self {
            fd: FdOps(fd),
            drop_guard: PathDropGuard::dummy(),
        }
    }
}

derive_raw_fd!(UdDatagram);
