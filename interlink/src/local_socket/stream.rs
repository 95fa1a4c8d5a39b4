use std::fmt::{self, Debug, Formatter};
use std::io::{self, IoSlice, IoSliceMut, Read, Write};

use super::{imp, ToLocalSocketName};

/// A connection between a local socket client and server.
///
/// Both `LocalSocketStream` and `&LocalSocketStream` implement [`Read`] and
/// [`Write`].
pub struct LocalSocketStream(pub(crate) imp::StreamImpl);

impl LocalSocketStream {
    /// Connects to the server listening on `name`.
    ///
    /// Fails with [`NotFound`](io::ErrorKind::NotFound) or
    /// [`ConnectionRefused`](io::ErrorKind::ConnectionRefused) when nobody
    /// listens there.
    pub fn connect<'a>(name: impl ToLocalSocketName<'a>) -> io::Result<Self> {
        let name = name.to_local_socket_name()?;
        imp::connect(&name).map(Self)
    }

    /// Process ID of the other end. Available on Windows, Linux and
    /// Android; [`Unsupported`](io::ErrorKind::Unsupported) elsewhere.
    pub fn peer_pid(&self) -> io::Result<u32> {
        #[cfg(unix)]
        {
            imp::peer_pid(self.0.peer_credentials()?)
        }
        #[cfg(windows)]
        {
            self.0.peer_process_id()
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.0.set_nonblocking(nonblocking)
    }
}

impl Read for &LocalSocketStream {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.0).read(buf)
    }
    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&self.0).read_vectored(bufs)
    }
}

impl Write for &LocalSocketStream {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&self.0).write(buf)
    }
    #[inline]
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (&self.0).write_vectored(bufs)
    }
    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        (&self.0).flush()
    }
}

impl Read for LocalSocketStream {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&*self).read_vectored(bufs)
    }
}

impl Write for LocalSocketStream {
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
        (&*self).flush()
    }
}

impl Debug for LocalSocketStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

forward_handle!(LocalSocketStream);
forward_try_clone!(LocalSocketStream);
