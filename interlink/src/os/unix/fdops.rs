use std::fmt::{self, Debug, Formatter};
use std::io::{self, IoSlice, IoSliceMut, Read, Write};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

use libc::c_int;

use crate::TryClone;

/// An owned file descriptor with `read`/`write` on shared references.
///
/// Sockets and pipes tolerate concurrent reads and writes from several
/// threads, so the I/O traits are implemented for `&FdOps` as well.
pub(crate) struct FdOps(pub(crate) OwnedFd);

impl FdOps {
    #[inline]
    pub(crate) fn as_raw(&self) -> c_int {
        self.0.as_raw_fd()
    }
}

fn iov_count(len: usize) -> c_int {
    len.min(c_int::MAX as usize) as c_int
}

fn cvt(ret: isize) -> io::Result<usize> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

impl Read for &FdOps {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let ret = unsafe { libc::read(self.as_raw(), buf.as_mut_ptr().cast(), buf.len()) };
        cvt(ret)
    }
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        // IoSliceMut is guaranteed to be ABI-compatible with iovec on Unix
        let ret = unsafe {
            libc::readv(
                self.as_raw(),
                bufs.as_ptr().cast::<libc::iovec>(),
                iov_count(bufs.len()),
            )
        };
        cvt(ret)
    }
}

impl Write for &FdOps {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let ret = unsafe { libc::write(self.as_raw(), buf.as_ptr().cast(), buf.len()) };
        cvt(ret)
    }
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let ret = unsafe {
            libc::writev(
                self.as_raw(),
                bufs.as_ptr().cast::<libc::iovec>(),
                iov_count(bufs.len()),
            )
        };
        cvt(ret)
    }
    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for FdOps {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&*self).read_vectored(bufs)
    }
}

impl Write for FdOps {
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

impl TryClone for FdOps {
    fn try_clone(&self) -> io::Result<Self> {
        // F_DUPFD_CLOEXEC under the hood
        Ok(Self(self.0.try_clone()?))
    }
}

impl Debug for FdOps {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FdOps").field(&self.as_raw()).finish()
    }
}

impl AsFd for FdOps {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl From<FdOps> for OwnedFd {
    #[inline]
    fn from(x: FdOps) -> Self {
        x.0
    }
}

impl From<OwnedFd> for FdOps {
    #[inline]
    fn from(fd: OwnedFd) -> Self {
        Self(fd)
    }
}
