//! Thin `io::Result` wrappers over the socket system calls.

use std::io;
use std::mem::size_of;
use std::net::Shutdown;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

use libc::{c_int, c_void, socklen_t, AF_UNIX};

use super::udsocket::SockAddr;
use super::FdOps;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
))]
const SOCK_CLOEXEC_SUPPORTED: bool = true;
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
const SOCK_CLOEXEC_SUPPORTED: bool = false;

pub(crate) fn cvt(ret: c_int) -> io::Result<c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Takes ownership of a freshly returned descriptor.
fn owned(fd: c_int) -> io::Result<OwnedFd> {
    let fd = cvt(fd)?;
    // SAFETY: the descriptor was just returned by the kernel and is not owned elsewhere
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
))]
fn socket_type_flags(nonblocking: bool) -> c_int {
    if nonblocking {
        libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK
    } else {
        libc::SOCK_CLOEXEC
    }
}
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
fn socket_type_flags(_nonblocking: bool) -> c_int {
    0
}

/// Platform fixups for sockets created without `SOCK_CLOEXEC`/`SOCK_NONBLOCK`.
fn finish_socket(fd: BorrowedFd<'_>, nonblocking: bool) -> io::Result<()> {
    if !SOCK_CLOEXEC_SUPPORTED {
        set_cloexec(fd)?;
        if nonblocking {
            set_nonblocking(fd, true)?;
        }
    }
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos"))]
    set_bool_option(fd, libc::SOL_SOCKET, libc::SO_NOSIGPIPE, true)?;
    Ok(())
}

pub(crate) fn create_uds(ty: c_int, nonblocking: bool) -> io::Result<FdOps> {
    let fd = owned(unsafe { libc::socket(AF_UNIX, ty | socket_type_flags(nonblocking), 0) })?;
    finish_socket(fd.as_fd(), nonblocking)?;
    Ok(FdOps(fd))
}

pub(crate) fn socketpair(ty: c_int) -> io::Result<(FdOps, FdOps)> {
    let mut fds: [c_int; 2] = [-1; 2];
    cvt(unsafe { libc::socketpair(AF_UNIX, ty | socket_type_flags(false), 0, fds.as_mut_ptr()) })?;
    // SAFETY: socketpair succeeded, so both descriptors are fresh and owned by us
    let (a, b) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    finish_socket(a.as_fd(), false)?;
    finish_socket(b.as_fd(), false)?;
    Ok((FdOps(a), FdOps(b)))
}

pub(crate) fn bind(fd: BorrowedFd<'_>, addr: &SockAddr) -> io::Result<()> {
    cvt(unsafe { libc::bind(fd.as_raw_fd(), addr.as_ptr(), addr.len()) }).map(drop)
}

pub(crate) fn connect(fd: BorrowedFd<'_>, addr: &SockAddr) -> io::Result<()> {
    cvt(unsafe { libc::connect(fd.as_raw_fd(), addr.as_ptr(), addr.len()) }).map(drop)
}

pub(crate) fn listen(fd: BorrowedFd<'_>, backlog: c_int) -> io::Result<()> {
    cvt(unsafe { libc::listen(fd.as_raw_fd(), backlog) }).map(drop)
}

pub(crate) fn accept(fd: BorrowedFd<'_>) -> io::Result<FdOps> {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    {
        let new = owned(unsafe {
            libc::accept4(
                fd.as_raw_fd(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                libc::SOCK_CLOEXEC,
            )
        })?;
        Ok(FdOps(new))
    }
    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    {
        let new = owned(unsafe {
            libc::accept(fd.as_raw_fd(), std::ptr::null_mut(), std::ptr::null_mut())
        })?;
        set_cloexec(new.as_fd())?;
        // BSD-derived systems let the listener's O_NONBLOCK leak into the new socket
        set_nonblocking(new.as_fd(), false)?;
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "tvos",
            target_os = "watchos"
        ))]
        set_bool_option(new.as_fd(), libc::SOL_SOCKET, libc::SO_NOSIGPIPE, true)?;
        Ok(FdOps(new))
    }
}

/// `getsockname`.
pub(crate) fn local_addr(fd: BorrowedFd<'_>) -> io::Result<SockAddr> {
    let mut addr = SockAddr::empty();
    cvt(unsafe { libc::getsockname(fd.as_raw_fd(), addr.as_mut_ptr(), &mut addr.len) })?;
    Ok(addr)
}

/// `getpeername`.
pub(crate) fn peer_addr(fd: BorrowedFd<'_>) -> io::Result<SockAddr> {
    let mut addr = SockAddr::empty();
    cvt(unsafe { libc::getpeername(fd.as_raw_fd(), addr.as_mut_ptr(), &mut addr.len) })?;
    Ok(addr)
}

pub(crate) fn set_cloexec(fd: BorrowedFd<'_>) -> io::Result<()> {
    let flags = cvt(unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) })?;
    if flags & libc::FD_CLOEXEC == 0 {
        cvt(unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, flags | libc::FD_CLOEXEC) })?;
    }
    Ok(())
}

pub(crate) fn get_nonblocking(fd: BorrowedFd<'_>) -> io::Result<bool> {
    let flags = cvt(unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL) })?;
    Ok(flags & libc::O_NONBLOCK != 0)
}

pub(crate) fn set_nonblocking(fd: BorrowedFd<'_>, nonblocking: bool) -> io::Result<()> {
    let old = cvt(unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL) })?;
    let new = if nonblocking {
        old | libc::O_NONBLOCK
    } else {
        old & !libc::O_NONBLOCK
    };
    if new != old {
        cvt(unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, new) })?;
    }
    Ok(())
}

pub(crate) fn shutdown(fd: BorrowedFd<'_>, how: Shutdown) -> io::Result<()> {
    let how = match how {
        Shutdown::Read => libc::SHUT_RD,
        Shutdown::Write => libc::SHUT_WR,
        Shutdown::Both => libc::SHUT_RDWR,
    };
    cvt(unsafe { libc::shutdown(fd.as_raw_fd(), how) }).map(drop)
}

pub(crate) fn set_bool_option(
    fd: BorrowedFd<'_>,
    level: c_int,
    name: c_int,
    value: bool,
) -> io::Result<()> {
    let value = c_int::from(value);
    cvt(unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            level,
            name,
            (&value as *const c_int).cast::<c_void>(),
            size_of::<c_int>() as socklen_t,
        )
    })
    .map(drop)
}

/// Reads a fixed-size socket option.
///
/// # Safety
/// `T` must be the exact type the kernel writes for `level`/`name`, and valid
/// for any bit pattern.
pub(crate) unsafe fn get_option<T: Copy>(
    fd: BorrowedFd<'_>,
    level: c_int,
    name: c_int,
) -> io::Result<T> {
    let mut value = std::mem::MaybeUninit::<T>::zeroed();
    let mut len = size_of::<T>() as socklen_t;
    cvt(libc::getsockopt(
        fd.as_raw_fd(),
        level,
        name,
        value.as_mut_ptr().cast::<c_void>(),
        &mut len,
    ))?;
    Ok(value.assume_init())
}
