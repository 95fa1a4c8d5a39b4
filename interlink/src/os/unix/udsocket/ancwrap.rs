//! `sendmsg`/`recvmsg` with ancillary data and optional addresses.

use std::io::{self, IoSlice, IoSliceMut};
use std::mem::zeroed;
use std::os::unix::io::{AsRawFd, BorrowedFd};
use std::ptr;

use libc::{c_int, iovec, msghdr};

use super::cmsg::{CmsgBuffer, CmsgRef};
use super::{ReadAncillarySuccess, SockAddr};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: c_int = 0;

#[cfg(any(target_os = "linux", target_os = "android"))]
const RECV_FLAGS: c_int = libc::MSG_CMSG_CLOEXEC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const RECV_FLAGS: c_int = 0;

pub(crate) fn sendmsg(
    fd: BorrowedFd<'_>,
    bufs: &[IoSlice<'_>],
    abuf: CmsgRef<'_>,
    addr: Option<&SockAddr>,
) -> io::Result<usize> {
    // SAFETY: msghdr is plain old data; zeroing also clears platform padding
    let mut hdr: msghdr = unsafe { zeroed() };
    if let Some(addr) = addr {
        hdr.msg_name = addr.as_ptr().cast_mut().cast();
        hdr.msg_namelen = addr.len();
    }
    // IoSlice is ABI-compatible with iovec; the kernel does not write through it
    hdr.msg_iov = bufs.as_ptr().cast_mut().cast::<iovec>();
    hdr.msg_iovlen = bufs.len() as _;
    if !abuf.is_empty() {
        hdr.msg_control = abuf.as_bytes().as_ptr().cast_mut().cast();
        hdr.msg_controllen = abuf.len() as _;
    }
    let ret = unsafe { libc::sendmsg(fd.as_raw_fd(), &hdr, SEND_FLAGS) };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

pub(crate) fn recvmsg(
    fd: BorrowedFd<'_>,
    bufs: &mut [IoSliceMut<'_>],
    abuf: &mut CmsgBuffer,
    mut addr: Option<&mut SockAddr>,
) -> io::Result<ReadAncillarySuccess> {
    // SAFETY: as above
    let mut hdr: msghdr = unsafe { zeroed() };
    if let Some(addr) = addr.as_deref_mut() {
        hdr.msg_name = addr.as_mut_ptr().cast();
        hdr.msg_namelen = addr.len();
    }
    hdr.msg_iov = bufs.as_mut_ptr().cast::<iovec>();
    hdr.msg_iovlen = bufs.len() as _;
    let (control, capacity) = abuf.recv_target();
    if capacity > 0 {
        hdr.msg_control = control.cast();
        hdr.msg_controllen = capacity as _;
    } else {
        hdr.msg_control = ptr::null_mut();
    }

    let ret = unsafe { libc::recvmsg(fd.as_raw_fd(), &mut hdr, RECV_FLAGS) };
    if ret == -1 {
        return Err(io::Error::last_os_error());
    }

    if let Some(addr) = addr {
        addr.len = hdr.msg_namelen;
    }
    let ancillary = if capacity > 0 {
        hdr.msg_controllen as usize
    } else {
        0
    };
    let truncated = hdr.msg_flags & libc::MSG_CTRUNC != 0;
    // SAFETY: the kernel reported writing `ancillary` bytes of control messages
    unsafe { abuf.set_received(ancillary, truncated) };

    Ok(ReadAncillarySuccess {
        main: ret as usize,
        ancillary,
    })
}

/// `sendto` for a single buffer.
pub(crate) fn sendto(fd: BorrowedFd<'_>, buf: &[u8], addr: &SockAddr) -> io::Result<usize> {
    let ret = unsafe {
        libc::sendto(
            fd.as_raw_fd(),
            buf.as_ptr().cast(),
            buf.len(),
            SEND_FLAGS,
            addr.as_ptr(),
            addr.len(),
        )
    };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}
