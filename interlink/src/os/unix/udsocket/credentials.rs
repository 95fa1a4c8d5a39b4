use std::io;
use std::os::unix::io::BorrowedFd;

/// Identity of the process on the other end of a connected socket, captured
/// by the kernel when the connection was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    /// Only reported on Linux and Android.
    pub pid: Option<libc::pid_t>,
    pub uid: libc::uid_t,
    pub gid: libc::gid_t,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn peer_credentials(fd: BorrowedFd<'_>) -> io::Result<PeerCredentials> {
    use crate::os::unix::c_wrappers;

    // SAFETY: SO_PEERCRED yields a ucred
    let cred = unsafe {
        c_wrappers::get_option::<libc::ucred>(fd, libc::SOL_SOCKET, libc::SO_PEERCRED)
    }?;
    Ok(PeerCredentials {
        pid: Some(cred.pid),
        uid: cred.uid,
        gid: cred.gid,
    })
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "netbsd"
))]
pub(crate) fn peer_credentials(fd: BorrowedFd<'_>) -> io::Result<PeerCredentials> {
    use std::os::unix::io::AsRawFd;

    let mut uid: libc::uid_t = 0;
    let mut gid: libc::gid_t = 0;
    if unsafe { libc::getpeereid(fd.as_raw_fd(), &mut uid, &mut gid) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(PeerCredentials {
        pid: None,
        uid,
        gid,
    })
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "netbsd"
)))]
pub(crate) fn peer_credentials(_fd: BorrowedFd<'_>) -> io::Result<PeerCredentials> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "peer credentials are not available on this platform",
    ))
}
