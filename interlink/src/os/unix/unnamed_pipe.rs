use std::io;
use std::os::unix::io::{FromRawFd, OwnedFd};

use libc::c_int;
use tracing::debug;

use super::c_wrappers::cvt;
use super::FdOps;

/// Creates a pipe, returning `(write end, read end)`. Both ends are
/// close-on-exec.
pub(crate) fn pipe() -> io::Result<(FdOps, FdOps)> {
    let mut fds: [c_int; 2] = [-1; 2];
    create(&mut fds)?;
    // SAFETY: the kernel just handed us both descriptors
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    {
        use std::os::unix::io::AsFd;
        super::c_wrappers::set_cloexec(read.as_fd())?;
        super::c_wrappers::set_cloexec(write.as_fd())?;
    }
    debug!(read_fd = fds[0], write_fd = fds[1], "Created unnamed pipe");
    Ok((FdOps(write), FdOps(read)))
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
))]
fn create(fds: &mut [c_int; 2]) -> io::Result<()> {
    cvt(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) }).map(drop)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
fn create(fds: &mut [c_int; 2]) -> io::Result<()> {
    cvt(unsafe { libc::pipe(fds.as_mut_ptr()) }).map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsFd;

    #[test]
    fn both_ends_are_cloexec() {
        let (w, r) = pipe().unwrap();
        for end in [&w, &r] {
            let flags = unsafe { libc::fcntl(end.as_raw(), libc::F_GETFD) };
            assert_ne!(flags & libc::FD_CLOEXEC, 0);
        }
        assert!(!super::super::c_wrappers::get_nonblocking(r.as_fd()).unwrap());
    }
}
