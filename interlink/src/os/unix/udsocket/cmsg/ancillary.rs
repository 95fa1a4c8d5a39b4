//! Typed ancillary data.

use std::borrow::Cow;
use std::mem::size_of;
use std::os::unix::io::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::ptr;

use libc::c_int;

use super::Cmsg;
use crate::Sealed;

/// A control message type that [`CmsgBuffer::add_message`](super::CmsgBuffer::add_message)
/// can encode. Sealed: the payload of every implementor is valid by construction.
pub trait EncodeAncillary: Sealed {
    fn cmsg_level(&self) -> c_int;
    fn cmsg_type(&self) -> c_int;
    fn payload(&self) -> Cow<'_, [u8]>;
}

/// File descriptors to send to the peer (`SCM_RIGHTS`).
///
/// The receiving process gets its own duplicates; the descriptors stay open
/// in the sender.
#[derive(Debug, Clone, Copy)]
pub struct FileDescriptors<'a>(pub &'a [BorrowedFd<'a>]);

impl Sealed for FileDescriptors<'_> {}

impl EncodeAncillary for FileDescriptors<'_> {
    fn cmsg_level(&self) -> c_int {
        libc::SOL_SOCKET
    }
    fn cmsg_type(&self) -> c_int {
        libc::SCM_RIGHTS
    }
    fn payload(&self) -> Cow<'_, [u8]> {
        let bytes = self
            .0
            .iter()
            .flat_map(|fd| fd.as_raw_fd().to_ne_bytes())
            .collect::<Vec<u8>>();
        Cow::Owned(bytes)
    }
}

/// Process credentials (`SCM_CREDENTIALS`).
///
/// The kernel attaches these to every message received on a socket with
/// credential passing enabled (`set_pass_credentials(true)`), whether or not
/// the sender supplied them. A sender without `CAP_SYS_ADMIN` may only claim
/// its own PID, and its real, effective or saved user and group IDs.
#[cfg(any(target_os = "linux", target_os = "android"))]
#[derive(Clone, Copy)]
pub struct Credentials(libc::ucred);

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Credentials {
    #[must_use]
    pub fn new(pid: libc::pid_t, uid: libc::uid_t, gid: libc::gid_t) -> Self {
        Self(libc::ucred { pid, uid, gid })
    }

    /// The credentials of the calling process.
    #[must_use]
    pub fn current() -> Self {
        // SAFETY: these calls cannot fail
        unsafe { Self::new(libc::getpid(), libc::getuid(), libc::getgid()) }
    }

    #[must_use]
    pub fn pid(&self) -> libc::pid_t {
        self.0.pid
    }

    #[must_use]
    pub fn uid(&self) -> libc::uid_t {
        self.0.uid
    }

    #[must_use]
    pub fn gid(&self) -> libc::gid_t {
        self.0.gid
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        (self.pid(), self.uid(), self.gid()) == (other.pid(), other.uid(), other.gid())
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Eq for Credentials {}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("pid", &self.pid())
            .field("uid", &self.uid())
            .field("gid", &self.gid())
            .finish()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Sealed for Credentials {}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl EncodeAncillary for Credentials {
    fn cmsg_level(&self) -> c_int {
        libc::SOL_SOCKET
    }
    fn cmsg_type(&self) -> c_int {
        libc::SCM_CREDENTIALS
    }
    fn payload(&self) -> Cow<'_, [u8]> {
        let mut bytes = Vec::with_capacity(size_of::<libc::ucred>());
        bytes.extend_from_slice(&self.0.pid.to_ne_bytes());
        bytes.extend_from_slice(&self.0.uid.to_ne_bytes());
        bytes.extend_from_slice(&self.0.gid.to_ne_bytes());
        Cow::Owned(bytes)
    }
}

/// A decoded control message.
#[derive(Debug)]
pub enum Ancillary {
    /// Descriptors received from the peer, now owned by this process.
    FileDescriptors(Vec<OwnedFd>),
    #[cfg(any(target_os = "linux", target_os = "android"))]
    Credentials(Credentials),
    /// A message this crate does not interpret, or a locally assembled one.
    Unknown {
        level: c_int,
        kind: c_int,
        data: Vec<u8>,
    },
}

impl Ancillary {
    pub(super) fn unknown(cmsg: &Cmsg<'_>) -> Self {
        Self::Unknown {
            level: cmsg.cmsg_level(),
            kind: cmsg.cmsg_type(),
            data: cmsg.data().to_vec(),
        }
    }

    /// # Safety
    /// The message must have been produced by the kernel in this process and
    /// never decoded before, since decoding takes ownership of descriptors.
    pub(super) unsafe fn decode(cmsg: Cmsg<'_>) -> Self {
        match (cmsg.cmsg_level(), cmsg.cmsg_type()) {
            (libc::SOL_SOCKET, libc::SCM_RIGHTS) => {
                let fds = cmsg
                    .data()
                    .chunks_exact(size_of::<c_int>())
                    .map(|chunk| {
                        let raw = ptr::read_unaligned(chunk.as_ptr().cast::<c_int>());
                        let fd = OwnedFd::from_raw_fd(raw);
                        // No MSG_CMSG_CLOEXEC on this platform, mark it after the fact
                        #[cfg(not(any(target_os = "linux", target_os = "android")))]
                        if let Err(e) = crate::os::unix::c_wrappers::set_cloexec(
                            std::os::unix::io::AsFd::as_fd(&fd),
                        ) {
                            tracing::warn!("Failed to set FD_CLOEXEC on received descriptor: {e}");
                        }
                        fd
                    })
                    .collect();
                Self::FileDescriptors(fds)
            }
            #[cfg(any(target_os = "linux", target_os = "android"))]
            (libc::SOL_SOCKET, libc::SCM_CREDENTIALS)
                if cmsg.data().len() >= size_of::<libc::ucred>() =>
            {
                let creds = ptr::read_unaligned(cmsg.data().as_ptr().cast::<libc::ucred>());
                Self::Credentials(Credentials(creds))
            }
            _ => Self::unknown(&cmsg),
        }
    }
}
