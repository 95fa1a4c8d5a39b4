use std::borrow::Cow;
use std::ffi::{CStr, CString, OsStr, OsString};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::mem::{size_of, zeroed};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use libc::{c_char, sockaddr, sockaddr_un, socklen_t};
use tracing::{debug, warn};

use crate::NameError;

/// The maximum length of a socket path in bytes, including the terminating NUL
/// for file paths and the leading NUL for namespaced names.
///
/// This is the size of the `sun_path` field of `sockaddr_un`.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const MAX_UDSOCKET_PATH_LEN: usize = 108;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const MAX_UDSOCKET_PATH_LEN: usize = 104;

/// Whether the platform has an abstract socket namespace.
pub const NAMESPACE_SUPPORTED: bool = cfg!(any(target_os = "linux", target_os = "android"));

/// The address of a Unix domain socket.
///
/// String-like values starting with `@` denote a name in the abstract
/// namespace (Linux and Android only). Such sockets do not appear in the
/// filesystem and disappear when the last handle to them is closed.
///
/// # Example
/// ```no_run
/// use interlink::os::unix::udsocket::{ToUdSocketPath, UdSocketPath};
/// use std::path::Path;
///
/// let file = "/tmp/example.sock".to_socket_path()?;
/// assert!(matches!(file, UdSocketPath::File(..)));
///
/// // Paths are always treated as files, even with a leading `@`.
/// let also_file = Path::new("@not-namespaced").to_socket_path()?;
/// assert!(!also_file.is_namespaced());
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum UdSocketPath<'a> {
    /// An unbound socket, or the peer of a `socketpair`.
    #[default]
    Unnamed,
    /// A socket file in the filesystem.
    File(Cow<'a, CStr>),
    /// A name in the abstract namespace, stored without the leading `@`.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    Namespaced(Cow<'a, CStr>),
}

impl<'a> UdSocketPath<'a> {
    /// Returns a borrowed copy.
    #[must_use]
    pub fn borrow(&self) -> UdSocketPath<'_> {
        match self {
            Self::Unnamed => UdSocketPath::Unnamed,
            Self::File(p) => UdSocketPath::File(Cow::Borrowed(p)),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Self::Namespaced(n) => UdSocketPath::Namespaced(Cow::Borrowed(n)),
        }
    }

    /// Clones borrowed data so the path no longer borrows from anything.
    #[must_use]
    pub fn upgrade(self) -> UdSocketPath<'static> {
        match self {
            Self::Unnamed => UdSocketPath::Unnamed,
            Self::File(p) => UdSocketPath::File(Cow::Owned(p.into_owned())),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Self::Namespaced(n) => UdSocketPath::Namespaced(Cow::Owned(n.into_owned())),
        }
    }

    #[must_use]
    pub fn as_cstr(&self) -> &CStr {
        match self {
            Self::Unnamed => empty_cstr(),
            Self::File(p) => p,
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Self::Namespaced(n) => n,
        }
    }

    /// The path or name as an `OsStr`. Namespaced names are returned without
    /// the leading `@`.
    #[must_use]
    pub fn as_osstr(&self) -> &OsStr {
        OsStr::from_bytes(self.as_cstr().to_bytes())
    }

    #[must_use]
    pub fn is_namespaced(&self) -> bool {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        if let Self::Namespaced(..) = self {
            return true;
        }
        false
    }

    /// The filesystem path, if this is a file socket.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::File(p) => Some(Path::new(OsStr::from_bytes(p.to_bytes()))),
            _ => None,
        }
    }

    pub(crate) fn to_sockaddr(&self) -> io::Result<SockAddr> {
        let mut addr = SockAddr::empty();
        let offset = sun_path_offset(&addr.addr);
        let (prefix, body): (&[u8], &[u8]) = match self {
            Self::Unnamed => return Err(NameError::Empty.into()),
            Self::File(p) => (&[], p.to_bytes_with_nul()),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Self::Namespaced(n) => (&[0], n.to_bytes()),
        };
        let total = prefix.len() + body.len();
        if total > addr.addr.sun_path.len() {
            return Err(NameError::TooLong {
                len: total,
                max: MAX_UDSOCKET_PATH_LEN,
            }
            .into());
        }
        for (dst, src) in addr
            .addr
            .sun_path
            .iter_mut()
            .zip(prefix.iter().chain(body.iter()))
        {
            *dst = *src as c_char;
        }
        addr.len = (offset + total) as socklen_t;
        Ok(addr)
    }

    /// Interprets an address filled in by the kernel.
    pub(crate) fn from_sockaddr(addr: &SockAddr) -> UdSocketPath<'static> {
        let offset = sun_path_offset(&addr.addr);
        let path_len = (addr.len as usize)
            .saturating_sub(offset)
            .min(addr.addr.sun_path.len());
        if path_len == 0 {
            return UdSocketPath::Unnamed;
        }
        let bytes: Vec<u8> = addr.addr.sun_path[..path_len]
            .iter()
            .map(|&c| c as u8)
            .collect();
        if bytes[0] == 0 {
            #[cfg(any(target_os = "linux", target_os = "android"))]
            if let Ok(name) = CString::new(&bytes[1..]) {
                return UdSocketPath::Namespaced(Cow::Owned(name));
            }
            return UdSocketPath::Unnamed;
        }
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        match CString::new(&bytes[..end]) {
            Ok(path) => UdSocketPath::File(Cow::Owned(path)),
            Err(_) => UdSocketPath::Unnamed,
        }
    }
}

impl Display for UdSocketPath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unnamed => f.write_str("(unnamed)"),
            Self::File(p) => write!(f, "{}", Path::new(OsStr::from_bytes(p.to_bytes())).display()),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Self::Namespaced(n) => write!(f, "@{}", String::from_utf8_lossy(n.to_bytes())),
        }
    }
}

fn empty_cstr() -> &'static CStr {
    // SAFETY: a single NUL byte is a valid empty C string
    unsafe { CStr::from_bytes_with_nul_unchecked(b"\0") }
}

fn check_file_len(len: usize) -> Result<(), NameError> {
    // room for the terminating NUL
    if len + 1 > MAX_UDSOCKET_PATH_LEN {
        return Err(NameError::TooLong {
            len: len + 1,
            max: MAX_UDSOCKET_PATH_LEN,
        });
    }
    Ok(())
}

fn namespaced(name: &[u8]) -> Result<UdSocketPath<'static>, NameError> {
    if !NAMESPACE_SUPPORTED {
        return Err(NameError::NamespaceUnsupported);
    }
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    // room for the leading NUL
    if name.len() + 1 > MAX_UDSOCKET_PATH_LEN {
        return Err(NameError::TooLong {
            len: name.len() + 1,
            max: MAX_UDSOCKET_PATH_LEN,
        });
    }
    let name = CString::new(name).map_err(|_| NameError::InteriorNul)?;
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        Ok(UdSocketPath::Namespaced(Cow::Owned(name)))
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        drop(name);
        Err(NameError::NamespaceUnsupported)
    }
}

fn file(bytes: Vec<u8>) -> Result<UdSocketPath<'static>, NameError> {
    if bytes.is_empty() {
        return Err(NameError::Empty);
    }
    check_file_len(bytes.len())?;
    let path = CString::new(bytes).map_err(|_| NameError::InteriorNul)?;
    Ok(UdSocketPath::File(Cow::Owned(path)))
}

/// Parses string-like input, where a leading `@` selects the namespace.
fn from_name_bytes(bytes: Cow<'_, [u8]>) -> Result<UdSocketPath<'static>, NameError> {
    match bytes.split_first() {
        None => Err(NameError::Empty),
        Some((b'@', rest)) => namespaced(rest),
        Some(_) => file(bytes.into_owned()),
    }
}

/// Conversion into a [`UdSocketPath`].
///
/// Implemented for the usual string and path types. String-like values with a
/// leading `@` become namespaced names; `Path` and `PathBuf` are always files.
pub trait ToUdSocketPath<'a> {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'a>>;
}

impl<'a> ToUdSocketPath<'a> for UdSocketPath<'a> {
    #[inline]
    fn to_socket_path(self) -> io::Result<UdSocketPath<'a>> {
        Ok(self)
    }
}

impl<'a> ToUdSocketPath<'a> for &'a UdSocketPath<'_> {
    #[inline]
    fn to_socket_path(self) -> io::Result<UdSocketPath<'a>> {
        Ok(self.borrow())
    }
}

impl<'a> ToUdSocketPath<'a> for &'a CStr {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'a>> {
        let bytes = self.to_bytes();
        match bytes.first() {
            None => Err(NameError::Empty.into()),
            Some(b'@') => Ok(namespaced(&bytes[1..])?),
            Some(_) => {
                check_file_len(bytes.len())?;
                Ok(UdSocketPath::File(Cow::Borrowed(self)))
            }
        }
    }
}

impl ToUdSocketPath<'static> for CString {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'static>> {
        let path = self.as_c_str().to_socket_path()?;
        Ok(path.upgrade())
    }
}

impl ToUdSocketPath<'static> for &OsStr {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'static>> {
        Ok(from_name_bytes(Cow::Borrowed(self.as_bytes()))?)
    }
}

impl ToUdSocketPath<'static> for OsString {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'static>> {
        Ok(from_name_bytes(Cow::Owned(self.into_vec()))?)
    }
}

impl ToUdSocketPath<'static> for &str {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'static>> {
        OsStr::new(self).to_socket_path()
    }
}

impl ToUdSocketPath<'static> for String {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'static>> {
        Ok(from_name_bytes(Cow::Owned(self.into_bytes()))?)
    }
}

impl ToUdSocketPath<'static> for &Path {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'static>> {
        Ok(file(self.as_os_str().as_bytes().to_vec())?)
    }
}

impl ToUdSocketPath<'static> for PathBuf {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'static>> {
        Ok(file(self.into_os_string().into_vec())?)
    }
}

impl ToUdSocketPath<'static> for &PathBuf {
    fn to_socket_path(self) -> io::Result<UdSocketPath<'static>> {
        self.as_path().to_socket_path()
    }
}

/// A `sockaddr_un` with its meaningful length.
pub(crate) struct SockAddr {
    pub(crate) addr: sockaddr_un,
    pub(crate) len: socklen_t,
}

impl SockAddr {
    /// A zeroed address whose length covers the whole structure, ready to be
    /// filled in by `recvmsg` or `getsockname`.
    pub(crate) fn empty() -> Self {
        // SAFETY: sockaddr_un is plain old data, all-zeroes is a valid value
        let mut addr: sockaddr_un = unsafe { zeroed() };
        addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
        Self {
            addr,
            len: size_of::<sockaddr_un>() as socklen_t,
        }
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *const sockaddr {
        (&self.addr as *const sockaddr_un).cast()
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut sockaddr {
        (&mut self.addr as *mut sockaddr_un).cast()
    }

    #[inline]
    pub(crate) fn len(&self) -> socklen_t {
        self.len
    }
}

fn sun_path_offset(addr: &sockaddr_un) -> usize {
    let base = (addr as *const sockaddr_un) as usize;
    let path = addr.sun_path.as_ptr() as usize;
    path - base
}

/// Removes a socket file when dropped.
///
/// Only ever armed for [`UdSocketPath::File`]; namespaced and unnamed sockets
/// have nothing in the filesystem to clean up.
#[derive(Debug, Default)]
pub(crate) struct PathDropGuard {
    path: Option<PathBuf>,
}

impl PathDropGuard {
    pub(crate) fn new(path: &UdSocketPath<'_>) -> Self {
        Self {
            path: path.file_path().map(Path::to_path_buf),
        }
    }

    pub(crate) fn dummy() -> Self {
        Self::default()
    }

    pub(crate) fn enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Keeps the socket file around after all.
    pub(crate) fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for PathDropGuard {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove socket file: {e}"),
        }
    }
}
