use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

use crate::NameError;

/// Name of a local socket: a filesystem path or a namespaced name.
///
/// Which kinds a platform supports is reported by [`NameTypeSupport`].
/// Namespaced names never create files; on Unix systems without an abstract
/// socket namespace they are mapped to files under `/tmp`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalSocketName<'a> {
    inner: Cow<'a, OsStr>,
    namespaced: bool,
}

impl<'a> LocalSocketName<'a> {
    pub(crate) fn from_raw_parts(inner: Cow<'a, OsStr>, namespaced: bool) -> Self {
        Self { inner, namespaced }
    }

    #[must_use]
    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    #[must_use]
    pub fn is_path(&self) -> bool {
        !self.namespaced
    }

    /// The name without the `@` marker or the Windows pipe prefix.
    #[must_use]
    pub fn inner(&self) -> &OsStr {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> Cow<'a, OsStr> {
        self.inner
    }

    #[must_use]
    pub fn into_owned(self) -> LocalSocketName<'static> {
        LocalSocketName {
            inner: Cow::Owned(self.inner.into_owned()),
            namespaced: self.namespaced,
        }
    }

    fn borrowed(&self) -> LocalSocketName<'_> {
        LocalSocketName {
            inner: Cow::Borrowed(&self.inner),
            namespaced: self.namespaced,
        }
    }
}

/// Conversion into a [`LocalSocketName`].
///
/// String-like values starting with `@` are namespaced, with the `@`
/// removed. Otherwise strings are paths on Unix and namespaced on Windows.
/// `Path` values are always paths on Unix; on Windows they must start with
/// `\\.\pipe\`.
///
/// # Example
/// ```
/// use interlink::local_socket::ToLocalSocketName;
///
/// let name = "@service".to_local_socket_name()?;
/// assert!(name.is_namespaced());
/// assert_eq!(name.inner(), "service");
/// # Ok::<(), std::io::Error>(())
/// ```
pub trait ToLocalSocketName<'a> {
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'a>>;
}

impl<'a> ToLocalSocketName<'a> for LocalSocketName<'a> {
    #[inline]
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'a>> {
        Ok(self)
    }
}

impl<'a> ToLocalSocketName<'a> for &'a LocalSocketName<'_> {
    #[inline]
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'a>> {
        Ok(self.borrowed())
    }
}

impl<'a> ToLocalSocketName<'a> for &'a str {
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'a>> {
        from_string(Cow::Borrowed(OsStr::new(self)))
    }
}

impl ToLocalSocketName<'static> for String {
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'static>> {
        from_string(Cow::Owned(OsString::from(self)))
    }
}

impl<'a> ToLocalSocketName<'a> for &'a OsStr {
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'a>> {
        from_string(Cow::Borrowed(self))
    }
}

impl ToLocalSocketName<'static> for OsString {
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'static>> {
        from_string(Cow::Owned(self))
    }
}

impl<'a> ToLocalSocketName<'a> for &'a Path {
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'a>> {
        from_path(Cow::Borrowed(self.as_os_str()))
    }
}

impl ToLocalSocketName<'static> for PathBuf {
    fn to_local_socket_name(self) -> io::Result<LocalSocketName<'static>> {
        from_path(Cow::Owned(self.into_os_string()))
    }
}

fn non_empty(name: Cow<'_, OsStr>, namespaced: bool) -> io::Result<LocalSocketName<'_>> {
    if name.is_empty() {
        return Err(NameError::Empty.into());
    }
    Ok(LocalSocketName::from_raw_parts(name, namespaced))
}

fn from_string(name: Cow<'_, OsStr>) -> io::Result<LocalSocketName<'_>> {
    if let Some(stripped) = strip_at(&name) {
        return non_empty(Cow::Owned(stripped), true);
    }
    non_empty(name, cfg!(windows))
}

/// `name` without a leading `@`, if it had one.
fn strip_at(name: &OsStr) -> Option<OsString> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        name.as_bytes()
            .strip_prefix(b"@")
            .map(|rest| OsStr::from_bytes(rest).to_owned())
    }
    #[cfg(windows)]
    {
        use std::os::windows::ffi::{OsStrExt, OsStringExt};
        let wide: Vec<u16> = name.encode_wide().collect();
        match wide.split_first() {
            Some((&first, rest)) if first == u16::from(b'@') => Some(OsString::from_wide(rest)),
            _ => None,
        }
    }
}

#[cfg(unix)]
fn from_path(path: Cow<'_, OsStr>) -> io::Result<LocalSocketName<'_>> {
    non_empty(path, false)
}

#[cfg(windows)]
fn from_path(path: Cow<'_, OsStr>) -> io::Result<LocalSocketName<'_>> {
    use std::os::windows::ffi::{OsStrExt, OsStringExt};

    const PREFIX: &str = r"\\.\pipe\";
    let wide: Vec<u16> = path.encode_wide().collect();
    let prefix: Vec<u16> = OsStr::new(PREFIX).encode_wide().collect();
    let Some(rest) = wide.strip_prefix(prefix.as_slice()) else {
        return Err(NameError::PathsUnsupported.into());
    };
    non_empty(Cow::Owned(OsString::from_wide(rest)), true)
}

/// Which kinds of [`LocalSocketName`] the platform can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameTypeSupport {
    /// Only filesystem paths.
    OnlyPaths,
    /// Only namespaced names.
    OnlyNamespaced,
    Both,
}

impl NameTypeSupport {
    /// What every supported version of the current platform provides.
    pub const ALWAYS_AVAILABLE: Self = if cfg!(windows) {
        Self::OnlyNamespaced
    } else if cfg!(any(target_os = "linux", target_os = "android")) {
        Self::Both
    } else {
        Self::OnlyPaths
    };

    /// What the running system supports.
    #[must_use]
    pub fn query() -> Self {
        #[cfg(unix)]
        {
            crate::os::unix::local_socket::name_type_support_query()
        }
        #[cfg(windows)]
        {
            Self::OnlyNamespaced
        }
    }

    #[must_use]
    pub const fn paths_supported(self) -> bool {
        matches!(self, Self::OnlyPaths | Self::Both)
    }

    #[must_use]
    pub const fn namespace_supported(self) -> bool {
        matches!(self, Self::OnlyNamespaced | Self::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_prefix_is_namespaced_and_stripped() {
        let name = "@app.sock".to_local_socket_name().unwrap();
        assert!(name.is_namespaced());
        assert_eq!(name.inner(), OsStr::new("app.sock"));
    }

    #[test]
    fn empty_names_rejected() {
        for input in ["", "@"] {
            let err = input.to_local_socket_name().unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{input:?}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn unix_strings_and_paths_are_files() {
        let name = String::from("/run/app.sock").to_local_socket_name().unwrap();
        assert!(name.is_path());
        let name = Path::new("@literal").to_local_socket_name().unwrap();
        assert!(name.is_path());
        assert_eq!(name.inner(), OsStr::new("@literal"));
    }

    #[cfg(windows)]
    #[test]
    fn windows_strings_are_namespaced() {
        let name = "app".to_local_socket_name().unwrap();
        assert!(name.is_namespaced());
    }

    #[cfg(windows)]
    #[test]
    fn windows_paths_need_pipe_prefix() {
        let name = Path::new(r"\\.\pipe\app").to_local_socket_name().unwrap();
        assert!(name.is_namespaced());
        assert_eq!(name.inner(), OsStr::new("app"));

        let err = Path::new(r"C:\app").to_local_socket_name().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn borrowed_and_owned_conversions() {
        let name = "@keep".to_local_socket_name().unwrap();
        let again = (&name).to_local_socket_name().unwrap();
        assert_eq!(again, name);
        let owned: LocalSocketName<'static> = name.into_owned();
        assert_eq!(owned.into_inner(), Cow::<OsStr>::Borrowed(OsStr::new("keep")));
    }

    #[test]
    fn support_flags() {
        assert!(NameTypeSupport::Both.paths_supported());
        assert!(NameTypeSupport::Both.namespace_supported());
        assert!(!NameTypeSupport::OnlyPaths.namespace_supported());
        assert!(!NameTypeSupport::OnlyNamespaced.paths_supported());
        assert_eq!(NameTypeSupport::query(), NameTypeSupport::ALWAYS_AVAILABLE);
    }
}
