//! Local sockets on Unix are Unix domain stream sockets.

use std::ffi::OsString;
use std::io;
use std::path::Path;

use super::udsocket::{
    PeerCredentials, ToUdSocketPath, UdSocketPath, UdStream, UdStreamListener,
    UdStreamListenerOptions, NAMESPACE_SUPPORTED,
};
use crate::local_socket::{ListenerOptions, LocalSocketName, NameTypeSupport};

pub(crate) type ListenerImpl = UdStreamListener;
pub(crate) type StreamImpl = UdStream;

/// Directory that stands in for the abstract namespace where there is none.
const NAMESPACE_FALLBACK_DIR: &str = "/tmp";

pub(crate) fn name_type_support_query() -> NameTypeSupport {
    if NAMESPACE_SUPPORTED {
        NameTypeSupport::Both
    } else {
        NameTypeSupport::OnlyPaths
    }
}

/// Maps a local socket name onto a Unix domain socket address.
pub(crate) fn to_socket_path(name: &LocalSocketName<'_>) -> io::Result<UdSocketPath<'static>> {
    if !name.is_namespaced() {
        return Path::new(name.inner()).to_socket_path();
    }
    if NAMESPACE_SUPPORTED {
        let mut at = OsString::from("@");
        at.push(name.inner());
        at.to_socket_path()
    } else {
        Path::new(NAMESPACE_FALLBACK_DIR)
            .join(name.inner())
            .to_socket_path()
    }
}

pub(crate) fn bind(options: &ListenerOptions<'_>) -> io::Result<ListenerImpl> {
    let path = to_socket_path(options.name_ref()?)?;
    UdStreamListener::bind_with_options(
        path,
        UdStreamListenerOptions {
            backlog: options.backlog,
            nonblocking: options.nonblocking,
            drop_guard: options.reclaim_name,
        },
    )
}

pub(crate) fn connect(name: &LocalSocketName<'_>) -> io::Result<StreamImpl> {
    UdStream::connect(to_socket_path(name)?)
}

/// Only Linux and Android report the peer's PID with its credentials.
pub(crate) fn peer_pid(creds: PeerCredentials) -> io::Result<u32> {
    let pid = creds.pid.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "the peer's process ID is not available on this platform",
        )
    })?;
    u32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "kernel reported a negative PID"))
}

#[cfg(feature = "tokio")]
pub(crate) mod tokio {
    use std::io;

    use super::super::udsocket::tokio::{UdStream, UdStreamListener};
    use super::{to_socket_path, ListenerOptions, LocalSocketName};
    use crate::os::unix::udsocket::UdStreamListenerOptions;

    pub(crate) type ListenerImpl = UdStreamListener;
    pub(crate) type StreamImpl = UdStream;
    pub(crate) use super::super::udsocket::tokio::{
        ReadHalf as ReadHalfImpl, WriteHalf as WriteHalfImpl,
    };

    pub(crate) fn bind(options: &ListenerOptions<'_>) -> io::Result<ListenerImpl> {
        let path = to_socket_path(options.name_ref()?)?;
        UdStreamListener::bind_with_options(
            path,
            UdStreamListenerOptions {
                backlog: options.backlog,
                nonblocking: true,
                drop_guard: options.reclaim_name,
            },
        )
    }

    pub(crate) async fn connect(name: &LocalSocketName<'_>) -> io::Result<StreamImpl> {
        UdStream::connect(to_socket_path(name)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_socket::ToLocalSocketName;

    #[test]
    fn plain_names_are_files() {
        let name = "/tmp/interlink-plain.sock".to_local_socket_name().unwrap();
        let path = to_socket_path(&name).unwrap();
        assert_eq!(
            path.file_path(),
            Some(Path::new("/tmp/interlink-plain.sock"))
        );
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn namespaced_names_use_abstract_namespace() {
        let name = "@interlink-ns".to_local_socket_name().unwrap();
        let path = to_socket_path(&name).unwrap();
        assert!(path.is_namespaced());
        assert_eq!(path.to_string(), "@interlink-ns");
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    #[test]
    fn namespaced_names_fall_back_to_tmp() {
        let name = "@interlink-ns".to_local_socket_name().unwrap();
        let path = to_socket_path(&name).unwrap();
        assert_eq!(path.file_path(), Some(Path::new("/tmp/interlink-ns")));
    }
}
