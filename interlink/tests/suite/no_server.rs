//! Connecting to names nobody listens on

use std::io::ErrorKind;

use interlink::local_socket::LocalSocketStream;

use crate::common::unique_local_name;

fn assert_absent(kind: ErrorKind) {
    assert!(
        matches!(kind, ErrorKind::NotFound | ErrorKind::ConnectionRefused),
        "expected NotFound or ConnectionRefused, got {kind:?}"
    );
}

#[test]
fn namespaced_name_without_server() {
    let err = LocalSocketStream::connect(unique_local_name("nobody").as_str()).unwrap_err();
    assert_absent(err.kind());
}

#[cfg(unix)]
#[test]
fn path_without_server() {
    let dir = crate::common::socket_dir();
    let err = LocalSocketStream::connect(dir.path().join("nobody.sock")).unwrap_err();
    assert_absent(err.kind());
}

#[cfg(unix)]
#[test]
fn stale_socket_file_refuses() {
    use interlink::local_socket::{ListenerOptions, LocalSocketListener, ToLocalSocketName};

    let dir = crate::common::socket_dir();
    let path = dir.path().join("stale.sock");
    let options = ListenerOptions::new()
        .name(path.as_path().to_local_socket_name().unwrap())
        .reclaim_name(false);
    drop(LocalSocketListener::bind_with_options(options).unwrap());
    assert!(path.exists());

    let err = LocalSocketStream::connect(path.as_path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
}
