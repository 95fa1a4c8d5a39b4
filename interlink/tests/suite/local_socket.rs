//! Synchronous local socket tests

use std::io::{BufRead, BufReader, Read, Write};
use std::thread;

use interlink::local_socket::{
    ListenerOptions, LocalSocketListener, LocalSocketStream, NameTypeSupport, ToLocalSocketName,
};
use interlink::TryClone;

use crate::common::unique_local_name;

#[test]
fn line_echo_round_trip() {
    let name = unique_local_name("echo");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();

    let server = thread::spawn(move || {
        let conn = listener.accept().unwrap();
        let mut reader = BufReader::new(&conn);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        (&conn).write_all(line.as_bytes()).unwrap();
    });

    let mut client = LocalSocketStream::connect(name.as_str()).unwrap();
    client.write_all(b"hello over a local socket\n").unwrap();
    let mut reply = String::new();
    BufReader::new(&mut client).read_line(&mut reply).unwrap();
    assert_eq!(reply, "hello over a local socket\n");
    server.join().unwrap();
}

#[test]
fn several_clients_in_sequence() {
    let name = unique_local_name("multi");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();

    let server = thread::spawn(move || {
        for (i, conn) in listener.incoming().take(3).enumerate() {
            let mut conn = conn.unwrap();
            conn.write_all(&[i as u8]).unwrap();
        }
    });

    for i in 0..3_u8 {
        let mut client = LocalSocketStream::connect(name.as_str()).unwrap();
        let mut byte = [0; 1];
        client.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], i);
    }
    server.join().unwrap();
}

#[test]
fn peer_pid_is_this_process() {
    let name = unique_local_name("pid");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();
    let client = LocalSocketStream::connect(name.as_str()).unwrap();
    let server = listener.accept().unwrap();

    if cfg!(any(windows, target_os = "linux", target_os = "android")) {
        assert_eq!(client.peer_pid().unwrap(), std::process::id());
        assert_eq!(server.peer_pid().unwrap(), std::process::id());
    } else {
        assert_eq!(
            client.peer_pid().unwrap_err().kind(),
            std::io::ErrorKind::Unsupported
        );
    }
}

#[test]
fn nonblocking_listener_reports_would_block() {
    let name = unique_local_name("nonblocking");
    let options = ListenerOptions::new()
        .name(name.as_str().to_local_socket_name().unwrap())
        .nonblocking(true);
    let listener = LocalSocketListener::bind_with_options(options).unwrap();
    let err = listener.accept().unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);

    listener.set_nonblocking(false).unwrap();
    let _client = LocalSocketStream::connect(name.as_str()).unwrap();
    listener.accept().unwrap();
}

#[test]
fn cloned_stream_shares_connection() {
    let name = unique_local_name("clone");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();
    let client = LocalSocketStream::connect(name.as_str()).unwrap();
    let mut server = listener.accept().unwrap();

    let mut clone = client.try_clone().unwrap();
    drop(client);
    clone.write_all(b"via clone").unwrap();
    let mut buf = [0; 9];
    server.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"via clone");
}

#[test]
fn name_support_matches_platform() {
    let support = NameTypeSupport::query();
    if cfg!(windows) {
        assert_eq!(support, NameTypeSupport::OnlyNamespaced);
    } else if cfg!(any(target_os = "linux", target_os = "android")) {
        assert_eq!(support, NameTypeSupport::Both);
    } else {
        assert_eq!(support, NameTypeSupport::OnlyPaths);
    }
}

#[cfg(unix)]
#[test]
fn path_names_reclaimed_on_drop() {
    let dir = crate::common::socket_dir();
    let path = dir.path().join("reclaim.sock");
    let listener = LocalSocketListener::bind(path.as_path()).unwrap();
    assert!(path.exists());
    drop(listener);
    assert!(!path.exists());

    let options = ListenerOptions::new()
        .name(path.as_path().to_local_socket_name().unwrap())
        .reclaim_name(false);
    drop(LocalSocketListener::bind_with_options(options).unwrap());
    assert!(path.exists());
}

#[test]
fn binding_a_taken_name_fails() {
    let name = unique_local_name("taken");
    let _listener = LocalSocketListener::bind(name.as_str()).unwrap();
    let err = LocalSocketListener::bind(name.as_str()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn sync_and_tokio_agree_on_taken_names() {
    use interlink::local_socket::tokio::LocalSocketListener as TokioListener;

    let name = unique_local_name("taken-mixed");
    let sync = LocalSocketListener::bind(name.as_str()).unwrap();
    let err = TokioListener::bind(name.as_str()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
    drop(sync);

    let other = unique_local_name("taken-mixed");
    let _tokio = TokioListener::bind(other.as_str()).unwrap();
    let err = LocalSocketListener::bind(other.as_str()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
}

#[cfg(all(windows, feature = "tokio"))]
#[tokio::test]
async fn tokio_pipe_name_collision_is_addr_in_use() {
    use interlink::local_socket::tokio::LocalSocketListener as TokioListener;

    let name = unique_local_name("taken-tokio");
    let _first = TokioListener::bind(name.as_str()).unwrap();
    let err = TokioListener::bind(name.as_str()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
}
