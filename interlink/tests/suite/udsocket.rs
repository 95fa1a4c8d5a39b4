//! Unix domain socket tests

use std::io::{Read, Write};
use std::net::Shutdown;
use std::thread;

use interlink::os::unix::udsocket::{UdDatagram, UdStream, UdStreamListener, UdSocketPath};

use crate::common::{payload, socket_dir};

#[test]
fn stream_transfers_large_payload() {
    let dir = socket_dir();
    let path = dir.path().join("large.sock");
    let listener = UdStreamListener::bind(path.as_path()).unwrap();
    let data = payload(256 * 1024);
    let expected = data.clone();

    let writer = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        conn.write_all(&data).unwrap();
        conn.shutdown(Shutdown::Write).unwrap();
    });

    let mut client = UdStream::connect(path.as_path()).unwrap();
    let mut received = Vec::new();
    client.read_to_end(&mut received).unwrap();
    writer.join().unwrap();
    assert_eq!(received, expected);
}

#[test]
fn listener_reports_its_path() {
    let dir = socket_dir();
    let path = dir.path().join("named.sock");
    let listener = UdStreamListener::bind(path.as_path()).unwrap();
    let local = listener.local_path().unwrap();
    assert_eq!(local.file_path(), Some(path.as_path()));

    let client = UdStream::connect(path.as_path()).unwrap();
    assert_eq!(client.peer_path().unwrap().file_path(), Some(path.as_path()));
}

#[test]
fn datagrams_keep_boundaries() {
    let dir = socket_dir();
    let server_path = dir.path().join("server.sock");
    let client_path = dir.path().join("client.sock");
    let server = UdDatagram::bound(server_path.as_path()).unwrap();
    let client = UdDatagram::bound(client_path.as_path()).unwrap();

    client.send_to(b"first", server_path.as_path()).unwrap();
    client.send_to(b"second message", server_path.as_path()).unwrap();

    let mut buf = [0; 64];
    let (n, from) = server.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"first");
    assert_eq!(from.file_path(), Some(client_path.as_path()));

    let (n, _) = server.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"second message");

    server.send_to(b"reply", from.borrow()).unwrap();
    let n = client.recv(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"reply");
}

#[test]
fn datagram_destination_enables_send() {
    let dir = socket_dir();
    let path = dir.path().join("dest.sock");
    let server = UdDatagram::bound(path.as_path()).unwrap();
    let client = UdDatagram::unbound().unwrap();
    client.set_destination(path.as_path()).unwrap();
    client.send(b"connected").unwrap();

    let mut buf = [0; 16];
    let (n, from) = server.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"connected");
    assert!(matches!(from, UdSocketPath::Unnamed));
}

#[test]
fn datagram_drop_guard_removes_file() {
    let dir = socket_dir();
    let path = dir.path().join("guarded.sock");
    let socket = UdDatagram::bound_with_drop_guard(path.as_path()).unwrap();
    assert!(path.exists());
    drop(socket);
    assert!(!path.exists());
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
fn namespaced_stream_leaves_no_file() {
    let name = format!("@interlink-ud-{}", std::process::id());
    let listener = UdStreamListener::bind(name.as_str()).unwrap();
    assert!(listener.local_path().unwrap().is_namespaced());

    let mut client = UdStream::connect(name.as_str()).unwrap();
    let mut server = listener.accept().unwrap();
    client.write_all(b"abstract").unwrap();
    let mut buf = [0; 8];
    server.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"abstract");
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn tokio_bound_sender_uses_poll_send() {
    use interlink::os::unix::udsocket::tokio::UdDatagram as TokioUdDatagram;
    use std::future::poll_fn;

    let dir = socket_dir();
    let server_path = dir.path().join("poll-send-server.sock");
    let client_path = dir.path().join("poll-send-client.sock");
    let server = TokioUdDatagram::bound(server_path.as_path()).unwrap();
    let client = TokioUdDatagram::bound(client_path.as_path()).unwrap();
    client.set_destination(server_path.as_path()).unwrap();

    let sent = poll_fn(|cx| client.poll_send(cx, b"poll_send"))
        .await
        .unwrap();
    assert_eq!(sent, 9);

    let mut buf = [0; 16];
    let (n, from) = server.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"poll_send");
    assert_eq!(from.file_path(), Some(client_path.as_path()));
}
