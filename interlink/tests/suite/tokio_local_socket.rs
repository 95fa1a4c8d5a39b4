//! Tokio local socket tests

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use interlink::local_socket::tokio::{LocalSocketListener, LocalSocketStream};

use crate::common::unique_local_name;

#[tokio::test]
async fn echo_with_split_halves() {
    let name = unique_local_name("tokio-echo");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();

    let server = tokio::spawn(async move {
        let conn = listener.accept().await.unwrap();
        let (read, mut write) = conn.split();
        let mut lines = BufReader::new(read).lines();
        while let Some(line) = lines.next_line().await.unwrap() {
            write.write_all(line.to_uppercase().as_bytes()).await.unwrap();
            write.write_all(b"\n").await.unwrap();
        }
    });

    let client = LocalSocketStream::connect(name.as_str()).await.unwrap();
    let (read, mut write) = client.split();
    write.write_all(b"ping\npong\n").await.unwrap();
    let mut lines = BufReader::new(read).lines();
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("PING"));
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("PONG"));

    drop(write);
    drop(lines);
    server.await.unwrap();
}

#[tokio::test]
async fn halves_reunite() {
    let name = unique_local_name("tokio-reunite");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();
    let (client, server) = tokio::join!(
        LocalSocketStream::connect(name.as_str()),
        listener.accept()
    );
    let client = client.unwrap();
    let mut server = server.unwrap();

    let (read, write) = client.split();
    let mut client = LocalSocketStream::reunite(read, write).unwrap();
    client.write_all(b"whole again").await.unwrap();
    let mut buf = [0; 11];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"whole again");
}

#[tokio::test]
async fn mismatched_halves_are_returned() {
    let name = unique_local_name("tokio-mismatch");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();
    let (a, a_server) = tokio::join!(
        LocalSocketStream::connect(name.as_str()),
        listener.accept()
    );
    let (b, b_server) = tokio::join!(
        LocalSocketStream::connect(name.as_str()),
        listener.accept()
    );
    let (_a_server, _b_server) = (a_server.unwrap(), b_server.unwrap());

    let (a_read, _a_write) = a.unwrap().split();
    let (_b_read, b_write) = b.unwrap().split();
    let err = LocalSocketStream::reunite(a_read, b_write).unwrap_err();
    let interlink::ReuniteError { read_half, write_half } = err;
    drop((read_half, write_half));
}

#[tokio::test]
async fn many_concurrent_clients() {
    let name = unique_local_name("tokio-concurrent");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();

    let server = tokio::spawn(async move {
        for _ in 0..8 {
            let mut conn = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut byte = [0; 1];
                conn.read_exact(&mut byte).await.unwrap();
                conn.write_all(&[byte[0].wrapping_mul(2)]).await.unwrap();
            });
        }
    });

    let clients = (0..8_u8).map(|i| {
        let name = name.clone();
        tokio::spawn(async move {
            let mut conn = LocalSocketStream::connect(name.as_str()).await.unwrap();
            conn.write_all(&[i]).await.unwrap();
            let mut byte = [0; 1];
            conn.read_exact(&mut byte).await.unwrap();
            assert_eq!(byte[0], i * 2);
        })
    });
    for client in clients.collect::<Vec<_>>() {
        client.await.unwrap();
    }
    server.await.unwrap();
}

#[tokio::test]
async fn peer_pid_over_tokio() {
    let name = unique_local_name("tokio-pid");
    let listener = LocalSocketListener::bind(name.as_str()).unwrap();
    let (client, _server) = tokio::join!(
        LocalSocketStream::connect(name.as_str()),
        listener.accept()
    );
    let client = client.unwrap();
    if cfg!(any(windows, target_os = "linux", target_os = "android")) {
        assert_eq!(client.peer_pid().unwrap(), std::process::id());
    }
}
