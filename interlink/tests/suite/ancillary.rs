//! Control message tests

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsFd;

use interlink::os::unix::udsocket::cmsg::ancillary::{Ancillary, FileDescriptors};
use interlink::os::unix::udsocket::cmsg::{Cmsg, CmsgBuffer};
use interlink::os::unix::udsocket::{UdDatagram, UdStream};
use std::mem::size_of;

#[test]
fn passes_file_descriptor_over_stream() {
    let (sender, receiver) = UdStream::pair().unwrap();
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(b"shared through SCM_RIGHTS").unwrap();

    let fds = [file.as_fd()];
    let mut out = CmsgBuffer::new();
    out.add_message(&FileDescriptors(&fds));
    assert_eq!(sender.send_ancillary(b"x", out.as_cmsg_ref()).unwrap(), 1);

    let mut buf = [0; 4];
    let mut abuf = CmsgBuffer::with_capacity(Cmsg::space_for_payload(size_of::<i32>()));
    let got = receiver.recv_ancillary(&mut buf, &mut abuf).unwrap();
    assert_eq!(got.main, 1);
    assert!(!abuf.truncated());

    let mut decoded = abuf.decode();
    assert_eq!(decoded.len(), 1);
    let fd = match decoded.remove(0) {
        Ancillary::FileDescriptors(mut fds) => fds.remove(0),
        other => panic!("unexpected control message: {other:?}"),
    };

    let mut received = File::from(fd);
    received.seek(SeekFrom::Start(0)).unwrap();
    let mut contents = String::new();
    received.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "shared through SCM_RIGHTS");
}

#[test]
fn small_control_buffer_reports_truncation() {
    let (sender, receiver) = UdDatagram::pair().unwrap();
    let a = tempfile::tempfile().unwrap();
    let b = tempfile::tempfile().unwrap();
    let fds = [a.as_fd(), b.as_fd()];
    let mut out = CmsgBuffer::new();
    out.add_message(&FileDescriptors(&fds));
    sender.send_ancillary(b"two fds", out.as_cmsg_ref()).unwrap();

    let mut buf = [0; 16];
    let mut abuf = CmsgBuffer::new();
    let got = receiver.recv_ancillary(&mut buf, &mut abuf).unwrap();
    assert_eq!(&buf[..got.main], b"two fds");
    assert!(abuf.truncated());
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
fn credentials_attached_when_enabled() {
    use interlink::os::unix::udsocket::cmsg::ancillary::Credentials;

    let (sender, receiver) = UdDatagram::pair().unwrap();
    receiver.set_pass_credentials(true).unwrap();
    sender.send(b"who am i").unwrap();

    let mut buf = [0; 16];
    let mut abuf =
        CmsgBuffer::with_capacity(Cmsg::space_for_payload(size_of::<libc::ucred>()));
    receiver.recv_ancillary(&mut buf, &mut abuf).unwrap();

    let creds = abuf
        .decode()
        .into_iter()
        .find_map(|msg| match msg {
            Ancillary::Credentials(creds) => Some(creds),
            _ => None,
        })
        .expect("kernel attaches credentials");
    assert_eq!(creds, Credentials::current());
}

#[test]
fn peer_credentials_match_current_user() {
    let (a, _b) = UdStream::pair().unwrap();
    match a.peer_credentials() {
        Ok(creds) => {
            assert_eq!(creds.uid, unsafe { libc::geteuid() });
            assert_eq!(creds.gid, unsafe { libc::getegid() });
        }
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::Unsupported),
    }
}

fn close_on_exec(fd: &impl std::os::unix::io::AsRawFd) -> bool {
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) };
    assert_ne!(flags, -1);
    flags & libc::FD_CLOEXEC != 0
}

fn only_descriptor(abuf: &mut CmsgBuffer) -> std::os::unix::io::OwnedFd {
    let mut decoded = abuf.decode();
    assert_eq!(decoded.len(), 1);
    match decoded.remove(0) {
        Ancillary::FileDescriptors(mut fds) => {
            assert_eq!(fds.len(), 1);
            fds.remove(0)
        }
        other => panic!("unexpected control message: {other:?}"),
    }
}

#[test]
fn recv_from_ancillary_names_sender_and_carries_fd() {
    let dir = crate::common::socket_dir();
    let server_path = dir.path().join("anc-server.sock");
    let client_path = dir.path().join("anc-client.sock");
    let server = UdDatagram::bound(server_path.as_path()).unwrap();
    let client = UdDatagram::bound(client_path.as_path()).unwrap();
    client.set_destination(server_path.as_path()).unwrap();

    let mut file = tempfile::tempfile().unwrap();
    file.write_all(b"datagram fd").unwrap();
    let fds = [file.as_fd()];
    let mut out = CmsgBuffer::new();
    out.add_message(&FileDescriptors(&fds));
    client.send_ancillary(b"with fd", out.as_cmsg_ref()).unwrap();

    let mut buf = [0; 16];
    let mut abuf = CmsgBuffer::with_capacity(Cmsg::space_for_payload(size_of::<i32>()));
    let (got, from) = server.recv_from_ancillary(&mut buf, &mut abuf).unwrap();
    assert_eq!(&buf[..got.main], b"with fd");
    assert_eq!(from.file_path(), Some(client_path.as_path()));

    let fd = only_descriptor(&mut abuf);
    assert!(close_on_exec(&fd));
    let mut received = File::from(fd);
    received.seek(SeekFrom::Start(0)).unwrap();
    let mut contents = String::new();
    received.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "datagram fd");
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn passes_file_descriptor_over_tokio_stream() {
    use interlink::os::unix::udsocket::tokio::UdStream as TokioUdStream;

    let (sender, receiver) = TokioUdStream::pair().unwrap();
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(b"async SCM_RIGHTS").unwrap();

    let fds = [file.as_fd()];
    let mut out = CmsgBuffer::new();
    out.add_message(&FileDescriptors(&fds));

    // Receive first so the readiness path has to wait for the send
    let recv = tokio::spawn(async move {
        let mut buf = [0; 4];
        let mut abuf = CmsgBuffer::with_capacity(Cmsg::space_for_payload(size_of::<i32>()));
        let got = receiver.recv_ancillary(&mut buf, &mut abuf).await.unwrap();
        assert_eq!(&buf[..got.main], b"y");
        assert!(!abuf.truncated());
        only_descriptor(&mut abuf)
    });
    tokio::task::yield_now().await;
    assert_eq!(sender.send_ancillary(b"y", out.as_cmsg_ref()).await.unwrap(), 1);

    let fd = recv.await.unwrap();
    assert!(close_on_exec(&fd));
    let mut received = File::from(fd);
    received.seek(SeekFrom::Start(0)).unwrap();
    let mut contents = String::new();
    received.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "async SCM_RIGHTS");
}
