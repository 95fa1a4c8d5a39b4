//! Unnamed pipe tests

use std::io::{Read, Write};
use std::thread;

use interlink::unnamed_pipe::pipe;

use crate::common::payload;

#[test]
fn bytes_flow_writer_to_reader() {
    let (mut writer, mut reader) = pipe().unwrap();
    writer.write_all(b"through the pipe").unwrap();
    drop(writer);

    let mut received = String::new();
    reader.read_to_string(&mut received).unwrap();
    assert_eq!(received, "through the pipe");
}

#[test]
fn writer_in_another_thread() {
    let (mut writer, mut reader) = pipe().unwrap();
    let data = payload(1024 * 1024);
    let expected = data.clone();

    let producer = thread::spawn(move || writer.write_all(&data).unwrap());
    let mut received = Vec::new();
    reader.read_to_end(&mut received).unwrap();
    producer.join().unwrap();
    assert_eq!(received, expected);
}

#[test]
fn reader_gone_breaks_pipe() {
    let (mut writer, reader) = pipe().unwrap();
    drop(reader);
    let err = writer.write_all(b"nobody listens").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
}
