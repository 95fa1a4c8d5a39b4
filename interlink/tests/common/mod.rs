//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

/// A local socket name no other test in this run (or a concurrent run) uses.
///
/// Namespaced, so it maps to the abstract namespace on Linux, a pipe name on
/// Windows and a `/tmp` file elsewhere.
pub fn unique_local_name(tag: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("@interlink-test-{tag}-{}-{n}", std::process::id())
}

/// Fresh directory for socket files, removed when dropped.
pub fn socket_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("interlink-")
        .tempdir()
        .expect("create socket directory")
}

/// Test payload with a recognizable pattern.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
