//! Platform-specific functionality.
//!
//! The portable modules at the crate root are built on top of these.

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;
