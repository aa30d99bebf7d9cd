#![forbid(unsafe_code)]

//! Public entry point for the appity media library crate.
//!
//! The binary in `src/bin/backend.rs` wires these modules into an HTTP
//! server; everything it needs lives here so it can be tested without a
//! listening socket.

pub mod config;
pub mod direct;
pub mod error;
pub mod extract;
pub mod library;
pub mod naming;
pub mod server;

#[cfg(test)]
mod test_support;
