//! Library target for the `nova` binary.
//!
//! `main.rs` is compiled here as a module so `cargo test -p nova-cli --lib`
//! typechecks and unit-tests the CLI without building the binary tests.

#[allow(dead_code)]
#[path = "main.rs"]
mod main_bin;
