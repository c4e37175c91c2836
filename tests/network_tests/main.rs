//! Network test suite
//!
//! Runs real servers on ephemeral loopback ports.

mod client_tests;
mod peer_tests;
