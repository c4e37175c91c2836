//! KV layer test suite

mod common;
mod versioned_tests;
