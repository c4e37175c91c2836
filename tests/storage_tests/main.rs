//! Storage test suite

mod common;
