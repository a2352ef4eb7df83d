//! Common test utilities

#![allow(dead_code)]

pub mod iobroker_mock;
pub mod test_fixtures;

pub use iobroker_mock::*;
pub use test_fixtures::*;
