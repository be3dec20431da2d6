pub mod common;
pub mod snapshot_tests;
