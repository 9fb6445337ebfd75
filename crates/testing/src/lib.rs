//! Testing utilities for the `sharevault` ecosystem.

/// Collections to be used solely for testing.
pub mod collection;
/// Remote collaborators to be used solely for testing.
pub mod remote;

use std::error::Error;

pub use crate::{
    collection::in_memory_collection::InMemoryCollection,
    remote::{
        in_memory_drive::{DriveCall, InMemoryDrive},
        in_memory_items::InMemoryItems,
    },
};

/// A test result.
pub type TestResult<T> = Result<T, Box<dyn Error>>;

/// Install a logger printing to the terminal, for debugging tests.
///
/// Installing it more than once is no error.
pub fn init_logging() {
    _ = simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );
}
