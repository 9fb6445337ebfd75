//! The commands that can be run on a backup.

pub mod restore;
