//! Command implementations for the toolbox CLI
//!
//! Each command is organized into its own module.

pub mod checksum;
pub mod config;
pub mod find;
pub mod prune;
pub mod size;
