//! Filesystem helpers
//!
//! - [`glob`] / [`rglob`]: find files by glob or regex, flat or recursive
//! - [`strfsize`]: human readable byte counts
//! - [`file_checksum`]: streaming file digests

pub mod checksum;
pub mod glob;
pub mod size;

pub use checksum::{DEFAULT_BUFFER_SIZE, HashAlgorithm, checksum_reader, file_checksum};
pub use glob::{MatchMode, glob, rglob};
pub use size::{DEFAULT_DIGITS, MAX_DIGITS, strfsize};
