//! Device configuration
//!
//! Indexed calibration values that the host reads and writes over the link,
//! stored as postcard binary data.

pub mod table;

pub use table::*;
