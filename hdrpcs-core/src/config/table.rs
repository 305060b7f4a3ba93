//! Configuration value table
//!
//! The supply exposes its calibration constants (shunt resistances, stage
//! gains, ...) as a flat list of `f32` values addressed by index. The host
//! reads them with GET_CONFIG and writes them with SET_CONFIG; the firmware
//! persists the table to flash.

use heapless::Vec;
use hdrpcs_protocol::checksum;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of configuration entries
pub const MAX_CONFIG_ENTRIES: usize = 32;

/// Magic number to identify valid configuration data
pub const CONFIG_MAGIC: u32 = 0x48445243; // "HDRC"

/// Current configuration data version
pub const CONFIG_VERSION: u8 = 1;

/// Maximum serialized table size
pub const MAX_CONFIG_BYTES: usize = 4 + 1 + 1 + MAX_CONFIG_ENTRIES * 4 + 1 + 8;

/// Configuration table errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Index is outside the table
    IndexOutOfRange(u8),
    /// More values than the table can hold
    TooManyEntries,
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// Checksum over the values did not match
    ChecksumMismatch,
    /// Invalid magic or version
    InvalidFormat,
}

/// Indexed configuration values
///
/// The number of entries is fixed when the table is built; SET_CONFIG can
/// only overwrite existing entries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConfigTable {
    /// Magic number for validation
    magic: u32,
    /// Data format version
    version: u8,
    /// Entry values, position is the wire index
    values: Vec<f32, MAX_CONFIG_ENTRIES>,
    /// Additive checksum over the little-endian value bytes
    checksum: u8,
}

impl Default for ConfigTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTable {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            magic: CONFIG_MAGIC,
            version: CONFIG_VERSION,
            values: Vec::new(),
            checksum: 0,
        }
    }

    /// Create a table holding `values` at indices `0..values.len()`
    pub fn from_values(values: &[f32]) -> Result<Self, ConfigError> {
        let values = Vec::from_slice(values).map_err(|_| ConfigError::TooManyEntries)?;
        let mut table = Self {
            values,
            ..Self::new()
        };
        table.checksum = table.calculate_checksum();
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<f32> {
        self.values.get(index as usize).copied()
    }

    /// Overwrite entry `index`
    pub fn set(&mut self, index: u8, value: f32) -> Result<(), ConfigError> {
        let slot = self
            .values
            .get_mut(index as usize)
            .ok_or(ConfigError::IndexOutOfRange(index))?;
        *slot = value;
        self.checksum = self.calculate_checksum();
        Ok(())
    }

    /// Iterate `(index, value)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (u8, f32)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as u8, v))
    }

    /// Check magic and version
    pub fn is_valid(&self) -> bool {
        self.magic == CONFIG_MAGIC && self.version == CONFIG_VERSION
    }

    /// Check the stored checksum against the values
    pub fn verify_checksum(&self) -> bool {
        self.checksum == self.calculate_checksum()
    }

    fn calculate_checksum(&self) -> u8 {
        self.values
            .iter()
            .fold(0u8, |acc, v| acc.wrapping_add(checksum(&v.to_le_bytes())))
    }

    /// Serialize into `buffer` for persistence
    #[cfg(feature = "serde")]
    pub fn to_bytes<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| ConfigError::Serialize)
    }

    /// Load a table written by [`ConfigTable::to_bytes`]
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let table: ConfigTable =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;

        if !table.is_valid() {
            return Err(ConfigError::InvalidFormat);
        }
        if !table.verify_checksum() {
            return Err(ConfigError::ChecksumMismatch);
        }
        Ok(table)
    }
}
