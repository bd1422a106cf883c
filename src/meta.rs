use serde::{Deserialize, Serialize};

use crate::{Result, Take5Error};

/// How an index maps to payload bytes, stored in the top byte of the
/// dictionary's value format word.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    /// No value table; the index is the payload.
    None,
    /// The index addresses payload-adjacent data directly.
    Index,
    /// Dense array of `value_size`-byte scalars.
    Fixed,
    /// Array of 4-byte offsets to variable-length payloads.
    Indirect,
}

impl ValueFormat {
    pub const MASK: u32 = 0xFF00_0000;

    pub const NONE: u32 = 0x0000_0000;
    pub const INDEX: u32 = 0x0100_0000;
    pub const FIXED: u32 = 0x0200_0000;
    pub const INDIRECT: u32 = 0x0300_0000;

    /// Decodes the tag from a raw format word, ignoring the reserved low bits.
    pub fn from_word(word: u32) -> Result<Self> {
        match word & Self::MASK {
            Self::NONE => Ok(ValueFormat::None),
            Self::INDEX => Ok(ValueFormat::Index),
            Self::FIXED => Ok(ValueFormat::Fixed),
            Self::INDIRECT => Ok(ValueFormat::Indirect),
            _ => Err(Take5Error::UnsupportedValueFormat(word)),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            ValueFormat::None => Self::NONE,
            ValueFormat::Index => Self::INDEX,
            ValueFormat::Fixed => Self::FIXED,
            ValueFormat::Indirect => Self::INDIRECT,
        }
    }
}

/// Static value-table metadata of a loaded dictionary.
///
/// Decoded and validated once at load time and never mutated afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLayout {
    /// Decoded format tag.
    pub format: ValueFormat,
    /// Reserved low 24 bits of the format word, carried through untouched.
    pub flags: u32,
    /// Width in bytes of a scalar payload or of one string unit.
    pub value_size: u32,
    /// Byte offset of the value table within the buffer.
    pub value_data: u32,
}

impl ValueLayout {
    pub fn new(format: ValueFormat, value_size: u32, value_data: u32) -> Self {
        Self {
            format,
            flags: 0,
            value_size,
            value_data,
        }
    }

    /// Builds a layout from the raw header fields, rejecting unknown tags.
    pub fn from_raw(format_word: u32, value_size: u32, value_data: u32) -> Result<Self> {
        let format = ValueFormat::from_word(format_word)?;
        Ok(Self {
            format,
            flags: format_word & !ValueFormat::MASK,
            value_size,
            value_data,
        })
    }

    /// Re-packs the format tag and reserved bits into a header word.
    pub fn format_word(&self) -> u32 {
        self.format.tag() | (self.flags & !ValueFormat::MASK)
    }
}

/// Summary returned by [`PerfectHashBuilder::build`](crate::PerfectHashBuilder::build).
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct PerfectHashInfo {
    /// Number of pairs that received an index.
    pub entry_count: u64,
    /// Number of buckets in the successful attempt.
    pub bucket_count: u64,
    /// Size of the index space; equal to `entry_count`.
    pub slot_count: u64,
    /// Seed of the successful attempt.
    pub seed: u64,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Number of keys in the fullest bucket.
    pub largest_bucket: u32,
    /// Largest displacement recorded for any bucket.
    pub max_displacement: u64,
}

/// Summary returned by [`ValueTableBuilder`](crate::ValueTableBuilder).
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ValueTableInfo {
    /// Layout a dictionary over the written bytes must use.
    pub layout: ValueLayout,
    /// Number of entries in the value table.
    pub entry_count: u64,
    /// Offset one past the last byte written.
    pub end_offset: u64,
}
