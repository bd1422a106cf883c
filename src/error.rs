use thiserror::Error;

/// Errors surfaced by value decoding and perfect-hash construction.
///
/// Decoding errors never leave a dictionary in a bad state; the same
/// dictionary stays usable for later lookups.
#[derive(Error, Debug)]
pub enum Take5Error {
    /// The dictionary's value size is not one the accessor can decode.
    ///
    /// `expected` lists every accepted width: a single width for scalars,
    /// `[1, 2]` for strings.
    #[error("value size mismatch: expected one of {expected:?}, dictionary has {actual}")]
    ValueSizeMismatch {
        expected: &'static [u32],
        actual: u32,
    },

    /// The top byte of the value format word is not a known tag.
    #[error("unsupported value format: {0:#010x}")]
    UnsupportedValueFormat(u32),

    /// String access on a dictionary whose value table holds no pointers.
    #[error("value table holds no pointers")]
    NoPointersHere,

    /// A read or write would fall outside the buffer.
    #[error("range {offset}+{length} out of bounds for buffer of {size} bytes")]
    OutOfBounds {
        offset: u64,
        length: u64,
        size: u64,
    },

    /// Payload access on a match that is not bound to a dictionary.
    #[error("match is not bound to a dictionary")]
    UnboundMatch,

    /// Two pairs carry the same 64-bit placement hash; no displacement can
    /// separate them. Distinct keys only get here through a broken hasher.
    #[error("duplicate placement hash {hash:#018x}")]
    DuplicateKeyHash { hash: u64 },

    /// The pair at `position` already carries an index.
    #[error("pair {position} already has an index assigned")]
    IndexAlreadyAssigned { position: usize },

    /// Every attempt exhausted its displacement search window.
    #[error("perfect hash construction failed for {keys} keys after {attempts} attempts")]
    PerfectHashConstructionFailed { keys: usize, attempts: u32 },

    #[error("invalid hash config: {0}")]
    InvalidHashConfig(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Take5Error>;
