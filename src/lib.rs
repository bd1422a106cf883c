//! Value decoding and perfect-hash index assignment for take5 dictionaries.
//!
//! A take5 dictionary is an immutable, memory-mapped structure that maps keys
//! to dense integer indices through an automaton, and indices to typed
//! payloads through a value table. This crate covers the two pieces on either
//! side of that index:
//!
//! - at query time, [`Take5Match`] and [`ValueCodec`] decode the payload of a
//!   matched index (fixed-width scalars, raw offsets, or null-terminated
//!   strings) directly against the mapped bytes of a [`Take5Dictionary`];
//! - at build time, [`PerfectHashBuilder`] gives every key of a batch a
//!   unique index in `0..N`, and [`ValueTableBuilder`] writes the value table
//!   those indices address.
//!
//! ```
//! use std::sync::Mutex;
//! use take5::{PerfectHashBuilder, StringEncoding, Take5Dictionary, ValueTableBuilder};
//!
//! # fn main() -> take5::Result<()> {
//! let builder = PerfectHashBuilder::default();
//! let mut pairs = builder.pairs([("apple", "red"), ("banana", "yellow")])?;
//! let (table, _) = builder.build(&mut pairs)?;
//!
//! let writer = Mutex::new(Vec::new());
//! let info = ValueTableBuilder::default()
//!     .with_base_offset(16)
//!     .build_strings(&writer, &pairs, StringEncoding::Utf8, |v| Some(*v))?;
//!
//! let data = writer.into_inner().expect("unpoisoned");
//! let dict = Take5Dictionary::new(data, info.layout);
//! let index = table.slot_of(pairs[1].placement_hash()).expect("non-empty table");
//! let mut m = dict.new_match();
//! m.populate(&dict, index, 6, 0);
//! assert_eq!(m.string_value()?.as_deref(), Some("yellow"));
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{Result, Take5Error};

mod hasher;
pub use hasher::{
    Take5DefaultHashLoader, Take5HashConfig, Take5HashLoader, key_hash, placement_hash,
};

mod meta;
pub use meta::{PerfectHashInfo, ValueFormat, ValueLayout, ValueTableInfo};

mod reader;
pub use reader::Take5Reader;

mod writer;
pub use writer::Take5Writer;

mod codec;
pub use codec::{StringValue, ValueCodec};

mod dictionary;
pub use dictionary::Take5Dictionary;

mod matching;
pub use matching::Take5Match;

mod pair;
pub use pair::PerfhashKeyValuePair;

mod builder;
pub use builder::{PerfectHashBuilder, PerfectHashTable};

mod value_table;
pub use value_table::{FixedValue, StringEncoding, ValueTableBuilder};
