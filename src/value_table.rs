use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    PerfhashKeyValuePair, Result, Take5Error, Take5Writer, ValueFormat, ValueLayout,
    ValueTableInfo,
};

/// Scalar payloads that can be stored in a `FIXED` value table.
pub trait FixedValue {
    /// Width in bytes; becomes the dictionary's value size.
    const SIZE: u32;

    /// Appends the native-order encoding of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);
}

macro_rules! impl_fixed_value {
    ($($t:ty),*) => {
        $(
            impl FixedValue for $t {
                const SIZE: u32 = std::mem::size_of::<$t>() as u32;

                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_fixed_value!(u8, i8, u16, i16, u32, i32, f32, u64, i64, f64);

/// Unit width of strings in an `INDIRECT` value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    /// One-byte units.
    Utf8,
    /// Two-byte native-order units.
    Utf16,
}

impl StringEncoding {
    pub fn unit_size(self) -> u32 {
        match self {
            StringEncoding::Utf8 => 1,
            StringEncoding::Utf16 => 2,
        }
    }
}

/// Builder type for emitting the value table of a take5 dictionary.
///
/// Pairs must already carry the indices assigned by
/// [`PerfectHashBuilder`](crate::PerfectHashBuilder); entry `i` of the table
/// holds the value of the pair with index `i`. The table starts at the
/// configured base offset and string payloads follow it, so offset `0` never
/// refers to a real payload.
#[derive(Debug)]
pub struct ValueTableBuilder {
    base_offset: u32,
    writer_buffer_size: usize,
}

impl Default for ValueTableBuilder {
    fn default() -> Self {
        Self {
            base_offset: 0,
            writer_buffer_size: 16 << 20, // 16 MiB
        }
    }
}

impl ValueTableBuilder {
    /// Sets the offset at which the value table starts; it becomes the
    /// layout's `value_data`.
    pub fn with_base_offset(mut self, offset: u32) -> Self {
        self.base_offset = offset;
        self
    }

    /// Adjusts the capacity of the buffered writer used for string payloads.
    pub fn with_writer_buffer_size(mut self, size: usize) -> Self {
        self.writer_buffer_size = size;
        self
    }

    /// Writes a dense `FIXED` table of scalars.
    pub fn build_fixed<W, K, V>(
        self,
        writer: &W,
        pairs: &[PerfhashKeyValuePair<K, V>],
    ) -> Result<ValueTableInfo>
    where
        W: Take5Writer,
        V: FixedValue,
    {
        let slots = index_slots(pairs)?;
        let mut table = Vec::with_capacity(slots.len() * V::SIZE as usize);
        for value in &slots {
            value.encode(&mut table);
        }
        writer.write_all_at(&table, self.base_offset as u64)?;

        Ok(ValueTableInfo {
            layout: ValueLayout::new(ValueFormat::Fixed, V::SIZE, self.base_offset),
            entry_count: slots.len() as u64,
            end_offset: self.base_offset as u64 + table.len() as u64,
        })
    }

    /// Writes an `INDIRECT` table of offsets followed by null-terminated
    /// strings.
    ///
    /// `text` extracts the string of a value; `None` stores the absent marker.
    ///
    /// # Errors
    ///
    /// Fails when a pair has no index, two pairs share an index, a string
    /// contains a NUL character, or the payload outgrows 32-bit offsets.
    pub fn build_strings<W, K, V, F>(
        self,
        writer: &W,
        pairs: &[PerfhashKeyValuePair<K, V>],
        encoding: StringEncoding,
        text: F,
    ) -> Result<ValueTableInfo>
    where
        W: Take5Writer,
        F: Fn(&V) -> Option<&str>,
    {
        let slots = index_slots(pairs)?;
        let table_end = self.base_offset as u64 + slots.len() as u64 * 4;

        let offset = AtomicU64::new(table_end);
        let mut buf_writer = BufWriter::with_capacity(
            self.writer_buffer_size,
            Take5WriterWrapper {
                inner: writer,
                offset: &offset,
            },
        );

        let mut table = Vec::with_capacity(slots.len() * 4);
        let mut unit = Vec::new();
        for value in slots {
            let Some(s) = text(value) else {
                table.extend_from_slice(&0u32.to_ne_bytes());
                continue;
            };
            if s.contains('\0') {
                return Err(Take5Error::Encode(format!(
                    "string payload {s:?} contains a NUL unit"
                )));
            }

            let ptr = offset.load(Ordering::Relaxed) + buf_writer.buffer().len() as u64;
            let ptr = u32::try_from(ptr)
                .map_err(|_| Take5Error::Encode(format!("payload offset {ptr} exceeds 32 bits")))?;
            table.extend_from_slice(&ptr.to_ne_bytes());

            unit.clear();
            match encoding {
                StringEncoding::Utf8 => {
                    unit.extend_from_slice(s.as_bytes());
                    unit.push(0);
                }
                StringEncoding::Utf16 => {
                    for u in s.encode_utf16().chain(std::iter::once(0)) {
                        unit.extend_from_slice(&u.to_ne_bytes());
                    }
                }
            }
            buf_writer.write_all(&unit)?;
        }
        let end_offset = offset.load(Ordering::Relaxed) + buf_writer.buffer().len() as u64;
        buf_writer.flush()?;
        if end_offset > u32::MAX as u64 {
            return Err(Take5Error::Encode(format!(
                "value table end {end_offset} exceeds 32 bits"
            )));
        }

        writer.write_all_at(&table, self.base_offset as u64)?;

        Ok(ValueTableInfo {
            layout: ValueLayout::new(
                ValueFormat::Indirect,
                encoding.unit_size(),
                self.base_offset,
            ),
            entry_count: table.len() as u64 / 4,
            end_offset,
        })
    }
}

/// Orders pair values by assigned index, rejecting gaps and duplicates.
fn index_slots<K, V>(pairs: &[PerfhashKeyValuePair<K, V>]) -> Result<Vec<&V>> {
    let mut slots: Vec<Option<&V>> = vec![None; pairs.len()];
    for (position, pair) in pairs.iter().enumerate() {
        let index = pair
            .index()
            .ok_or_else(|| Take5Error::Encode(format!("pair {position} has no index")))?;
        let Some(slot) = slots.get_mut(index as usize) else {
            return Err(Take5Error::Encode(format!(
                "index {index} out of range for {} pairs",
                pairs.len()
            )));
        };
        if slot.is_some() {
            return Err(Take5Error::Encode(format!(
                "index {index} assigned to more than one pair"
            )));
        }
        *slot = Some(&pair.value);
    }
    // every index in range was claimed exactly once, so no slot is empty
    Ok(slots.into_iter().flatten().collect())
}

/// Thin wrapper implementing [`std::io::Write`] in terms of [`Take5Writer`].
///
/// Each write lands in the underlying writer at consecutive offsets tracked by
/// an atomic counter.
struct Take5WriterWrapper<'a, W: Take5Writer> {
    inner: &'a W,
    offset: &'a AtomicU64,
}

impl<W: Take5Writer> Write for Take5WriterWrapper<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let offset = self.offset.fetch_add(buf.len() as u64, Ordering::Relaxed);
        self.inner.write_all_at(buf, offset)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
