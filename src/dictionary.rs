use crate::{Result, Take5Reader, Take5Match, ValueCodec, ValueLayout};

/// Read-only view of a loaded take5 dictionary's value table.
///
/// The dictionary owns (or borrows, depending on `R`) the mapped bytes and the
/// value layout decoded from the file header. Loading and automaton traversal
/// happen elsewhere; this type only serves payload decoding for the matches
/// traversal produces.
///
/// # Type Parameters
/// - `R`: buffer satisfying [`Take5Reader`], e.g. `Vec<u8>` or `memmap2::Mmap`.
#[derive(Debug)]
pub struct Take5Dictionary<R: Take5Reader> {
    layout: ValueLayout,
    data: R,
}

impl<R: Take5Reader> Take5Dictionary<R> {
    /// Wraps a buffer with an already validated layout.
    pub fn new(data: R, layout: ValueLayout) -> Self {
        Self { layout, data }
    }

    /// Wraps a buffer, decoding the raw header fields eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedValueFormat`](crate::Take5Error::UnsupportedValueFormat)
    /// when the top byte of `format_word` is not a known tag.
    pub fn from_raw(data: R, format_word: u32, value_size: u32, value_data: u32) -> Result<Self> {
        let layout = ValueLayout::from_raw(format_word, value_size, value_data)?;
        Ok(Self::new(data, layout))
    }

    pub fn layout(&self) -> &ValueLayout {
        &self.layout
    }

    pub fn data(&self) -> &[u8] {
        self.data.bytes()
    }

    /// Codec over this dictionary's buffer and layout.
    pub fn codec(&self) -> ValueCodec<'_> {
        ValueCodec::new(self.data.bytes(), self.layout)
    }

    /// Creates an empty match for automaton traversal to fill in.
    pub fn new_match(&self) -> Take5Match<'_, R> {
        Take5Match::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::*;

    fn fixed_int_table(values: &[i32], value_data: usize) -> Vec<u8> {
        let mut data = vec![0u8; value_data];
        for value in values {
            data.extend_from_slice(&value.to_ne_bytes());
        }
        data
    }

    #[test]
    fn test_from_raw() {
        let data = fixed_int_table(&[1, 2, 3], 100);
        let dict = Take5Dictionary::from_raw(data, ValueFormat::FIXED, 4, 100).unwrap();
        assert_eq!(dict.layout().format, ValueFormat::Fixed);
        assert_eq!(dict.codec().read_i32(2).unwrap(), 3);

        Take5Dictionary::from_raw(Vec::new(), 0x0900_0000, 4, 0).unwrap_err();
    }

    #[test]
    fn test_mmap_backed() {
        use std::io::Write;

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&fixed_int_table(&[10, 20, 30, 40], 16))
            .unwrap();
        let mmap = unsafe { memmap2::Mmap::map(&file).unwrap() };

        let dict = Take5Dictionary::new(mmap, ValueLayout::new(ValueFormat::Fixed, 4, 16));
        assert_eq!(dict.codec().resolve_offset(3).unwrap(), 28);
        assert_eq!(dict.codec().read_i32(3).unwrap(), 40);
        dict.codec().read_i32(4).unwrap_err();
    }

    #[test]
    fn test_concurrent_lookups() {
        const N: i32 = 1000;
        let values = (0..N).collect::<Vec<_>>();
        let dict = Arc::new(Take5Dictionary::new(
            fixed_int_table(&values, 8),
            ValueLayout::new(ValueFormat::Fixed, 4, 8),
        ));

        let threads = (0..4)
            .map(|t| {
                let dict = dict.clone();
                std::thread::spawn(move || {
                    let mut m = dict.new_match();
                    for i in (t..N).step_by(4) {
                        m.populate(&dict, i as u32, 1, 0);
                        assert_eq!(m.int_value().unwrap(), i);
                        assert_eq!(m.raw_slice(4).unwrap(), &i.to_ne_bytes());
                        m.reset();
                    }
                })
            })
            .collect::<Vec<_>>();
        for thread in threads {
            thread.join().unwrap();
        }
    }
}
