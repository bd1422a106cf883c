use std::borrow::Cow;

use crate::{Result, Take5Error, Take5Reader, ValueFormat, ValueLayout};

/// Outcome of decoding an indirect string payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringValue<'a> {
    /// The value table entry is `0`.
    Absent,
    /// Decoded text; UTF-8 payloads borrow straight from the buffer.
    Present(Cow<'a, str>),
    /// The payload bytes are not valid UTF-8 / UTF-16.
    Malformed,
}

impl<'a> StringValue<'a> {
    /// Collapses `Malformed` into `None`.
    pub fn into_option(self) -> Option<Cow<'a, str>> {
        match self {
            StringValue::Present(text) => Some(text),
            StringValue::Absent | StringValue::Malformed => None,
        }
    }
}

/// Decodes payloads for match indices directly against a mapped buffer.
///
/// The codec is a pair of borrowed buffer and copied layout; it holds no
/// state of its own and every read is a stateless offset-based read, so it
/// may be used from any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct ValueCodec<'a> {
    data: &'a [u8],
    layout: ValueLayout,
}

impl<'a> ValueCodec<'a> {
    pub fn new(data: &'a [u8], layout: ValueLayout) -> Self {
        Self { data, layout }
    }

    pub fn layout(&self) -> &ValueLayout {
        &self.layout
    }

    /// Byte offset of the payload for `index`.
    ///
    /// `None` and `Index` formats return the index itself, `Fixed` addresses a
    /// dense scalar array and `Indirect` follows the stored 4-byte offset.
    pub fn resolve_offset(&self, index: u32) -> Result<u32> {
        match self.layout.format {
            ValueFormat::None | ValueFormat::Index => Ok(index),
            ValueFormat::Fixed => {
                let offset = index as u64 * self.layout.value_size as u64
                    + self.layout.value_data as u64;
                u32::try_from(offset).map_err(|_| self.out_of_bounds(offset, 0))
            }
            ValueFormat::Indirect => self.pointer(index),
        }
    }

    pub fn read_f32(&self, index: u32) -> Result<f32> {
        self.expect_size(&[4])?;
        let offset = self.resolve_offset(index)?;
        self.data.array_at(offset as usize).map(f32::from_ne_bytes)
    }

    pub fn read_i32(&self, index: u32) -> Result<i32> {
        self.expect_size(&[4])?;
        let offset = self.resolve_offset(index)?;
        self.data.i32_at(offset as usize)
    }

    pub fn read_f64(&self, index: u32) -> Result<f64> {
        self.expect_size(&[8])?;
        let offset = self.resolve_offset(index)?;
        self.data.array_at(offset as usize).map(f64::from_ne_bytes)
    }

    /// Decodes the null-terminated string referenced by the value table entry
    /// for `index`.
    ///
    /// Units are one byte (UTF-8) or two bytes (UTF-16, native order) as given
    /// by the value size. A string that runs off the end of the buffer is an
    /// error; bytes that do not decode are reported as
    /// [`StringValue::Malformed`].
    pub fn string_value(&self, index: u32) -> Result<StringValue<'a>> {
        let ptr = self.pointer(index)? as usize;
        if ptr == 0 {
            return Ok(StringValue::Absent);
        }
        if self.layout.format != ValueFormat::Indirect {
            return Err(Take5Error::NoPointersHere);
        }

        match self.layout.value_size {
            1 => {
                let tail = self.data.get(ptr..).unwrap_or_default();
                let len = tail
                    .iter()
                    .position(|&unit| unit == 0)
                    .ok_or_else(|| self.out_of_bounds(ptr as u64, tail.len() as u64 + 1))?;
                Ok(match std::str::from_utf8(&tail[..len]) {
                    Ok(text) => StringValue::Present(Cow::Borrowed(text)),
                    Err(_) => StringValue::Malformed,
                })
            }
            2 => {
                let tail = self.data.get(ptr..).unwrap_or_default();
                let units = tail
                    .chunks_exact(2)
                    .map(|unit| u16::from_ne_bytes([unit[0], unit[1]]));
                let mut len = 0usize;
                let mut terminated = false;
                for unit in units.clone() {
                    if unit == 0 {
                        terminated = true;
                        break;
                    }
                    len += 1;
                }
                if !terminated {
                    return Err(self.out_of_bounds(ptr as u64, (len as u64 + 1) * 2));
                }
                let decoded: std::result::Result<String, _> =
                    char::decode_utf16(units.take(len)).collect();
                Ok(match decoded {
                    Ok(text) => StringValue::Present(Cow::Owned(text)),
                    Err(_) => StringValue::Malformed,
                })
            }
            other => Err(Take5Error::ValueSizeMismatch {
                expected: &[1, 2],
                actual: other,
            }),
        }
    }

    /// Lenient string accessor: malformed payloads come back as `None`.
    ///
    /// The malformed case is logged so it stays distinguishable from an
    /// absent value; use [`string_value`](Self::string_value) to branch on it.
    pub fn read_string(&self, index: u32) -> Result<Option<String>> {
        let value = self.string_value(index)?;
        if value == StringValue::Malformed {
            tracing::warn!(
                index = index,
                value_size = self.layout.value_size,
                "Malformed string payload"
            );
        }
        Ok(value.into_option().map(Cow::into_owned))
    }

    /// Zero-copy view of `length` bytes starting at the payload offset.
    pub fn raw_slice(&self, index: u32, length: usize) -> Result<&'a [u8]> {
        let offset = self.resolve_offset(index)?;
        self.data.slice_at(offset as usize, length)
    }

    /// Reads the 4-byte value table entry for `index`.
    fn pointer(&self, index: u32) -> Result<u32> {
        let offset = index as u64 * 4 + self.layout.value_data as u64;
        let offset = usize::try_from(offset).map_err(|_| self.out_of_bounds(offset, 4))?;
        self.data.u32_at(offset)
    }

    fn expect_size(&self, expected: &'static [u32]) -> Result<()> {
        if !expected.contains(&self.layout.value_size) {
            return Err(Take5Error::ValueSizeMismatch {
                expected,
                actual: self.layout.value_size,
            });
        }
        Ok(())
    }

    fn out_of_bounds(&self, offset: u64, length: u64) -> Take5Error {
        Take5Error::OutOfBounds {
            offset,
            length,
            size: self.data.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_u32(data: &mut [u8], offset: usize, value: u32) {
        data[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }

    fn utf16_payload(text: &str) -> Vec<u8> {
        text.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|unit| unit.to_ne_bytes())
            .collect()
    }

    #[test]
    fn test_fixed_offsets() {
        let data = vec![0u8; 256];
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Fixed, 4, 100));
        for i in 0..32 {
            assert_eq!(codec.resolve_offset(i).unwrap(), 100 + i * 4);
        }
    }

    #[test]
    fn test_none_and_index_offsets() {
        let data = vec![0u8; 8];
        for format in [ValueFormat::None, ValueFormat::Index] {
            let codec = ValueCodec::new(&data, ValueLayout::new(format, 0, 0));
            assert_eq!(codec.resolve_offset(12345).unwrap(), 12345);
        }
    }

    #[test]
    fn test_fixed_int_scenario() {
        let mut data = vec![0u8; 128];
        put_u32(&mut data, 108, 42);
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Fixed, 4, 100));
        assert_eq!(codec.read_i32(2).unwrap(), 42);
    }

    #[test]
    fn test_fixed_floats() {
        let mut data = vec![0u8; 64];
        data[16..20].copy_from_slice(&1.5f32.to_ne_bytes());
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Fixed, 4, 12));
        assert_eq!(codec.read_f32(1).unwrap(), 1.5);

        data[24..32].copy_from_slice(&(-2.25f64).to_ne_bytes());
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Fixed, 8, 8));
        assert_eq!(codec.read_f64(2).unwrap(), -2.25);
    }

    #[test]
    fn test_size_mismatch() {
        let data = vec![0u8; 64];
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 2, 0));
        assert!(matches!(
            codec.read_f32(0),
            Err(Take5Error::ValueSizeMismatch {
                expected: &[4],
                actual: 2
            })
        ));
        assert!(matches!(
            codec.read_i32(0),
            Err(Take5Error::ValueSizeMismatch { .. })
        ));
        assert!(matches!(
            codec.read_f64(0),
            Err(Take5Error::ValueSizeMismatch {
                expected: &[8],
                actual: 2
            })
        ));
    }

    #[test]
    fn test_indirect_scalar_follows_pointer() {
        let mut data = vec![0u8; 64];
        put_u32(&mut data, 8, 40);
        put_u32(&mut data, 40, 7);
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 4, 4));
        assert_eq!(codec.resolve_offset(1).unwrap(), 40);
        assert_eq!(codec.read_i32(1).unwrap(), 7);
    }

    #[test]
    fn test_utf8_string() {
        let mut data = vec![0u8; 32];
        put_u32(&mut data, 0, 0);
        put_u32(&mut data, 4, 16);
        data[16..20].copy_from_slice(b"cat\0");
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 1, 0));

        assert_eq!(codec.read_string(1).unwrap().as_deref(), Some("cat"));
        assert!(matches!(
            codec.string_value(1).unwrap(),
            StringValue::Present(Cow::Borrowed("cat"))
        ));
        assert_eq!(codec.read_string(0).unwrap(), None);
        assert_eq!(codec.string_value(0).unwrap(), StringValue::Absent);
    }

    #[test]
    fn test_utf16_string() {
        let text = "naïve 日本 \u{1F600}";
        let payload = utf16_payload(text);
        let mut data = vec![0u8; 8];
        put_u32(&mut data, 4, 8);
        data.extend_from_slice(&payload);
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 2, 0));
        assert_eq!(codec.read_string(1).unwrap().as_deref(), Some(text));
    }

    #[test]
    fn test_empty_string_is_present() {
        let mut data = vec![0u8; 12];
        put_u32(&mut data, 0, 8);
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 1, 0));
        assert_eq!(codec.read_string(0).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_malformed_strings() {
        let mut data = vec![0u8; 24];
        put_u32(&mut data, 0, 8);
        data[8..11].copy_from_slice(&[0xff, 0xfe, 0]);
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 1, 0));
        assert_eq!(codec.string_value(0).unwrap(), StringValue::Malformed);
        assert_eq!(codec.read_string(0).unwrap(), None);

        // unpaired high surrogate
        let mut data = vec![0u8; 16];
        put_u32(&mut data, 0, 8);
        data[8..10].copy_from_slice(&0xd800u16.to_ne_bytes());
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 2, 0));
        assert_eq!(codec.string_value(0).unwrap(), StringValue::Malformed);
    }

    #[test]
    fn test_string_errors() {
        let mut data = vec![0u8; 16];
        put_u32(&mut data, 0, 8);
        data[8..16].copy_from_slice(b"dogsdogs");

        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Fixed, 1, 0));
        assert!(matches!(
            codec.read_string(0),
            Err(Take5Error::NoPointersHere)
        ));

        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 4, 0));
        assert!(matches!(
            codec.read_string(0),
            Err(Take5Error::ValueSizeMismatch {
                expected: &[1, 2],
                actual: 4
            })
        ));
        let message = codec.read_string(0).unwrap_err().to_string();
        assert_eq!(
            message,
            "value size mismatch: expected one of [1, 2], dictionary has 4"
        );

        // no terminator before the end of the buffer
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 1, 0));
        assert!(matches!(
            codec.read_string(0),
            Err(Take5Error::OutOfBounds { offset: 8, .. })
        ));
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 2, 0));
        assert!(matches!(
            codec.read_string(0),
            Err(Take5Error::OutOfBounds { offset: 8, .. })
        ));

        // codec stays usable after errors
        assert!(matches!(
            codec.read_string(5),
            Err(Take5Error::OutOfBounds { .. })
        ));
        assert_eq!(codec.resolve_offset(0).unwrap(), 8);
    }

    #[test]
    fn test_raw_slice() {
        let mut data = vec![0u8; 32];
        put_u32(&mut data, 4, 20);
        data[20..24].copy_from_slice(&[1, 2, 3, 4]);
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Indirect, 1, 0));
        assert_eq!(codec.raw_slice(1, 4).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(codec.raw_slice(1, 12).unwrap().len(), 12);
        codec.raw_slice(1, 13).unwrap_err();

        // a slice never disturbs later reads
        assert_eq!(codec.resolve_offset(1).unwrap(), 20);
    }

    #[test]
    fn test_fixed_offset_overflow() {
        let data = vec![0u8; 8];
        let codec = ValueCodec::new(&data, ValueLayout::new(ValueFormat::Fixed, 8, u32::MAX));
        assert!(matches!(
            codec.resolve_offset(u32::MAX),
            Err(Take5Error::OutOfBounds { .. })
        ));
    }
}
