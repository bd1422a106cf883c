use std::fmt;

use crate::{Result, StringValue, Take5Dictionary, Take5Error, Take5Reader, ValueCodec};

/// A single match generated by a dictionary lookup.
///
/// Automaton traversal fills a match in with [`populate`](Self::populate);
/// the match then borrows its dictionary and can be queried for the value
/// data associated with the matched prefix. A match is meant to be reused
/// across lookups via [`reset`](Self::reset) rather than reallocated.
#[derive(Debug)]
pub struct Take5Match<'d, R: Take5Reader> {
    dict: Option<&'d Take5Dictionary<R>>,
    length: u32,
    index: u32,
    state: i32,
    matched_char: char,
}

impl<R: Take5Reader> Default for Take5Match<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d, R: Take5Reader> Take5Match<'d, R> {
    /// Creates an unbound match. Payload accessors fail until it is populated.
    pub fn new() -> Self {
        Self {
            dict: None,
            length: 0,
            index: 0,
            state: 0,
            matched_char: '\0',
        }
    }

    /// Clears the dictionary binding, length and index.
    pub fn reset(&mut self) {
        self.dict = None;
        self.length = 0;
        self.index = 0;
    }

    /// Binds the match to `dict` with the result of a successful traversal.
    pub fn populate(&mut self, dict: &'d Take5Dictionary<R>, index: u32, length: u32, state: i32) {
        self.dict = Some(dict);
        self.index = index;
        self.length = length;
        self.state = state;
    }

    pub fn set_matched_char(&mut self, c: char) {
        self.matched_char = c;
    }

    /// Length of the matched prefix.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Index of the matched word.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Automaton state reached by the match.
    pub fn state(&self) -> i32 {
        self.state
    }

    pub fn matched_char(&self) -> char {
        self.matched_char
    }

    pub fn is_bound(&self) -> bool {
        self.dict.is_some()
    }

    pub fn dictionary(&self) -> Option<&'d Take5Dictionary<R>> {
        self.dict
    }

    pub fn float_value(&self) -> Result<f32> {
        self.codec()?.read_f32(self.index)
    }

    pub fn int_value(&self) -> Result<i32> {
        self.codec()?.read_i32(self.index)
    }

    pub fn double_value(&self) -> Result<f64> {
        self.codec()?.read_f64(self.index)
    }

    /// String payload, assuming a null-terminated UTF-8 (value size 1) or
    /// UTF-16 (value size 2) run. Malformed payloads come back as `None`.
    pub fn string_value(&self) -> Result<Option<String>> {
        self.codec()?.read_string(self.index)
    }

    /// Like [`string_value`](Self::string_value) but keeps absent and
    /// malformed payloads apart and borrows UTF-8 text from the buffer.
    pub fn string_payload(&self) -> Result<StringValue<'d>> {
        self.codec()?.string_value(self.index)
    }

    /// Offset into the buffer at which the payload can be found.
    pub fn offset_value(&self) -> Result<u32> {
        self.codec()?.resolve_offset(self.index)
    }

    /// Zero-copy view of `length` payload bytes; the caller disassembles it.
    pub fn raw_slice(&self, length: usize) -> Result<&'d [u8]> {
        self.codec()?.raw_slice(self.index, length)
    }

    fn codec(&self) -> Result<ValueCodec<'d>> {
        self.dict
            .map(Take5Dictionary::codec)
            .ok_or(Take5Error::UnboundMatch)
    }
}

impl<R: Take5Reader> fmt::Display for Take5Match<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Match: index = {} length = {}]", self.index, self.length)
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    fn indirect_dictionary() -> Take5Dictionary<Vec<u8>> {
        // value table at 4: [0, 16, 20]; "cat" at 16, 7 at 20
        let mut data = vec![0u8; 24];
        data[8..12].copy_from_slice(&16u32.to_ne_bytes());
        data[12..16].copy_from_slice(&20u32.to_ne_bytes());
        data[16..20].copy_from_slice(b"cat\0");
        data[20..24].copy_from_slice(&7i32.to_ne_bytes());
        Take5Dictionary::new(data, ValueLayout::new(ValueFormat::Indirect, 1, 4))
    }

    #[test]
    fn test_accessors() {
        let dict = indirect_dictionary();
        let mut m = dict.new_match();
        assert!(!m.is_bound());

        m.populate(&dict, 1, 3, 17);
        m.set_matched_char('t');
        assert!(m.is_bound());
        assert_eq!(m.index(), 1);
        assert_eq!(m.length(), 3);
        assert_eq!(m.state(), 17);
        assert_eq!(m.matched_char(), 't');
        assert_eq!(m.offset_value().unwrap(), 16);
        assert_eq!(m.string_value().unwrap().as_deref(), Some("cat"));
        assert_eq!(
            m.string_payload().unwrap(),
            StringValue::Present("cat".into())
        );
        assert_eq!(m.raw_slice(3).unwrap(), b"cat");
        assert!(matches!(
            m.int_value(),
            Err(Take5Error::ValueSizeMismatch { .. })
        ));

        m.populate(&dict, 0, 1, 0);
        assert_eq!(m.string_value().unwrap(), None);
        assert_eq!(m.string_payload().unwrap(), StringValue::Absent);
    }

    #[test]
    fn test_reset_fails_cleanly() {
        let dict = indirect_dictionary();
        let mut m = Take5Match::new();
        m.populate(&dict, 1, 3, 5);
        assert_eq!(m.string_value().unwrap().as_deref(), Some("cat"));

        m.reset();
        assert_eq!(m.index(), 0);
        assert_eq!(m.length(), 0);
        assert!(m.dictionary().is_none());
        assert!(matches!(m.string_value(), Err(Take5Error::UnboundMatch)));
        assert!(matches!(m.offset_value(), Err(Take5Error::UnboundMatch)));
        assert!(matches!(m.float_value(), Err(Take5Error::UnboundMatch)));
        assert!(matches!(m.double_value(), Err(Take5Error::UnboundMatch)));
        assert!(matches!(m.raw_slice(1), Err(Take5Error::UnboundMatch)));

        m.reset();
        assert!(!m.is_bound());
    }

    #[test]
    fn test_display_omits_state() {
        let dict = indirect_dictionary();
        let mut m = dict.new_match();
        m.populate(&dict, 2, 4, 99);
        assert_eq!(m.to_string(), "[Match: index = 2 length = 4]");
    }

    #[test]
    fn test_fixed_dictionary_has_no_strings() {
        let mut data = vec![0u8; 16];
        data[4..8].copy_from_slice(&3u32.to_ne_bytes());
        let dict = Take5Dictionary::new(data, ValueLayout::new(ValueFormat::Fixed, 4, 0));
        let mut m = dict.new_match();
        m.populate(&dict, 1, 1, 0);
        assert_eq!(m.int_value().unwrap(), 3);
        assert!(matches!(m.string_value(), Err(Take5Error::NoPointersHere)));
    }
}
