use std::io::Result;
use std::sync::Mutex;

/// Trait representing positional writers suitable for take5 value tables.
///
/// Writers must support writing arbitrary byte slices at fixed offsets without
/// altering shared state; this is satisfied by `FileExt` handles on both Unix
/// and Windows, and by an in-memory `Mutex<Vec<u8>>` that grows on demand.
pub trait Take5Writer {
    /// Writes `data` at the given absolute `offset`.
    fn write_all_at(&self, data: &[u8], offset: u64) -> Result<()>;
}

#[cfg(unix)]
impl Take5Writer for std::fs::File {
    fn write_all_at(&self, data: &[u8], offset: u64) -> Result<()> {
        std::os::unix::fs::FileExt::write_all_at(self, data, offset)
    }
}

#[cfg(windows)]
impl Take5Writer for std::fs::File {
    fn write_all_at(&self, mut data: &[u8], mut offset: u64) -> Result<()> {
        use std::os::windows::fs::FileExt;
        while !data.is_empty() {
            let written = self.seek_write(data, offset)?;
            if written == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ));
            }
            data = &data[written..];
            offset += written as u64;
        }
        Ok(())
    }
}

impl Take5Writer for Mutex<Vec<u8>> {
    fn write_all_at(&self, data: &[u8], offset: u64) -> Result<()> {
        let mut buffer = self
            .lock()
            .map_err(|_| std::io::Error::other("buffer lock poisoned"))?;
        let start = usize::try_from(offset).map_err(|_| {
            std::io::Error::other(format!("offset {offset} exceeds the address space"))
        })?;
        let end = start.checked_add(data.len()).ok_or_else(|| {
            std::io::Error::other(format!(
                "write of {} bytes at offset {offset} overflows",
                data.len()
            ))
        })?;
        if buffer.len() < end {
            buffer.resize(end, 0);
        }
        buffer[start..end].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_writer_grows() {
        let writer = Mutex::new(Vec::new());
        writer.write_all_at(b"cat", 4).unwrap();
        writer.write_all_at(b"ab", 0).unwrap();
        assert_eq!(writer.into_inner().unwrap(), b"ab\0\0cat");
    }

    #[test]
    fn test_memory_writer_rejects_overflow() {
        let writer = Mutex::new(Vec::new());
        writer.write_all_at(b"cat", u64::MAX - 1).unwrap_err();
        assert!(writer.into_inner().unwrap().is_empty());
    }

    #[test]
    fn test_file_writer() {
        let file = tempfile::tempfile().unwrap();
        file.write_all_at(b"take5", 3).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 8);
    }
}
