//! The `.shx` index codec: one fixed 8-byte `(offset, content_length)` entry
//! per shape, both fields in 16-bit words, big-endian.

use crate::error::Result;
use crate::header::{Header, HEADER_SIZE};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// One `.shx` entry: the shape's offset and content length, both in
/// 16-bit words, matching the corresponding `.shp` record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShxEntry {
    pub offset: i32,
    pub content_length: i32,
}

impl ShxEntry {
    pub(crate) fn read_from<R: Read>(source: &mut R) -> Result<ShxEntry> {
        let offset = source.read_i32::<BigEndian>()?;
        let content_length = source.read_i32::<BigEndian>()?;
        Ok(ShxEntry { offset, content_length })
    }

    pub(crate) fn write_to<W: Write>(&self, dest: &mut W) -> Result<()> {
        dest.write_i32::<BigEndian>(self.offset)?;
        dest.write_i32::<BigEndian>(self.content_length)?;
        Ok(())
    }

    /// Byte offset (from the start of the `.shp` file) of this entry's
    /// record-number field.
    pub fn byte_offset(&self) -> u64 {
        self.offset as u64 * 2
    }
}

/// Reads the `.shx` header followed by every entry in the file.
pub(crate) fn read_index<R: Read>(source: &mut R) -> Result<(Header, Vec<ShxEntry>)> {
    let header = Header::read_from(source)?;
    let body_bytes = header.file_length as i64 * 2 - HEADER_SIZE as i64;
    let num_entries = (body_bytes / 8).max(0) as usize;
    let mut entries = Vec::with_capacity(num_entries);
    for _ in 0..num_entries {
        entries.push(ShxEntry::read_from(source)?);
    }
    Ok((header, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn entry_roundtrip() {
        let entry = ShxEntry { offset: 50, content_length: 10 };
        let mut buf = Vec::new();
        entry.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 8);

        let mut cursor = Cursor::new(buf);
        let read_back = ShxEntry::read_from(&mut cursor).unwrap();
        assert_eq!(read_back, entry);
        assert_eq!(read_back.byte_offset(), 100);
    }
}
