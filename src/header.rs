//! The 100-byte header shared by the `.shp` and `.shx` files.

use crate::error::{Error, Result};
use crate::shape::{BBox, Range};
use crate::shapetype::ShapeType;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Magic number that must appear as the first big-endian i32 of both files.
pub const FILE_CODE: i32 = 9994;
/// Version written into every header produced by this crate.
pub const VERSION: i32 = 1000;
/// Size in bytes of the fixed header, common to `.shp` and `.shx`.
pub const HEADER_SIZE: i32 = 100;

const RESERVED_WORDS: [i32; 5] = [0, 0, 0, 0, 0];

/// The common `.shp`/`.shx` file header: file code, length, shape type, and
/// the XYZM bounding box of the whole file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    /// Total file length in 16-bit words, including this 100-byte header.
    pub file_length: i32,
    pub shape_type: ShapeType,
    pub bbox: BBox,
    pub z_range: Range,
    pub m_range: Range,
}

impl Header {
    pub fn read_from<R: Read>(source: &mut R) -> Result<Header> {
        let file_code = source.read_i32::<BigEndian>()?;
        if file_code != FILE_CODE {
            return Err(Error::InvalidFileCode(file_code));
        }
        for _ in 0..5 {
            source.read_i32::<BigEndian>()?;
        }
        let file_length = source.read_i32::<BigEndian>()?;
        let _version = source.read_i32::<LittleEndian>()?;
        let shape_type = ShapeType::read_from(source)?;

        let xmin = source.read_f64::<LittleEndian>()?;
        let ymin = source.read_f64::<LittleEndian>()?;
        let xmax = source.read_f64::<LittleEndian>()?;
        let ymax = source.read_f64::<LittleEndian>()?;
        let zmin = source.read_f64::<LittleEndian>()?;
        let zmax = source.read_f64::<LittleEndian>()?;
        let mmin = source.read_f64::<LittleEndian>()?;
        let mmax = source.read_f64::<LittleEndian>()?;

        Ok(Header {
            file_length,
            shape_type,
            bbox: BBox { xmin, ymin, xmax, ymax },
            z_range: (zmin, zmax),
            m_range: (mmin, mmax),
        })
    }

    pub fn write_to<W: Write>(&self, dest: &mut W) -> Result<()> {
        dest.write_i32::<BigEndian>(FILE_CODE)?;
        for word in RESERVED_WORDS {
            dest.write_i32::<BigEndian>(word)?;
        }
        dest.write_i32::<BigEndian>(self.file_length)?;
        dest.write_i32::<LittleEndian>(VERSION)?;
        self.shape_type.write_to(dest)?;

        dest.write_f64::<LittleEndian>(self.bbox.xmin)?;
        dest.write_f64::<LittleEndian>(self.bbox.ymin)?;
        dest.write_f64::<LittleEndian>(self.bbox.xmax)?;
        dest.write_f64::<LittleEndian>(self.bbox.ymax)?;
        dest.write_f64::<LittleEndian>(self.z_range.0)?;
        dest.write_f64::<LittleEndian>(self.z_range.1)?;
        dest.write_f64::<LittleEndian>(self.m_range.0)?;
        dest.write_f64::<LittleEndian>(self.m_range.1)?;
        Ok(())
    }

    /// A header with an empty bbox and unset shape type, suitable as a
    /// placeholder before the writer knows the final extents.
    pub(crate) fn placeholder() -> Header {
        Header {
            file_length: HEADER_SIZE / 2,
            shape_type: ShapeType::NullShape,
            bbox: BBox { xmin: 0.0, ymin: 0.0, xmax: 0.0, ymax: 0.0 },
            z_range: (0.0, 0.0),
            m_range: (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip() {
        let header = Header {
            file_length: 75,
            shape_type: ShapeType::PolygonZ,
            bbox: BBox { xmin: -10.0, ymin: -20.0, xmax: 10.0, ymax: 20.0 },
            z_range: (0.0, 100.0),
            m_range: (-1.0e38, -1.0e38),
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE as usize);

        let mut cursor = Cursor::new(buf);
        let read_back = Header::read_from(&mut cursor).unwrap();
        assert_eq!(read_back, header);
    }

    #[test]
    fn wrong_file_code() {
        let mut buf = vec![0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&1234i32.to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = Header::read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::InvalidFileCode(1234)));
    }
}
