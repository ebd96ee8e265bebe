//! The `.dbf` attribute table codec: header, field descriptors, and the
//! per-record fixed-width row format.

use crate::encoding::TextCodec;
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const VERSION: u8 = 0x03;
/// Size in bytes of the fixed dbf header, before the field descriptor array.
pub const HEADER_SIZE: usize = 32;
/// Size in bytes of one field descriptor.
pub const DESCRIPTOR_SIZE: usize = 32;
/// Marks the end of the field descriptor array.
pub const TERMINATOR: u8 = 0x0D;
/// Optional end-of-file marker some writers append.
pub const EOF_MARKER: u8 = 0x1A;

/// A dbf field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Logical,
    Date,
    Memo,
}

impl FieldType {
    pub(crate) fn from_byte(b: u8) -> Result<FieldType> {
        match b {
            b'C' => Ok(FieldType::Character),
            b'N' => Ok(FieldType::Numeric),
            b'F' => Ok(FieldType::Float),
            b'L' => Ok(FieldType::Logical),
            b'D' => Ok(FieldType::Date),
            b'M' => Ok(FieldType::Memo),
            other => Err(Error::InvalidFieldDescriptor {
                name: String::new(),
                reason: format!("unknown field kind byte `{}`", other as char),
            }),
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Logical => b'L',
            FieldType::Date => b'D',
            FieldType::Memo => b'M',
        }
    }

    /// The default length used by `Writer::field` when none is given.
    pub fn default_length(self) -> u8 {
        match self {
            FieldType::Character => 50,
            FieldType::Numeric | FieldType::Float => 10,
            FieldType::Logical => 1,
            FieldType::Date => 8,
            FieldType::Memo => 10,
        }
    }
}

/// One field descriptor: name, kind, declared length, and decimal count
/// (meaningful only for `Numeric`/`Float`).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub kind: FieldType,
    pub length: u8,
    pub decimal: u8,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, kind: FieldType, length: u8, decimal: u8) -> Result<FieldInfo> {
        let name = name.into();
        if name.is_empty() || name.len() > 10 {
            return Err(Error::InvalidFieldDescriptor {
                name: name.clone(),
                reason: "field name must be 1-10 bytes".to_string(),
            });
        }
        if length == 0 {
            return Err(Error::InvalidFieldDescriptor { name, reason: "field length must be >= 1".to_string() });
        }
        Ok(FieldInfo { name, kind, length, decimal })
    }

    pub(crate) fn read_from<R: Read>(source: &mut R, codec: &TextCodec) -> Result<FieldInfo> {
        let mut name_bytes = [0u8; 11];
        source.read_exact(&mut name_bytes)?;
        let nul_at = name_bytes.iter().position(|&b| b == 0).unwrap_or(11);
        let name = codec.decode(&name_bytes[..nul_at])?;

        let kind = FieldType::from_byte(source.read_u8()?)?;
        let mut reserved = [0u8; 4];
        source.read_exact(&mut reserved)?;
        let length = source.read_u8()?;
        let decimal = source.read_u8()?;
        let mut reserved2 = [0u8; 14];
        source.read_exact(&mut reserved2)?;

        Ok(FieldInfo { name, kind, length, decimal })
    }

    pub(crate) fn write_to<W: Write>(&self, dest: &mut W, codec: &TextCodec) -> Result<()> {
        let encoded = codec.encode(&self.name)?;
        let mut name_bytes = [0u8; 11];
        let n = encoded.len().min(10);
        name_bytes[..n].copy_from_slice(&encoded[..n]);
        dest.write_all(&name_bytes)?;

        dest.write_u8(self.kind.to_byte())?;
        dest.write_all(&[0u8; 4])?;
        dest.write_u8(self.length)?;
        dest.write_u8(self.decimal)?;
        dest.write_all(&[0u8; 14])?;
        Ok(())
    }
}

/// The 32-byte dbf header, followed by the field descriptor array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub last_update: (u8, u8, u8),
    pub num_records: i32,
    pub header_size: i16,
    pub record_size: i16,
}

impl Header {
    pub(crate) fn read_from<R: Read>(source: &mut R) -> Result<Header> {
        let _version = source.read_u8()?;
        let y = source.read_u8()?;
        let m = source.read_u8()?;
        let d = source.read_u8()?;
        let num_records = source.read_i32::<LittleEndian>()?;
        let header_size = source.read_i16::<LittleEndian>()?;
        let record_size = source.read_i16::<LittleEndian>()?;
        let mut reserved = [0u8; 20];
        source.read_exact(&mut reserved)?;
        Ok(Header { last_update: (y, m, d), num_records, header_size, record_size })
    }

    pub(crate) fn write_to<W: Write>(&self, dest: &mut W) -> Result<()> {
        dest.write_u8(VERSION)?;
        dest.write_u8(self.last_update.0)?;
        dest.write_u8(self.last_update.1)?;
        dest.write_u8(self.last_update.2)?;
        dest.write_i32::<LittleEndian>(self.num_records)?;
        dest.write_i16::<LittleEndian>(self.header_size)?;
        dest.write_i16::<LittleEndian>(self.record_size)?;
        dest.write_all(&[0u8; 20])?;
        Ok(())
    }
}

/// Reads field descriptors until the `0x0D` terminator.
pub(crate) fn read_field_descriptors<R: Read>(source: &mut R, codec: &TextCodec) -> Result<Vec<FieldInfo>> {
    let mut fields = Vec::new();
    loop {
        let mut marker = [0u8; 1];
        source.read_exact(&mut marker)?;
        if marker[0] == TERMINATOR {
            break;
        }
        let mut rest = [0u8; DESCRIPTOR_SIZE - 1];
        source.read_exact(&mut rest)?;
        let mut full = Vec::with_capacity(DESCRIPTOR_SIZE);
        full.push(marker[0]);
        full.extend_from_slice(&rest);
        fields.push(FieldInfo::read_from(&mut std::io::Cursor::new(full), codec)?);
    }
    Ok(fields)
}

pub(crate) fn write_field_descriptors<W: Write>(dest: &mut W, fields: &[FieldInfo], codec: &TextCodec) -> Result<()> {
    for field in fields {
        field.write_to(dest, codec)?;
    }
    dest.write_u8(TERMINATOR)?;
    Ok(())
}

/// Computes the on-disk header size for the given user fields, including
/// the synthetic leading `DeletionFlag`.
pub(crate) fn header_size(num_user_fields: usize) -> i16 {
    (HEADER_SIZE + DESCRIPTOR_SIZE * num_user_fields + 1) as i16
}

/// Computes the record size (deletion flag byte + sum of field widths).
pub(crate) fn record_size(fields: &[FieldInfo]) -> i16 {
    1 + fields.iter().map(|f| f.length as i16).sum::<i16>()
}

/// One attribute value, or `Null` when the stored bytes don't parse as
/// the field's declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Character(String),
    Numeric(f64),
    Logical(bool),
    Date(Date),
    Memo(String),
    Null,
}

/// A calendar date as stored by `D` fields: a `(year, month, day)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

fn pad_right(bytes: &[u8], width: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(width, b' ');
    out
}

fn trim_c_value(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] == b' ' || bytes[end - 1] == 0) {
        end -= 1;
    }
    &bytes[..end]
}

/// Formats one value according to its field descriptor, producing exactly
/// `field.length` bytes.
pub(crate) fn format_value(field: &FieldInfo, value: &Value, codec: &TextCodec) -> Result<Vec<u8>> {
    let width = field.length as usize;
    match (field.kind, value) {
        (FieldType::Character, Value::Character(s)) => {
            let encoded = codec.encode(s)?;
            if encoded.len() > width {
                return Err(Error::ValueTooWide { field: field.name.clone(), width });
            }
            Ok(pad_right(&encoded, width))
        }
        (FieldType::Character, Value::Null) => Ok(vec![b' '; width]),
        (FieldType::Numeric | FieldType::Float, Value::Numeric(n)) => {
            let text = if field.decimal == 0 {
                format!("{:.0}", n.round())
            } else {
                format!("{:.*}", field.decimal as usize, n)
            };
            if text.len() > width {
                return Err(Error::ValueTooWide { field: field.name.clone(), width });
            }
            Ok(right_justify(text.as_bytes(), width))
        }
        (FieldType::Numeric | FieldType::Float, Value::Null) => Ok(vec![b' '; width]),
        (FieldType::Logical, Value::Logical(b)) => {
            let mut out = vec![b' '; width];
            out[0] = if *b { b'T' } else { b'F' };
            Ok(out)
        }
        (FieldType::Logical, Value::Null) => Ok(vec![b'?'; width]),
        (FieldType::Date, Value::Date(d)) => {
            let text = format!("{:04}{:02}{:02}", d.year, d.month, d.day);
            if text.len() != 8 || width < 8 {
                return Err(Error::ValueTooWide { field: field.name.clone(), width });
            }
            Ok(pad_right(text.as_bytes(), width))
        }
        (FieldType::Date, Value::Null) => Ok(vec![b' '; width]),
        (FieldType::Memo, Value::Memo(s)) => {
            let encoded = codec.encode(s)?;
            if encoded.len() > width {
                return Err(Error::ValueTooWide { field: field.name.clone(), width });
            }
            Ok(pad_right(&encoded, width))
        }
        (FieldType::Memo, Value::Null) => Ok(vec![b' '; width]),
        _ => Err(Error::InvalidLogicalValue { field: field.name.clone(), value: '?' }),
    }
}

fn right_justify(bytes: &[u8], width: usize) -> Vec<u8> {
    let mut out = vec![b' '; width];
    let start = width.saturating_sub(bytes.len());
    out[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(width)..]);
    out
}

/// Parses one value according to its field descriptor. Unparseable or
/// blank content yields `Value::Null` rather than an error, per the dbf
/// null-handling rules.
pub(crate) fn parse_value(field: &FieldInfo, bytes: &[u8], codec: &TextCodec) -> Result<Value> {
    match field.kind {
        FieldType::Character => {
            let trimmed = trim_c_value(bytes);
            Ok(Value::Character(codec.decode(trimmed)?))
        }
        FieldType::Numeric | FieldType::Float => {
            let text = std::str::from_utf8(bytes).unwrap_or("").trim();
            match text.parse::<f64>() {
                Ok(n) if !text.is_empty() => Ok(Value::Numeric(n)),
                _ => Ok(Value::Null),
            }
        }
        FieldType::Logical => match bytes.first() {
            Some(b'Y' | b'y' | b'T' | b't' | b'1') => Ok(Value::Logical(true)),
            Some(b'N' | b'n' | b'F' | b'f' | b'0') => Ok(Value::Logical(false)),
            _ => Ok(Value::Null),
        },
        FieldType::Date => {
            let text = std::str::from_utf8(bytes).unwrap_or("");
            if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
                let year: i32 = text[0..4].parse().unwrap_or(0);
                let month: u32 = text[4..6].parse().unwrap_or(0);
                let day: u32 = text[6..8].parse().unwrap_or(0);
                Ok(Value::Date(Date { year, month, day }))
            } else {
                Ok(Value::Null)
            }
        }
        FieldType::Memo => {
            let trimmed = trim_c_value(bytes);
            Ok(Value::Memo(codec.decode(trimmed)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::ErrorPolicy;

    fn utf8_codec() -> TextCodec {
        TextCodec::new(encoding_rs::UTF_8, ErrorPolicy::Strict)
    }

    #[test]
    fn field_descriptor_roundtrip() {
        let field = FieldInfo::new("FLT", FieldType::Numeric, 18, 10).unwrap();
        let codec = utf8_codec();
        let mut buf = Vec::new();
        field.write_to(&mut buf, &codec).unwrap();
        assert_eq!(buf.len(), DESCRIPTOR_SIZE);

        let mut cursor = std::io::Cursor::new(buf);
        let read_back = FieldInfo::read_from(&mut cursor, &codec).unwrap();
        assert_eq!(read_back, field);
    }

    #[test]
    fn numeric_formatting_matches_fixed_width() {
        let field = FieldInfo::new("FLT", FieldType::Numeric, 18, 10).unwrap();
        let codec = utf8_codec();
        let formatted = format_value(&field, &Value::Numeric(1.3217328), &codec).unwrap();
        assert_eq!(std::str::from_utf8(&formatted).unwrap(), "      1.3217328000");
    }

    #[test]
    fn null_numeric_roundtrips_to_null() {
        let field = FieldInfo::new("INT", FieldType::Numeric, 10, 0).unwrap();
        let codec = utf8_codec();
        let formatted = format_value(&field, &Value::Null, &codec).unwrap();
        let parsed = parse_value(&field, &formatted, &codec).unwrap();
        assert_eq!(parsed, Value::Null);
    }

    #[test]
    fn logical_accepts_common_truthy_falsy_bytes() {
        let field = FieldInfo::new("BOOL", FieldType::Logical, 1, 0).unwrap();
        let codec = utf8_codec();
        assert_eq!(parse_value(&field, b"Y", &codec).unwrap(), Value::Logical(true));
        assert_eq!(parse_value(&field, b"n", &codec).unwrap(), Value::Logical(false));
        assert_eq!(parse_value(&field, b"?", &codec).unwrap(), Value::Null);
    }

    #[test]
    fn character_strips_trailing_spaces_and_nuls() {
        let field = FieldInfo::new("TXT", FieldType::Character, 5, 0).unwrap();
        let codec = utf8_codec();
        let parsed = parse_value(&field, b"Hi\0\0\0", &codec).unwrap();
        assert_eq!(parsed, Value::Character("Hi".to_string()));
    }

    #[test]
    fn date_roundtrip() {
        let field = FieldInfo::new("DATE", FieldType::Date, 8, 0).unwrap();
        let codec = utf8_codec();
        let date = Date { year: 1998, month: 1, day: 30 };
        let formatted = format_value(&field, &Value::Date(date), &codec).unwrap();
        assert_eq!(&formatted, b"19980130");
        let parsed = parse_value(&field, &formatted, &codec).unwrap();
        assert_eq!(parsed, Value::Date(date));
    }
}
