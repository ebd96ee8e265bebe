//! Crate-wide error type.

use crate::shapetype::ShapeType;

/// Coarse error classification, matching the error kinds named in the
/// on-disk format's specification. Useful when a caller wants to branch
/// on category rather than match every concrete variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// File signature mismatch, impossible header value, truncated record.
    MalformedFile,
    /// An oid or seek target falls outside the known record/shape range.
    OutOfRange,
    /// Field schema violation: field added after records, zero fields at
    /// close, invalid field kind/length/decimal.
    SchemaError,
    /// A value cannot be represented at the declared field width, or a
    /// boolean field was given an unrecognized byte.
    ValueError,
    /// A byte sequence could not be decoded under the configured encoding.
    EncodingError,
    /// The underlying byte stream returned an I/O error.
    IoError,
}

/// All errors that can happen when reading or writing a shapefile triplet.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Wraps `std::io::Error`s from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The shp/shx file did not start with the ESRI magic number.
    #[error("the file code `{0:#x}` is invalid, is this a shapefile?")]
    InvalidFileCode(i32),

    /// A shape-type code in a header or record did not match any known type.
    #[error("the code `{0}` does not correspond to any ShapeType defined by ESRI")]
    InvalidShapeType(i32),

    /// A multipatch part-type code did not match any known patch type.
    #[error("invalid multipatch part type code `{0}`")]
    InvalidPatchType(i32),

    /// A record declared a content length too short for its shape type.
    #[error("record content length ({len_words} words) is too short for shape type {shape_type}")]
    TruncatedRecord { len_words: i32, shape_type: ShapeType },

    /// Requested oid falls outside `0..len`.
    #[error("oid {oid} is out of range (have {len} records)")]
    OutOfRange { oid: usize, len: usize },

    /// A seek or read ran past the end of a stream.
    #[error("attempted to read past the end of the stream")]
    UnexpectedEof,

    /// `Writer::field` called after at least one record/shape was written.
    #[error("cannot add field `{0}`: records have already been written")]
    FieldsAfterRecords(String),

    /// `Writer` closed with zero user fields defined for the dbf table.
    #[error("a dbf table must have at least one field")]
    NoFields,

    /// An invalid field kind, length, or decimal was requested.
    #[error("invalid field descriptor for `{name}`: {reason}")]
    InvalidFieldDescriptor { name: String, reason: String },

    /// A value could not be formatted to fit the field's declared width.
    #[error("value for field `{field}` does not fit in a width of {width}")]
    ValueTooWide { field: String, width: usize },

    /// A boolean-typed field was given a byte outside `{Y,y,T,t,1,N,n,F,f,0,?, }`.
    #[error("field `{field}` does not accept the logical value {value:?}")]
    InvalidLogicalValue { field: String, value: char },

    /// A polygon ring writer call had fewer than 3 distinct XY points.
    #[error("a ring must have at least 3 distinct points, got {0}")]
    DegenerateRing(usize),

    /// Bytes could not be decoded under the configured encoding (`strict` policy).
    #[error("cannot decode bytes as `{encoding}`")]
    Encoding { encoding: String },

    /// Reader requires a `.dbf` stream for the requested operation.
    #[error(".dbf stream is missing")]
    MissingDbf,

    /// Reader/Writer requires a `.shp` stream for the requested operation.
    #[error(".shp stream is missing")]
    MissingShp,

    /// An operation requires a `.shx` stream that was never supplied.
    #[error(".shx stream is missing")]
    MissingShx,

    /// The requested field name does not exist in the table's schema.
    #[error("unknown field `{0}`")]
    UnknownField(String),
}

impl Error {
    /// Returns the coarse category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::IoError,
            Error::InvalidFileCode(_)
            | Error::InvalidShapeType(_)
            | Error::InvalidPatchType(_)
            | Error::TruncatedRecord { .. }
            | Error::UnexpectedEof => ErrorKind::MalformedFile,
            Error::OutOfRange { .. } => ErrorKind::OutOfRange,
            Error::FieldsAfterRecords(_)
            | Error::NoFields
            | Error::InvalidFieldDescriptor { .. }
            | Error::UnknownField(_) => ErrorKind::SchemaError,
            Error::ValueTooWide { .. }
            | Error::InvalidLogicalValue { .. }
            | Error::DegenerateRing(_) => ErrorKind::ValueError,
            Error::Encoding { .. } => ErrorKind::EncodingError,
            Error::MissingDbf | Error::MissingShp | Error::MissingShx => ErrorKind::SchemaError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
