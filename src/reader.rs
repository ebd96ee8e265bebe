//! The read-only view over a shapefile triplet: eager header parsing,
//! lazy bodies, shx-backed or scanned random access, and bbox/field
//! prefiltered iteration.

use crate::dbf::{self, FieldInfo, FieldType, Value};
use crate::encoding::{ErrorPolicy, TextCodec};
use crate::error::{Error, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::shape::BBox;
use crate::shapetype::ShapeType;
use crate::shp::{self, RecordHeader};
use crate::shx::{self, ShxEntry};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Builder-style configuration for [Reader::new]/[Reader::from_path],
/// mirroring the `las` crate's `Builder`.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    encoding_label: Option<String>,
    encoding_errors: ErrorPolicy,
    verbose: bool,
}

impl Default for ReaderOptions {
    fn default() -> ReaderOptions {
        ReaderOptions { encoding_label: None, encoding_errors: ErrorPolicy::Strict, verbose: true }
    }
}

impl ReaderOptions {
    pub fn new() -> ReaderOptions {
        ReaderOptions::default()
    }

    /// Pins an explicit encoding label, taking precedence over any `.cpg` sidecar.
    pub fn encoding(mut self, label: impl Into<String>) -> ReaderOptions {
        self.encoding_label = Some(label.into());
        self
    }

    pub fn encoding_errors(mut self, policy: ErrorPolicy) -> ReaderOptions {
        self.encoding_errors = policy;
        self
    }

    /// Gates non-fatal `log::warn!` calls for this reader instance.
    pub fn verbose(mut self, verbose: bool) -> ReaderOptions {
        self.verbose = verbose;
        self
    }

    fn resolve_codec(&self) -> TextCodec {
        match &self.encoding_label {
            Some(label) => TextCodec::from_label(label, self.encoding_errors).unwrap_or_else(|| {
                log::warn!("unrecognized encoding label `{label}`, falling back to UTF-8");
                TextCodec::new(encoding_rs::UTF_8, self.encoding_errors)
            }),
            None => TextCodec::new(encoding_rs::UTF_8, self.encoding_errors),
        }
    }
}

struct ShpPart<R> {
    source: R,
    header: Header,
    end: u64,
}

struct DbfPart<R> {
    source: R,
    header: dbf::Header,
    fields: Vec<FieldInfo>,
}

/// A read-only view over any subset of the `.shp`/`.shx`/`.dbf` triplet.
pub struct Reader<R> {
    shp: Option<ShpPart<R>>,
    shx: Option<Vec<ShxEntry>>,
    dbf: Option<DbfPart<R>>,
    codec: TextCodec,
    verbose: bool,
    projection: Option<String>,
    scan: Vec<(u64, i32)>,
    scan_pos: u64,
}

impl<R: Read + Seek> Reader<R> {
    /// Opens a reader over any non-empty subset of the three streams.
    /// Headers are parsed eagerly; record/shape bodies are not.
    pub fn new(shp: Option<R>, shx: Option<R>, dbf: Option<R>, options: ReaderOptions) -> Result<Reader<R>> {
        if shp.is_none() && dbf.is_none() {
            return Err(Error::MissingShp);
        }
        let codec = options.resolve_codec();

        let shp = match shp {
            Some(mut source) => {
                let header = Header::read_from(&mut source)?;
                let cursor = HEADER_SIZE as u64;
                let actual_end = source.seek(SeekFrom::End(0))?;
                source.seek(SeekFrom::Start(cursor))?;
                let declared_end = header.file_length as u64 * 2;
                let end = if declared_end != actual_end {
                    if options.verbose {
                        log::warn!("shp file length header ({declared_end} bytes) does not match the stream's actual size ({actual_end} bytes); using the measured size");
                    }
                    actual_end
                } else {
                    declared_end
                };
                Some(ShpPart { source, header, end })
            }
            None => None,
        };

        let shx = match shx {
            Some(mut source) => {
                let (_header, entries) = shx::read_index(&mut source)?;
                Some(entries)
            }
            None => None,
        };

        let dbf = match dbf {
            Some(mut source) => {
                let header = dbf::Header::read_from(&mut source)?;
                let fields = dbf::read_field_descriptors(&mut source, &codec)?;
                Some(DbfPart { source, header, fields })
            }
            None => None,
        };

        Ok(Reader {
            shp,
            shx,
            dbf,
            codec,
            verbose: options.verbose,
            projection: None,
            scan: Vec::new(),
            scan_pos: HEADER_SIZE as u64,
        })
    }

    /// Number of records if a dbf is present, else the number of shapes.
    pub fn len(&mut self) -> Result<usize> {
        if let Some(dbf) = &self.dbf {
            return Ok(dbf.header.num_records as usize);
        }
        self.shape_count()
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn shape_type(&self) -> Option<ShapeType> {
        self.shp.as_ref().map(|s| s.header.shape_type)
    }

    pub fn bbox(&self) -> Option<BBox> {
        self.shp.as_ref().map(|s| s.header.bbox)
    }

    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.shp.as_ref().map(|s| s.header.z_range)
    }

    pub fn m_range(&self) -> Option<(f64, f64)> {
        self.shp.as_ref().map(|s| s.header.m_range)
    }

    /// The field schema, including the synthetic leading `DeletionFlag`
    /// descriptor every dbf row starts with on disk. `record`/
    /// `record_with_fields` never include it, since it isn't a value a
    /// caller looks up by name, just the row's leading status byte.
    pub fn fields(&self) -> Vec<FieldInfo> {
        let Some(dbf) = self.dbf.as_ref() else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(1 + dbf.fields.len());
        out.push(FieldInfo { name: "DeletionFlag".to_string(), kind: FieldType::Character, length: 1, decimal: 0 });
        out.extend(dbf.fields.iter().cloned());
        out
    }

    pub fn encoding(&self) -> &'static str {
        self.codec.label()
    }

    /// Raw WKT text of a sibling `.prj` file, when opened via [Reader::from_path].
    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref()
    }

    /// Reads shape `oid` by random access: via the `.shx` index when
    /// present, otherwise via an amortized linear scan of the `.shp`.
    pub fn shape(&mut self, oid: usize) -> Result<crate::shape::Shape> {
        use crate::shape::Shape;
        if self.shp.is_none() {
            return Err(Error::MissingShp);
        }
        let (byte_offset, _content_length) = self.offset_for(oid)?;
        let shp = self.shp.as_mut().unwrap();
        shp.source.seek(SeekFrom::Start(byte_offset))?;
        let record_header = RecordHeader::read_from(&mut shp.source)?;
        let payload_bytes = record_header.content_length as i64 * 2;
        match shp::decode_shape(&mut shp.source, payload_bytes) {
            Ok(shape) => Ok(shape),
            Err(Error::InvalidShapeType(code)) => {
                if self.verbose {
                    log::warn!("oid {oid}: unknown shape type code {code}, yielding NullShape");
                }
                Ok(Shape::NullShape)
            }
            Err(e) => Err(e),
        }
    }

    /// Reads record `oid`, optionally limited to a subset of field names
    /// (in schema order).
    pub fn record(&mut self, oid: usize) -> Result<Vec<(String, Value)>> {
        self.record_with_fields(oid, None)
    }

    pub fn record_with_fields(&mut self, oid: usize, fields: Option<&[&str]>) -> Result<Vec<(String, Value)>> {
        let dbf = self.dbf.as_mut().ok_or(Error::MissingDbf)?;
        let len = dbf.header.num_records as usize;
        if oid >= len {
            return Err(Error::OutOfRange { oid, len });
        }
        let record_size = dbf.header.record_size as u64;
        let offset = dbf.header.header_size as u64 + oid as u64 * record_size;
        dbf.source.seek(SeekFrom::Start(offset))?;
        let mut row = vec![0u8; record_size as usize];
        dbf.source.read_exact(&mut row)?;

        let mut pos = 1usize;
        let mut out = Vec::new();
        for field in &dbf.fields {
            let width = field.length as usize;
            let slice = &row[pos..pos + width];
            pos += width;
            let include = fields.map(|subset| subset.contains(&field.name.as_str())).unwrap_or(true);
            if include {
                let value = dbf::parse_value(field, slice, &self.codec)?;
                out.push((field.name.clone(), value));
            }
        }
        Ok(out)
    }

    fn offset_for(&mut self, oid: usize) -> Result<(u64, i32)> {
        if let Some(entries) = &self.shx {
            let entry = entries.get(oid).copied().ok_or(Error::OutOfRange { oid, len: entries.len() })?;
            return Ok((entry.byte_offset(), entry.content_length));
        }
        self.ensure_scanned(oid)?;
        let len = self.scan.len();
        let (offset, content_length) = *self.scan.get(oid).ok_or(Error::OutOfRange { oid, len })?;
        Ok((offset, content_length))
    }

    fn ensure_scanned(&mut self, oid: usize) -> Result<()> {
        while self.scan.len() <= oid {
            let shp = self.shp.as_mut().ok_or(Error::MissingShp)?;
            if self.scan_pos >= shp.end {
                return Err(Error::OutOfRange { oid, len: self.scan.len() });
            }
            shp.source.seek(SeekFrom::Start(self.scan_pos))?;
            let record_header = RecordHeader::read_from(&mut shp.source)?;
            let content_bytes = record_header.content_length as u64 * 2;
            self.scan.push((self.scan_pos, record_header.content_length));
            self.scan_pos += 8 + content_bytes;
        }
        Ok(())
    }

    fn ensure_fully_scanned(&mut self) -> Result<()> {
        loop {
            let shp = self.shp.as_ref().ok_or(Error::MissingShp)?;
            if self.scan_pos >= shp.end {
                return Ok(());
            }
            let next = self.scan.len();
            self.ensure_scanned(next)?;
        }
    }

    fn shape_count(&mut self) -> Result<usize> {
        if let Some(shx) = &self.shx {
            return Ok(shx.len());
        }
        if self.shp.is_some() {
            self.ensure_fully_scanned()?;
            return Ok(self.scan.len());
        }
        Err(Error::MissingShp)
    }

    fn shape_record_count(&mut self) -> Result<usize> {
        let shapes = self.shape_count()?;
        match &self.dbf {
            Some(dbf) => Ok(shapes.min(dbf.header.num_records as usize)),
            None => Ok(shapes),
        }
    }

    /// Reads only the bbox (or implied point bbox) of shape `oid`,
    /// without decoding the rest of its payload.
    fn peek_bbox(&mut self, oid: usize) -> Result<Option<BBox>> {
        let (byte_offset, _) = self.offset_for(oid)?;
        let shp = self.shp.as_mut().ok_or(Error::MissingShp)?;
        shp.source.seek(SeekFrom::Start(byte_offset))?;
        let _record_header = RecordHeader::read_from(&mut shp.source)?;
        let shape_type = match ShapeType::read_from(&mut shp.source) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };
        let bbox = match shape_type {
            ShapeType::NullShape => None,
            ShapeType::Point | ShapeType::PointM | ShapeType::PointZ => {
                let x = shp.source.read_f64::<LittleEndian>()?;
                let y = shp.source.read_f64::<LittleEndian>()?;
                Some(BBox { xmin: x, ymin: y, xmax: x, ymax: y })
            }
            _ => {
                let xmin = shp.source.read_f64::<LittleEndian>()?;
                let ymin = shp.source.read_f64::<LittleEndian>()?;
                let xmax = shp.source.read_f64::<LittleEndian>()?;
                let ymax = shp.source.read_f64::<LittleEndian>()?;
                Some(BBox { xmin, ymin, xmax, ymax })
            }
        };
        Ok(bbox)
    }

    /// Iterates shapes in ascending oid order, optionally prefiltered by
    /// an inclusive bbox.
    pub fn iter_shapes(&mut self, bbox: Option<BBox>) -> Result<ShapeIter<'_, R>> {
        let stop = self.shape_count()?;
        Ok(ShapeIter { reader: self, next_oid: 0, stop, bbox })
    }

    /// Iterates `[start, stop)` dbf records, optionally limited to a
    /// field-name subset (in schema order).
    pub fn iter_records<'a>(&'a mut self, start: usize, stop: usize, fields: Option<&[&str]>) -> Result<RecordIter<'a, R>> {
        let len = self.dbf.as_ref().ok_or(Error::MissingDbf)?.header.num_records as usize;
        let stop = stop.min(len);
        let fields = fields.map(|f| f.iter().map(|s| s.to_string()).collect());
        Ok(RecordIter { reader: self, next_oid: start.min(stop), stop, fields })
    }

    /// Iterates (shape, record) pairs, optionally prefiltered by bbox.
    pub fn iter_shape_records(&mut self, bbox: Option<BBox>) -> Result<ShapeRecordIter<'_, R>> {
        let stop = self.shape_record_count()?;
        Ok(ShapeRecordIter { reader: self, next_oid: 0, stop, bbox })
    }
}

/// Iterator yielding `(oid, Shape)` in ascending order, produced by [Reader::iter_shapes].
pub struct ShapeIter<'r, R> {
    reader: &'r mut Reader<R>,
    next_oid: usize,
    stop: usize,
    bbox: Option<BBox>,
}

impl<'r, R: Read + Seek> Iterator for ShapeIter<'r, R> {
    type Item = Result<(usize, crate::shape::Shape)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_oid < self.stop {
            let oid = self.next_oid;
            self.next_oid += 1;
            if let Some(bbox) = self.bbox {
                match self.reader.peek_bbox(oid) {
                    Ok(Some(shape_bbox)) => {
                        if !bbox.intersects(&shape_bbox) {
                            continue;
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }
            return Some(self.reader.shape(oid).map(|s| (oid, s)));
        }
        None
    }
}

/// Iterator yielding `(oid, record)` in ascending order, produced by [Reader::iter_records].
pub struct RecordIter<'r, R> {
    reader: &'r mut Reader<R>,
    next_oid: usize,
    stop: usize,
    fields: Option<Vec<String>>,
}

impl<'r, R: Read + Seek> Iterator for RecordIter<'r, R> {
    type Item = Result<(usize, Vec<(String, Value)>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_oid >= self.stop {
            return None;
        }
        let oid = self.next_oid;
        self.next_oid += 1;
        let subset: Option<Vec<&str>> = self.fields.as_ref().map(|v| v.iter().map(|s| s.as_str()).collect());
        Some(self.reader.record_with_fields(oid, subset.as_deref()).map(|r| (oid, r)))
    }
}

/// Iterator yielding `(oid, Shape, record)` in ascending order, produced
/// by [Reader::iter_shape_records].
pub struct ShapeRecordIter<'r, R> {
    reader: &'r mut Reader<R>,
    next_oid: usize,
    stop: usize,
    bbox: Option<BBox>,
}

impl<'r, R: Read + Seek> Iterator for ShapeRecordIter<'r, R> {
    type Item = Result<(usize, crate::shape::Shape, Vec<(String, Value)>)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_oid < self.stop {
            let oid = self.next_oid;
            self.next_oid += 1;
            if let Some(bbox) = self.bbox {
                match self.reader.peek_bbox(oid) {
                    Ok(Some(shape_bbox)) => {
                        if !bbox.intersects(&shape_bbox) {
                            continue;
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }
            let shape = match self.reader.shape(oid) {
                Ok(s) => s,
                Err(e) => return Some(Err(e)),
            };
            let record = match self.reader.record(oid) {
                Ok(r) => r,
                Err(e) => return Some(Err(e)),
            };
            return Some(Ok((oid, shape, record)));
        }
        None
    }
}

fn open_case_insensitive(base: &Path, ext: &str) -> Result<Option<BufReader<File>>> {
    let mut tried = Vec::new();
    for candidate in [ext.to_string(), ext.to_lowercase(), ext.to_uppercase()] {
        if tried.contains(&candidate) {
            continue;
        }
        let path = base.with_extension(&candidate);
        match File::open(&path) {
            Ok(f) => return Ok(Some(BufReader::new(f))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tried.push(candidate);
    }
    Ok(None)
}

impl Reader<BufReader<File>> {
    /// Opens a reader from `<base>.shp` plus whichever of `.shx`/`.dbf`/
    /// `.cpg`/`.prj` exist alongside it. Missing sidecars are tolerated;
    /// operations that need them fail lazily.
    pub fn from_path<P: AsRef<Path>>(path: P, mut options: ReaderOptions) -> Result<Reader<BufReader<File>>> {
        let base: PathBuf = path.as_ref().to_path_buf();

        if options.encoding_label.is_none() {
            if let Some(cpg) = open_case_insensitive(&base, "cpg")? {
                let mut cpg = cpg;
                let mut label = String::new();
                cpg.read_to_string(&mut label)?;
                options = options.encoding(label.trim().to_string());
            }
        }

        let shp = open_case_insensitive(&base, "shp")?;
        let shx = open_case_insensitive(&base, "shx")?;
        let dbf = open_case_insensitive(&base, "dbf")?;

        let mut reader = Reader::new(shp, shx, dbf, options)?;

        if let Some(mut prj) = open_case_insensitive(&base, "prj")? {
            let mut text = String::new();
            prj.read_to_string(&mut text)?;
            reader.projection = Some(text);
        }

        Ok(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbf::{FieldType, Value as DbfValue};
    use crate::shape::Point;
    use crate::shp::encode_shape;
    use crate::shx::ShxEntry;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    fn build_point_shapefile() -> (Vec<u8>, Vec<u8>) {
        let shape = crate::shape::Shape::Point(Point::new(122.0, 37.0));
        let payload = encode_shape(&shape).unwrap();
        let mut shp = Vec::new();
        let header = Header {
            file_length: ((HEADER_SIZE as usize + 8 + payload.len()) / 2) as i32,
            shape_type: ShapeType::Point,
            bbox: BBox { xmin: 122.0, ymin: 37.0, xmax: 122.0, ymax: 37.0 },
            z_range: (0.0, 0.0),
            m_range: (0.0, 0.0),
        };
        header.write_to(&mut shp).unwrap();
        shp.write_i32::<byteorder::BigEndian>(1).unwrap();
        shp.write_i32::<byteorder::BigEndian>((payload.len() / 2) as i32).unwrap();
        shp.extend_from_slice(&payload);

        let mut shx = Vec::new();
        let shx_header = Header { file_length: (HEADER_SIZE as usize + 8) as i32 / 2, ..header };
        shx_header.write_to(&mut shx).unwrap();
        ShxEntry { offset: HEADER_SIZE / 2, content_length: (payload.len() / 2) as i32 }.write_to(&mut shx).unwrap();

        (shp, shx)
    }

    #[test]
    fn reads_point_shape_via_shx() {
        let (shp, shx) = build_point_shapefile();
        let mut reader = Reader::new(Some(Cursor::new(shp)), Some(Cursor::new(shx)), None, ReaderOptions::new()).unwrap();
        assert_eq!(reader.shape_type(), Some(ShapeType::Point));
        let shape = reader.shape(0).unwrap();
        assert_eq!(shape, crate::shape::Shape::Point(Point::new(122.0, 37.0)));
    }

    #[test]
    fn scans_without_shx() {
        let (shp, _) = build_point_shapefile();
        let mut reader = Reader::new(Some(Cursor::new(shp)), None, None, ReaderOptions::new()).unwrap();
        let shape = reader.shape(0).unwrap();
        assert_eq!(shape, crate::shape::Shape::Point(Point::new(122.0, 37.0)));
    }

    #[test]
    fn dbf_only_reader_reports_missing_shp() {
        let mut fields = Vec::new();
        fields.push(FieldInfo::new("NAME", FieldType::Character, 5, 0).unwrap());
        let codec = TextCodec::default();
        let mut dbf_bytes = Vec::new();
        let header =
            dbf::Header { last_update: (98, 1, 1), num_records: 1, header_size: dbf::header_size(1), record_size: dbf::record_size(&fields) };
        header.write_to(&mut dbf_bytes).unwrap();
        dbf::write_field_descriptors(&mut dbf_bytes, &fields, &codec).unwrap();
        dbf_bytes.push(b' ');
        dbf_bytes.extend_from_slice(b"Hello");

        let mut reader = Reader::new(None, None, Some(Cursor::new(dbf_bytes)), ReaderOptions::new()).unwrap();
        assert!(matches!(reader.shape(0), Err(Error::MissingShp)));
        let record = reader.record(0).unwrap();
        assert_eq!(record, vec![("NAME".to_string(), DbfValue::Character("Hello".to_string()))]);
    }
}
