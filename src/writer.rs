//! The append-only `.shp`/`.shx`/`.dbf` writer: streams shape/record
//! pairs, tracks running extents and counters, and finalizes headers on
//! close. Modeled after `las`'s two-phase `Writer`/`OpenWriter` split,
//! collapsed into one type since a shapefile has no equivalent freeze point.

use crate::dbf::{self, FieldInfo, FieldType, Value};
use crate::encoding::{ErrorPolicy, TextCodec};
use crate::error::{Error, Result};
use crate::geo::Geometry;
use crate::header::Header;
use crate::shape::{
    range_from, BBox, Multipatch, Multipoint, MultipointM, MultipointZ, Point, PointM, PointZ, Polygon, PolygonM,
    PolygonZ, Polyline, PolylineM, PolylineZ, Range, Shape, NO_DATA,
};
use crate::shapetype::{PatchType, ShapeType};
use crate::shp::{self, RecordHeader};
use crate::shx::ShxEntry;
use byteorder::WriteBytesExt;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Builder-style configuration for [Writer::new]/[Writer::from_path].
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    shape_type: Option<ShapeType>,
    encoding_label: Option<String>,
    encoding_errors: ErrorPolicy,
    auto_balance: bool,
    verbose: bool,
}

impl WriterOptions {
    pub fn new() -> WriterOptions {
        WriterOptions::default()
    }

    /// Pins the shape type written into the shp/shx headers at close. If
    /// left unset, the type of the first non-null shape written wins.
    pub fn shape_type(mut self, shape_type: ShapeType) -> WriterOptions {
        self.shape_type = Some(shape_type);
        self
    }

    pub fn encoding(mut self, label: impl Into<String>) -> WriterOptions {
        self.encoding_label = Some(label.into());
        self
    }

    pub fn encoding_errors(mut self, policy: ErrorPolicy) -> WriterOptions {
        self.encoding_errors = policy;
        self
    }

    /// After every `record`/`shape` call, brings whichever of shp/dbf is
    /// behind back in step with synthetic null entries.
    pub fn auto_balance(mut self, auto_balance: bool) -> WriterOptions {
        self.auto_balance = auto_balance;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> WriterOptions {
        self.verbose = verbose;
        self
    }

    fn resolve_codec(&self) -> TextCodec {
        match &self.encoding_label {
            Some(label) => TextCodec::from_label(label, self.encoding_errors)
                .unwrap_or_else(|| TextCodec::new(encoding_rs::UTF_8, self.encoding_errors)),
            None => TextCodec::new(encoding_rs::UTF_8, self.encoding_errors),
        }
    }
}

fn empty_bbox() -> BBox {
    BBox { xmin: 0.0, ymin: 0.0, xmax: 0.0, ymax: 0.0 }
}

fn grow_range(current: Option<Range>, new: Range) -> Option<Range> {
    Some(match current {
        Some((lo, hi)) => (lo.min(new.0), hi.max(new.1)),
        None => new,
    })
}

fn grow_m_range(current: Option<Range>, new: Range) -> Option<Range> {
    if crate::shape::is_no_data(new.0) && crate::shape::is_no_data(new.1) {
        return current;
    }
    grow_range(current, new)
}

fn today_ymd() -> (u8, u8, u8) {
    let now = time::OffsetDateTime::now_utc();
    let year = (now.year() - 1900).clamp(0, 255) as u8;
    (year, u8::from(now.month()), now.day())
}

fn flatten_xy(parts: &[Vec<(f64, f64)>]) -> (Vec<Point>, Vec<i32>) {
    let mut points = Vec::new();
    let mut offsets = Vec::new();
    for part in parts {
        offsets.push(points.len() as i32);
        points.extend(part.iter().map(|&(x, y)| Point::new(x, y)));
    }
    (points, offsets)
}

fn infer_shape_type(geometry: &Geometry) -> ShapeType {
    match geometry {
        Geometry::Point(_) => ShapeType::Point,
        Geometry::MultiPoint(_) => ShapeType::Multipoint,
        Geometry::LineString(_) | Geometry::MultiLineString(_) => ShapeType::Polyline,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => ShapeType::Polygon,
        Geometry::GeometryCollection(_) => ShapeType::NullShape,
    }
}

/// An append-only writer over any subset of the `.shp`/`.shx`/`.dbf`
/// triplet. Shapes and records flow through once; nothing already
/// written is ever re-read.
pub struct Writer<W: Write + Seek> {
    shp: Option<W>,
    shx: Option<W>,
    dbf: Option<W>,
    prj_path: Option<PathBuf>,
    cpg_path: Option<PathBuf>,
    projection: Option<String>,
    codec: TextCodec,
    verbose: bool,
    auto_balance: bool,
    shape_type: Option<ShapeType>,
    fields: Vec<FieldInfo>,
    fields_locked: bool,
    shp_num: usize,
    rec_num: usize,
    shp_bytes: u64,
    shx_bytes: u64,
    bbox: Option<BBox>,
    z_range: Option<Range>,
    m_range: Option<Range>,
    closed: bool,
}

impl<W: Write + Seek> Writer<W> {
    /// Opens a writer over any non-empty subset of the three streams.
    /// Placeholder 100-byte headers are written immediately to shp/shx;
    /// the dbf header is deferred until the field schema is known.
    pub fn new(shp: Option<W>, shx: Option<W>, dbf: Option<W>, options: WriterOptions) -> Result<Writer<W>> {
        if shp.is_none() && dbf.is_none() {
            return Err(Error::MissingShp);
        }
        let mut shp = shp;
        let mut shx = shx;
        if let Some(s) = shp.as_mut() {
            Header::placeholder().write_to(s)?;
        }
        if let Some(s) = shx.as_mut() {
            Header::placeholder().write_to(s)?;
        }
        Ok(Writer {
            shp,
            shx,
            dbf,
            prj_path: None,
            cpg_path: None,
            projection: None,
            codec: options.resolve_codec(),
            verbose: options.verbose,
            auto_balance: options.auto_balance,
            shape_type: options.shape_type,
            fields: Vec::new(),
            fields_locked: false,
            shp_num: 0,
            rec_num: 0,
            shp_bytes: crate::header::HEADER_SIZE as u64,
            shx_bytes: crate::header::HEADER_SIZE as u64,
            bbox: None,
            z_range: None,
            m_range: None,
            closed: false,
        })
    }

    /// Declares a dbf field. Forbidden once any record or shape has been written.
    pub fn field(&mut self, name: impl Into<String>, kind: FieldType, length: Option<u8>, decimal: Option<u8>) -> Result<()> {
        let name = name.into();
        if self.fields_locked {
            return Err(Error::FieldsAfterRecords(name));
        }
        let length = length.unwrap_or_else(|| kind.default_length());
        self.fields.push(FieldInfo::new(name, kind, length, decimal.unwrap_or(0))?);
        Ok(())
    }

    /// Sets the WKT text to write out as a sidecar `.prj` at close. Only
    /// takes effect when the writer was opened via [Writer::from_path].
    pub fn set_projection(&mut self, wkt: impl Into<String>) {
        self.projection = Some(wkt.into());
    }

    fn lock_fields_and_write_dbf_header(&mut self) -> Result<()> {
        if self.fields_locked {
            return Ok(());
        }
        if self.dbf.is_some() && self.fields.is_empty() {
            return Err(Error::NoFields);
        }
        self.fields_locked = true;
        if let Some(dbf) = self.dbf.as_mut() {
            let header = dbf::Header {
                last_update: today_ymd(),
                num_records: 0,
                header_size: dbf::header_size(self.fields.len()),
                record_size: dbf::record_size(&self.fields),
            };
            header.write_to(dbf)?;
            dbf::write_field_descriptors(dbf, &self.fields, &self.codec)?;
        }
        Ok(())
    }

    fn append_shape_raw(&mut self, shape: Shape) -> Result<()> {
        self.lock_fields_and_write_dbf_header()?;
        let shape_type = shape.shape_type();
        let payload = shp::encode_shape(&shape)?;
        let content_length = (payload.len() / 2) as i32;
        let offset_words = (self.shp_bytes / 2) as i32;
        let record_number = (self.shp_num + 1) as i32;

        if let Some(shp) = self.shp.as_mut() {
            RecordHeader { record_number, content_length }.write_to(shp)?;
            shp.write_all(&payload)?;
        }
        if let Some(shx) = self.shx.as_mut() {
            ShxEntry { offset: offset_words, content_length }.write_to(shx)?;
            self.shx_bytes += 8;
        }
        self.shp_bytes += 8 + payload.len() as u64;
        self.shp_num += 1;

        if self.shape_type.is_none() && shape_type != ShapeType::NullShape {
            self.shape_type = Some(shape_type);
        }
        if let Some(shape_bbox) = shape.bbox() {
            self.bbox = Some(match self.bbox {
                Some(mut b) => {
                    b.grow_bbox(&shape_bbox);
                    b
                }
                None => shape_bbox,
            });
        }
        if let Some(z) = shape.z_range() {
            self.z_range = grow_range(self.z_range, z);
        }
        if let Some(m) = shape.m_range() {
            self.m_range = grow_m_range(self.m_range, m);
        }
        if self.verbose {
            log::debug!("wrote shape {} ({} bytes)", self.shp_num - 1, payload.len());
        }
        Ok(())
    }

    fn append_record_raw(&mut self, values: Vec<Value>) -> Result<()> {
        self.lock_fields_and_write_dbf_header()?;
        if self.dbf.is_none() {
            return Err(Error::MissingDbf);
        }
        let mut row = vec![b' '];
        for (i, field) in self.fields.iter().enumerate() {
            let value = values.get(i).cloned().unwrap_or(Value::Null);
            row.extend(dbf::format_value(field, &value, &self.codec)?);
        }
        self.dbf.as_mut().unwrap().write_all(&row)?;
        self.rec_num += 1;
        Ok(())
    }

    fn auto_balance_if_enabled(&mut self) -> Result<()> {
        if self.auto_balance {
            self.balance()
        } else {
            Ok(())
        }
    }

    /// Brings the shp and dbf record counts back in step, regardless of
    /// whether auto-balance is enabled.
    pub fn balance(&mut self) -> Result<()> {
        while self.shp_num < self.rec_num {
            self.append_shape_raw(Shape::NullShape)?;
        }
        while self.dbf.is_some() && self.rec_num < self.shp_num {
            let blanks = vec![Value::Null; self.fields.len()];
            self.append_record_raw(blanks)?;
        }
        Ok(())
    }

    /// Appends any shape directly.
    pub fn shape(&mut self, shape: Shape) -> Result<()> {
        self.append_shape_raw(shape)?;
        self.auto_balance_if_enabled()
    }

    /// Appends a shape derived from an interchange [Geometry], using the
    /// writer's pinned shape type (or an inferred XY-only one).
    pub fn geometry(&mut self, geometry: &Geometry) -> Result<()> {
        let shape_type = self.shape_type.unwrap_or_else(|| infer_shape_type(geometry));
        let shape = crate::geo::geometry_to_shape(geometry, shape_type)?;
        self.shape(shape)
    }

    /// Appends a dbf record, values aligned left-to-right against the
    /// declared field order; missing trailing values are null.
    pub fn record(&mut self, values: Vec<Value>) -> Result<()> {
        self.append_record_raw(values)?;
        self.auto_balance_if_enabled()
    }

    /// Appends a dbf record addressed by field name.
    pub fn record_map(&mut self, values: &[(&str, Value)]) -> Result<()> {
        self.lock_fields_and_write_dbf_header()?;
        let mut ordered = vec![Value::Null; self.fields.len()];
        for (name, value) in values {
            let idx = self
                .fields
                .iter()
                .position(|f| f.name == *name)
                .ok_or_else(|| Error::UnknownField((*name).to_string()))?;
            ordered[idx] = value.clone();
        }
        self.record(ordered)
    }

    pub fn null(&mut self) -> Result<()> {
        self.shape(Shape::NullShape)
    }

    pub fn point(&mut self, x: f64, y: f64) -> Result<()> {
        self.shape(Shape::Point(Point::new(x, y)))
    }

    pub fn point_m(&mut self, x: f64, y: f64, m: Option<f64>) -> Result<()> {
        self.shape(Shape::PointM(PointM::new(x, y, m)))
    }

    pub fn point_z(&mut self, x: f64, y: f64, z: f64, m: Option<f64>) -> Result<()> {
        self.shape(Shape::PointZ(PointZ::new(x, y, z, m)))
    }

    pub fn multipoint(&mut self, points: &[(f64, f64)]) -> Result<()> {
        let pts: Vec<Point> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
        let bbox = BBox::from_points(&pts).unwrap_or_else(empty_bbox);
        self.shape(Shape::Multipoint(Multipoint { points: pts, bbox }))
    }

    pub fn multipoint_m(&mut self, points: &[(f64, f64)], m: &[Option<f64>]) -> Result<()> {
        let pts: Vec<PointM> = points.iter().zip(m.iter()).map(|(&(x, y), &mv)| PointM::new(x, y, mv)).collect();
        let bbox = BBox::from_points(&pts).unwrap_or_else(empty_bbox);
        let m_range = range_from(pts.iter().filter_map(|p| p.measure())).unwrap_or((NO_DATA, NO_DATA));
        self.shape(Shape::MultipointM(MultipointM { points: pts, bbox, m_range }))
    }

    pub fn multipoint_z(&mut self, points: &[(f64, f64)], z: &[f64], m: &[Option<f64>]) -> Result<()> {
        let pts: Vec<PointZ> = points
            .iter()
            .zip(z.iter())
            .zip(m.iter())
            .map(|((&(x, y), &zv), &mv)| PointZ::new(x, y, zv, mv))
            .collect();
        let bbox = BBox::from_points(&pts).unwrap_or_else(empty_bbox);
        let z_range = range_from(pts.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
        let m_range = range_from(pts.iter().filter_map(|p| p.measure())).unwrap_or((NO_DATA, NO_DATA));
        self.shape(Shape::MultipointZ(MultipointZ { points: pts, bbox, z_range, m_range }))
    }

    pub fn polyline(&mut self, parts: &[Vec<(f64, f64)>]) -> Result<()> {
        let (points, offsets) = flatten_xy(parts);
        let bbox = BBox::from_points(&points).unwrap_or_else(empty_bbox);
        self.shape(Shape::Polyline(Polyline { points, parts: offsets, bbox }))
    }

    pub fn polyline_m(&mut self, parts: &[Vec<(f64, f64, Option<f64>)>]) -> Result<()> {
        let mut points = Vec::new();
        let mut offsets = Vec::new();
        for part in parts {
            offsets.push(points.len() as i32);
            points.extend(part.iter().map(|&(x, y, m)| PointM::new(x, y, m)));
        }
        let bbox = BBox::from_points(&points).unwrap_or_else(empty_bbox);
        let m_range = range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((NO_DATA, NO_DATA));
        self.shape(Shape::PolylineM(PolylineM { points, parts: offsets, bbox, m_range }))
    }

    pub fn polyline_z(&mut self, parts: &[Vec<(f64, f64, f64, Option<f64>)>]) -> Result<()> {
        let mut points = Vec::new();
        let mut offsets = Vec::new();
        for part in parts {
            offsets.push(points.len() as i32);
            points.extend(part.iter().map(|&(x, y, z, m)| PointZ::new(x, y, z, m)));
        }
        let bbox = BBox::from_points(&points).unwrap_or_else(empty_bbox);
        let z_range = range_from(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
        let m_range = range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((NO_DATA, NO_DATA));
        self.shape(Shape::PolylineZ(PolylineZ { points, parts: offsets, bbox, z_range, m_range }))
    }

    /// Appends a polygon from its rings. Each ring is auto-closed and
    /// rejected if it has fewer than 3 distinct XY points.
    pub fn polygon(&mut self, rings: &[Vec<(f64, f64)>]) -> Result<()> {
        let mut points = Vec::new();
        let mut offsets = Vec::new();
        for ring in rings {
            let pts: Vec<Point> = ring.iter().map(|&(x, y)| Point::new(x, y)).collect();
            let closed = shp::close_ring(&pts)?;
            offsets.push(points.len() as i32);
            points.extend(closed);
        }
        let bbox = BBox::from_points(&points).unwrap_or_else(empty_bbox);
        self.shape(Shape::Polygon(Polygon { points, parts: offsets, bbox }))
    }

    pub fn polygon_m(&mut self, rings: &[Vec<(f64, f64, Option<f64>)>]) -> Result<()> {
        let mut points = Vec::new();
        let mut offsets = Vec::new();
        for ring in rings {
            let pts: Vec<PointM> = ring.iter().map(|&(x, y, m)| PointM::new(x, y, m)).collect();
            let closed = shp::close_ring_m(&pts)?;
            offsets.push(points.len() as i32);
            points.extend(closed);
        }
        let bbox = BBox::from_points(&points).unwrap_or_else(empty_bbox);
        let m_range = range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((NO_DATA, NO_DATA));
        self.shape(Shape::PolygonM(PolygonM { points, parts: offsets, bbox, m_range }))
    }

    pub fn polygon_z(&mut self, rings: &[Vec<(f64, f64, f64, Option<f64>)>]) -> Result<()> {
        let mut points = Vec::new();
        let mut offsets = Vec::new();
        for ring in rings {
            let pts: Vec<PointZ> = ring.iter().map(|&(x, y, z, m)| PointZ::new(x, y, z, m)).collect();
            let closed = shp::close_ring_z(&pts)?;
            offsets.push(points.len() as i32);
            points.extend(closed);
        }
        let bbox = BBox::from_points(&points).unwrap_or_else(empty_bbox);
        let z_range = range_from(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
        let m_range = range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((NO_DATA, NO_DATA));
        self.shape(Shape::PolygonZ(PolygonZ { points, parts: offsets, bbox, z_range, m_range }))
    }

    pub fn multipatch(&mut self, parts: &[(PatchType, Vec<(f64, f64, f64, Option<f64>)>)]) -> Result<()> {
        let mut points = Vec::new();
        let mut offsets = Vec::new();
        let mut part_types = Vec::new();
        for (patch_type, verts) in parts {
            offsets.push(points.len() as i32);
            part_types.push(*patch_type);
            points.extend(verts.iter().map(|&(x, y, z, m)| PointZ::new(x, y, z, m)));
        }
        let bbox = BBox::from_points(&points).unwrap_or_else(empty_bbox);
        let z_range = range_from(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
        let m_range = range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((NO_DATA, NO_DATA));
        self.shape(Shape::Multipatch(Multipatch { points, parts: offsets, part_types, bbox, z_range, m_range }))
    }

    fn finalize(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.lock_fields_and_write_dbf_header()?;

        if let Some(shp) = self.shp.as_mut() {
            let header = Header {
                file_length: (self.shp_bytes / 2) as i32,
                shape_type: self.shape_type.unwrap_or(ShapeType::NullShape),
                bbox: self.bbox.unwrap_or_else(empty_bbox),
                z_range: self.z_range.unwrap_or((0.0, 0.0)),
                m_range: self.m_range.unwrap_or((0.0, 0.0)),
            };
            shp.seek(SeekFrom::Start(0))?;
            header.write_to(shp)?;
            shp.flush()?;
        }
        if let Some(shx) = self.shx.as_mut() {
            let header = Header {
                file_length: (self.shx_bytes / 2) as i32,
                shape_type: self.shape_type.unwrap_or(ShapeType::NullShape),
                bbox: self.bbox.unwrap_or_else(empty_bbox),
                z_range: self.z_range.unwrap_or((0.0, 0.0)),
                m_range: self.m_range.unwrap_or((0.0, 0.0)),
            };
            shx.seek(SeekFrom::Start(0))?;
            header.write_to(shx)?;
            shx.flush()?;
        }
        if let Some(dbf) = self.dbf.as_mut() {
            dbf.write_u8(dbf::EOF_MARKER)?;
            let header = dbf::Header {
                last_update: today_ymd(),
                num_records: self.rec_num as i32,
                header_size: dbf::header_size(self.fields.len()),
                record_size: dbf::record_size(&self.fields),
            };
            dbf.seek(SeekFrom::Start(0))?;
            header.write_to(dbf)?;
            dbf.flush()?;
        }
        if let (Some(path), Some(text)) = (&self.prj_path, &self.projection) {
            std::fs::write(path, text)?;
        }
        if let Some(path) = &self.cpg_path {
            std::fs::write(path, self.codec.label())?;
        }
        Ok(())
    }

    /// Rewrites every header with its final counters and extents. The
    /// writer is not reusable afterward.
    pub fn close(mut self) -> Result<()> {
        self.finalize()
    }
}

impl<W: Write + Seek> Drop for Writer<W> {
    fn drop(&mut self) {
        // Best-effort only: errors here have no caller left to observe them,
        // and a writer with an unresolved dbf schema has nothing safe to flush.
        if !self.closed && !(self.dbf.is_some() && self.fields.is_empty()) {
            let _ = self.finalize();
        }
    }
}

fn with_lowercase_extension(base: &Path, ext: &str) -> PathBuf {
    base.with_extension(ext)
}

impl Writer<BufWriter<File>> {
    /// Creates `<base>.shp`/`.shx`/`.dbf`, truncating any existing files.
    pub fn from_path<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Writer<BufWriter<File>>> {
        let base = path.as_ref().to_path_buf();
        let shp = Some(BufWriter::new(File::create(with_lowercase_extension(&base, "shp"))?));
        let shx = Some(BufWriter::new(File::create(with_lowercase_extension(&base, "shx"))?));
        let dbf = Some(BufWriter::new(File::create(with_lowercase_extension(&base, "dbf"))?));
        let mut writer = Writer::new(shp, shx, dbf, options)?;
        writer.prj_path = Some(with_lowercase_extension(&base, "prj"));
        writer.cpg_path = Some(with_lowercase_extension(&base, "cpg"));
        Ok(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{Reader, ReaderOptions};
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn new_cursor_writer(options: WriterOptions) -> Writer<Cursor<Vec<u8>>> {
        Writer::new(Some(Cursor::new(Vec::new())), Some(Cursor::new(Vec::new())), Some(Cursor::new(Vec::new())), options).unwrap()
    }

    /// A `Read + Write + Seek` handle over a shared buffer, so tests can
    /// inspect what a writer produced after it has closed and dropped.
    #[derive(Clone)]
    struct SharedBuffer(Rc<RefCell<Cursor<Vec<u8>>>>);

    impl SharedBuffer {
        fn new() -> SharedBuffer {
            SharedBuffer(Rc::new(RefCell::new(Cursor::new(Vec::new()))))
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.0.borrow_mut().flush()
        }
    }

    impl std::io::Read for SharedBuffer {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().read(buf)
        }
    }

    impl Seek for SharedBuffer {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.0.borrow_mut().seek(pos)
        }
    }

    #[test]
    fn writes_point_and_record_roundtrip() {
        let mut writer = new_cursor_writer(WriterOptions::new());
        writer.field("NAME", FieldType::Character, Some(10), None).unwrap();
        writer.point(122.0, 37.0).unwrap();
        writer.record(vec![Value::Character("abc".to_string())]).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn auto_balance_fills_missing_dbf_rows() {
        let mut writer = new_cursor_writer(WriterOptions::new().auto_balance(true));
        writer.field("NAME", FieldType::Character, Some(5), None).unwrap();
        writer.point(1.0, 1.0).unwrap();
        writer.point(2.0, 2.0).unwrap();
        assert_eq!(writer.rec_num, 2);
        writer.close().unwrap();
    }

    #[test]
    fn dbf_only_writer_rejects_empty_schema() {
        let mut writer = Writer::new(None::<Cursor<Vec<u8>>>, None, Some(Cursor::new(Vec::new())), WriterOptions::new()).unwrap();
        let err = writer.record(vec![]).unwrap_err();
        assert!(matches!(err, Error::NoFields));
    }

    #[test]
    fn polygon_ring_auto_closes_and_updates_bbox() {
        let mut writer = new_cursor_writer(WriterOptions::new());
        writer.field("ID", FieldType::Numeric, Some(9), Some(0)).unwrap();
        writer.polygon(&[vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]]).unwrap();
        writer.record(vec![Value::Numeric(1.0)]).unwrap();
        assert_eq!(writer.bbox, Some(BBox { xmin: 0.0, ymin: 0.0, xmax: 10.0, ymax: 10.0 }));
        writer.close().unwrap();
    }

    #[test]
    fn reads_back_through_reader() {
        let shp = SharedBuffer::new();
        let shx = SharedBuffer::new();
        let mut writer = Writer::new(Some(shp.clone()), Some(shx.clone()), None, WriterOptions::new()).unwrap();
        writer.point(122.0, 37.0).unwrap();
        writer.point(5.0, 6.0).unwrap();
        writer.close().unwrap();

        let mut reader = Reader::new(Some(shp), Some(shx), None, ReaderOptions::new()).unwrap();
        assert_eq!(reader.len().unwrap(), 2);
        assert_eq!(reader.shape(0).unwrap(), Shape::Point(Point::new(122.0, 37.0)));
        assert_eq!(reader.shape(1).unwrap(), Shape::Point(Point::new(5.0, 6.0)));
        assert_eq!(reader.bbox(), Some(BBox { xmin: 5.0, ymin: 6.0, xmax: 122.0, ymax: 37.0 }));
    }

    #[test]
    fn empty_writer_still_finalizes_headers_on_close() {
        let shp = SharedBuffer::new();
        let shx = SharedBuffer::new();
        let writer = Writer::new(Some(shp.clone()), Some(shx.clone()), None, WriterOptions::new()).unwrap();
        writer.close().unwrap();

        let mut reader = Reader::new(Some(shp), Some(shx), None, ReaderOptions::new()).unwrap();
        assert_eq!(reader.len().unwrap(), 0);
    }
}
