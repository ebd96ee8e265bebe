use esri_shapefile::{
    geo, BBox, Date, FieldType, Point, Reader, ReaderOptions, Shape, ShapeType, Value, Writer, WriterOptions,
};
use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom, Write};
use std::rc::Rc;

/// A `Read + Write + Seek` handle over a shared in-memory buffer, so a
/// stream can be handed to a `Writer`, closed, and then reopened with a
/// `Reader` without touching the filesystem.
#[derive(Clone)]
struct Buffer(Rc<RefCell<std::io::Cursor<Vec<u8>>>>);

impl Buffer {
    fn new() -> Buffer {
        Buffer(Rc::new(RefCell::new(std::io::Cursor::new(Vec::new()))))
    }

    fn len(&self) -> usize {
        self.0.borrow().get_ref().len()
    }
}

impl Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().read(buf)
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

impl Seek for Buffer {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.0.borrow_mut().seek(pos)
    }
}

#[test]
fn point_round_trip_matches_byte_layout() {
    let shp = Buffer::new();
    let shx = Buffer::new();
    let dbf = Buffer::new();

    let mut writer = Writer::new(
        Some(shp.clone()),
        Some(shx.clone()),
        Some(dbf.clone()),
        WriterOptions::new().shape_type(ShapeType::Point),
    )
    .unwrap();
    writer.field("name", FieldType::Character, Some(5), None).unwrap();
    writer.point(122.0, 37.0).unwrap();
    writer.record(vec![Value::Character("p1".to_string())]).unwrap();
    writer.close().unwrap();

    assert_eq!(shp.len(), 128);
    assert_eq!(shx.len(), 108);

    let mut reader = Reader::new(Some(shp), Some(shx), Some(dbf), ReaderOptions::new()).unwrap();
    assert_eq!(reader.len().unwrap(), 1);
    assert_eq!(reader.shape_type(), Some(ShapeType::Point));
    assert_eq!(reader.shape(0).unwrap(), Shape::Point(Point::new(122.0, 37.0)));
    assert_eq!(reader.record(0).unwrap(), vec![("name".to_string(), Value::Character("p1".to_string()))]);
}

#[test]
fn polygon_ring_auto_closes() {
    let shp = Buffer::new();
    let shx = Buffer::new();

    let mut writer =
        Writer::new(Some(shp.clone()), Some(shx.clone()), None, WriterOptions::new().shape_type(ShapeType::Polygon))
            .unwrap();
    writer.polygon(&[vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]]).unwrap();
    writer.close().unwrap();

    let mut reader = Reader::new(Some(shp), Some(shx), None, ReaderOptions::new()).unwrap();
    let shape = reader.shape(0).unwrap();
    match shape {
        Shape::Polygon(poly) => {
            assert_eq!(poly.points, vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 1.0),
                Point::new(1.0, 1.0),
                Point::new(1.0, 0.0),
                Point::new(0.0, 0.0),
            ]);
            assert_eq!(poly.parts, vec![0]);
            assert_eq!(poly.bbox, BBox { xmin: 0.0, ymin: 0.0, xmax: 1.0, ymax: 1.0 });
        }
        other => panic!("expected Polygon, got {:?}", other),
    }
}

#[test]
fn polygon_with_hole_reports_outer_then_inner_ring() {
    let shp = Buffer::new();
    let shx = Buffer::new();

    let mut writer =
        Writer::new(Some(shp.clone()), Some(shx.clone()), None, WriterOptions::new().shape_type(ShapeType::Polygon))
            .unwrap();
    writer
        .polygon(&[
            vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)],
            vec![(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)],
        ])
        .unwrap();
    writer.close().unwrap();

    let mut reader = Reader::new(Some(shp), Some(shx), None, ReaderOptions::new()).unwrap();
    let shape = reader.shape(0).unwrap();
    let geometry = geo::shape_to_geometry(&shape).unwrap();
    match geometry {
        geo::Geometry::Polygon(rings) => {
            assert_eq!(rings.len(), 2);
            assert_eq!(rings[0].len(), 5);
            assert_eq!(rings[1].len(), 5);
        }
        other => panic!("expected Polygon geometry, got {:?}", other),
    }
}

#[test]
fn dbf_covers_every_field_type_and_nulls() {
    let dbf = Buffer::new();
    let mut writer = Writer::new(None::<Buffer>, None, Some(dbf.clone()), WriterOptions::new()).unwrap();
    writer.field("INT", FieldType::Numeric, Some(10), Some(0)).unwrap();
    writer.field("FLT", FieldType::Numeric, Some(18), Some(10)).unwrap();
    writer.field("TXT", FieldType::Character, Some(5), None).unwrap();
    writer.field("BOOL", FieldType::Logical, None, None).unwrap();
    writer.field("DATE", FieldType::Date, None, None).unwrap();

    writer
        .record(vec![
            Value::Numeric(1.0),
            Value::Numeric(1.3217328),
            Value::Character("Hello".to_string()),
            Value::Logical(true),
            Value::Date(Date { year: 1998, month: 1, day: 30 }),
        ])
        .unwrap();
    writer.record(vec![Value::Null; 5]).unwrap();
    writer.close().unwrap();

    let mut reader = Reader::new(None::<Buffer>, None, Some(dbf), ReaderOptions::new()).unwrap();
    assert_eq!(reader.len().unwrap(), 2);

    let first: Vec<Value> = reader.record(0).unwrap().into_iter().map(|(_, v)| v).collect();
    assert_eq!(
        first,
        vec![
            Value::Numeric(1.0),
            Value::Numeric(1.3217328),
            Value::Character("Hello".to_string()),
            Value::Logical(true),
            Value::Date(Date { year: 1998, month: 1, day: 30 }),
        ]
    );

    let second: Vec<Value> = reader.record(1).unwrap().into_iter().map(|(_, v)| v).collect();
    assert_eq!(second, vec![Value::Null; 5]);
}

#[test]
fn bbox_prefilter_returns_only_intersecting_points_in_order() {
    let shp = Buffer::new();
    let shx = Buffer::new();

    let mut writer =
        Writer::new(Some(shp.clone()), Some(shx.clone()), None, WriterOptions::new().shape_type(ShapeType::Point))
            .unwrap();
    for x in 0..10 {
        for y in 0..10 {
            writer.point(x as f64, y as f64).unwrap();
        }
    }
    writer.close().unwrap();

    let mut reader = Reader::new(Some(shp), Some(shx), None, ReaderOptions::new()).unwrap();
    let query = BBox { xmin: 3.0, ymin: 3.0, xmax: 5.0, ymax: 5.0 };
    let hits: Vec<(usize, Shape)> = reader.iter_shapes(Some(query)).unwrap().map(|r| r.unwrap()).collect();

    assert_eq!(hits.len(), 9);
    let mut last_oid = None;
    for (oid, shape) in &hits {
        if let Some(last) = last_oid {
            assert!(*oid > last, "oids must be strictly ascending");
        }
        last_oid = Some(*oid);
        match shape {
            Shape::Point(p) => {
                assert!((3.0..=5.0).contains(&p.x));
                assert!((3.0..=5.0).contains(&p.y));
            }
            other => panic!("expected Point, got {:?}", other),
        }
    }
}

#[test]
fn shape_lookup_without_shx_scans_and_then_reuses_the_scan() {
    let shp = Buffer::new();
    let dbf = Buffer::new();

    let mut writer = Writer::new(Some(shp.clone()), None, Some(dbf.clone()), WriterOptions::new()).unwrap();
    writer.field("ID", FieldType::Numeric, Some(9), Some(0)).unwrap();
    for i in 0..50 {
        writer.point(i as f64, i as f64).unwrap();
        writer.record(vec![Value::Numeric(i as f64)]).unwrap();
    }
    writer.close().unwrap();

    let mut reader = Reader::new(Some(shp), None, Some(dbf), ReaderOptions::new()).unwrap();
    assert_eq!(reader.shape(42).unwrap(), Shape::Point(Point::new(42.0, 42.0)));
    assert_eq!(reader.shape(10).unwrap(), Shape::Point(Point::new(10.0, 10.0)));
}
