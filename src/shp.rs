//! The `.shp` record codec: per-record framing and the shape payload
//! encode/decode for every shape type.

use crate::error::{Error, Result};
use crate::shape::{
    close_ring_points, close_ring_points_m, close_ring_points_z, measure_or_no_data, range_from, BBox, Multipatch,
    Multipoint, MultipointM, MultipointZ, Point, PointM, PointZ, Polygon, PolygonM, PolygonZ, Polyline, PolylineM,
    PolylineZ, Range, Shape, NO_DATA,
};
use crate::shapetype::{PatchType, ShapeType};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The 8-byte `(record number, content length)` prefix of every `.shp` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordHeader {
    /// 1-based in the file; callers see the 0-based `oid`.
    pub record_number: i32,
    /// Content length in 16-bit words, excluding this 8-byte header.
    pub content_length: i32,
}

impl RecordHeader {
    pub(crate) fn read_from<R: Read>(source: &mut R) -> Result<RecordHeader> {
        let record_number = source.read_i32::<BigEndian>()?;
        let content_length = source.read_i32::<BigEndian>()?;
        Ok(RecordHeader { record_number, content_length })
    }

    pub(crate) fn write_to<W: Write>(&self, dest: &mut W) -> Result<()> {
        dest.write_i32::<BigEndian>(self.record_number)?;
        dest.write_i32::<BigEndian>(self.content_length)?;
        Ok(())
    }
}

fn read_bbox<R: Read>(source: &mut R) -> Result<BBox> {
    let xmin = source.read_f64::<LittleEndian>()?;
    let ymin = source.read_f64::<LittleEndian>()?;
    let xmax = source.read_f64::<LittleEndian>()?;
    let ymax = source.read_f64::<LittleEndian>()?;
    Ok(BBox { xmin, ymin, xmax, ymax })
}

fn write_bbox<W: Write>(bbox: &BBox, dest: &mut W) -> Result<()> {
    dest.write_f64::<LittleEndian>(bbox.xmin)?;
    dest.write_f64::<LittleEndian>(bbox.ymin)?;
    dest.write_f64::<LittleEndian>(bbox.xmax)?;
    dest.write_f64::<LittleEndian>(bbox.ymax)?;
    Ok(())
}

fn read_range<R: Read>(source: &mut R) -> Result<Range> {
    let min = source.read_f64::<LittleEndian>()?;
    let max = source.read_f64::<LittleEndian>()?;
    Ok((min, max))
}

fn write_range<W: Write>(range: &Range, dest: &mut W) -> Result<()> {
    dest.write_f64::<LittleEndian>(range.0)?;
    dest.write_f64::<LittleEndian>(range.1)?;
    Ok(())
}

/// Decodes one shape record payload (the shape-type code and everything
/// after it), given the total byte length of the payload as declared by
/// the record's content length, so optional trailing M blocks can be
/// detected rather than assumed.
pub(crate) fn decode_shape<R: Read>(source: &mut R, payload_bytes: i64) -> Result<Shape> {
    let shape_type = ShapeType::read_from(source)?;
    let body_bytes = payload_bytes - 4;

    let shape = match shape_type {
        ShapeType::NullShape => Shape::NullShape,
        ShapeType::Point => {
            let x = source.read_f64::<LittleEndian>()?;
            let y = source.read_f64::<LittleEndian>()?;
            Shape::Point(Point::new(x, y))
        }
        ShapeType::PointM => {
            let x = source.read_f64::<LittleEndian>()?;
            let y = source.read_f64::<LittleEndian>()?;
            let m = source.read_f64::<LittleEndian>()?;
            Shape::PointM(PointM { x, y, m })
        }
        ShapeType::PointZ => {
            let x = source.read_f64::<LittleEndian>()?;
            let y = source.read_f64::<LittleEndian>()?;
            let z = source.read_f64::<LittleEndian>()?;
            let m = if body_bytes >= 32 { source.read_f64::<LittleEndian>()? } else { NO_DATA };
            Shape::PointZ(PointZ { x, y, z, m })
        }
        ShapeType::Multipoint | ShapeType::MultipointM | ShapeType::MultipointZ => {
            let bbox = read_bbox(source)?;
            let num_points = source.read_i32::<LittleEndian>()?;
            let n = num_points as usize;
            let mut xy = Vec::with_capacity(n);
            for _ in 0..n {
                let x = source.read_f64::<LittleEndian>()?;
                let y = source.read_f64::<LittleEndian>()?;
                xy.push((x, y));
            }
            let fixed_bytes = 32 + 4 + 16 * n;

            let z = if shape_type == ShapeType::MultipointZ {
                let _z_range = read_range(source)?;
                let mut zs = Vec::with_capacity(n);
                for _ in 0..n {
                    zs.push(source.read_f64::<LittleEndian>()?);
                }
                Some(zs)
            } else {
                None
            };
            let z_consumed = if z.is_some() { 16 + 8 * n } else { 0 };

            let m = if shape_type.has_m() && body_bytes as usize >= fixed_bytes + z_consumed + 16 + 8 * n {
                let _m_range = read_range(source)?;
                let mut ms = Vec::with_capacity(n);
                for _ in 0..n {
                    ms.push(source.read_f64::<LittleEndian>()?);
                }
                Some(ms)
            } else {
                None
            };

            match shape_type {
                ShapeType::Multipoint => {
                    Shape::Multipoint(Multipoint { points: xy.into_iter().map(|(x, y)| Point::new(x, y)).collect(), bbox })
                }
                ShapeType::MultipointM => {
                    let ms = m.unwrap_or_else(|| vec![NO_DATA; n]);
                    let points = xy.into_iter().zip(ms).map(|((x, y), m)| PointM { x, y, m }).collect();
                    let m_range = range_from(xy_m_values(&points)).unwrap_or((NO_DATA, NO_DATA));
                    Shape::MultipointM(MultipointM { points, bbox, m_range })
                }
                ShapeType::MultipointZ => {
                    let zs = z.unwrap_or_else(|| vec![0.0; n]);
                    let ms = m.unwrap_or_else(|| vec![NO_DATA; n]);
                    let points: Vec<PointZ> = xy
                        .into_iter()
                        .zip(zs.iter())
                        .zip(ms.iter())
                        .map(|(((x, y), &z), &m)| PointZ { x, y, z, m })
                        .collect();
                    let z_range = range_from(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
                    let m_range = range_from(xy_m_values(&points)).unwrap_or((NO_DATA, NO_DATA));
                    Shape::MultipointZ(MultipointZ { points, bbox, z_range, m_range })
                }
                _ => unreachable!(),
            }
        }
        ShapeType::Polyline | ShapeType::PolylineM | ShapeType::PolylineZ | ShapeType::Polygon | ShapeType::PolygonM | ShapeType::PolygonZ => {
            let (parts, xy, z, m, bbox, z_range, m_range) = decode_parts_shape(source, shape_type, body_bytes)?;
            build_line_or_poly_shape(shape_type, parts, xy, z, m, bbox, z_range, m_range)
        }
        ShapeType::Multipatch => {
            let bbox = read_bbox(source)?;
            let num_parts = source.read_i32::<LittleEndian>()?;
            let num_points = source.read_i32::<LittleEndian>()?;
            let (np, nn) = (num_parts as usize, num_points as usize);

            let mut parts = Vec::with_capacity(np);
            for _ in 0..np {
                parts.push(source.read_i32::<LittleEndian>()?);
            }
            let mut part_types = Vec::with_capacity(np);
            for _ in 0..np {
                part_types.push(PatchType::read_from(source)?);
            }
            let mut xy = Vec::with_capacity(nn);
            for _ in 0..nn {
                let x = source.read_f64::<LittleEndian>()?;
                let y = source.read_f64::<LittleEndian>()?;
                xy.push((x, y));
            }

            let _z_range = read_range(source)?;
            let mut zs = Vec::with_capacity(nn);
            for _ in 0..nn {
                zs.push(source.read_f64::<LittleEndian>()?);
            }

            let consumed_before_m = 4 + 32 + 4 + 4 + 4 * np + 4 * np + 16 * nn + 16 + 8 * nn;
            let ms = if payload_bytes as usize >= consumed_before_m + 16 + 8 * nn {
                let _m_range = read_range(source)?;
                let mut ms = Vec::with_capacity(nn);
                for _ in 0..nn {
                    ms.push(source.read_f64::<LittleEndian>()?);
                }
                ms
            } else {
                vec![NO_DATA; nn]
            };

            let points: Vec<PointZ> = xy
                .into_iter()
                .zip(zs.iter())
                .zip(ms.iter())
                .map(|(((x, y), &z), &m)| PointZ { x, y, z, m })
                .collect();
            let z_range = range_from(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
            let m_range = range_from(xy_m_values(&points)).unwrap_or((NO_DATA, NO_DATA));

            Shape::Multipatch(Multipatch { points, parts, part_types, bbox, z_range, m_range })
        }
    };
    Ok(shape)
}

fn xy_m_values<I: MeasureAt>(points: &[I]) -> impl Iterator<Item = f64> + '_ {
    points.iter().filter_map(|p| p.measure())
}

trait MeasureAt {
    fn measure(&self) -> Option<f64>;
}
impl MeasureAt for PointM {
    fn measure(&self) -> Option<f64> {
        self.measure()
    }
}
impl MeasureAt for PointZ {
    fn measure(&self) -> Option<f64> {
        self.measure()
    }
}

#[allow(clippy::type_complexity)]
fn decode_parts_shape<R: Read>(
    source: &mut R,
    shape_type: ShapeType,
    body_bytes: i64,
) -> Result<(Vec<i32>, Vec<(f64, f64)>, Option<Vec<f64>>, Option<Vec<f64>>, BBox, Range, Range)> {
    let bbox = read_bbox(source)?;
    let num_parts = source.read_i32::<LittleEndian>()?;
    let num_points = source.read_i32::<LittleEndian>()?;
    let (np, nn) = (num_parts as usize, num_points as usize);

    let mut parts = Vec::with_capacity(np);
    for _ in 0..np {
        parts.push(source.read_i32::<LittleEndian>()?);
    }
    let mut xy = Vec::with_capacity(nn);
    for _ in 0..nn {
        let x = source.read_f64::<LittleEndian>()?;
        let y = source.read_f64::<LittleEndian>()?;
        xy.push((x, y));
    }

    let fixed_bytes = 32 + 4 + 4 + 4 * np + 16 * nn;

    let z = if shape_type.has_z() {
        let _z_range = read_range(source)?;
        let mut zs = Vec::with_capacity(nn);
        for _ in 0..nn {
            zs.push(source.read_f64::<LittleEndian>()?);
        }
        Some(zs)
    } else {
        None
    };
    let z_consumed = if z.is_some() { 16 + 8 * nn } else { 0 };

    let m = if shape_type.has_m() && body_bytes as usize >= fixed_bytes + z_consumed + 16 + 8 * nn {
        let _m_range = read_range(source)?;
        let mut ms = Vec::with_capacity(nn);
        for _ in 0..nn {
            ms.push(source.read_f64::<LittleEndian>()?);
        }
        Some(ms)
    } else {
        None
    };

    let z_range = z.as_ref().and_then(|zs| range_from(zs.iter().copied())).unwrap_or((0.0, 0.0));
    let m_range = m
        .as_ref()
        .and_then(|ms| range_from(ms.iter().copied().filter(|v| !crate::shape::is_no_data(*v))))
        .unwrap_or((NO_DATA, NO_DATA));

    Ok((parts, xy, z, m, bbox, z_range, m_range))
}

#[allow(clippy::too_many_arguments)]
fn build_line_or_poly_shape(
    shape_type: ShapeType,
    parts: Vec<i32>,
    xy: Vec<(f64, f64)>,
    z: Option<Vec<f64>>,
    m: Option<Vec<f64>>,
    bbox: BBox,
    z_range: Range,
    m_range: Range,
) -> Shape {
    let n = xy.len();
    match shape_type {
        ShapeType::Polyline => {
            Shape::Polyline(Polyline { points: xy.into_iter().map(|(x, y)| Point::new(x, y)).collect(), parts, bbox })
        }
        ShapeType::Polygon => {
            Shape::Polygon(Polygon { points: xy.into_iter().map(|(x, y)| Point::new(x, y)).collect(), parts, bbox })
        }
        ShapeType::PolylineM => {
            let ms = m.unwrap_or_else(|| vec![NO_DATA; n]);
            let points = xy.into_iter().zip(ms).map(|((x, y), m)| PointM { x, y, m }).collect();
            Shape::PolylineM(PolylineM { points, parts, bbox, m_range })
        }
        ShapeType::PolygonM => {
            let ms = m.unwrap_or_else(|| vec![NO_DATA; n]);
            let points = xy.into_iter().zip(ms).map(|((x, y), m)| PointM { x, y, m }).collect();
            Shape::PolygonM(PolygonM { points, parts, bbox, m_range })
        }
        ShapeType::PolylineZ => {
            let zs = z.unwrap_or_else(|| vec![0.0; n]);
            let ms = m.unwrap_or_else(|| vec![NO_DATA; n]);
            let points = xy.into_iter().zip(zs).zip(ms).map(|(((x, y), z), m)| PointZ { x, y, z, m }).collect();
            Shape::PolylineZ(PolylineZ { points, parts, bbox, z_range, m_range })
        }
        ShapeType::PolygonZ => {
            let zs = z.unwrap_or_else(|| vec![0.0; n]);
            let ms = m.unwrap_or_else(|| vec![NO_DATA; n]);
            let points = xy.into_iter().zip(zs).zip(ms).map(|(((x, y), z), m)| PointZ { x, y, z, m }).collect();
            Shape::PolygonZ(PolygonZ { points, parts, bbox, z_range, m_range })
        }
        _ => unreachable!(),
    }
}

/// Encodes a shape's payload (shape-type code onward) and returns it along
/// with its bbox/z/m ranges so the writer can fold them into running
/// file-level extents.
pub(crate) fn encode_shape(shape: &Shape) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    shape.shape_type().write_to(&mut out)?;

    match shape {
        Shape::NullShape => {}
        Shape::Point(p) => {
            out.write_f64::<LittleEndian>(p.x)?;
            out.write_f64::<LittleEndian>(p.y)?;
        }
        Shape::PointM(p) => {
            out.write_f64::<LittleEndian>(p.x)?;
            out.write_f64::<LittleEndian>(p.y)?;
            out.write_f64::<LittleEndian>(measure_or_no_data(p.measure()))?;
        }
        Shape::PointZ(p) => {
            out.write_f64::<LittleEndian>(p.x)?;
            out.write_f64::<LittleEndian>(p.y)?;
            out.write_f64::<LittleEndian>(p.z)?;
            out.write_f64::<LittleEndian>(measure_or_no_data(p.measure()))?;
        }
        Shape::Multipoint(s) => {
            write_bbox(&s.bbox, &mut out)?;
            out.write_i32::<LittleEndian>(s.points.len() as i32)?;
            for p in &s.points {
                out.write_f64::<LittleEndian>(p.x)?;
                out.write_f64::<LittleEndian>(p.y)?;
            }
        }
        Shape::MultipointM(s) => {
            write_bbox(&s.bbox, &mut out)?;
            out.write_i32::<LittleEndian>(s.points.len() as i32)?;
            for p in &s.points {
                out.write_f64::<LittleEndian>(p.x)?;
                out.write_f64::<LittleEndian>(p.y)?;
            }
            write_range(&s.m_range, &mut out)?;
            for p in &s.points {
                out.write_f64::<LittleEndian>(measure_or_no_data(p.measure()))?;
            }
        }
        Shape::MultipointZ(s) => {
            write_bbox(&s.bbox, &mut out)?;
            out.write_i32::<LittleEndian>(s.points.len() as i32)?;
            for p in &s.points {
                out.write_f64::<LittleEndian>(p.x)?;
                out.write_f64::<LittleEndian>(p.y)?;
            }
            write_range(&s.z_range, &mut out)?;
            for p in &s.points {
                out.write_f64::<LittleEndian>(p.z)?;
            }
            write_range(&s.m_range, &mut out)?;
            for p in &s.points {
                out.write_f64::<LittleEndian>(measure_or_no_data(p.measure()))?;
            }
        }
        Shape::Polyline(s) => write_parts_xy(&mut out, &s.bbox, &s.parts, &s.points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>())?,
        Shape::Polygon(s) => write_parts_xy(&mut out, &s.bbox, &s.parts, &s.points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>())?,
        Shape::PolylineM(s) => write_parts_m(&mut out, &s.bbox, &s.parts, &s.points, &s.m_range)?,
        Shape::PolygonM(s) => write_parts_m(&mut out, &s.bbox, &s.parts, &s.points, &s.m_range)?,
        Shape::PolylineZ(s) => write_parts_z(&mut out, &s.bbox, &s.parts, &s.points, &s.z_range, &s.m_range)?,
        Shape::PolygonZ(s) => write_parts_z(&mut out, &s.bbox, &s.parts, &s.points, &s.z_range, &s.m_range)?,
        Shape::Multipatch(s) => {
            write_bbox(&s.bbox, &mut out)?;
            out.write_i32::<LittleEndian>(s.parts.len() as i32)?;
            out.write_i32::<LittleEndian>(s.points.len() as i32)?;
            for &start in &s.parts {
                out.write_i32::<LittleEndian>(start)?;
            }
            for &pt in &s.part_types {
                pt.write_to(&mut out)?;
            }
            for p in &s.points {
                out.write_f64::<LittleEndian>(p.x)?;
                out.write_f64::<LittleEndian>(p.y)?;
            }
            write_range(&s.z_range, &mut out)?;
            for p in &s.points {
                out.write_f64::<LittleEndian>(p.z)?;
            }
            write_range(&s.m_range, &mut out)?;
            for p in &s.points {
                out.write_f64::<LittleEndian>(measure_or_no_data(p.measure()))?;
            }
        }
    }

    if out.len() % 2 != 0 {
        return Err(Error::Encoding { encoding: "odd shape payload length".to_string() });
    }
    Ok(out)
}

fn write_parts_xy(out: &mut Vec<u8>, bbox: &BBox, parts: &[i32], xy: &[(f64, f64)]) -> Result<()> {
    write_bbox(bbox, out)?;
    out.write_i32::<LittleEndian>(parts.len() as i32)?;
    out.write_i32::<LittleEndian>(xy.len() as i32)?;
    for &start in parts {
        out.write_i32::<LittleEndian>(start)?;
    }
    for &(x, y) in xy {
        out.write_f64::<LittleEndian>(x)?;
        out.write_f64::<LittleEndian>(y)?;
    }
    Ok(())
}

fn write_parts_m(out: &mut Vec<u8>, bbox: &BBox, parts: &[i32], points: &[PointM], m_range: &Range) -> Result<()> {
    write_bbox(bbox, out)?;
    out.write_i32::<LittleEndian>(parts.len() as i32)?;
    out.write_i32::<LittleEndian>(points.len() as i32)?;
    for &start in parts {
        out.write_i32::<LittleEndian>(start)?;
    }
    for p in points {
        out.write_f64::<LittleEndian>(p.x)?;
        out.write_f64::<LittleEndian>(p.y)?;
    }
    write_range(m_range, out)?;
    for p in points {
        out.write_f64::<LittleEndian>(measure_or_no_data(p.measure()))?;
    }
    Ok(())
}

fn write_parts_z(out: &mut Vec<u8>, bbox: &BBox, parts: &[i32], points: &[PointZ], z_range: &Range, m_range: &Range) -> Result<()> {
    write_bbox(bbox, out)?;
    out.write_i32::<LittleEndian>(parts.len() as i32)?;
    out.write_i32::<LittleEndian>(points.len() as i32)?;
    for &start in parts {
        out.write_i32::<LittleEndian>(start)?;
    }
    for p in points {
        out.write_f64::<LittleEndian>(p.x)?;
        out.write_f64::<LittleEndian>(p.y)?;
    }
    write_range(z_range, out)?;
    for p in points {
        out.write_f64::<LittleEndian>(p.z)?;
    }
    write_range(m_range, out)?;
    for p in points {
        out.write_f64::<LittleEndian>(measure_or_no_data(p.measure()))?;
    }
    Ok(())
}

/// Auto-closes a ring for the given point kind, rejecting degenerate rings.
/// Used by the writer before serializing Polygon/PolygonM/PolygonZ parts.
pub(crate) fn close_ring(points: &[Point]) -> Result<Vec<Point>> {
    close_ring_points(points).map_err(Error::DegenerateRing)
}
pub(crate) fn close_ring_m(points: &[PointM]) -> Result<Vec<PointM>> {
    close_ring_points_m(points).map_err(Error::DegenerateRing)
}
pub(crate) fn close_ring_z(points: &[PointZ]) -> Result<Vec<PointZ>> {
    close_ring_points_z(points).map_err(Error::DegenerateRing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn point_roundtrip() {
        let shape = Shape::Point(Point::new(122.0, 37.0));
        let payload = encode_shape(&shape).unwrap();
        assert_eq!(payload.len(), 20);
        let mut cursor = Cursor::new(payload.clone());
        let decoded = decode_shape(&mut cursor, payload.len() as i64).unwrap();
        assert_eq!(decoded, shape);
    }

    #[test]
    fn polygon_roundtrip_with_hole() {
        let outer = close_ring(&[Point::new(0.0, 0.0), Point::new(0.0, 10.0), Point::new(10.0, 10.0), Point::new(10.0, 0.0)]).unwrap();
        let hole = close_ring(&[Point::new(2.0, 2.0), Point::new(2.0, 4.0), Point::new(4.0, 4.0), Point::new(4.0, 2.0)]).unwrap();
        let mut points = outer.clone();
        points.extend(hole.clone());
        let parts = vec![0, outer.len() as i32];
        let bbox = BBox::from_points(&points).unwrap();
        let shape = Shape::Polygon(Polygon { points, parts, bbox });

        let payload = encode_shape(&shape).unwrap();
        let mut cursor = Cursor::new(payload.clone());
        let decoded = decode_shape(&mut cursor, payload.len() as i64).unwrap();
        assert_eq!(decoded, shape);
    }

    #[test]
    fn pointz_missing_m_block_reads_as_sentinel() {
        let mut payload = Vec::new();
        ShapeType::PointZ.write_to(&mut payload).unwrap();
        payload.write_f64::<LittleEndian>(1.0).unwrap();
        payload.write_f64::<LittleEndian>(2.0).unwrap();
        payload.write_f64::<LittleEndian>(3.0).unwrap();
        // no trailing m value
        let mut cursor = Cursor::new(payload.clone());
        let decoded = decode_shape(&mut cursor, payload.len() as i64).unwrap();
        match decoded {
            Shape::PointZ(p) => assert!(crate::shape::is_no_data(p.m)),
            _ => panic!("expected PointZ"),
        }
    }
}
