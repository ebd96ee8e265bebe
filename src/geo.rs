//! The GeoJSON-equivalent interchange layer: converts between [Shape] and
//! a small geometry/feature object model.

use crate::dbf::Value;
use crate::error::{Error, Result};
use crate::shape::{
    is_clockwise, parts_of, BBox, Multipatch, Multipoint, MultipointM, MultipointZ, Point, PointM, PointZ, Polygon,
    PolygonM, PolygonZ, Polyline, PolylineM, PolylineZ, Shape, XY,
};
use crate::shapetype::{PatchType, ShapeType};

/// One coordinate, with the Z/M dimensions present only when the source
/// shape carried them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub m: Option<f64>,
}

impl Position {
    fn xy(x: f64, y: f64) -> Position {
        Position { x, y, z: None, m: None }
    }
    fn xym(x: f64, y: f64, m: Option<f64>) -> Position {
        Position { x, y, z: None, m }
    }
    fn xyzm(x: f64, y: f64, z: f64, m: Option<f64>) -> Position {
        Position { x, y, z: Some(z), m }
    }
}

impl XY for Position {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
}

/// A GeoJSON-equivalent geometry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
    GeometryCollection(Vec<Geometry>),
}

/// A geometry paired with its attribute row.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub oid: usize,
    pub geometry: Option<Geometry>,
    pub properties: Vec<(String, Value)>,
}

/// A sequence of [Feature]s, mirroring a reader's full contents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

fn bbox_of_ring(ring: &[Position]) -> Option<BBox> {
    BBox::from_points(ring)
}

/// Groups a shape's rings into outer/hole polygons. `is_outer[i]` tells
/// whether ring `i` starts a new polygon; a ring that isn't an outer is
/// attached as a hole of the nearest preceding outer whose envelope
/// contains its own. If no such outer exists (ambiguous containment),
/// it is attached to the most recently opened outer instead.
fn group_rings(rings: Vec<Vec<Position>>, is_outer: Vec<bool>) -> Vec<Vec<Vec<Position>>> {
    struct Group {
        outer: Vec<Position>,
        outer_bbox: Option<BBox>,
        holes: Vec<Vec<Position>>,
    }

    let mut groups: Vec<Group> = Vec::new();
    for (ring, outer) in rings.into_iter().zip(is_outer) {
        if outer || groups.is_empty() {
            let outer_bbox = bbox_of_ring(&ring);
            groups.push(Group { outer: ring, outer_bbox, holes: Vec::new() });
            continue;
        }

        let hole_bbox = bbox_of_ring(&ring);
        let target = hole_bbox.and_then(|hb| {
            groups.iter().rposition(|g| g.outer_bbox.map(|ob| ob.contains(&hb)).unwrap_or(false))
        });

        match target {
            Some(idx) => groups[idx].holes.push(ring),
            None => {
                log::warn!("ambiguous hole-in-outer assignment; attaching to most recently opened outer");
                if let Some(last) = groups.last_mut() {
                    last.holes.push(ring);
                }
            }
        }
    }

    groups
        .into_iter()
        .map(|g| {
            let mut rings = vec![g.outer];
            rings.extend(g.holes);
            rings
        })
        .collect()
}

fn polygon_or_multi(groups: Vec<Vec<Vec<Position>>>) -> Geometry {
    if groups.len() <= 1 {
        Geometry::Polygon(groups.into_iter().next().unwrap_or_default())
    } else {
        Geometry::MultiPolygon(groups)
    }
}

/// Converts one [Shape] to its GeoJSON-equivalent [Geometry]. Returns
/// `None` for `NullShape`, which has no geometry representation.
pub fn shape_to_geometry(shape: &Shape) -> Option<Geometry> {
    match shape {
        Shape::NullShape => None,
        Shape::Point(p) => Some(Geometry::Point(Position::xy(p.x, p.y))),
        Shape::PointM(p) => Some(Geometry::Point(Position::xym(p.x, p.y, p.measure()))),
        Shape::PointZ(p) => Some(Geometry::Point(Position::xyzm(p.x, p.y, p.z, p.measure()))),
        Shape::Multipoint(s) => Some(Geometry::MultiPoint(s.points.iter().map(|p| Position::xy(p.x, p.y)).collect())),
        Shape::MultipointM(s) => {
            Some(Geometry::MultiPoint(s.points.iter().map(|p| Position::xym(p.x, p.y, p.measure())).collect()))
        }
        Shape::MultipointZ(s) => {
            Some(Geometry::MultiPoint(s.points.iter().map(|p| Position::xyzm(p.x, p.y, p.z, p.measure())).collect()))
        }
        Shape::Polyline(s) => Some(line_geometry(parts_of(&s.points, &s.parts).into_iter().map(|pts| {
            pts.iter().map(|p| Position::xy(p.x, p.y)).collect()
        }))),
        Shape::PolylineM(s) => Some(line_geometry(parts_of(&s.points, &s.parts).into_iter().map(|pts| {
            pts.iter().map(|p| Position::xym(p.x, p.y, p.measure())).collect()
        }))),
        Shape::PolylineZ(s) => Some(line_geometry(parts_of(&s.points, &s.parts).into_iter().map(|pts| {
            pts.iter().map(|p| Position::xyzm(p.x, p.y, p.z, p.measure())).collect()
        }))),
        Shape::Polygon(s) => Some(polygon_geometry_xy(&s.points, &s.parts)),
        Shape::PolygonM(s) => Some(polygon_geometry_m(&s.points, &s.parts)),
        Shape::PolygonZ(s) => Some(polygon_geometry_z(&s.points, &s.parts)),
        Shape::Multipatch(s) => Some(multipatch_geometry(s)),
    }
}

fn line_geometry<I: Iterator<Item = Vec<Position>>>(parts: I) -> Geometry {
    let mut parts: Vec<Vec<Position>> = parts.collect();
    if parts.len() == 1 {
        Geometry::LineString(parts.pop().unwrap())
    } else {
        Geometry::MultiLineString(parts)
    }
}

fn polygon_geometry_xy(points: &[Point], parts: &[i32]) -> Geometry {
    let part_slices = parts_of(points, parts);
    let is_outer: Vec<bool> = part_slices.iter().map(|pts| is_clockwise(*pts)).collect();
    let rings: Vec<Vec<Position>> = part_slices.into_iter().map(|pts| pts.iter().map(|p| Position::xy(p.x, p.y)).collect()).collect();
    polygon_or_multi(group_rings(rings, is_outer))
}

fn polygon_geometry_m(points: &[PointM], parts: &[i32]) -> Geometry {
    let part_slices = parts_of(points, parts);
    let is_outer: Vec<bool> = part_slices.iter().map(|pts| is_clockwise(*pts)).collect();
    let rings: Vec<Vec<Position>> =
        part_slices.into_iter().map(|pts| pts.iter().map(|p| Position::xym(p.x, p.y, p.measure())).collect()).collect();
    polygon_or_multi(group_rings(rings, is_outer))
}

fn polygon_geometry_z(points: &[PointZ], parts: &[i32]) -> Geometry {
    let part_slices = parts_of(points, parts);
    let is_outer: Vec<bool> = part_slices.iter().map(|pts| is_clockwise(*pts)).collect();
    let rings: Vec<Vec<Position>> = part_slices
        .into_iter()
        .map(|pts| pts.iter().map(|p| Position::xyzm(p.x, p.y, p.z, p.measure())).collect())
        .collect();
    polygon_or_multi(group_rings(rings, is_outer))
}

/// Triangulates a `TRIANGLE_STRIP` part into individual triangles,
/// alternating winding order every other triangle as the strip does.
fn triangulate_strip(points: &[PointZ]) -> Vec<[PointZ; 3]> {
    let mut out = Vec::new();
    for i in 0..points.len().saturating_sub(2) {
        if i % 2 == 0 {
            out.push([points[i], points[i + 1], points[i + 2]]);
        } else {
            out.push([points[i + 1], points[i], points[i + 2]]);
        }
    }
    out
}

/// Triangulates a `TRIANGLE_FAN` part into individual triangles around
/// its first point.
fn triangulate_fan(points: &[PointZ]) -> Vec<[PointZ; 3]> {
    let mut out = Vec::new();
    if points.is_empty() {
        return out;
    }
    let hub = points[0];
    for i in 1..points.len().saturating_sub(1) {
        out.push([hub, points[i], points[i + 1]]);
    }
    out
}

fn triangle_to_ring(tri: [PointZ; 3]) -> Vec<Position> {
    vec![
        Position::xyzm(tri[0].x, tri[0].y, tri[0].z, tri[0].measure()),
        Position::xyzm(tri[1].x, tri[1].y, tri[1].z, tri[1].measure()),
        Position::xyzm(tri[2].x, tri[2].y, tri[2].z, tri[2].measure()),
        Position::xyzm(tri[0].x, tri[0].y, tri[0].z, tri[0].measure()),
    ]
}

fn multipatch_geometry(s: &Multipatch) -> Geometry {
    let part_slices = parts_of(&s.points, &s.parts);
    let mut polygons: Vec<Vec<Vec<Position>>> = Vec::new();

    let mut ring_group_points: Vec<Vec<Position>> = Vec::new();
    let mut ring_group_outer: Vec<bool> = Vec::new();

    for (pts, &part_type) in part_slices.iter().zip(s.part_types.iter()) {
        match part_type {
            PatchType::TriangleStrip => {
                for tri in triangulate_strip(pts) {
                    polygons.push(vec![triangle_to_ring(tri)]);
                }
            }
            PatchType::TriangleFan => {
                for tri in triangulate_fan(pts) {
                    polygons.push(vec![triangle_to_ring(tri)]);
                }
            }
            PatchType::OuterRing | PatchType::InnerRing | PatchType::FirstRing | PatchType::Ring => {
                ring_group_points.push(pts.iter().map(|p| Position::xyzm(p.x, p.y, p.z, p.measure())).collect());
                ring_group_outer.push(part_type.starts_outer());
            }
        }
    }

    if !ring_group_points.is_empty() {
        polygons.extend(group_rings(ring_group_points, ring_group_outer));
    }

    Geometry::MultiPolygon(polygons)
}

/// Builds a [Shape] of the given type from a [Geometry], the inverse of
/// [shape_to_geometry]. Used by `Writer::shape` to accept any
/// GeoJSON-equivalent object.
pub fn geometry_to_shape(geometry: &Geometry, shape_type: ShapeType) -> Result<Shape> {
    match (geometry, shape_type) {
        (Geometry::Point(p), ShapeType::Point) => Ok(Shape::Point(Point::new(p.x, p.y))),
        (Geometry::Point(p), ShapeType::PointM) => Ok(Shape::PointM(PointM::new(p.x, p.y, p.m))),
        (Geometry::Point(p), ShapeType::PointZ) => Ok(Shape::PointZ(PointZ::new(p.x, p.y, p.z.unwrap_or(0.0), p.m))),
        (Geometry::MultiPoint(pts), ShapeType::Multipoint) => {
            let points: Vec<Point> = pts.iter().map(|p| Point::new(p.x, p.y)).collect();
            let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
            Ok(Shape::Multipoint(Multipoint { points, bbox }))
        }
        (Geometry::MultiPoint(pts), ShapeType::MultipointM) => {
            let points: Vec<PointM> = pts.iter().map(|p| PointM::new(p.x, p.y, p.m)).collect();
            let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
            let m_range = crate::shape::range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((crate::shape::NO_DATA, crate::shape::NO_DATA));
            Ok(Shape::MultipointM(MultipointM { points, bbox, m_range }))
        }
        (Geometry::MultiPoint(pts), ShapeType::MultipointZ) => {
            let points: Vec<PointZ> = pts.iter().map(|p| PointZ::new(p.x, p.y, p.z.unwrap_or(0.0), p.m)).collect();
            let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
            let z_range = crate::shape::range_from(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
            let m_range = crate::shape::range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((crate::shape::NO_DATA, crate::shape::NO_DATA));
            Ok(Shape::MultipointZ(MultipointZ { points, bbox, z_range, m_range }))
        }
        (Geometry::LineString(pts), ShapeType::Polyline) => build_polyline_xy(std::slice::from_ref(pts)),
        (Geometry::MultiLineString(parts), ShapeType::Polyline) => build_polyline_xy(parts),
        (Geometry::LineString(pts), ShapeType::PolylineM) => build_polyline_m(std::slice::from_ref(pts)),
        (Geometry::MultiLineString(parts), ShapeType::PolylineM) => build_polyline_m(parts),
        (Geometry::LineString(pts), ShapeType::PolylineZ) => build_polyline_z(std::slice::from_ref(pts)),
        (Geometry::MultiLineString(parts), ShapeType::PolylineZ) => build_polyline_z(parts),
        (Geometry::Polygon(rings), ShapeType::Polygon) => build_polygon_xy(std::slice::from_ref(rings)),
        (Geometry::MultiPolygon(polys), ShapeType::Polygon) => build_polygon_xy(polys),
        (Geometry::Polygon(rings), ShapeType::PolygonM) => build_polygon_m(std::slice::from_ref(rings)),
        (Geometry::MultiPolygon(polys), ShapeType::PolygonM) => build_polygon_m(polys),
        (Geometry::Polygon(rings), ShapeType::PolygonZ) => build_polygon_z(std::slice::from_ref(rings)),
        (Geometry::MultiPolygon(polys), ShapeType::PolygonZ) => build_polygon_z(polys),
        _ => Err(Error::InvalidFieldDescriptor {
            name: "geometry".to_string(),
            reason: format!("cannot represent this geometry as shape type {shape_type}"),
        }),
    }
}

fn flatten_parts_xy(parts: &[Vec<Position>]) -> (Vec<Point>, Vec<i32>) {
    let mut points = Vec::new();
    let mut starts = Vec::new();
    for part in parts {
        starts.push(points.len() as i32);
        points.extend(part.iter().map(|p| Point::new(p.x, p.y)));
    }
    (points, starts)
}

fn build_polyline_xy(parts: &[Vec<Position>]) -> Result<Shape> {
    let (points, part_starts) = flatten_parts_xy(parts);
    let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
    Ok(Shape::Polyline(Polyline { points, parts: part_starts, bbox }))
}

fn build_polyline_m(parts: &[Vec<Position>]) -> Result<Shape> {
    let mut points = Vec::new();
    let mut starts = Vec::new();
    for part in parts {
        starts.push(points.len() as i32);
        points.extend(part.iter().map(|p| PointM::new(p.x, p.y, p.m)));
    }
    let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
    let m_range = crate::shape::range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((crate::shape::NO_DATA, crate::shape::NO_DATA));
    Ok(Shape::PolylineM(PolylineM { points, parts: starts, bbox, m_range }))
}

fn build_polyline_z(parts: &[Vec<Position>]) -> Result<Shape> {
    let mut points = Vec::new();
    let mut starts = Vec::new();
    for part in parts {
        starts.push(points.len() as i32);
        points.extend(part.iter().map(|p| PointZ::new(p.x, p.y, p.z.unwrap_or(0.0), p.m)));
    }
    let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
    let z_range = crate::shape::range_from(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
    let m_range = crate::shape::range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((crate::shape::NO_DATA, crate::shape::NO_DATA));
    Ok(Shape::PolylineZ(PolylineZ { points, parts: starts, bbox, z_range, m_range }))
}

fn build_polygon_xy(polys: &[Vec<Vec<Position>>]) -> Result<Shape> {
    let mut points = Vec::new();
    let mut starts = Vec::new();
    for poly in polys {
        for ring in poly {
            let closed = crate::shp::close_ring(ring)?;
            starts.push(points.len() as i32);
            points.extend(closed);
        }
    }
    let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
    Ok(Shape::Polygon(Polygon { points, parts: starts, bbox }))
}

fn build_polygon_m(polys: &[Vec<Vec<Position>>]) -> Result<Shape> {
    let mut points = Vec::new();
    let mut starts = Vec::new();
    for poly in polys {
        for ring in poly {
            let with_m: Vec<PointM> = ring.iter().map(|p| PointM::new(p.x, p.y, p.m)).collect();
            let closed = crate::shp::close_ring_m(&with_m)?;
            starts.push(points.len() as i32);
            points.extend(closed);
        }
    }
    let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
    let m_range = crate::shape::range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((crate::shape::NO_DATA, crate::shape::NO_DATA));
    Ok(Shape::PolygonM(PolygonM { points, parts: starts, bbox, m_range }))
}

fn build_polygon_z(polys: &[Vec<Vec<Position>>]) -> Result<Shape> {
    let mut points = Vec::new();
    let mut starts = Vec::new();
    for poly in polys {
        for ring in poly {
            let with_z: Vec<PointZ> = ring.iter().map(|p| PointZ::new(p.x, p.y, p.z.unwrap_or(0.0), p.m)).collect();
            let closed = crate::shp::close_ring_z(&with_z)?;
            starts.push(points.len() as i32);
            points.extend(closed);
        }
    }
    let bbox = BBox::from_points(&points).ok_or(Error::DegenerateRing(0))?;
    let z_range = crate::shape::range_from(points.iter().map(|p| p.z)).unwrap_or((0.0, 0.0));
    let m_range = crate::shape::range_from(points.iter().filter_map(|p| p.measure())).unwrap_or((crate::shape::NO_DATA, crate::shape::NO_DATA));
    Ok(Shape::PolygonZ(PolygonZ { points, parts: starts, bbox, z_range, m_range }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::BBox as ShapeBBox;

    #[test]
    fn point_to_geometry() {
        let shape = Shape::Point(Point::new(1.0, 2.0));
        assert_eq!(shape_to_geometry(&shape), Some(Geometry::Point(Position::xy(1.0, 2.0))));
    }

    #[test]
    fn polygon_with_hole_groups_into_one_polygon() {
        let outer = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        let hole = [
            Point::new(2.0, 2.0),
            Point::new(4.0, 2.0),
            Point::new(4.0, 4.0),
            Point::new(2.0, 4.0),
            Point::new(2.0, 2.0),
        ];
        assert!(is_clockwise(&outer));
        assert!(!is_clockwise(&hole));

        let mut points = outer.to_vec();
        points.extend(hole);
        let parts = vec![0, outer.len() as i32];
        let bbox = ShapeBBox::from_points(&points).unwrap();
        let shape = Shape::Polygon(Polygon { points, parts, bbox });

        match shape_to_geometry(&shape).unwrap() {
            Geometry::Polygon(rings) => assert_eq!(rings.len(), 2),
            other => panic!("expected Polygon, got {other:?}"),
        }
    }

    #[test]
    fn two_outers_become_multipolygon() {
        let a = [Point::new(0.0, 0.0), Point::new(0.0, 1.0), Point::new(1.0, 1.0), Point::new(1.0, 0.0), Point::new(0.0, 0.0)];
        let b = [Point::new(5.0, 5.0), Point::new(5.0, 6.0), Point::new(6.0, 6.0), Point::new(6.0, 5.0), Point::new(5.0, 5.0)];
        let mut points = a.to_vec();
        points.extend(b);
        let parts = vec![0, a.len() as i32];
        let bbox = ShapeBBox::from_points(&points).unwrap();
        let shape = Shape::Polygon(Polygon { points, parts, bbox });

        match shape_to_geometry(&shape).unwrap() {
            Geometry::MultiPolygon(polys) => assert_eq!(polys.len(), 2),
            other => panic!("expected MultiPolygon, got {other:?}"),
        }
    }
}
