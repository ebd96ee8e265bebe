//! The in-memory geometry model.
//!
//! [Shape] is a discriminated union over the 14 ESRI shape types; unlike
//! the on-disk record, the Z/M/part-type/bbox fields only exist on the
//! concrete struct of the variant that carries them.

use crate::shapetype::{PatchType, ShapeType};

/// Sentinel used by the format to mean "no measure at this point".
///
/// Any stored value at or below this is considered missing; the writer
/// always emits exactly this value for points with no measure.
pub const NO_DATA: f64 = -1.0e38;

/// Returns whether `m` represents a missing measure.
pub fn is_no_data(m: f64) -> bool {
    m <= NO_DATA
}

/// Normalizes a possibly-missing measure value the way the format expects
/// it on disk: `None` becomes exactly [NO_DATA].
pub(crate) fn measure_or_no_data(m: Option<f64>) -> f64 {
    match m {
        Some(m) if !is_no_data(m) => m,
        _ => NO_DATA,
    }
}

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// A 2D point with a measure value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointM {
    pub x: f64,
    pub y: f64,
    /// `< -1e38` means "no measure"; use [PointM::measure] to read this as an `Option`.
    pub m: f64,
}

impl PointM {
    pub fn new(x: f64, y: f64, m: Option<f64>) -> Self {
        PointM { x, y, m: measure_or_no_data(m) }
    }

    pub fn measure(&self) -> Option<f64> {
        if is_no_data(self.m) {
            None
        } else {
            Some(self.m)
        }
    }
}

/// A 3D point with an optional measure value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointZ {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// `< -1e38` means "no measure"; use [PointZ::measure] to read this as an `Option`.
    pub m: f64,
}

impl PointZ {
    pub fn new(x: f64, y: f64, z: f64, m: Option<f64>) -> Self {
        PointZ { x, y, z, m: measure_or_no_data(m) }
    }

    pub fn measure(&self) -> Option<f64> {
        if is_no_data(self.m) {
            None
        } else {
            Some(self.m)
        }
    }
}

/// Anything that can be projected down to plain XY coordinates, so ring
/// closure/orientation/bbox logic can be shared across the `Point`,
/// `PointM`, and `PointZ` point kinds.
pub trait XY {
    fn x(&self) -> f64;
    fn y(&self) -> f64;
}

impl XY for Point {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
}

impl XY for PointM {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
}

impl XY for PointZ {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
}

/// An XY bounding box, inclusive on all sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    /// Computes the bbox of a non-empty point slice. Returns `None` if `points` is empty.
    pub fn from_points<P: XY>(points: &[P]) -> Option<BBox> {
        let mut iter = points.iter();
        let first = iter.next()?;
        let mut bbox = BBox {
            xmin: first.x(),
            ymin: first.y(),
            xmax: first.x(),
            ymax: first.y(),
        };
        for p in iter {
            bbox.grow(p.x(), p.y());
        }
        Some(bbox)
    }

    pub fn grow(&mut self, x: f64, y: f64) {
        self.xmin = self.xmin.min(x);
        self.ymin = self.ymin.min(y);
        self.xmax = self.xmax.max(x);
        self.ymax = self.ymax.max(y);
    }

    pub fn grow_bbox(&mut self, other: &BBox) {
        self.xmin = self.xmin.min(other.xmin);
        self.ymin = self.ymin.min(other.ymin);
        self.xmax = self.xmax.max(other.xmax);
        self.ymax = self.ymax.max(other.ymax);
    }

    /// Inclusive intersection test, as required by the bbox prefilter.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }

    /// Whether `other`'s envelope is fully contained within `self`'s.
    pub fn contains(&self, other: &BBox) -> bool {
        self.xmin <= other.xmin && self.xmax >= other.xmax && self.ymin <= other.ymin && self.ymax >= other.ymax
    }
}

/// A min/max range, used for the Z and M dimensions.
pub type Range = (f64, f64);

pub(crate) fn range_from<I: IntoIterator<Item = f64>>(values: I) -> Option<Range> {
    let mut iter = values.into_iter();
    let first = iter.next()?;
    let mut range = (first, first);
    for v in iter {
        range.0 = range.0.min(v);
        range.1 = range.1.max(v);
    }
    Some(range)
}

/// Returns twice the signed area of the ring (positive = counter-clockwise, negative = clockwise).
pub fn signed_area<P: XY>(points: &[P]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..points.len() {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % points.len()];
        area += p0.x() * p1.y() - p1.x() * p0.y();
    }
    area / 2.0
}

/// A ring written clockwise in XY is an outer ring; counter-clockwise is a hole.
pub fn is_clockwise<P: XY>(points: &[P]) -> bool {
    signed_area(points) < 0.0
}

/// Number of points in `points` that are distinct from `points[0]`, ignoring
/// a trailing closing point equal to the first.
fn unique_point_count<P: XY>(points: &[P]) -> usize {
    if points.is_empty() {
        return 0;
    }
    let (x0, y0) = (points[0].x(), points[0].y());
    let mut count = 1;
    for p in &points[1..] {
        if (p.x(), p.y()) != (x0, y0) {
            count += 1;
        }
    }
    count
}

/// Appends a copy of the first point if the ring is not already closed.
/// Returns an error description if fewer than 3 distinct points remain.
pub(crate) fn close_ring_points(points: &[Point]) -> Result<Vec<Point>, usize> {
    let unique = unique_point_count(points);
    if unique < 3 {
        return Err(unique);
    }
    let mut out = points.to_vec();
    if out.first() != out.last() {
        out.push(out[0]);
    }
    Ok(out)
}

pub(crate) fn close_ring_points_m(points: &[PointM]) -> Result<Vec<PointM>, usize> {
    let unique = unique_point_count(points);
    if unique < 3 {
        return Err(unique);
    }
    let mut out = points.to_vec();
    if out.first().map(|p| (p.x, p.y)) != out.last().map(|p| (p.x, p.y)) {
        let first = out[0];
        out.push(first);
    }
    Ok(out)
}

pub(crate) fn close_ring_points_z(points: &[PointZ]) -> Result<Vec<PointZ>, usize> {
    let unique = unique_point_count(points);
    if unique < 3 {
        return Err(unique);
    }
    let mut out = points.to_vec();
    if out.first().map(|p| (p.x, p.y)) != out.last().map(|p| (p.x, p.y)) {
        let first = out[0];
        out.push(first);
    }
    Ok(out)
}

macro_rules! parts_shape {
    ($name:ident, $point:ty) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub points: Vec<$point>,
            /// Non-decreasing start indices into `points`; single-part shapes are `[0]`.
            pub parts: Vec<i32>,
            pub bbox: BBox,
        }
    };
}

parts_shape!(Polyline, Point);
parts_shape!(Polygon, Point);

#[derive(Debug, Clone, PartialEq)]
pub struct PolylineM {
    pub points: Vec<PointM>,
    pub parts: Vec<i32>,
    pub bbox: BBox,
    pub m_range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonM {
    pub points: Vec<PointM>,
    pub parts: Vec<i32>,
    pub bbox: BBox,
    pub m_range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolylineZ {
    pub points: Vec<PointZ>,
    pub parts: Vec<i32>,
    pub bbox: BBox,
    pub z_range: Range,
    pub m_range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonZ {
    pub points: Vec<PointZ>,
    pub parts: Vec<i32>,
    pub bbox: BBox,
    pub z_range: Range,
    pub m_range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Multipoint {
    pub points: Vec<Point>,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipointM {
    pub points: Vec<PointM>,
    pub bbox: BBox,
    pub m_range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipointZ {
    pub points: Vec<PointZ>,
    pub bbox: BBox,
    pub z_range: Range,
    pub m_range: Range,
}

/// Multipatch always uses `PointZ`, regardless of whether the file's other
/// shapes (there are none, since a file holds one shape type) would.
#[derive(Debug, Clone, PartialEq)]
pub struct Multipatch {
    pub points: Vec<PointZ>,
    pub parts: Vec<i32>,
    pub part_types: Vec<PatchType>,
    pub bbox: BBox,
    pub z_range: Range,
    pub m_range: Range,
}

/// Splits `points`/`parts` into per-part point slices.
pub fn parts_of<'a, P>(points: &'a [P], parts: &[i32]) -> Vec<&'a [P]> {
    let mut out = Vec::with_capacity(parts.len());
    for (i, &start) in parts.iter().enumerate() {
        let end = parts.get(i + 1).copied().unwrap_or(points.len() as i32);
        out.push(&points[start as usize..end as usize]);
    }
    out
}

/// One geometry record. Z, M, part types and bbox only appear on the
/// variants that carry them.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    NullShape,
    Point(Point),
    PointM(PointM),
    PointZ(PointZ),
    Polyline(Polyline),
    PolylineM(PolylineM),
    PolylineZ(PolylineZ),
    Polygon(Polygon),
    PolygonM(PolygonM),
    PolygonZ(PolygonZ),
    Multipoint(Multipoint),
    MultipointM(MultipointM),
    MultipointZ(MultipointZ),
    Multipatch(Multipatch),
}

impl Shape {
    /// Returns the [ShapeType] this shape would be serialized as.
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::NullShape => ShapeType::NullShape,
            Shape::Point(_) => ShapeType::Point,
            Shape::PointM(_) => ShapeType::PointM,
            Shape::PointZ(_) => ShapeType::PointZ,
            Shape::Polyline(_) => ShapeType::Polyline,
            Shape::PolylineM(_) => ShapeType::PolylineM,
            Shape::PolylineZ(_) => ShapeType::PolylineZ,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::PolygonM(_) => ShapeType::PolygonM,
            Shape::PolygonZ(_) => ShapeType::PolygonZ,
            Shape::Multipoint(_) => ShapeType::Multipoint,
            Shape::MultipointM(_) => ShapeType::MultipointM,
            Shape::MultipointZ(_) => ShapeType::MultipointZ,
            Shape::Multipatch(_) => ShapeType::Multipatch,
        }
    }

    /// Returns the shape's stored bbox, or `None` for `NullShape` and
    /// single points with no stored bbox record.
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            Shape::NullShape => None,
            Shape::Point(p) => Some(BBox { xmin: p.x, ymin: p.y, xmax: p.x, ymax: p.y }),
            Shape::PointM(p) => Some(BBox { xmin: p.x, ymin: p.y, xmax: p.x, ymax: p.y }),
            Shape::PointZ(p) => Some(BBox { xmin: p.x, ymin: p.y, xmax: p.x, ymax: p.y }),
            Shape::Polyline(s) => Some(s.bbox),
            Shape::PolylineM(s) => Some(s.bbox),
            Shape::PolylineZ(s) => Some(s.bbox),
            Shape::Polygon(s) => Some(s.bbox),
            Shape::PolygonM(s) => Some(s.bbox),
            Shape::PolygonZ(s) => Some(s.bbox),
            Shape::Multipoint(s) => Some(s.bbox),
            Shape::MultipointM(s) => Some(s.bbox),
            Shape::MultipointZ(s) => Some(s.bbox),
            Shape::Multipatch(s) => Some(s.bbox),
        }
    }

    /// Number of points carried by this shape (0 for `NullShape`).
    pub fn point_count(&self) -> usize {
        match self {
            Shape::NullShape => 0,
            Shape::Point(_) | Shape::PointM(_) | Shape::PointZ(_) => 1,
            Shape::Polyline(s) => s.points.len(),
            Shape::PolylineM(s) => s.points.len(),
            Shape::PolylineZ(s) => s.points.len(),
            Shape::Polygon(s) => s.points.len(),
            Shape::PolygonM(s) => s.points.len(),
            Shape::PolygonZ(s) => s.points.len(),
            Shape::Multipoint(s) => s.points.len(),
            Shape::MultipointM(s) => s.points.len(),
            Shape::MultipointZ(s) => s.points.len(),
            Shape::Multipatch(s) => s.points.len(),
        }
    }

    /// The shape's stored Z range, for variants that carry one.
    pub fn z_range(&self) -> Option<Range> {
        match self {
            Shape::PointZ(p) => Some((p.z, p.z)),
            Shape::PolylineZ(s) => Some(s.z_range),
            Shape::PolygonZ(s) => Some(s.z_range),
            Shape::MultipointZ(s) => Some(s.z_range),
            Shape::Multipatch(s) => Some(s.z_range),
            _ => None,
        }
    }

    /// The shape's stored M range, for variants that carry one. Ranges
    /// made entirely of the no-data sentinel are still reported, so the
    /// writer can fold them verbatim into the file-level extent.
    pub fn m_range(&self) -> Option<Range> {
        match self {
            Shape::PointM(p) => Some((p.m, p.m)),
            Shape::PointZ(p) => Some((p.m, p.m)),
            Shape::PolylineM(s) => Some(s.m_range),
            Shape::PolygonM(s) => Some(s.m_range),
            Shape::PolylineZ(s) => Some(s.m_range),
            Shape::PolygonZ(s) => Some(s.m_range),
            Shape::MultipointM(s) => Some(s.m_range),
            Shape::MultipointZ(s) => Some(s.m_range),
            Shape::Multipatch(s) => Some(s.m_range),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_intersection_is_inclusive() {
        let a = BBox { xmin: 0.0, ymin: 0.0, xmax: 5.0, ymax: 5.0 };
        let b = BBox { xmin: 5.0, ymin: 5.0, xmax: 10.0, ymax: 10.0 };
        assert!(a.intersects(&b));
        let c = BBox { xmin: 5.01, ymin: 0.0, xmax: 10.0, ymax: 5.0 };
        assert!(!a.intersects(&c));
    }

    #[test]
    fn orientation() {
        let clockwise = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        assert!(is_clockwise(&clockwise));
        let ccw = [
            Point::new(2.0, 2.0),
            Point::new(4.0, 2.0),
            Point::new(4.0, 4.0),
            Point::new(2.0, 4.0),
            Point::new(2.0, 2.0),
        ];
        assert!(!is_clockwise(&ccw));
    }

    #[test]
    fn auto_close_appends_first_point() {
        let unclosed = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
        ];
        let closed = close_ring_points(&unclosed).unwrap();
        assert_eq!(closed.len(), 5);
        assert_eq!(closed[0], closed[4]);
    }

    #[test]
    fn degenerate_ring_rejected() {
        let two_points = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        assert!(close_ring_points(&two_points).is_err());
    }

    #[test]
    fn no_data_sentinel() {
        assert!(is_no_data(NO_DATA));
        assert!(is_no_data(-2.0e38));
        assert!(!is_no_data(0.0));
        assert_eq!(measure_or_no_data(None), NO_DATA);
        assert_eq!(measure_or_no_data(Some(1.0)), 1.0);
    }
}
