//! The [ShapeType] and [PatchType] codes defined by the ESRI specification.

use crate::error::Error;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

/// The type of all the shapes stored in a shapefile (mixing shapes of
/// different types in one file is not allowed, except for `NullShape`
/// records which may stand in for any type).
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum ShapeType {
    NullShape = 0,
    Point = 1,
    Polyline = 3,
    Polygon = 5,
    Multipoint = 8,

    PointZ = 11,
    PolylineZ = 13,
    PolygonZ = 15,
    MultipointZ = 18,

    PointM = 21,
    PolylineM = 23,
    PolygonM = 25,
    MultipointM = 28,

    Multipatch = 31,
}

impl ShapeType {
    pub(crate) fn read_from<T: Read>(source: &mut T) -> Result<ShapeType, Error> {
        let code = source.read_i32::<LittleEndian>()?;
        Self::from(code).ok_or(Error::InvalidShapeType(code))
    }

    pub(crate) fn write_to<T: Write>(self, dest: &mut T) -> Result<(), std::io::Error> {
        dest.write_i32::<LittleEndian>(self as i32)
    }

    /// Returns the ShapeType corresponding to the input code, if valid.
    ///
    /// ```
    /// use esri_shapefile::ShapeType;
    ///
    /// assert_eq!(ShapeType::from(25), Some(ShapeType::PolygonM));
    /// assert_eq!(ShapeType::from(60), None);
    /// ```
    pub fn from(code: i32) -> Option<ShapeType> {
        match code {
            0 => Some(ShapeType::NullShape),
            1 => Some(ShapeType::Point),
            3 => Some(ShapeType::Polyline),
            5 => Some(ShapeType::Polygon),
            8 => Some(ShapeType::Multipoint),
            11 => Some(ShapeType::PointZ),
            13 => Some(ShapeType::PolylineZ),
            15 => Some(ShapeType::PolygonZ),
            18 => Some(ShapeType::MultipointZ),
            21 => Some(ShapeType::PointM),
            23 => Some(ShapeType::PolylineM),
            25 => Some(ShapeType::PolygonM),
            28 => Some(ShapeType::MultipointM),
            31 => Some(ShapeType::Multipatch),
            _ => None,
        }
    }

    /// Returns whether shapes of this type carry a Z dimension.
    pub fn has_z(self) -> bool {
        matches!(
            self,
            ShapeType::PointZ | ShapeType::PolylineZ | ShapeType::PolygonZ | ShapeType::MultipointZ
        ) || self == ShapeType::Multipatch
    }

    /// Returns whether shapes of this type carry the optional M dimension.
    pub fn has_m(self) -> bool {
        self.has_z()
            || matches!(
                self,
                ShapeType::PointM | ShapeType::PolylineM | ShapeType::PolygonM | ShapeType::MultipointM
            )
    }

    /// Returns true if a shape of this type may have more than one part.
    pub fn is_multipart(self) -> bool {
        !matches!(
            self,
            ShapeType::Point
                | ShapeType::PointM
                | ShapeType::PointZ
                | ShapeType::Multipoint
                | ShapeType::MultipointM
                | ShapeType::MultipointZ
        )
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ShapeType::NullShape => "NullShape",
            ShapeType::Point => "Point",
            ShapeType::Polyline => "Polyline",
            ShapeType::Polygon => "Polygon",
            ShapeType::Multipoint => "Multipoint",
            ShapeType::PointZ => "PointZ",
            ShapeType::PolylineZ => "PolylineZ",
            ShapeType::PolygonZ => "PolygonZ",
            ShapeType::MultipointZ => "MultipointZ",
            ShapeType::PointM => "PointM",
            ShapeType::PolylineM => "PolylineM",
            ShapeType::PolygonM => "PolygonM",
            ShapeType::MultipointM => "MultipointM",
            ShapeType::Multipatch => "Multipatch",
        };
        write!(f, "{name}")
    }
}

/// The type of a single part within a [crate::shape::Multipatch] shape.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum PatchType {
    TriangleStrip = 0,
    TriangleFan = 1,
    OuterRing = 2,
    InnerRing = 3,
    FirstRing = 4,
    Ring = 5,
}

impl PatchType {
    pub(crate) fn read_from<T: Read>(source: &mut T) -> Result<PatchType, Error> {
        let code = source.read_i32::<LittleEndian>()?;
        Self::from(code).ok_or(Error::InvalidPatchType(code))
    }

    pub(crate) fn write_to<T: Write>(self, dest: &mut T) -> Result<(), std::io::Error> {
        dest.write_i32::<LittleEndian>(self as i32)
    }

    pub fn from(code: i32) -> Option<PatchType> {
        match code {
            0 => Some(PatchType::TriangleStrip),
            1 => Some(PatchType::TriangleFan),
            2 => Some(PatchType::OuterRing),
            3 => Some(PatchType::InnerRing),
            4 => Some(PatchType::FirstRing),
            5 => Some(PatchType::Ring),
            _ => None,
        }
    }

    /// Whether this part type begins a new outer ring/polygon.
    pub fn starts_outer(self) -> bool {
        matches!(self, PatchType::OuterRing | PatchType::FirstRing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_codes() {
        for code in [0, 1, 3, 5, 8, 11, 13, 15, 18, 21, 23, 25, 28, 31] {
            let shape_type = ShapeType::from(code).unwrap();
            assert_eq!(shape_type as i32, code);
        }
        assert_eq!(ShapeType::from(99), None);
    }

    #[test]
    fn dimension_flags() {
        assert!(!ShapeType::Point.has_z());
        assert!(!ShapeType::Point.has_m());
        assert!(ShapeType::PointM.has_m());
        assert!(!ShapeType::PointM.has_z());
        assert!(ShapeType::PointZ.has_z());
        assert!(ShapeType::PointZ.has_m());
        assert!(ShapeType::Multipatch.has_z());
    }
}
