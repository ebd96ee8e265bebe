//! Read and write the ESRI Shapefile triplet (`.shp`/`.shx`/`.dbf`).
//!
//! [Reader] opens any subset of the triplet for sequential or random-access
//! reading; [Writer] streams shapes and dbf records out and finalizes the
//! headers on close. [Shape] is the in-memory geometry model shared by both;
//! [geo] is a small geometry interchange layer for callers that don't want
//! to depend on the [Shape] enum directly.

mod dbf;
mod encoding;
mod error;
pub mod geo;
mod header;
pub mod reader;
mod shape;
mod shapetype;
mod shp;
mod shx;
pub mod writer;

pub use crate::dbf::{Date, FieldInfo, FieldType, Value};
pub use crate::encoding::{ErrorPolicy, TextCodec};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::geo::{Feature, FeatureCollection, Geometry, Position};
pub use crate::reader::{Reader, ReaderOptions};
pub use crate::shape::{
    is_no_data, BBox, Multipatch, Multipoint, MultipointM, MultipointZ, Point, PointM, PointZ, Polygon, PolygonM,
    PolygonZ, Polyline, PolylineM, PolylineZ, Range, Shape, NO_DATA,
};
pub use crate::shapetype::{PatchType, ShapeType};
pub use crate::writer::{Writer, WriterOptions};
