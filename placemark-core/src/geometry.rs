//! The geometry value model.
//!
//! Geometries are a closed sum type over the seven simple-feature kinds,
//! tagged with a spatial reference identifier (SRID). Coordinates are
//! `geo::Coord` values with `x = longitude` and `y = latitude` when the SRID
//! denotes a geographic reference system. Constructors validate the
//! shape-specific invariants; values obtained from them are always well
//! formed.

use geo::Coord;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// SRID of the WGS84 geographic coordinate system (longitude/latitude).
pub const WGS84: i32 = 4326;

/// Errors returned by the validating geometry constructors.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// A line string (or a member of a multi line string) had fewer than two
    /// coordinates.
    #[error("line string requires at least 2 coordinates, found {found}")]
    ShortLineString {
        /// Number of coordinates supplied.
        found: usize,
    },
    /// A polygon ring had fewer than four coordinates.
    #[error("polygon ring requires at least 4 coordinates, found {found}")]
    ShortRing {
        /// Number of coordinates supplied.
        found: usize,
    },
    /// A polygon ring did not end where it started.
    #[error("polygon ring is not closed: starts at {first:?}, ends at {last:?}")]
    OpenRing {
        /// First coordinate of the ring.
        first: Coord<f64>,
        /// Last coordinate of the ring.
        last: Coord<f64>,
    },
}

/// A polygon: one closed exterior ring plus zero or more closed interior
/// rings (holes). Rings include the closing coordinate, so a triangle has
/// four entries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    /// Outer boundary, closed.
    pub exterior: Vec<Coord<f64>>,
    /// Holes, each closed.
    pub interiors: Vec<Vec<Coord<f64>>>,
}

impl Polygon {
    /// Validates and constructs a [`Polygon`].
    ///
    /// Every ring must contain at least four coordinates and its first and
    /// last coordinates must be bitwise identical.
    ///
    /// # Examples
    /// ```
    /// use geo::Coord;
    /// use placemark_core::Polygon;
    ///
    /// let ring = vec![
    ///     Coord { x: 0.0, y: 0.0 },
    ///     Coord { x: 1.0, y: 0.0 },
    ///     Coord { x: 1.0, y: 1.0 },
    ///     Coord { x: 0.0, y: 0.0 },
    /// ];
    /// assert!(Polygon::new(ring, Vec::new()).is_ok());
    /// ```
    pub fn new(
        exterior: Vec<Coord<f64>>,
        interiors: Vec<Vec<Coord<f64>>>,
    ) -> Result<Self, GeometryError> {
        validate_ring(&exterior)?;
        for ring in &interiors {
            validate_ring(ring)?;
        }
        Ok(Self {
            exterior,
            interiors,
        })
    }
}

fn validate_ring(ring: &[Coord<f64>]) -> Result<(), GeometryError> {
    if ring.len() < 4 {
        return Err(GeometryError::ShortRing { found: ring.len() });
    }
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if first != last => Err(GeometryError::OpenRing {
            first: *first,
            last: *last,
        }),
        _ => Ok(()),
    }
}

fn validate_line(coords: &[Coord<f64>]) -> Result<(), GeometryError> {
    if coords.len() < 2 {
        return Err(GeometryError::ShortLineString {
            found: coords.len(),
        });
    }
    Ok(())
}

/// The seven geometry kinds, without an SRID.
///
/// The variant set is fixed; dispatch is by exhaustive matching rather than
/// subtyping. Equality is structural: two shapes tracing the same area in a
/// different coordinate order are different values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// A single coordinate.
    Point(Coord<f64>),
    /// An ordered sequence of at least two coordinates.
    LineString(Vec<Coord<f64>>),
    /// A closed exterior ring with optional holes.
    Polygon(Polygon),
    /// A collection of points.
    MultiPoint(Vec<Coord<f64>>),
    /// An ordered sequence of line strings.
    MultiLineString(Vec<Vec<Coord<f64>>>),
    /// An ordered sequence of polygons.
    MultiPolygon(Vec<Polygon>),
    /// A heterogeneous, possibly nested collection of shapes.
    GeometryCollection(Vec<Shape>),
}

impl Shape {
    /// Validates and constructs a [`Shape::LineString`].
    pub fn line_string(coords: Vec<Coord<f64>>) -> Result<Self, GeometryError> {
        validate_line(&coords)?;
        Ok(Self::LineString(coords))
    }

    /// Validates and constructs a [`Shape::MultiLineString`]; each member
    /// needs at least two coordinates.
    pub fn multi_line_string(parts: Vec<Vec<Coord<f64>>>) -> Result<Self, GeometryError> {
        for part in &parts {
            validate_line(part)?;
        }
        Ok(Self::MultiLineString(parts))
    }

    /// Every coordinate of the shape, in encoding order.
    pub fn coords(&self) -> Vec<Coord<f64>> {
        let mut out = Vec::new();
        self.collect_coords(&mut out);
        out
    }

    fn collect_coords(&self, out: &mut Vec<Coord<f64>>) {
        match self {
            Self::Point(coord) => out.push(*coord),
            Self::LineString(coords) | Self::MultiPoint(coords) => out.extend_from_slice(coords),
            Self::Polygon(polygon) => collect_polygon(polygon, out),
            Self::MultiLineString(parts) => {
                for part in parts {
                    out.extend_from_slice(part);
                }
            }
            Self::MultiPolygon(polygons) => {
                for polygon in polygons {
                    collect_polygon(polygon, out);
                }
            }
            Self::GeometryCollection(shapes) => {
                for shape in shapes {
                    shape.collect_coords(out);
                }
            }
        }
    }
}

fn collect_polygon(polygon: &Polygon, out: &mut Vec<Coord<f64>>) {
    out.extend_from_slice(&polygon.exterior);
    for ring in &polygon.interiors {
        out.extend_from_slice(ring);
    }
}

/// A shape tagged with its spatial reference identifier.
///
/// The SRID is carried once, on the top-level value; members of a
/// [`Shape::GeometryCollection`] inherit it. Equality is structural and
/// includes the SRID.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use placemark_core::{Geometry, WGS84};
///
/// let point = Geometry::point(WGS84, Coord { x: 78.4867, y: 17.385 });
/// assert_eq!(point.srid, WGS84);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    /// Spatial reference identifier (4326 = WGS84 longitude/latitude).
    pub srid: i32,
    /// The geometry itself.
    pub shape: Shape,
}

impl Geometry {
    /// Constructs a point geometry.
    pub const fn point(srid: i32, coord: Coord<f64>) -> Self {
        Self {
            srid,
            shape: Shape::Point(coord),
        }
    }

    /// Validates and constructs a line string geometry.
    ///
    /// # Examples
    /// ```
    /// use geo::Coord;
    /// use placemark_core::{Geometry, GeometryError, WGS84};
    ///
    /// let too_short = Geometry::line_string(WGS84, vec![Coord { x: 0.0, y: 0.0 }]);
    /// assert_eq!(too_short, Err(GeometryError::ShortLineString { found: 1 }));
    /// ```
    pub fn line_string(srid: i32, coords: Vec<Coord<f64>>) -> Result<Self, GeometryError> {
        Ok(Self {
            srid,
            shape: Shape::line_string(coords)?,
        })
    }

    /// Validates and constructs a polygon geometry from its rings.
    pub fn polygon(
        srid: i32,
        exterior: Vec<Coord<f64>>,
        interiors: Vec<Vec<Coord<f64>>>,
    ) -> Result<Self, GeometryError> {
        Ok(Self {
            srid,
            shape: Shape::Polygon(Polygon::new(exterior, interiors)?),
        })
    }

    /// Constructs a multi point geometry.
    pub const fn multi_point(srid: i32, coords: Vec<Coord<f64>>) -> Self {
        Self {
            srid,
            shape: Shape::MultiPoint(coords),
        }
    }

    /// Validates and constructs a multi line string geometry.
    pub fn multi_line_string(
        srid: i32,
        parts: Vec<Vec<Coord<f64>>>,
    ) -> Result<Self, GeometryError> {
        Ok(Self {
            srid,
            shape: Shape::multi_line_string(parts)?,
        })
    }

    /// Constructs a multi polygon geometry from already-validated polygons.
    pub const fn multi_polygon(srid: i32, polygons: Vec<Polygon>) -> Self {
        Self {
            srid,
            shape: Shape::MultiPolygon(polygons),
        }
    }

    /// Constructs a geometry collection from already-validated shapes.
    pub const fn collection(srid: i32, shapes: Vec<Shape>) -> Self {
        Self {
            srid,
            shape: Shape::GeometryCollection(shapes),
        }
    }
}
