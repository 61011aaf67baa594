//! Extended-WKB wire codec for geometries.
//!
//! The encoding is deterministic: identical geometries always produce
//! identical bytes. Layout follows the well-known-binary convention,
//! little-endian throughout:
//!
//! - byte-order marker `0x01`;
//! - `u32` type code (1–7), OR'd with the `0x2000_0000` SRID flag on the
//!   top-level geometry only, followed by the `u32` SRID;
//! - the variant payload: coordinates as two `f64`s, sequence and ring
//!   counts as `u32`s, polygon rings including the closing coordinate;
//! - members of multi geometries and collections carry their own header
//!   (byte order + type code) but never an SRID — the SRID appears exactly
//!   once.
//!
//! [`decode`] re-validates shapes through the model constructors, so a blob
//! describing an open polygon ring is rejected rather than materialised.

use geo::Coord;
use thiserror::Error;

use crate::geometry::{Geometry, GeometryError, Polygon, Shape};

const BYTE_ORDER_LE: u8 = 0x01;
const SRID_FLAG: u32 = 0x2000_0000;

const TYPE_POINT: u32 = 1;
const TYPE_LINE_STRING: u32 = 2;
const TYPE_POLYGON: u32 = 3;
const TYPE_MULTI_POINT: u32 = 4;
const TYPE_MULTI_LINE_STRING: u32 = 5;
const TYPE_MULTI_POLYGON: u32 = 6;
const TYPE_GEOMETRY_COLLECTION: u32 = 7;

/// Errors raised while decoding a geometry blob.
#[derive(Debug, Error, PartialEq)]
pub enum WkbError {
    /// The input ended before the payload was complete.
    #[error("truncated geometry: needed {needed} more byte(s) at offset {offset}")]
    Truncated {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Number of bytes the read required.
        needed: usize,
    },
    /// The byte-order marker was not little-endian.
    #[error("unsupported byte-order marker {found:#04x}; only 0x01 (little-endian) is accepted")]
    BadByteOrder {
        /// Marker byte found in the input.
        found: u8,
    },
    /// The type code does not name one of the seven geometry kinds.
    #[error("unknown geometry type code {code}")]
    UnknownType {
        /// Code found in the input.
        code: u32,
    },
    /// The top-level geometry did not carry an SRID.
    #[error("top-level geometry does not carry an SRID")]
    MissingSrid,
    /// A nested geometry carried its own SRID.
    #[error("nested geometry must not carry an SRID")]
    UnexpectedSrid,
    /// A multi geometry member had the wrong type code.
    #[error("multi-geometry member has type code {found}, expected {expected}")]
    MemberType {
        /// Code required by the enclosing geometry.
        expected: u32,
        /// Code found in the input.
        found: u32,
    },
    /// Bytes remained after the geometry payload.
    #[error("{remaining} trailing byte(s) after geometry payload")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },
    /// The decoded shape violated a model invariant.
    #[error("decoded geometry failed validation: {0}")]
    Invalid(#[from] GeometryError),
}

/// Serialise a geometry to its wire form.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use placemark_core::{Geometry, WGS84, decode, encode};
///
/// let point = Geometry::point(WGS84, Coord { x: 78.4867, y: 17.385 });
/// let bytes = encode(&point);
/// assert_eq!(decode(&bytes).unwrap(), point);
/// ```
pub fn encode(geometry: &Geometry) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(BYTE_ORDER_LE);
    write_u32(&mut out, type_code(&geometry.shape) | SRID_FLAG);
    write_u32(&mut out, geometry.srid.cast_unsigned());
    write_body(&mut out, &geometry.shape);
    out
}

/// Deserialise a geometry from its wire form.
///
/// Fails on truncated or structurally invalid input; trailing bytes after
/// the payload are an error.
pub fn decode(bytes: &[u8]) -> Result<Geometry, WkbError> {
    let mut reader = Reader { bytes, pos: 0 };
    let marker = reader.read_u8()?;
    if marker != BYTE_ORDER_LE {
        return Err(WkbError::BadByteOrder { found: marker });
    }
    let raw = reader.read_u32()?;
    if raw & SRID_FLAG == 0 {
        return Err(WkbError::MissingSrid);
    }
    let srid = reader.read_u32()?.cast_signed();
    let shape = read_body(&mut reader, raw & !SRID_FLAG)?;
    let remaining = reader.remaining();
    if remaining > 0 {
        return Err(WkbError::TrailingBytes { remaining });
    }
    Ok(Geometry { srid, shape })
}

const fn type_code(shape: &Shape) -> u32 {
    match shape {
        Shape::Point(_) => TYPE_POINT,
        Shape::LineString(_) => TYPE_LINE_STRING,
        Shape::Polygon(_) => TYPE_POLYGON,
        Shape::MultiPoint(_) => TYPE_MULTI_POINT,
        Shape::MultiLineString(_) => TYPE_MULTI_LINE_STRING,
        Shape::MultiPolygon(_) => TYPE_MULTI_POLYGON,
        Shape::GeometryCollection(_) => TYPE_GEOMETRY_COLLECTION,
    }
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_coord(out: &mut Vec<u8>, coord: Coord<f64>) {
    out.extend_from_slice(&coord.x.to_le_bytes());
    out.extend_from_slice(&coord.y.to_le_bytes());
}

fn write_coord_seq(out: &mut Vec<u8>, coords: &[Coord<f64>]) {
    write_u32(out, coords.len() as u32);
    for coord in coords {
        write_coord(out, *coord);
    }
}

fn write_polygon_body(out: &mut Vec<u8>, polygon: &Polygon) {
    write_u32(out, 1 + polygon.interiors.len() as u32);
    write_coord_seq(out, &polygon.exterior);
    for ring in &polygon.interiors {
        write_coord_seq(out, ring);
    }
}

fn write_member_header(out: &mut Vec<u8>, code: u32) {
    out.push(BYTE_ORDER_LE);
    write_u32(out, code);
}

fn write_body(out: &mut Vec<u8>, shape: &Shape) {
    match shape {
        Shape::Point(coord) => write_coord(out, *coord),
        Shape::LineString(coords) => write_coord_seq(out, coords),
        Shape::Polygon(polygon) => write_polygon_body(out, polygon),
        Shape::MultiPoint(points) => {
            write_u32(out, points.len() as u32);
            for point in points {
                write_member_header(out, TYPE_POINT);
                write_coord(out, *point);
            }
        }
        Shape::MultiLineString(parts) => {
            write_u32(out, parts.len() as u32);
            for part in parts {
                write_member_header(out, TYPE_LINE_STRING);
                write_coord_seq(out, part);
            }
        }
        Shape::MultiPolygon(polygons) => {
            write_u32(out, polygons.len() as u32);
            for polygon in polygons {
                write_member_header(out, TYPE_POLYGON);
                write_polygon_body(out, polygon);
            }
        }
        Shape::GeometryCollection(shapes) => {
            write_u32(out, shapes.len() as u32);
            for member in shapes {
                write_member_header(out, type_code(member));
                write_body(out, member);
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, count: usize) -> Result<&[u8], WkbError> {
        let end = self.pos.checked_add(count).ok_or(WkbError::Truncated {
            offset: self.pos,
            needed: count,
        })?;
        let slice = self.bytes.get(self.pos..end).ok_or(WkbError::Truncated {
            offset: self.pos,
            needed: count,
        })?;
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, WkbError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, WkbError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().map_err(|_| WkbError::Truncated {
            offset: self.pos,
            needed: 4,
        })?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_f64(&mut self) -> Result<f64, WkbError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().map_err(|_| WkbError::Truncated {
            offset: self.pos,
            needed: 8,
        })?;
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_coord(&mut self) -> Result<Coord<f64>, WkbError> {
        let x = self.read_f64()?;
        let y = self.read_f64()?;
        Ok(Coord { x, y })
    }

    // Counts are read iteratively rather than pre-allocated so a corrupt
    // length prefix fails with `Truncated` instead of exhausting memory.
    fn read_coord_seq(&mut self) -> Result<Vec<Coord<f64>>, WkbError> {
        let count = self.read_u32()?;
        let mut coords = Vec::new();
        for _ in 0..count {
            coords.push(self.read_coord()?);
        }
        Ok(coords)
    }

    fn read_member_header(&mut self, expected: u32) -> Result<(), WkbError> {
        let code = self.read_nested_code()?;
        if code != expected {
            return Err(WkbError::MemberType {
                expected,
                found: code,
            });
        }
        Ok(())
    }

    fn read_nested_code(&mut self) -> Result<u32, WkbError> {
        let marker = self.read_u8()?;
        if marker != BYTE_ORDER_LE {
            return Err(WkbError::BadByteOrder { found: marker });
        }
        let raw = self.read_u32()?;
        if raw & SRID_FLAG != 0 {
            return Err(WkbError::UnexpectedSrid);
        }
        Ok(raw)
    }
}

fn read_polygon_body(reader: &mut Reader<'_>) -> Result<Polygon, WkbError> {
    let ring_count = reader.read_u32()?;
    if ring_count == 0 {
        return Err(WkbError::Invalid(GeometryError::ShortRing { found: 0 }));
    }
    let exterior = reader.read_coord_seq()?;
    let mut interiors = Vec::new();
    for _ in 1..ring_count {
        interiors.push(reader.read_coord_seq()?);
    }
    Ok(Polygon::new(exterior, interiors)?)
}

fn read_body(reader: &mut Reader<'_>, code: u32) -> Result<Shape, WkbError> {
    match code {
        TYPE_POINT => Ok(Shape::Point(reader.read_coord()?)),
        TYPE_LINE_STRING => Ok(Shape::line_string(reader.read_coord_seq()?)?),
        TYPE_POLYGON => Ok(Shape::Polygon(read_polygon_body(reader)?)),
        TYPE_MULTI_POINT => {
            let count = reader.read_u32()?;
            let mut points = Vec::new();
            for _ in 0..count {
                reader.read_member_header(TYPE_POINT)?;
                points.push(reader.read_coord()?);
            }
            Ok(Shape::MultiPoint(points))
        }
        TYPE_MULTI_LINE_STRING => {
            let count = reader.read_u32()?;
            let mut parts = Vec::new();
            for _ in 0..count {
                reader.read_member_header(TYPE_LINE_STRING)?;
                parts.push(reader.read_coord_seq()?);
            }
            Ok(Shape::multi_line_string(parts)?)
        }
        TYPE_MULTI_POLYGON => {
            let count = reader.read_u32()?;
            let mut polygons = Vec::new();
            for _ in 0..count {
                reader.read_member_header(TYPE_POLYGON)?;
                polygons.push(read_polygon_body(reader)?);
            }
            Ok(Shape::MultiPolygon(polygons))
        }
        TYPE_GEOMETRY_COLLECTION => {
            let count = reader.read_u32()?;
            let mut shapes = Vec::new();
            for _ in 0..count {
                let member_code = reader.read_nested_code()?;
                shapes.push(read_body(reader, member_code)?);
            }
            Ok(Shape::GeometryCollection(shapes))
        }
        other => Err(WkbError::UnknownType { code: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::WGS84;
    use rstest::rstest;

    fn coord(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn square() -> Polygon {
        Polygon::new(
            vec![
                coord(0.0, 0.0),
                coord(1.0, 0.0),
                coord(1.0, 1.0),
                coord(0.0, 1.0),
                coord(0.0, 0.0),
            ],
            Vec::new(),
        )
        .unwrap()
    }

    fn sample_geometries() -> Vec<Geometry> {
        vec![
            Geometry::point(WGS84, coord(78.4867, 17.385)),
            Geometry::line_string(WGS84, vec![coord(0.0, 0.0), coord(1.0, 2.0)]).unwrap(),
            Geometry {
                srid: WGS84,
                shape: Shape::Polygon(square()),
            },
            Geometry::multi_point(WGS84, vec![coord(1.0, 1.0), coord(2.0, 2.0)]),
            Geometry::multi_line_string(
                WGS84,
                vec![
                    vec![coord(0.0, 0.0), coord(1.0, 0.0)],
                    vec![coord(0.0, 1.0), coord(1.0, 1.0)],
                ],
            )
            .unwrap(),
            Geometry::multi_polygon(3857, vec![square()]),
            Geometry::collection(
                WGS84,
                vec![
                    Shape::Point(coord(5.0, 5.0)),
                    Shape::GeometryCollection(vec![Shape::Polygon(square())]),
                ],
            ),
        ]
    }

    #[rstest]
    fn round_trips_every_variant() {
        for geometry in sample_geometries() {
            let bytes = encode(&geometry);
            assert_eq!(decode(&bytes).unwrap(), geometry, "{geometry:?}");
        }
    }

    #[rstest]
    fn encoding_is_deterministic() {
        let geometry = Geometry::collection(WGS84, vec![Shape::Polygon(square())]);
        assert_eq!(encode(&geometry), encode(&geometry));
    }

    #[rstest]
    fn srid_appears_once_at_top_level() {
        let geometry = Geometry::multi_point(WGS84, vec![coord(1.0, 1.0)]);
        let bytes = encode(&geometry);
        // Layout: marker, type|flag, srid, count, then the member header.
        let top_code = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
        let member_code = u32::from_le_bytes(bytes[14..18].try_into().unwrap());
        assert_ne!(top_code & SRID_FLAG, 0);
        assert_eq!(member_code, TYPE_POINT);
    }

    #[rstest]
    fn rejects_truncated_input() {
        let bytes = encode(&Geometry::point(WGS84, coord(1.0, 2.0)));
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            decode(truncated),
            Err(WkbError::Truncated { .. })
        ));
    }

    #[rstest]
    fn rejects_empty_input() {
        assert!(matches!(decode(&[]), Err(WkbError::Truncated { .. })));
    }

    #[rstest]
    fn rejects_big_endian_marker() {
        let mut bytes = encode(&Geometry::point(WGS84, coord(1.0, 2.0)));
        bytes[0] = 0x00;
        assert_eq!(decode(&bytes), Err(WkbError::BadByteOrder { found: 0x00 }));
    }

    #[rstest]
    fn rejects_unknown_type_code() {
        let mut bytes = Vec::new();
        bytes.push(BYTE_ORDER_LE);
        bytes.extend_from_slice(&(99_u32 | SRID_FLAG).to_le_bytes());
        bytes.extend_from_slice(&4326_u32.to_le_bytes());
        assert_eq!(decode(&bytes), Err(WkbError::UnknownType { code: 99 }));
    }

    #[rstest]
    fn rejects_missing_srid() {
        let mut bytes = Vec::new();
        bytes.push(BYTE_ORDER_LE);
        bytes.extend_from_slice(&TYPE_POINT.to_le_bytes());
        bytes.extend_from_slice(&1.0_f64.to_le_bytes());
        bytes.extend_from_slice(&2.0_f64.to_le_bytes());
        assert_eq!(decode(&bytes), Err(WkbError::MissingSrid));
    }

    #[rstest]
    fn rejects_trailing_bytes() {
        let mut bytes = encode(&Geometry::point(WGS84, coord(1.0, 2.0)));
        bytes.push(0xFF);
        assert_eq!(decode(&bytes), Err(WkbError::TrailingBytes { remaining: 1 }));
    }

    #[rstest]
    fn rejects_open_ring_payload() {
        // Hand-built polygon blob whose single ring does not close.
        let mut bytes = Vec::new();
        bytes.push(BYTE_ORDER_LE);
        bytes.extend_from_slice(&(TYPE_POLYGON | SRID_FLAG).to_le_bytes());
        bytes.extend_from_slice(&4326_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u32.to_le_bytes());
        bytes.extend_from_slice(&4_u32.to_le_bytes());
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.5, 0.5)] {
            bytes.extend_from_slice(&f64::to_le_bytes(x));
            bytes.extend_from_slice(&f64::to_le_bytes(y));
        }
        assert!(matches!(
            decode(&bytes),
            Err(WkbError::Invalid(GeometryError::OpenRing { .. }))
        ));
    }

    #[rstest]
    fn rejects_nested_srid() {
        let mut bytes = Vec::new();
        bytes.push(BYTE_ORDER_LE);
        bytes.extend_from_slice(&(TYPE_MULTI_POINT | SRID_FLAG).to_le_bytes());
        bytes.extend_from_slice(&4326_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u32.to_le_bytes());
        bytes.push(BYTE_ORDER_LE);
        bytes.extend_from_slice(&(TYPE_POINT | SRID_FLAG).to_le_bytes());
        assert_eq!(decode(&bytes), Err(WkbError::UnexpectedSrid));
    }

    #[rstest]
    fn rejects_mismatched_member_type() {
        let mut bytes = Vec::new();
        bytes.push(BYTE_ORDER_LE);
        bytes.extend_from_slice(&(TYPE_MULTI_POINT | SRID_FLAG).to_le_bytes());
        bytes.extend_from_slice(&4326_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u32.to_le_bytes());
        bytes.push(BYTE_ORDER_LE);
        bytes.extend_from_slice(&TYPE_LINE_STRING.to_le_bytes());
        assert_eq!(
            decode(&bytes),
            Err(WkbError::MemberType {
                expected: TYPE_POINT,
                found: TYPE_LINE_STRING,
            })
        );
    }
}
