//! Records persisted by the store.

use crate::geometry::Geometry;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A named row with an optional geometry column.
///
/// `id` is `None` until the store assigns one on insert; once assigned it is
/// immutable. `name` and `location` may be overwritten by single-record or
/// batch updates.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use placemark_core::{Geometry, Record, WGS84};
///
/// let record = Record::new(
///     "Charminar",
///     Some(Geometry::point(WGS84, Coord { x: 78.4747, y: 17.3616 })),
/// );
/// assert!(record.id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record {
    /// Store-assigned identifier; `None` before the first insert.
    pub id: Option<i64>,
    /// Optional display name.
    pub name: Option<String>,
    /// Optional geometry payload.
    pub location: Option<Geometry>,
}

impl Record {
    /// Constructs an unsaved record with a name and an optional location.
    pub fn new(name: impl Into<String>, location: Option<Geometry>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            location,
        }
    }

    /// Constructs an unsaved record with a name and no location.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }
}
