//! Data access for geometry-bearing records.
//!
//! The [`RecordStore`] trait covers the CRUD surface the demonstration
//! exercises: idempotent schema creation, transactional multi-row insert,
//! full and filtered reads, single-row and predicate-batch updates, bulk
//! delete, and the proximity query. Implementations delegate spatial
//! computation to the backing store; this module only builds predicates and
//! moves geometry through the codec.

use geo::{Coord, Distance, Haversine, Point};
use thiserror::Error;

use crate::geometry::Geometry;
use crate::record::Record;
use crate::wkb::{self, WkbError};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteRecordStore;

/// Errors surfaced by [`RecordStore`] operations.
///
/// Transport and driver errors are carried as boxed sources so the enum does
/// not depend on a particular backend. "Zero rows matched" for deletes and
/// batch updates is a normal empty result, never an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The update target does not exist.
    #[error("record {id} not found")]
    NotFound {
        /// Identifier that matched no row.
        id: i64,
    },
    /// A write carried a geometry whose SRID differs from the column SRID.
    #[error("geometry SRID {found} does not match column SRID {expected}")]
    SridMismatch {
        /// SRID the table was opened with.
        expected: i32,
        /// SRID carried by the rejected geometry.
        found: i32,
    },
    /// The backing store rejected a write.
    #[error("store rejected the write: {message}")]
    Constraint {
        /// Driver-reported reason.
        message: String,
    },
    /// The backing store could not be reached or opened.
    #[error("store unavailable: {source}")]
    Unavailable {
        /// Underlying transport or driver error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A stored geometry blob failed to decode.
    #[error("stored geometry is malformed: {0}")]
    Malformed(#[from] WkbError),
    /// Any other backing-store failure.
    #[error("database failure: {source}")]
    Database {
        /// Underlying driver error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Row predicates the store can push down in one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPredicate {
    /// Rows with `id` strictly greater than the threshold.
    IdAbove(i64),
    /// Rows with `id` less than or equal to the threshold.
    IdAtMost(i64),
}

impl RecordPredicate {
    /// Whether the predicate matches the given id.
    pub const fn matches(&self, id: i64) -> bool {
        match *self {
            Self::IdAbove(threshold) => id > threshold,
            Self::IdAtMost(threshold) => id <= threshold,
        }
    }
}

/// An explicit batch-update request: one predicate plus the assignments to
/// apply to every matching row in a single store-side statement.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use placemark_core::{BatchUpdate, Geometry, RecordPredicate, WGS84};
///
/// let update = BatchUpdate::new(RecordPredicate::IdAbove(4))
///     .set_location(Geometry::point(WGS84, Coord { x: 1.0, y: 2.0 }))
///     .append_name(" (updated)");
/// assert!(!update.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUpdate {
    pub(crate) predicate: RecordPredicate,
    pub(crate) set_location: Option<Geometry>,
    pub(crate) append_name: Option<String>,
}

impl BatchUpdate {
    /// Starts a request with no assignments.
    pub const fn new(predicate: RecordPredicate) -> Self {
        Self {
            predicate,
            set_location: None,
            append_name: None,
        }
    }

    /// Overwrite the location of every matching row.
    #[must_use]
    pub fn set_location(mut self, geometry: Geometry) -> Self {
        self.set_location = Some(geometry);
        self
    }

    /// Append a suffix to the name of every matching row; a missing name is
    /// treated as the empty string.
    #[must_use]
    pub fn append_name(mut self, suffix: impl Into<String>) -> Self {
        self.append_name = Some(suffix.into());
        self
    }

    /// The predicate selecting the rows to update.
    pub const fn predicate(&self) -> RecordPredicate {
        self.predicate
    }

    /// True when the request carries no assignments; executing it is a no-op.
    pub const fn is_empty(&self) -> bool {
        self.set_location.is_none() && self.append_name.is_none()
    }
}

/// CRUD and proximity operations over geometry-bearing records.
///
/// Operations are stateless request/response calls over an external,
/// stateful store. Multi-row writes (`insert_many`, `batch_update`) are
/// all-or-nothing: a rejection leaves the store unchanged. Isolation across
/// concurrent callers is whatever the backing store provides; no additional
/// locking happens here.
pub trait RecordStore {
    /// Create the backing table if absent; a no-op when it already exists.
    fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Insert the records in one transaction, returning them with their
    /// store-assigned ids in store order. If any record is rejected, none
    /// are committed.
    fn insert_many(&mut self, records: &[Record]) -> Result<Vec<Record>, StoreError>;

    /// All rows, decoded through the codec, ordered by id.
    fn list_all(&self) -> Result<Vec<Record>, StoreError>;

    /// The lowest-id row with the given name, if any.
    fn find_by_name(&self, name: &str) -> Result<Option<Record>, StoreError>;

    /// Overwrite one row's location. Fails with [`StoreError::NotFound`]
    /// when the id matches no row.
    fn update_location(&mut self, id: i64, location: Geometry) -> Result<(), StoreError>;

    /// Apply the request to every matching row in one store-side statement,
    /// returning the affected count. Zero matches is a normal result.
    fn batch_update(&mut self, update: &BatchUpdate) -> Result<usize, StoreError>;

    /// Remove every matching row, returning the removed count. Zero matches
    /// is a normal result.
    fn delete_where(&mut self, predicate: &RecordPredicate) -> Result<usize, StoreError>;

    /// Rows whose location lies within `meters` of the origin (geodesic
    /// metres; `x = longitude`, `y = latitude`). Rows without a location
    /// never match. Distance computation is delegated to the backing
    /// store's spatial predicate.
    fn within_distance(&self, origin: Coord<f64>, meters: f64)
    -> Result<Vec<Record>, StoreError>;
}

/// Encode an optional location for storage, enforcing the column SRID
/// policy: a geometry with a different SRID is rejected before any row is
/// written.
pub(crate) fn encode_location(
    column_srid: i32,
    location: Option<&Geometry>,
) -> Result<Option<Vec<u8>>, StoreError> {
    location
        .map(|geometry| {
            if geometry.srid != column_srid {
                return Err(StoreError::SridMismatch {
                    expected: column_srid,
                    found: geometry.srid,
                });
            }
            Ok(wkb::encode(geometry))
        })
        .transpose()
}

/// Minimum Haversine distance in metres between the origin and any
/// coordinate of the geometry. Empty geometries yield infinity and so never
/// fall within a finite radius.
pub(crate) fn nearest_distance_m(origin: Coord<f64>, geometry: &Geometry) -> f64 {
    let origin = Point::from(origin);
    geometry
        .shape
        .coords()
        .into_iter()
        .map(|coord| Haversine.distance(origin, Point::from(coord)))
        .fold(f64::INFINITY, f64::min)
}
