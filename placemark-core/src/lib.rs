//! Core types for the Placemark spatial record store.
//!
//! The crate is organised around four pieces: the geometry value model
//! ([`Geometry`], [`Shape`]), the wire codec ([`encode`]/[`decode`]), the
//! [`Record`] carrying an optional geometry, and the [`RecordStore`] trait
//! with its SQLite implementation. Constructors return `Result` to surface
//! invalid input early.

#![forbid(unsafe_code)]

mod geometry;
mod record;
pub mod store;
pub mod wkb;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use geometry::{Geometry, GeometryError, Polygon, Shape, WGS84};
pub use record::Record;
pub use store::{BatchUpdate, RecordPredicate, RecordStore, StoreError};
pub use wkb::{WkbError, decode, encode};

#[cfg(feature = "store-sqlite")]
pub use store::SqliteRecordStore;
