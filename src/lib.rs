//! Facade crate for the Placemark spatial record store.
//!
//! This crate re-exports the geometry model, codec, and record store types
//! from `placemark-core` and exposes the SQLite backend behind the
//! `store-sqlite` feature flag.

#![forbid(unsafe_code)]

pub use placemark_core::{
    BatchUpdate, Geometry, GeometryError, Polygon, Record, RecordPredicate, RecordStore, Shape,
    StoreError, WGS84, WkbError, decode, encode,
};

#[cfg(feature = "store-sqlite")]
pub use placemark_core::SqliteRecordStore;
