//! Test doubles shared by unit and behaviour tests.

use geo::Coord;

use crate::geometry::{Geometry, WGS84};
use crate::record::Record;
use crate::store::{
    BatchUpdate, RecordPredicate, RecordStore, StoreError, encode_location, nearest_distance_m,
};
use crate::wkb;

#[derive(Debug, Clone)]
struct StoredRow {
    id: i64,
    name: Option<String>,
    location: Option<Vec<u8>>,
}

/// In-memory [`RecordStore`] mirroring the SQLite backend's behaviour:
/// store-assigned ids, one SRID per table, all-or-nothing batches, and
/// geometry persisted through the wire codec.
#[derive(Debug)]
pub struct MemoryStore {
    column_srid: i32,
    next_id: i64,
    rows: Vec<StoredRow>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store with the WGS84 column SRID.
    pub const fn new() -> Self {
        Self::with_srid(WGS84)
    }

    /// An empty store with an explicit column SRID.
    pub const fn with_srid(column_srid: i32) -> Self {
        Self {
            column_srid,
            next_id: 1,
            rows: Vec::new(),
        }
    }

    fn decode_row(row: &StoredRow) -> Result<Record, StoreError> {
        let location = row.location.as_deref().map(wkb::decode).transpose()?;
        Ok(Record {
            id: Some(row.id),
            name: row.name.clone(),
            location,
        })
    }
}

impl RecordStore for MemoryStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn insert_many(&mut self, records: &[Record]) -> Result<Vec<Record>, StoreError> {
        // Encode (and so validate) every record before mutating anything to
        // keep the batch all-or-nothing.
        let mut encoded = Vec::with_capacity(records.len());
        for record in records {
            encoded.push(encode_location(
                self.column_srid,
                record.location.as_ref(),
            )?);
        }

        let mut inserted = Vec::with_capacity(records.len());
        for (record, location) in records.iter().zip(encoded) {
            let id = self.next_id;
            self.next_id += 1;
            self.rows.push(StoredRow {
                id,
                name: record.name.clone(),
                location,
            });
            inserted.push(Record {
                id: Some(id),
                name: record.name.clone(),
                location: record.location.clone(),
            });
        }
        Ok(inserted)
    }

    fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        self.rows.iter().map(Self::decode_row).collect()
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Record>, StoreError> {
        self.rows
            .iter()
            .filter(|row| row.name.as_deref() == Some(name))
            .min_by_key(|row| row.id)
            .map(Self::decode_row)
            .transpose()
    }

    fn update_location(&mut self, id: i64, location: Geometry) -> Result<(), StoreError> {
        let blob = encode_location(self.column_srid, Some(&location))?;
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound { id })?;
        row.location = blob;
        Ok(())
    }

    fn batch_update(&mut self, update: &BatchUpdate) -> Result<usize, StoreError> {
        if update.is_empty() {
            return Ok(0);
        }
        let blob = encode_location(self.column_srid, update.set_location.as_ref())?;

        let mut affected = 0;
        for row in self
            .rows
            .iter_mut()
            .filter(|row| update.predicate.matches(row.id))
        {
            if let Some(encoded) = &blob {
                row.location = Some(encoded.clone());
            }
            if let Some(suffix) = &update.append_name {
                let mut name = row.name.take().unwrap_or_default();
                name.push_str(suffix);
                row.name = Some(name);
            }
            affected += 1;
        }
        Ok(affected)
    }

    fn delete_where(&mut self, predicate: &RecordPredicate) -> Result<usize, StoreError> {
        let before = self.rows.len();
        self.rows.retain(|row| !predicate.matches(row.id));
        Ok(before - self.rows.len())
    }

    fn within_distance(
        &self,
        origin: Coord<f64>,
        meters: f64,
    ) -> Result<Vec<Record>, StoreError> {
        let mut matches = Vec::new();
        for row in &self.rows {
            let record = Self::decode_row(row)?;
            let Some(location) = &record.location else {
                continue;
            };
            if nearest_distance_m(origin, location) <= meters {
                matches.push(record);
            }
        }
        Ok(matches)
    }
}
