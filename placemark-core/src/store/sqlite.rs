//! SQLite-backed record store.
//!
//! Geometry blobs are stored in a `BLOB` column in the crate's extended-WKB
//! encoding. The proximity predicate is pushed into SQLite through a
//! registered scalar function whose distance math comes from the `geo`
//! crate; this module never computes distances itself.

use std::path::Path;

use geo::Coord;
use log::{debug, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::geometry::{Geometry, WGS84};
use crate::record::Record;
use crate::wkb;

use super::{BatchUpdate, RecordPredicate, RecordStore, StoreError, encode_location};

/// SQL name of the registered distance function.
const DISTANCE_FN: &str = "geo_distance_m";

/// Record store backed by a single SQLite connection.
///
/// The table enforces one SRID per geometry column, fixed at open time;
/// writes carrying any other SRID fail with [`StoreError::SridMismatch`]
/// before a row is touched. Multi-row writes run in one transaction, so a
/// mid-batch rejection rolls the whole batch back.
#[derive(Debug)]
pub struct SqliteRecordStore {
    connection: Connection,
    column_srid: i32,
}

impl SqliteRecordStore {
    /// Open (or create) a database at the given path with the WGS84 column
    /// SRID.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_srid(path, WGS84)
    }

    /// Open (or create) a database at the given path with an explicit
    /// column SRID.
    pub fn open_with_srid<P: AsRef<Path>>(path: P, column_srid: i32) -> Result<Self, StoreError> {
        let connection = Connection::open(path.as_ref()).map_err(classify)?;
        Self::from_connection(connection, column_srid)
    }

    /// Open a private in-memory database with the WGS84 column SRID.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(classify)?;
        Self::from_connection(connection, WGS84)
    }

    fn from_connection(connection: Connection, column_srid: i32) -> Result<Self, StoreError> {
        register_distance_function(&connection).map_err(classify)?;
        Ok(Self {
            connection,
            column_srid,
        })
    }

    /// SRID every stored geometry must carry.
    pub const fn column_srid(&self) -> i32 {
        self.column_srid
    }

    fn query_records(
        &self,
        sql: &str,
        parameters: Vec<Value>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut statement = self.connection.prepare(sql).map_err(classify)?;
        let rows = statement
            .query_map(params_from_iter(parameters), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                ))
            })
            .map_err(classify)?;

        let mut records = Vec::new();
        for row in rows {
            let (id, name, blob) = row.map_err(classify)?;
            let location = blob.as_deref().map(wkb::decode).transpose()?;
            records.push(Record {
                id: Some(id),
                name,
                location,
            });
        }
        Ok(records)
    }
}

impl RecordStore for SqliteRecordStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.connection
            .execute(
                "CREATE TABLE IF NOT EXISTS records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT,
                    location BLOB
                )",
                [],
            )
            .map_err(classify)?;
        info!("ensured records schema (column SRID {})", self.column_srid);
        Ok(())
    }

    fn insert_many(&mut self, records: &[Record]) -> Result<Vec<Record>, StoreError> {
        let column_srid = self.column_srid;
        let transaction = self.connection.transaction().map_err(classify)?;
        let mut inserted = Vec::with_capacity(records.len());
        {
            let mut statement = transaction
                .prepare("INSERT INTO records (name, location) VALUES (?1, ?2)")
                .map_err(classify)?;
            for record in records {
                let blob = encode_location(column_srid, record.location.as_ref())?;
                let id = statement
                    .insert(params![record.name, blob])
                    .map_err(classify)?;
                inserted.push(Record {
                    id: Some(id),
                    name: record.name.clone(),
                    location: record.location.clone(),
                });
            }
        }
        // Dropping the transaction without committing rolls back, so an
        // error on any row leaves the table untouched.
        transaction.commit().map_err(classify)?;
        debug!("inserted {} record(s)", inserted.len());
        Ok(inserted)
    }

    fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        self.query_records(
            "SELECT id, name, location FROM records ORDER BY id",
            Vec::new(),
        )
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Record>, StoreError> {
        let row = self
            .connection
            .query_row(
                "SELECT id, name, location FROM records WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<Vec<u8>>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(classify)?;

        let Some((id, found_name, blob)) = row else {
            return Ok(None);
        };
        let location = blob.as_deref().map(wkb::decode).transpose()?;
        Ok(Some(Record {
            id: Some(id),
            name: found_name,
            location,
        }))
    }

    fn update_location(&mut self, id: i64, location: Geometry) -> Result<(), StoreError> {
        let blob = encode_location(self.column_srid, Some(&location))?;
        let affected = self
            .connection
            .execute(
                "UPDATE records SET location = ?1 WHERE id = ?2",
                params![blob, id],
            )
            .map_err(classify)?;
        if affected == 0 {
            return Err(StoreError::NotFound { id });
        }
        debug!("updated location of record {id}");
        Ok(())
    }

    fn batch_update(&mut self, update: &BatchUpdate) -> Result<usize, StoreError> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut assignments = Vec::new();
        let mut parameters: Vec<Value> = Vec::new();
        if let Some(geometry) = &update.set_location {
            let blob = encode_location(self.column_srid, Some(geometry))?;
            assignments.push("location = ?");
            parameters.push(blob.map_or(Value::Null, Value::Blob));
        }
        if let Some(suffix) = &update.append_name {
            assignments.push("name = coalesce(name, '') || ?");
            parameters.push(Value::Text(suffix.clone()));
        }
        let (clause, threshold) = predicate_sql(update.predicate);
        parameters.push(Value::Integer(threshold));

        let sql = format!(
            "UPDATE records SET {} WHERE {clause}",
            assignments.join(", ")
        );
        let affected = self
            .connection
            .execute(&sql, params_from_iter(parameters))
            .map_err(classify)?;
        debug!("batch update affected {affected} row(s)");
        Ok(affected)
    }

    fn delete_where(&mut self, predicate: &RecordPredicate) -> Result<usize, StoreError> {
        let (clause, threshold) = predicate_sql(*predicate);
        let sql = format!("DELETE FROM records WHERE {clause}");
        let removed = self
            .connection
            .execute(&sql, params![threshold])
            .map_err(classify)?;
        debug!("delete removed {removed} row(s)");
        Ok(removed)
    }

    fn within_distance(
        &self,
        origin: Coord<f64>,
        meters: f64,
    ) -> Result<Vec<Record>, StoreError> {
        let sql = format!(
            "SELECT id, name, location FROM records
             WHERE location IS NOT NULL AND {DISTANCE_FN}(location, ?, ?) <= ?
             ORDER BY id"
        );
        self.query_records(
            &sql,
            vec![
                Value::Real(origin.x),
                Value::Real(origin.y),
                Value::Real(meters),
            ],
        )
    }
}

const fn predicate_sql(predicate: RecordPredicate) -> (&'static str, i64) {
    match predicate {
        RecordPredicate::IdAbove(threshold) => ("id > ?", threshold),
        RecordPredicate::IdAtMost(threshold) => ("id <= ?", threshold),
    }
}

/// Register the scalar distance function the proximity predicate relies on.
///
/// The function decodes the stored blob and returns the minimum Haversine
/// distance in metres between the origin and the geometry; the math is the
/// `geo` crate's, evaluated inside the store's own row scan.
fn register_distance_function(connection: &Connection) -> rusqlite::Result<()> {
    connection.create_scalar_function(
        DISTANCE_FN,
        3,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| {
            let blob = context.get::<Vec<u8>>(0)?;
            let lon = context.get::<f64>(1)?;
            let lat = context.get::<f64>(2)?;
            let geometry = wkb::decode(&blob)
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
            Ok(super::nearest_distance_m(Coord { x: lon, y: lat }, &geometry))
        },
    )
}

/// Map driver errors into the store taxonomy: constraint failures become
/// [`StoreError::Constraint`], connectivity failures become
/// [`StoreError::Unavailable`], and everything else is a generic database
/// failure.
fn classify(error: rusqlite::Error) -> StoreError {
    use rusqlite::ErrorCode;

    match error.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::Constraint {
            message: error.to_string(),
        },
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::NotADatabase,
        ) => StoreError::Unavailable {
            source: Box::new(error),
        },
        _ => StoreError::Database {
            source: Box::new(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn point(x: f64, y: f64) -> Geometry {
        Geometry::point(WGS84, Coord { x, y })
    }

    #[fixture]
    fn store() -> SqliteRecordStore {
        let mut created = SqliteRecordStore::open_in_memory().expect("open store");
        created.ensure_schema().expect("schema");
        created
    }

    #[rstest]
    fn ensure_schema_is_idempotent(mut store: SqliteRecordStore) {
        store.ensure_schema().expect("second ensure_schema");
        assert!(store.list_all().expect("list").is_empty());
    }

    #[rstest]
    fn inserted_records_round_trip(mut store: SqliteRecordStore) {
        let line =
            Geometry::line_string(WGS84, vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }])
                .expect("line string");
        store
            .insert_many(&[
                Record::new("point", Some(point(78.4867, 17.385))),
                Record::new("line", Some(line.clone())),
                Record::named("bare"),
            ])
            .expect("insert");

        let rows = store.list_all().expect("list");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].location, Some(point(78.4867, 17.385)));
        assert_eq!(rows[1].location, Some(line));
        assert_eq!(rows[2].location, None);
    }

    #[rstest]
    fn insert_rejection_commits_nothing(mut store: SqliteRecordStore) {
        let foreign = Geometry::point(3857, Coord { x: 0.0, y: 0.0 });
        let result = store.insert_many(&[
            Record::new("first", Some(point(0.0, 0.0))),
            Record::new("second", Some(point(1.0, 1.0))),
            Record::new("third", Some(foreign)),
        ]);
        assert!(matches!(result, Err(StoreError::SridMismatch { .. })));
        assert!(store.list_all().expect("list").is_empty());
    }

    #[rstest]
    fn find_by_name_prefers_lowest_id(mut store: SqliteRecordStore) {
        store
            .insert_many(&[Record::named("twin"), Record::named("twin")])
            .expect("insert");
        let found = store.find_by_name("twin").expect("query");
        assert_eq!(found.and_then(|record| record.id), Some(1));
        assert!(store.find_by_name("absent").expect("query").is_none());
    }

    #[rstest]
    fn update_location_rewrites_one_row(mut store: SqliteRecordStore) {
        store
            .insert_many(&[
                Record::new("move me", Some(point(0.0, 0.0))),
                Record::new("leave me", Some(point(5.0, 5.0))),
            ])
            .expect("insert");
        store
            .update_location(1, point(2.0, 2.0))
            .expect("update row 1");

        let rows = store.list_all().expect("list");
        assert_eq!(rows[0].location, Some(point(2.0, 2.0)));
        assert_eq!(rows[1].location, Some(point(5.0, 5.0)));
    }

    #[rstest]
    fn update_location_reports_missing_row(mut store: SqliteRecordStore) {
        let result = store.update_location(42, point(0.0, 0.0));
        assert!(matches!(result, Err(StoreError::NotFound { id: 42 })));
    }

    #[rstest]
    fn batch_update_is_scoped_to_predicate(mut store: SqliteRecordStore) {
        let records: Vec<Record> = (0..6)
            .map(|index| Record::new(format!("r{index}"), Some(point(f64::from(index), 0.0))))
            .collect();
        store.insert_many(&records).expect("insert");
        let before = store.list_all().expect("list");

        let update = BatchUpdate::new(RecordPredicate::IdAbove(4))
            .set_location(point(70.0, 15.0))
            .append_name(" (updated)");
        let affected = store.batch_update(&update).expect("batch update");
        assert_eq!(affected, 2);

        let after = store.list_all().expect("list");
        for (previous, current) in before.iter().zip(&after).take(4) {
            assert_eq!(previous, current);
        }
        for current in after.iter().skip(4) {
            assert_eq!(current.location, Some(point(70.0, 15.0)));
            assert!(current.name.as_deref().unwrap().ends_with(" (updated)"));
        }
    }

    #[rstest]
    fn batch_update_with_zero_matches_returns_zero(mut store: SqliteRecordStore) {
        let update = BatchUpdate::new(RecordPredicate::IdAbove(10)).append_name("!");
        assert_eq!(store.batch_update(&update).expect("update"), 0);
    }

    #[rstest]
    fn delete_where_matching_nothing_is_ok(mut store: SqliteRecordStore) {
        assert_eq!(
            store
                .delete_where(&RecordPredicate::IdAtMost(4))
                .expect("delete"),
            0
        );
    }

    #[rstest]
    fn delete_where_removes_matching_rows(mut store: SqliteRecordStore) {
        store
            .insert_many(&[
                Record::named("a"),
                Record::named("b"),
                Record::named("c"),
            ])
            .expect("insert");
        let removed = store
            .delete_where(&RecordPredicate::IdAtMost(2))
            .expect("delete");
        assert_eq!(removed, 2);
        let remaining = store.list_all().expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, Some(3));
    }

    #[rstest]
    fn within_distance_uses_geodesic_metres(mut store: SqliteRecordStore) {
        let origin = Coord {
            x: 78.4867,
            y: 17.385,
        };
        store
            .insert_many(&[
                Record::new("here", Some(point(origin.x, origin.y))),
                // Roughly 53 km east at this latitude.
                Record::new("far", Some(point(78.9867, 17.385))),
                Record::named("nowhere"),
            ])
            .expect("insert");

        let nearby = store.within_distance(origin, 2_000.0).expect("query");
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].name.as_deref(), Some("here"));

        let wide = store.within_distance(origin, 100_000.0).expect("query");
        assert_eq!(wide.len(), 2);
    }

    #[rstest]
    fn update_rejects_foreign_srid(mut store: SqliteRecordStore) {
        store
            .insert_many(&[Record::named("row")])
            .expect("insert");
        let result = store.update_location(1, Geometry::point(27700, Coord { x: 0.0, y: 0.0 }));
        assert!(matches!(
            result,
            Err(StoreError::SridMismatch {
                expected: WGS84,
                found: 27700,
            })
        ));
    }

    #[rstest]
    fn reopens_persisted_database() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("records.db");
        {
            let mut store = SqliteRecordStore::open(&path).expect("open");
            store.ensure_schema().expect("schema");
            store
                .insert_many(&[Record::new("persisted", Some(point(1.0, 2.0)))])
                .expect("insert");
        }

        let store = SqliteRecordStore::open(&path).expect("reopen");
        let rows = store.list_all().expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("persisted"));
    }
}
