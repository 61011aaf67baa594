//! The demonstration scenario: one pass over every store operation.

use geo::Coord;
use log::info;
use placemark_core::{
    BatchUpdate, Geometry, GeometryError, Polygon, Record, RecordPredicate, RecordStore, Shape,
    SqliteRecordStore,
};

use crate::error::CliError;
use crate::{DemoArgs, ListArgs};

/// Origin of the proximity query (Hussain Sagar, Hyderabad).
const ORIGIN: Coord<f64> = Coord {
    x: 78.4867,
    y: 17.385,
};

/// Radius of the proximity query in metres.
const NEARBY_METERS: f64 = 2_000.0;

/// Ids at or below this threshold are bulk-deleted; ids above it are
/// batch-updated.
const ID_THRESHOLD: i64 = 4;

pub(crate) fn run_demo(args: &DemoArgs) -> Result<(), CliError> {
    let mut store = SqliteRecordStore::open_with_srid(&args.database, args.srid)?;
    store.ensure_schema()?;
    println!("schema ready in {}", args.database.display());

    let inserted = store.insert_many(&seed_records(args.srid)?)?;
    println!("inserted {} records", inserted.len());

    let nearby = store.within_distance(ORIGIN, NEARBY_METERS)?;
    println!(
        "within {NEARBY_METERS} m of ({}, {}):",
        ORIGIN.x, ORIGIN.y
    );
    for record in &nearby {
        println!("  {}", serde_json::to_string(record)?);
    }

    if let Some(id) = store
        .find_by_name("Sample Point")?
        .and_then(|record| record.id)
    {
        store.update_location(
            id,
            Geometry::point(args.srid, Coord { x: 78.5, y: 17.4 }),
        )?;
        println!("moved record {id}");
    }

    let update = BatchUpdate::new(RecordPredicate::IdAbove(ID_THRESHOLD))
        .set_location(Geometry::point(args.srid, Coord { x: 80.0, y: 18.0 }))
        .append_name(" (updated)");
    let affected = store.batch_update(&update)?;
    println!("batch update touched {affected} records");

    let removed = store.delete_where(&RecordPredicate::IdAtMost(ID_THRESHOLD))?;
    println!("deleted {removed} records");

    print_records(&store)?;
    info!("demonstration complete");
    Ok(())
}

pub(crate) fn run_list(args: &ListArgs) -> Result<(), CliError> {
    let mut store = SqliteRecordStore::open(&args.database)?;
    store.ensure_schema()?;
    print_records(&store)
}

fn print_records(store: &SqliteRecordStore) -> Result<(), CliError> {
    for record in store.list_all()? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

/// One record per geometry kind, all tagged with the given SRID.
fn seed_records(srid: i32) -> Result<Vec<Record>, GeometryError> {
    let coord = |x: f64, y: f64| Coord { x, y };
    let ring = vec![
        coord(78.47, 17.37),
        coord(78.48, 17.37),
        coord(78.48, 17.38),
        coord(78.47, 17.37),
    ];
    let polygon = Polygon::new(ring.clone(), Vec::new())?;

    Ok(vec![
        Record::new("Sample Point", Some(Geometry::point(srid, ORIGIN))),
        Record::new(
            "Sample LineString",
            Some(Geometry::line_string(
                srid,
                vec![coord(78.48, 17.38), coord(78.49, 17.39)],
            )?),
        ),
        Record::new(
            "Sample Polygon",
            Some(Geometry::polygon(srid, ring, Vec::new())?),
        ),
        Record::new(
            "Sample MultiPoint",
            Some(Geometry::multi_point(
                srid,
                vec![coord(78.40, 17.40), coord(78.41, 17.41)],
            )),
        ),
        Record::new(
            "Sample MultiLineString",
            Some(Geometry::multi_line_string(
                srid,
                vec![
                    vec![coord(78.40, 17.40), coord(78.41, 17.40)],
                    vec![coord(78.40, 17.41), coord(78.41, 17.41)],
                ],
            )?),
        ),
        Record::new(
            "Sample MultiPolygon",
            Some(Geometry::multi_polygon(srid, vec![polygon.clone()])),
        ),
        Record::new(
            "Sample Collection",
            Some(Geometry::collection(
                srid,
                vec![Shape::Point(coord(78.45, 17.35)), Shape::Polygon(polygon)],
            )),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use placemark_core::WGS84;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    fn seed_covers_all_seven_kinds() {
        let records = seed_records(WGS84).expect("seed");
        assert_eq!(records.len(), 7);
        let shapes: Vec<_> = records
            .iter()
            .filter_map(|record| record.location.as_ref())
            .map(|geometry| std::mem::discriminant(&geometry.shape))
            .collect();
        let mut unique = shapes.clone();
        unique.dedup();
        assert_eq!(unique.len(), 7, "each record carries a distinct kind");
    }

    #[rstest]
    fn demo_leaves_only_batch_updated_rows() {
        let dir = TempDir::new().expect("temp dir");
        let args = DemoArgs {
            database: dir.path().join("demo.db"),
            srid: WGS84,
        };
        run_demo(&args).expect("demo run");

        let store = SqliteRecordStore::open(&args.database).expect("reopen");
        let rows = store.list_all().expect("list");
        assert_eq!(rows.len(), 3);
        for record in &rows {
            assert!(record.id.expect("id") > ID_THRESHOLD);
            assert!(
                record
                    .name
                    .as_deref()
                    .expect("name")
                    .ends_with(" (updated)")
            );
        }
    }

    #[rstest]
    fn list_on_fresh_database_prints_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let args = ListArgs {
            database: dir.path().join("empty.db"),
        };
        run_list(&args).expect("list run");
    }
}
