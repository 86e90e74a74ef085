//! File-level GeoJSON reading and writing

use geo_types::{polygon, Geometry, Point};
use geolocus_core::io::{read_geojson, write_geojson};
use geolocus_core::{AttributeTable, AttributeValue, Dataset, Error};

fn sample() -> Dataset {
    let geoms = vec![
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]),
        Geometry::Point(Point::new(2.5, -1.25)),
    ];
    let mut table = AttributeTable::with_rows(2);
    table.push_f64_column("income", &[31.5, 28.0]).unwrap();
    table
        .push_column("district", vec![AttributeValue::from("north"), AttributeValue::from("south")])
        .unwrap();
    table
        .push_column("households", vec![AttributeValue::Int(120), AttributeValue::Null])
        .unwrap();
    Dataset::new(geoms, table).unwrap()
}

#[test]
fn file_roundtrip_preserves_table_and_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("districts.geojson");
    let ds = sample();

    write_geojson(&ds, &path).unwrap();
    let back = read_geojson(&path).unwrap();

    assert_eq!(back.len(), 2);
    assert_eq!(back.geometries(), ds.geometries());
    assert_eq!(back.table(), ds.table());
    let names: Vec<&str> = back.table().names().collect();
    assert_eq!(names, vec!["income", "district", "households"]);
}

#[test]
fn non_finite_values_come_back_as_null() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nan.geojson");
    let mut table = AttributeTable::with_rows(1);
    table.push_f64_column("LISA_I", &[f64::NAN]).unwrap();
    let ds = Dataset::new(vec![Geometry::Point(Point::new(0.0, 0.0))], table).unwrap();

    write_geojson(&ds, &path).unwrap();
    let back = read_geojson(&path).unwrap();
    assert_eq!(back.table().value("LISA_I", 0), Some(&AttributeValue::Null));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_geojson(dir.path().join("absent.geojson")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn malformed_json_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.geojson");
    std::fs::write(&path, "{\"type\": \"FeatureCollection\", \"features\": [").unwrap();
    assert!(read_geojson(&path).is_err());
}
