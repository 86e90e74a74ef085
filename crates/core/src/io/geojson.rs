//! GeoJSON FeatureCollection reading/writing
//!
//! Geometry is mapped onto `geo-types`; properties become an
//! [`AttributeTable`] whose column order is the order in which keys are
//! first seen across features. Features lacking a key get `Null`.
//! Non-finite floats are written as `null`, since JSON has no NaN.

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::vector::{AttributeTable, AttributeValue, Dataset};

/// Read a GeoJSON FeatureCollection file into a [`Dataset`]
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let file = File::open(path.as_ref())?;
    let value: Value = serde_json::from_reader(BufReader::new(file))?;
    dataset_from_value(&value)
}

/// Parse a GeoJSON FeatureCollection held in memory
pub fn read_geojson_from_str(text: &str) -> Result<Dataset> {
    let value: Value = serde_json::from_str(text)?;
    dataset_from_value(&value)
}

/// Write a [`Dataset`] as a GeoJSON FeatureCollection file
pub fn write_geojson<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &dataset_to_value(dataset))?;
    writer.flush()?;
    Ok(())
}

/// Serialize a [`Dataset`] to a GeoJSON string
pub fn write_geojson_to_string(dataset: &Dataset) -> Result<String> {
    Ok(serde_json::to_string(&dataset_to_value(dataset))?)
}

fn dataset_from_value(value: &Value) -> Result<Dataset> {
    let kind = value.get("type").and_then(Value::as_str);
    if kind != Some("FeatureCollection") {
        return Err(Error::Format(format!(
            "expected a FeatureCollection, found {}",
            kind.unwrap_or("no type")
        )));
    }
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Format("FeatureCollection has no 'features' array".into()))?;

    let n = features.len();
    let mut geometries = Vec::with_capacity(n);
    let mut names: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<AttributeValue>> = Vec::new();

    for (row, feature) in features.iter().enumerate() {
        let geometry = feature
            .get("geometry")
            .filter(|g| !g.is_null())
            .ok_or_else(|| Error::Format(format!("feature {} has no geometry", row)))?;
        geometries.push(
            parse_geometry(geometry)
                .map_err(|e| Error::Format(format!("feature {}: {}", row, e)))?,
        );

        let properties = match feature.get("properties") {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Null) | None => None,
            Some(_) => {
                return Err(Error::Format(format!(
                    "feature {}: properties must be an object",
                    row
                )))
            }
        };

        if let Some(props) = properties {
            for (key, v) in props {
                let col = match names.iter().position(|n| n == key) {
                    Some(c) => c,
                    None => {
                        names.push(key.clone());
                        columns.push(vec![AttributeValue::Null; n]);
                        names.len() - 1
                    }
                };
                columns[col][row] = attribute_from_json(v);
            }
        }
    }

    let mut table = AttributeTable::with_rows(n);
    for (name, values) in names.into_iter().zip(columns) {
        table.push_column(name, values)?;
    }
    Dataset::new(geometries, table)
}

fn dataset_to_value(dataset: &Dataset) -> Value {
    let table = dataset.table();
    let features: Vec<Value> = dataset
        .geometries()
        .iter()
        .enumerate()
        .map(|(row, geom)| {
            let mut props = Map::new();
            for column in table.columns() {
                props.insert(column.name.clone(), attribute_to_json(&column.values[row]));
            }
            json!({
                "type": "Feature",
                "geometry": geometry_to_json(geom),
                "properties": Value::Object(props),
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn attribute_from_json(v: &Value) -> AttributeValue {
    match v {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(num) => match num.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => num
                .as_f64()
                .map(AttributeValue::Float)
                .unwrap_or(AttributeValue::Null),
        },
        Value::String(s) => AttributeValue::String(s.clone()),
        // Nested values are kept verbatim as text
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(v: &AttributeValue) -> Value {
    match v {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => json!(i),
        AttributeValue::Float(f) if f.is_finite() => json!(f),
        AttributeValue::Float(_) => Value::Null,
        AttributeValue::String(s) => Value::String(s.clone()),
    }
}

// ─── Geometry ───────────────────────────────────────────────────────────

fn parse_geometry(value: &Value) -> std::result::Result<Geometry<f64>, String> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry has no type")?;

    if kind == "GeometryCollection" {
        let parts = value
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or("GeometryCollection has no 'geometries'")?;
        let geoms = parts
            .iter()
            .map(parse_geometry)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection(geoms)));
    }

    let coords = value
        .get("coordinates")
        .ok_or_else(|| format!("{} has no coordinates", kind))?;

    let geom = match kind {
        "Point" => Geometry::Point(Point::from(parse_position(coords)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint::new(
            parse_positions(coords)?.into_iter().map(Point::from).collect(),
        )),
        "LineString" => Geometry::LineString(LineString::new(parse_positions(coords)?)),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString::new(
            as_array(coords)?
                .iter()
                .map(|l| parse_positions(l).map(LineString::new))
                .collect::<std::result::Result<Vec<_>, _>>()?,
        )),
        "Polygon" => Geometry::Polygon(parse_polygon(coords)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon::new(
            as_array(coords)?
                .iter()
                .map(parse_polygon)
                .collect::<std::result::Result<Vec<_>, _>>()?,
        )),
        other => return Err(format!("unsupported geometry type '{}'", other)),
    };
    Ok(geom)
}

fn as_array(value: &Value) -> std::result::Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("expected an array, found {}", value))
}

fn parse_position(value: &Value) -> std::result::Result<Coord<f64>, String> {
    let arr = as_array(value)?;
    if arr.len() < 2 {
        return Err("position needs at least two numbers".into());
    }
    let x = arr[0].as_f64().ok_or("non-numeric x coordinate")?;
    let y = arr[1].as_f64().ok_or("non-numeric y coordinate")?;
    Ok(Coord { x, y })
}

fn parse_positions(value: &Value) -> std::result::Result<Vec<Coord<f64>>, String> {
    as_array(value)?.iter().map(parse_position).collect()
}

fn parse_polygon(value: &Value) -> std::result::Result<Polygon<f64>, String> {
    let rings = as_array(value)?;
    let mut rings = rings.iter().map(|r| parse_positions(r).map(LineString::new));
    let exterior = rings.next().ok_or("polygon has no rings")??;
    let interiors = rings.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn line_positions(ls: &LineString<f64>) -> Value {
    Value::Array(ls.0.iter().map(position).collect())
}

fn polygon_rings(p: &Polygon<f64>) -> Value {
    let mut rings = vec![line_positions(p.exterior())];
    rings.extend(p.interiors().iter().map(line_positions));
    Value::Array(rings)
}

fn geometry_to_json(geom: &Geometry<f64>) -> Value {
    match geom {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": position(&p.0)}),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::Line(l) => json!({
            "type": "LineString",
            "coordinates": [position(&l.start), position(&l.end)],
        }),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": line_positions(ls)}),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line_positions).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon_rings(p)}),
        Geometry::Rect(r) => json!({"type": "Polygon", "coordinates": polygon_rings(&r.to_polygon())}),
        Geometry::Triangle(t) => {
            json!({"type": "Polygon", "coordinates": polygon_rings(&t.to_polygon())})
        }
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_rings).collect::<Vec<_>>(),
        }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_to_json).collect::<Vec<_>>(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]},
             "properties": {"name": "a", "pop": 12.5, "code": 7}},
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [3.0, 4.0]},
             "properties": {"pop": null, "extra": true}}
        ]
    }"#;

    #[test]
    fn test_read_fixture() {
        let ds = read_geojson_from_str(FIXTURE).unwrap();
        assert_eq!(ds.len(), 2);
        let names: Vec<&str> = ds.table().names().collect();
        assert_eq!(names, vec!["name", "pop", "code", "extra"]);
        assert_eq!(ds.table().value("code", 0), Some(&AttributeValue::Int(7)));
        assert_eq!(ds.table().value("name", 1), Some(&AttributeValue::Null));
        assert_eq!(ds.table().value("extra", 1), Some(&AttributeValue::Bool(true)));
        assert!(matches!(ds.geometries()[0], Geometry::Polygon(_)));
        assert!(matches!(ds.geometries()[1], Geometry::Point(_)));
    }

    #[test]
    fn test_string_roundtrip() {
        let ds = read_geojson_from_str(FIXTURE).unwrap();
        let text = write_geojson_to_string(&ds).unwrap();
        let back = read_geojson_from_str(&text).unwrap();
        assert_eq!(back.table(), ds.table());
        assert_eq!(back.geometries(), ds.geometries());
    }

    #[test]
    fn test_nan_written_as_null() {
        let mut table = AttributeTable::with_rows(1);
        table.push_f64_column("v", &[f64::NAN]).unwrap();
        let ds = Dataset::new(vec![Geometry::Point(Point::new(0.0, 0.0))], table).unwrap();
        let text = write_geojson_to_string(&ds).unwrap();
        assert!(text.contains("\"v\":null"));
    }

    #[test]
    fn test_reject_non_collection() {
        let err = read_geojson_from_str(r#"{"type": "Feature"}"#).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_reject_missing_geometry() {
        let text = r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":null,"properties":{}}]}"#;
        assert!(matches!(read_geojson_from_str(text), Err(Error::Format(_))));
    }

    #[test]
    fn test_multipolygon_with_hole() {
        let text = r#"{"type":"FeatureCollection","features":[{"type":"Feature",
            "geometry":{"type":"MultiPolygon","coordinates":[[[[0,0],[4,0],[4,4],[0,4],[0,0]],[[1,1],[2,1],[2,2],[1,1]]]]},
            "properties":{}}]}"#;
        let ds = read_geojson_from_str(text).unwrap();
        match &ds.geometries()[0] {
            Geometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 1);
                assert_eq!(mp.0[0].interiors().len(), 1);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }
}
