//! I/O operations for reading and writing vector datasets
//!
//! Datasets are exchanged as GeoJSON FeatureCollections. Legacy consumers
//! with short field-name limits are served by [`legacy_field_mapping`].

mod field_names;
mod geojson;

pub use field_names::{legacy_field_mapping, LEGACY_FIELD_LEN};
pub use geojson::{read_geojson, read_geojson_from_str, write_geojson, write_geojson_to_string};
