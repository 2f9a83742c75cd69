use anyhow::{anyhow, Context, Result};
use geojson::GeoJson;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

use crate::types::{DrawnFeature, FeatureId};

/// Loads the features of a GeoJSON file. A feature without an `id` is keyed
/// `#<position>` in the file.
pub fn load_features(path: &Path) -> Result<Vec<DrawnFeature>> {
    info!("Loading GeoJSON from {:?}...", path);
    let file = File::open(path).with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let features = read_features(BufReader::new(file))
        .with_context(|| format!("Failed to load features from {:?}", path))?;
    info!("Loaded {} features", features.len());
    Ok(features)
}

pub fn read_features(reader: impl Read) -> Result<Vec<DrawnFeature>> {
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => return Err(anyhow!("GeoJSON must be a Feature or FeatureCollection")),
    };

    let mut seen = HashSet::new();
    let mut drawn = Vec::with_capacity(features.len());
    for (index, feature) in features.into_iter().enumerate() {
        let id = feature
            .id
            .map(FeatureId::from)
            .unwrap_or_else(|| FeatureId::Text(format!("#{index}")));
        if !seen.insert(id.clone()) {
            warn!("Feature {} appears more than once, keeping the last one", id);
        }
        drawn.push(DrawnFeature {
            id,
            geometry: feature.geometry,
            properties: feature.properties.unwrap_or_default(),
        });
    }
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area;
    use crate::store::FeatureStore;
    use std::io::Write;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "mission",
                "properties": { "name": "Mission" },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]] }
            },
            {
                "type": "Feature",
                "properties": null,
                "geometry": { "type": "Point", "coordinates": [0, 0] }
            }
        ]
    }"#;

    #[test]
    fn reads_collection_and_keys_anonymous_features_by_index() {
        let features = read_features(COLLECTION.as_bytes()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, FeatureId::from("mission"));
        assert_eq!(features[0].property_str("name"), Ok("Mission"));
        assert_eq!(features[1].id, FeatureId::from("#1"));
        assert!(features[1].properties.is_empty());
    }

    #[test]
    fn anonymous_feature_does_not_replace_numeric_id() {
        let features = read_features(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "id": 1,
                        "properties": {},
                        "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]] }
                    },
                    {
                        "type": "Feature",
                        "properties": {},
                        "geometry": { "type": "Polygon", "coordinates": [[[5,0],[6,0],[6,1],[5,1],[5,0]]] }
                    }
                ]
            }"#
            .as_bytes(),
        )
        .unwrap();

        let mut store = FeatureStore::new();
        store.apply_upserts(features);
        assert_eq!(store.len(), 2);
        assert_eq!(area::aggregate(&store.snapshot()).measured_count(), 2);
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let result = read_features(r#"{ "type": "Point", "coordinates": [0, 0] }"#.as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn load_features_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(COLLECTION.as_bytes()).unwrap();
        assert_eq!(load_features(file.path()).unwrap().len(), 2);
    }
}
