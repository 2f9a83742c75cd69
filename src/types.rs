use geojson::feature::Id;
use geojson::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::FeatureError;

/// Identifier of a drawn feature. `1` and `"1"` are different features.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Number(serde_json::Number),
    Text(String),
}

impl FeatureId {
    fn rank(&self) -> u8 {
        match self {
            FeatureId::Number(_) => 0,
            FeatureId::Text(_) => 1,
        }
    }
}

impl Ord for FeatureId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Equal numbers (including -0.0 and 0.0) must compare Equal.
            (FeatureId::Number(a), FeatureId::Number(b)) if a == b => Ordering::Equal,
            (FeatureId::Number(a), FeatureId::Number(b)) => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.to_string().cmp(&b.to_string()))
            }
            (FeatureId::Text(a), FeatureId::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for FeatureId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Number(n) => write!(f, "{n}"),
            FeatureId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        FeatureId::Text(value.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        FeatureId::Text(value)
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        FeatureId::Number(value.into())
    }
}

impl From<Id> for FeatureId {
    fn from(value: Id) -> Self {
        match value {
            Id::String(s) => FeatureId::Text(s),
            Id::Number(n) => FeatureId::Number(n),
        }
    }
}

impl From<FeatureId> for Id {
    fn from(value: FeatureId) -> Self {
        match value {
            FeatureId::Text(s) => Id::String(s),
            FeatureId::Number(n) => Id::Number(n),
        }
    }
}

/// A polygon drawn on the map, as emitted by the drawing control.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnFeature {
    pub id: FeatureId,
    pub geometry: Option<geojson::Geometry>,
    pub properties: JsonObject,
}

pub type FeatureMap = BTreeMap<FeatureId, DrawnFeature>;

impl DrawnFeature {
    pub fn new(id: impl Into<FeatureId>, geometry: geojson::Value) -> Self {
        Self {
            id: id.into(),
            geometry: Some(geojson::Geometry::new(geometry)),
            properties: JsonObject::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Result<&Value, FeatureError> {
        self.properties
            .get(key)
            .ok_or_else(|| FeatureError::MissingProperty {
                key: key.to_string(),
            })
    }

    /// Like [`Self::property`], but a non-string value counts as missing.
    pub fn property_str(&self, key: &str) -> Result<&str, FeatureError> {
        self.property(key)?
            .as_str()
            .ok_or_else(|| FeatureError::MissingProperty {
                key: key.to_string(),
            })
    }
}

impl TryFrom<geojson::Feature> for DrawnFeature {
    type Error = FeatureError;

    fn try_from(feature: geojson::Feature) -> Result<Self, Self::Error> {
        let id = feature.id.ok_or(FeatureError::MissingId)?;
        Ok(Self {
            id: id.into(),
            geometry: feature.geometry,
            properties: feature.properties.unwrap_or_default(),
        })
    }
}

impl From<DrawnFeature> for geojson::Feature {
    fn from(feature: DrawnFeature) -> Self {
        geojson::Feature {
            bbox: None,
            geometry: feature.geometry,
            id: Some(feature.id.into()),
            properties: Some(feature.properties),
            foreign_members: None,
        }
    }
}

/// Camera parameters of the map view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            latitude: 37.7751,
            longitude: -122.4193,
            zoom: 11.0,
            bearing: 0.0,
            pitch: 0.0,
        }
    }
}

/// A camera transition issued to the map view. `sequence` increases with
/// every issued flight so a polling page can tell new flights from old ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlyTo {
    /// `[longitude, latitude]`
    pub center: [f64; 2],
    pub duration_ms: u64,
    pub sequence: u64,
}
