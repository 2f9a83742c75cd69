use geo::{ChamberlainDuquetteArea, Coord, LineString, Polygon};
use serde::Serialize;
use tracing::debug;

use crate::error::{FeatureError, SkippedFeature};
use crate::types::{DrawnFeature, FeatureId, FeatureMap};

const SQUARE_METERS_PER_SQUARE_KILOMETER: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureArea {
    pub id: FeatureId,
    /// The feature's `name` property, when it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub square_meters: f64,
}

/// Summed area of every measurable feature in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaReport {
    pub total_square_meters: f64,
    pub total_square_kilometers: f64,
    pub features: Vec<FeatureArea>,
    pub skipped: Vec<SkippedFeature>,
}

impl AreaReport {
    pub fn measured_count(&self) -> usize {
        self.features.len()
    }
}

/// Total area in square meters. Features that are not polygons are skipped.
pub fn total_area(features: &FeatureMap) -> f64 {
    aggregate(features).total_square_meters
}

pub fn aggregate(features: &FeatureMap) -> AreaReport {
    let mut total = 0.0;
    let mut measured = Vec::with_capacity(features.len());
    let mut skipped = Vec::new();

    for (id, feature) in features {
        match polygon_area(feature) {
            Ok(square_meters) => {
                total += square_meters;
                let name = match feature.property_str("name") {
                    Ok(name) => Some(name.to_string()),
                    Err(e) => {
                        debug!("Feature {} is unnamed: {}", id, e);
                        None
                    }
                };
                measured.push(FeatureArea {
                    id: id.clone(),
                    name,
                    square_meters,
                });
            }
            Err(e) => {
                debug!("Skipping feature {}: {}", id, e);
                skipped.push(SkippedFeature::new(id.clone(), &e));
            }
        }
    }

    AreaReport {
        total_square_meters: total,
        total_square_kilometers: total / SQUARE_METERS_PER_SQUARE_KILOMETER,
        features: measured,
        skipped,
    }
}

/// Spherical area of the feature's polygon in square meters, holes subtracted.
///
/// Each ring is measured unsigned, so winding order does not matter.
pub fn polygon_area(feature: &DrawnFeature) -> Result<f64, FeatureError> {
    let polygon = to_polygon(feature)?;
    let holes: f64 = polygon.interiors().iter().map(ring_area).sum();
    Ok(ring_area(polygon.exterior()) - holes)
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).chamberlain_duquette_unsigned_area()
}

/// Reads the feature geometry as a polygon. Every ring must be closed and
/// hold at least four positions.
pub fn to_polygon(feature: &DrawnFeature) -> Result<Polygon<f64>, FeatureError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| FeatureError::invalid_geometry("feature has no geometry"))?;

    let rings = match &geometry.value {
        geojson::Value::Polygon(rings) => rings,
        other => {
            return Err(FeatureError::invalid_geometry(format!(
                "expected Polygon, found {}",
                value_type(other)
            )))
        }
    };

    let mut rings = rings.iter().enumerate().map(|(i, ring)| to_ring(i, ring));
    let exterior = rings
        .next()
        .ok_or_else(|| FeatureError::invalid_geometry("polygon has no rings"))??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn to_ring(index: usize, positions: &[geojson::Position]) -> Result<LineString<f64>, FeatureError> {
    if positions.len() < 4 {
        return Err(FeatureError::invalid_geometry(format!(
            "ring {} has {} positions, at least 4 are required",
            index,
            positions.len()
        )));
    }

    let coords = positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(FeatureError::invalid_geometry(format!(
                "ring {} has a position with fewer than 2 values",
                index
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if coords.first() != coords.last() {
        return Err(FeatureError::invalid_geometry(format!(
            "ring {} is not closed",
            index
        )));
    }

    Ok(LineString::new(coords))
}

fn value_type(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
