//! Session state for one page: the drawn features, the camera and the
//! background color. All changes go through [`Session::reduce`].

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::types::{DrawnFeature, FeatureId, FeatureMap, FlyTo, ViewState};

/// Camera transitions always take this long.
pub const FLY_TO_DURATION: Duration = Duration::from_millis(2000);

/// Drawn features keyed by identifier.
///
/// Updates build the next map and swap it in whole, so a [`snapshot`] taken
/// before an update never observes part of it.
///
/// [`snapshot`]: FeatureStore::snapshot
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    features: Arc<FeatureMap>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces each feature at its identifier. Later entries win.
    pub fn apply_upserts(&mut self, features: impl IntoIterator<Item = DrawnFeature>) {
        let mut next = (*self.features).clone();
        for feature in features {
            next.insert(feature.id.clone(), feature);
        }
        self.features = Arc::new(next);
    }

    /// Removes each identifier that is present.
    pub fn apply_deletes<'a>(&mut self, ids: impl IntoIterator<Item = &'a FeatureId>) {
        let mut next = (*self.features).clone();
        for id in ids {
            if next.remove(id).is_none() {
                debug!("Delete of unknown feature {}", id);
            }
        }
        self.features = Arc::new(next);
    }

    pub fn snapshot(&self) -> Arc<FeatureMap> {
        Arc::clone(&self.features)
    }

    pub fn get(&self, id: &FeatureId) -> Option<&DrawnFeature> {
        self.features.get(id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_feature_collection(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.values().cloned().map(Into::into).collect(),
            foreign_members: None,
        }
    }
}

/// The map's camera. Fly-to commands are ignored until the page reports the
/// map as loaded.
#[derive(Debug, Clone)]
pub struct MapView {
    view: ViewState,
    ready: bool,
    last_flight: Option<FlyTo>,
}

impl MapView {
    pub fn new(initial: ViewState) -> Self {
        Self {
            view: initial,
            ready: false,
            last_flight: None,
        }
    }

    pub fn view_state(&self) -> ViewState {
        self.view
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn last_flight(&self) -> Option<FlyTo> {
        self.last_flight
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Returns the issued flight, or `None` when the map is not ready yet.
    pub fn fly_to(&mut self, longitude: f64, latitude: f64, duration: Duration) -> Option<FlyTo> {
        if !self.ready {
            debug!("Map view not ready, ignoring fly-to");
            return None;
        }

        let sequence = self.last_flight.map_or(1, |f| f.sequence + 1);
        let flight = FlyTo {
            center: [longitude, latitude],
            duration_ms: duration.as_millis() as u64,
            sequence,
        };
        self.view.longitude = longitude;
        self.view.latitude = latitude;
        self.last_flight = Some(flight);
        Some(flight)
    }
}

/// Payload of a drawing-control event: the features it touched.
#[derive(Debug, Clone, Deserialize)]
pub struct DrawEvent {
    pub features: Vec<geojson::Feature>,
}

impl DrawEvent {
    /// Features that carry an identifier. Anonymous ones cannot be keyed and
    /// are dropped.
    pub fn into_features(self) -> Vec<DrawnFeature> {
        self.features
            .into_iter()
            .filter_map(|f| match DrawnFeature::try_from(f) {
                Ok(feature) => Some(feature),
                Err(e) => {
                    warn!("Dropping drawn feature: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn into_ids(self) -> Vec<FeatureId> {
        self.into_features().into_iter().map(|f| f.id).collect()
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    DrawCreate(Vec<DrawnFeature>),
    DrawUpdate(Vec<DrawnFeature>),
    DrawDelete(Vec<FeatureId>),
    SetBackgroundColor(String),
    MapReady,
    FlyTo { longitude: f64, latitude: f64 },
}

#[derive(Debug, Clone)]
pub struct Session {
    pub background_color: String,
    pub features: FeatureStore,
    pub map: MapView,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            background_color: config.session.background_color.clone(),
            features: FeatureStore::new(),
            map: MapView::new(config.map.initial_view),
        }
    }

    pub fn reduce(mut self, event: SessionEvent) -> Self {
        self.apply(event);
        self
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::DrawCreate(features) | SessionEvent::DrawUpdate(features) => {
                debug!("Upserting {} features", features.len());
                self.features.apply_upserts(features);
            }
            SessionEvent::DrawDelete(ids) => {
                debug!("Deleting {} features", ids.len());
                self.features.apply_deletes(&ids);
            }
            SessionEvent::SetBackgroundColor(color) => {
                info!("Background color set to {}", color);
                self.background_color = color;
            }
            SessionEvent::MapReady => {
                info!("Map view ready");
                self.map.mark_ready();
            }
            SessionEvent::FlyTo {
                longitude,
                latitude,
            } => {
                if let Some(flight) = self.map.fly_to(longitude, latitude, FLY_TO_DURATION) {
                    info!("Flying to [{}, {}] (#{})", longitude, latitude, flight.sequence);
                }
            }
        }
    }
}
