use thiserror::Error;

use crate::types::FeatureId;

/// Problems with a single drawn feature. Recoverable: aggregation skips the
/// feature and reports it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("geometry is not a valid polygon: {reason}")]
    InvalidGeometry { reason: String },

    #[error("property `{key}` is not set")]
    MissingProperty { key: String },

    #[error("feature has no identifier")]
    MissingId,
}

impl FeatureError {
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("invalid arguments for `{action}`: {source}")]
    InvalidArguments {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("action `{0}` is not available to the user")]
    NotAvailable(String),
}

/// A feature the aggregator could not measure.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SkippedFeature {
    pub id: FeatureId,
    pub reason: String,
}

impl SkippedFeature {
    pub fn new(id: FeatureId, error: &FeatureError) -> Self {
        Self {
            id,
            reason: error.to_string(),
        }
    }
}
