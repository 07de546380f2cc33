use thiserror::Error;

use crate::domain::FeatureTypeName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilitiesError {
    #[error("invalid WFS endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("unsupported WFS service at {0}: it must support WFS 2.0.0 with GeoJSON output")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("feature type '{0}' is not listed in the current capabilities")]
    NotFound(FeatureTypeName),
    #[error("feature type '{name}' cannot be displayed: {reason}")]
    Unsupported {
        name: FeatureTypeName,
        reason: String,
    },
}

impl LayerError {
    pub fn unsupported(name: &FeatureTypeName, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            name: name.clone(),
            reason: reason.into(),
        }
    }

    pub fn name(&self) -> &FeatureTypeName {
        match self {
            Self::NotFound(name) | Self::Unsupported { name, .. } => name,
        }
    }
}
