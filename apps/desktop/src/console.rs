//! Terminal stand-ins for the UI host and the map renderer.

use client_core::{MapRenderer, SessionHandle, UiHost};
use shared::{
    domain::{BoundingBox, FeatureTypeDescriptor, FeatureTypeName, LayerDescriptor, RequestId},
    error::LayerError,
};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct ConsoleUi {
    /// Case-insensitive substring matched against names and titles.
    filter: Option<String>,
    pub warning: bool,
    pub listed: usize,
    pub shown: Vec<FeatureTypeName>,
    pub failures: Vec<(FeatureTypeName, LayerError)>,
}

impl ConsoleUi {
    pub fn with_filter(filter: Option<String>) -> Self {
        Self {
            filter: filter
                .map(|text| text.trim().to_lowercase())
                .filter(|text| !text.is_empty()),
            ..Self::default()
        }
    }

    fn matches(&self, feature_type: &FeatureTypeDescriptor) -> bool {
        self.filter.as_deref().map_or(true, |needle| {
            feature_type.name.as_str().to_lowercase().contains(needle)
                || feature_type.title.to_lowercase().contains(needle)
        })
    }
}

impl UiHost for ConsoleUi {
    fn render(&mut self, feature_types: &[FeatureTypeDescriptor]) {
        self.listed = feature_types.len();
        self.shown.clear();
        for ft in feature_types {
            if !self.matches(ft) {
                continue;
            }
            println!("{:<48} {}", ft.name.as_str(), ft.title);
            self.shown.push(ft.name.clone());
        }
    }

    fn set_loading(&mut self, loading: bool) {
        debug!(loading, "loading state changed");
    }

    fn set_warning(&mut self, warning: bool) {
        if warning {
            warn!("endpoint is not a usable WFS service");
        }
        self.warning = warning;
    }

    fn layer_failed(&mut self, name: &FeatureTypeName, error: &LayerError) {
        warn!(feature_type = %name, %error, "layer could not be built");
        self.failures.push((name.clone(), error.clone()));
    }
}

/// Has no tiles to wait for, so every added layer reports itself loaded at once.
pub struct ConsoleMap {
    handle: SessionHandle,
    pub framed: Option<BoundingBox>,
}

impl ConsoleMap {
    pub fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            framed: None,
        }
    }
}

impl MapRenderer for ConsoleMap {
    fn remove_all_layers(&mut self) {
        self.framed = None;
    }

    fn add_layer(&mut self, request_id: RequestId, layer: &LayerDescriptor) {
        info!(
            %request_id,
            feature_type = %layer.name,
            source = %layer.source.get_feature_url,
            "layer added"
        );
        if let Err(err) = self.handle.layer_loaded(request_id) {
            warn!(%request_id, "failed to report layer load: {err:#}");
        }
    }

    fn frame_extent(&mut self, extent: BoundingBox) {
        let (center_x, center_y) = extent.center();
        info!(center_x, center_y, "framing extent");
        self.framed = Some(extent);
    }
}
