//! Single-active-layer selection state machine.
//!
//! The controller is the only writer of the current capabilities document and
//! selection. It never performs I/O: network work is requested through the
//! returned [`Command`] and its outcome comes back as a [`ControllerEvent`].
//! Every selection bumps a generation counter; results tagged with an older
//! generation are dropped, so the most recent pick always wins.

use std::sync::Arc;

use shared::{
    domain::{
        BoundingBox, CapabilitiesDocument, FeatureTypeDescriptor, FeatureTypeName, FetchId,
        LayerDescriptor, RequestId,
    },
    error::{CapabilitiesError, LayerError},
};
use tracing::{debug, info, warn};

/// Presentation side consumed by the core.
pub trait UiHost {
    fn render(&mut self, feature_types: &[FeatureTypeDescriptor]);
    fn set_loading(&mut self, loading: bool);
    fn set_warning(&mut self, warning: bool);
    fn layer_failed(&mut self, name: &FeatureTypeName, error: &LayerError);
}

pub trait MapRenderer {
    fn close_popup(&mut self) {}
    fn remove_all_layers(&mut self);
    /// The renderer reports completion with [`ControllerEvent::LayerLoaded`] carrying `request_id`.
    fn add_layer(&mut self, request_id: RequestId, layer: &LayerDescriptor);
    fn frame_extent(&mut self, extent: BoundingBox);
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    EndpointSubmitted(String),
    CapabilitiesFetched {
        fetch_id: FetchId,
        doc: CapabilitiesDocument,
    },
    CapabilitiesFailed {
        fetch_id: FetchId,
        error: CapabilitiesError,
    },
    FeatureTypeSelected(FeatureTypeName),
    LayerResolved {
        request_id: RequestId,
        layer: LayerDescriptor,
    },
    LayerResolveFailed {
        request_id: RequestId,
        error: LayerError,
    },
    LayerLoaded {
        request_id: RequestId,
    },
}

impl ControllerEvent {
    /// True for events that finish a previously issued [`Command`].
    pub fn completes_command(&self) -> bool {
        matches!(
            self,
            Self::CapabilitiesFetched { .. }
                | Self::CapabilitiesFailed { .. }
                | Self::LayerResolved { .. }
                | Self::LayerResolveFailed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FetchCapabilities {
        fetch_id: FetchId,
        endpoint: String,
    },
    ResolveLayer {
        request_id: RequestId,
        name: FeatureTypeName,
        doc: Arc<CapabilitiesDocument>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    Listed {
        doc: Arc<CapabilitiesDocument>,
    },
    Resolving {
        doc: Arc<CapabilitiesDocument>,
        name: FeatureTypeName,
        request_id: RequestId,
    },
    Displayed {
        doc: Arc<CapabilitiesDocument>,
        name: FeatureTypeName,
        layer: Arc<LayerDescriptor>,
        request_id: RequestId,
    },
}

impl SelectionState {
    pub fn document(&self) -> Option<&Arc<CapabilitiesDocument>> {
        match self {
            Self::Idle => None,
            Self::Listed { doc }
            | Self::Resolving { doc, .. }
            | Self::Displayed { doc, .. } => Some(doc),
        }
    }
}

#[derive(Debug, Default)]
pub struct LayerSelectionController {
    state: SelectionState,
    generation: RequestId,
    latest_fetch: FetchId,
    fetch_pending: bool,
    layer_on_map: bool,
    loading: bool,
}

impl LayerSelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn document(&self) -> Option<&Arc<CapabilitiesDocument>> {
        self.state.document()
    }

    pub fn selected(&self) -> Option<&FeatureTypeName> {
        match &self.state {
            SelectionState::Resolving { name, .. } | SelectionState::Displayed { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }

    pub fn displayed_layer(&self) -> Option<&LayerDescriptor> {
        match &self.state {
            SelectionState::Displayed { layer, .. } => Some(layer.as_ref()),
            _ => None,
        }
    }

    pub fn generation(&self) -> RequestId {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn dispatch(
        &mut self,
        event: ControllerEvent,
        ui: &mut dyn UiHost,
        map: &mut dyn MapRenderer,
    ) -> Option<Command> {
        let command = match event {
            ControllerEvent::EndpointSubmitted(endpoint) => {
                Some(self.on_endpoint_submitted(endpoint, ui))
            }
            ControllerEvent::CapabilitiesFetched { fetch_id, doc } => {
                self.on_capabilities_fetched(fetch_id, doc, ui, map);
                None
            }
            ControllerEvent::CapabilitiesFailed { fetch_id, error } => {
                self.on_capabilities_failed(fetch_id, error, ui);
                None
            }
            ControllerEvent::FeatureTypeSelected(name) => self.select_feature_type(name, map),
            ControllerEvent::LayerResolved { request_id, layer } => {
                self.on_layer_resolved(request_id, layer, map);
                None
            }
            ControllerEvent::LayerResolveFailed { request_id, error } => {
                self.on_layer_resolve_failed(request_id, error, ui, map);
                None
            }
            ControllerEvent::LayerLoaded { request_id } => {
                self.on_layer_loaded(request_id, map);
                None
            }
        };
        self.sync_loading(ui);
        command
    }

    fn on_endpoint_submitted(&mut self, endpoint: String, ui: &mut dyn UiHost) -> Command {
        self.latest_fetch = self.latest_fetch.next();
        self.fetch_pending = true;
        ui.render(&[]);
        Command::FetchCapabilities {
            fetch_id: self.latest_fetch,
            endpoint,
        }
    }

    fn on_capabilities_fetched(
        &mut self,
        fetch_id: FetchId,
        doc: CapabilitiesDocument,
        ui: &mut dyn UiHost,
        map: &mut dyn MapRenderer,
    ) {
        if fetch_id != self.latest_fetch {
            debug!(%fetch_id, latest = %self.latest_fetch, "discarding stale capabilities");
            return;
        }
        self.fetch_pending = false;

        // Hard reset: whatever was resolving is now stale.
        self.generation = self.generation.next();
        if self.layer_on_map {
            map.remove_all_layers();
            self.layer_on_map = false;
        }
        ui.set_warning(false);
        ui.render(&doc.feature_types);
        info!(endpoint = %doc.endpoint, feature_types = doc.len(), "feature types listed");
        self.state = SelectionState::Listed { doc: Arc::new(doc) };
    }

    fn on_capabilities_failed(
        &mut self,
        fetch_id: FetchId,
        error: CapabilitiesError,
        ui: &mut dyn UiHost,
    ) {
        if fetch_id != self.latest_fetch {
            debug!(%fetch_id, latest = %self.latest_fetch, "discarding stale capabilities failure");
            return;
        }
        self.fetch_pending = false;
        warn!(%error, "capabilities unavailable; keeping previous state");
        ui.set_warning(true);
        if let Some(doc) = self.state.document() {
            ui.render(&doc.feature_types);
        }
    }

    fn select_feature_type(
        &mut self,
        name: FeatureTypeName,
        map: &mut dyn MapRenderer,
    ) -> Option<Command> {
        let Some(doc) = self.state.document().cloned() else {
            debug!(feature_type = %name, "ignoring selection without capabilities");
            return None;
        };
        map.close_popup();
        self.generation = self.generation.next();
        let request_id = self.generation;
        debug!(feature_type = %name, %request_id, "feature type selected");
        self.state = SelectionState::Resolving {
            doc: doc.clone(),
            name: name.clone(),
            request_id,
        };
        Some(Command::ResolveLayer {
            request_id,
            name,
            doc,
        })
    }

    fn resolving_matches(&self, request_id: RequestId) -> bool {
        request_id == self.generation
            && matches!(&self.state, SelectionState::Resolving { request_id: current, .. } if *current == request_id)
    }

    fn on_layer_resolved(
        &mut self,
        request_id: RequestId,
        layer: LayerDescriptor,
        map: &mut dyn MapRenderer,
    ) {
        if !self.resolving_matches(request_id) {
            debug!(%request_id, current = %self.generation, "discarding superseded layer");
            return;
        }
        let SelectionState::Resolving { doc, name, .. } = std::mem::take(&mut self.state) else {
            return;
        };

        map.remove_all_layers();
        map.add_layer(request_id, &layer);
        self.layer_on_map = true;
        info!(feature_type = %name, %request_id, "layer displayed");
        self.state = SelectionState::Displayed {
            doc,
            name,
            layer: Arc::new(layer),
            request_id,
        };
    }

    fn on_layer_resolve_failed(
        &mut self,
        request_id: RequestId,
        error: LayerError,
        ui: &mut dyn UiHost,
        map: &mut dyn MapRenderer,
    ) {
        if !self.resolving_matches(request_id) {
            debug!(%request_id, current = %self.generation, "discarding superseded layer failure");
            return;
        }
        let SelectionState::Resolving { doc, name, .. } = std::mem::take(&mut self.state) else {
            return;
        };

        if self.layer_on_map {
            map.remove_all_layers();
            self.layer_on_map = false;
        }
        warn!(feature_type = %name, %error, "layer could not be displayed");
        ui.layer_failed(&name, &error);
        self.state = SelectionState::Listed { doc };
    }

    fn on_layer_loaded(&mut self, request_id: RequestId, map: &mut dyn MapRenderer) {
        match &self.state {
            SelectionState::Displayed {
                layer,
                request_id: current,
                ..
            } if *current == request_id => map.frame_extent(layer.extent),
            _ => debug!(%request_id, "ignoring load signal for a replaced layer"),
        }
    }

    fn sync_loading(&mut self, ui: &mut dyn UiHost) {
        let loading = self.fetch_pending || matches!(self.state, SelectionState::Resolving { .. });
        if loading != self.loading {
            self.loading = loading;
            ui.set_loading(loading);
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
