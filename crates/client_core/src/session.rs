//! Async driver around [`LayerSelectionController`].
//!
//! UI picks, renderer load signals and network completions all arrive at one
//! inbox and are applied by the session loop, which is the controller's only
//! caller. Network work runs in spawned tasks that post their outcome back to
//! the inbox.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use shared::domain::{FeatureTypeName, RequestId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    capabilities::CapabilitiesClient,
    controller::{Command, ControllerEvent, LayerSelectionController, MapRenderer, UiHost},
    layer_factory::LayerFactory,
    transport::HttpFetch,
};

/// Sending side handed to the UI host and the map renderer.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl SessionHandle {
    pub fn submit_endpoint(&self, endpoint: impl Into<String>) -> Result<()> {
        self.send(ControllerEvent::EndpointSubmitted(endpoint.into()))
    }

    pub fn select(&self, name: impl Into<FeatureTypeName>) -> Result<()> {
        self.send(ControllerEvent::FeatureTypeSelected(name.into()))
    }

    pub fn layer_loaded(&self, request_id: RequestId) -> Result<()> {
        self.send(ControllerEvent::LayerLoaded { request_id })
    }

    pub fn send(&self, event: ControllerEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow!("layer session is closed"))
    }
}

/// Receiving side owned by the [`Session`].
///
/// Network completions travel on a separate channel whose sender the session
/// keeps, so queued work still finishes after every [`SessionHandle`] is gone.
pub struct SessionInbox {
    rx: mpsc::UnboundedReceiver<ControllerEvent>,
    completions_tx: mpsc::UnboundedSender<ControllerEvent>,
    completions_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    handles_closed: bool,
}

pub fn channel() -> (SessionHandle, SessionInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    (
        SessionHandle { tx },
        SessionInbox {
            rx,
            completions_tx,
            completions_rx,
            handles_closed: false,
        },
    )
}

pub struct Session<U, M> {
    controller: LayerSelectionController,
    ui: U,
    map: M,
    capabilities: CapabilitiesClient,
    layers: LayerFactory,
    inbox: SessionInbox,
    in_flight: usize,
}

impl<U, M> Session<U, M>
where
    U: UiHost,
    M: MapRenderer,
{
    pub fn new(ui: U, map: M, fetch: Arc<dyn HttpFetch>, inbox: SessionInbox) -> Self {
        Self {
            controller: LayerSelectionController::new(),
            ui,
            map,
            capabilities: CapabilitiesClient::new(fetch.clone()),
            layers: LayerFactory::new(fetch),
            inbox,
            in_flight: 0,
        }
    }

    pub fn controller(&self) -> &LayerSelectionController {
        &self.controller
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Waits for and applies one event.
    ///
    /// Returns `false` once every handle is dropped and no network work is outstanding.
    pub async fn step(&mut self) -> bool {
        let event = if self.inbox.handles_closed {
            if self.in_flight == 0 {
                return false;
            }
            self.inbox.completions_rx.recv().await
        } else {
            tokio::select! {
                biased;
                Some(event) = self.inbox.completions_rx.recv() => Some(event),
                event = self.inbox.rx.recv() => event,
            }
        };

        match event {
            Some(event) => {
                self.apply(event);
                true
            }
            None => {
                debug!(in_flight = self.in_flight, "all session handles dropped");
                self.inbox.handles_closed = true;
                self.in_flight > 0
            }
        }
    }

    /// Runs until all handles are dropped and no network work is outstanding.
    pub async fn run(&mut self) {
        while self.step().await {}
    }

    /// Applies queued events until nothing is queued and nothing is in flight.
    pub async fn settle(&mut self) {
        loop {
            while let Some(event) = self.try_next() {
                self.apply(event);
            }
            if self.in_flight == 0 || !self.step().await {
                break;
            }
        }
    }

    fn try_next(&mut self) -> Option<ControllerEvent> {
        self.inbox
            .completions_rx
            .try_recv()
            .ok()
            .or_else(|| self.inbox.rx.try_recv().ok())
    }

    fn apply(&mut self, event: ControllerEvent) {
        if event.completes_command() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        if let Some(command) = self
            .controller
            .dispatch(event, &mut self.ui, &mut self.map)
        {
            self.spawn(command);
        }
    }

    fn spawn(&mut self, command: Command) {
        let tx = self.inbox.completions_tx.clone();
        self.in_flight += 1;
        match command {
            Command::FetchCapabilities { fetch_id, endpoint } => {
                let client = self.capabilities.clone();
                tokio::spawn(async move {
                    let event = match client.fetch_capabilities(&endpoint).await {
                        Ok(doc) => ControllerEvent::CapabilitiesFetched { fetch_id, doc },
                        Err(error) => ControllerEvent::CapabilitiesFailed { fetch_id, error },
                    };
                    let _ = tx.send(event);
                });
            }
            Command::ResolveLayer {
                request_id,
                name,
                doc,
            } => {
                let factory = self.layers.clone();
                tokio::spawn(async move {
                    let event = match factory.build_layer(&name, &doc).await {
                        Ok(layer) => ControllerEvent::LayerResolved { request_id, layer },
                        Err(error) => ControllerEvent::LayerResolveFailed { request_id, error },
                    };
                    let _ = tx.send(event);
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
