//! WFS capabilities discovery and single-active-layer selection.

pub mod capabilities;
pub mod controller;
pub mod layer_factory;
pub mod session;
pub mod transport;
mod xml;

pub use capabilities::{parse_endpoint, CapabilitiesClient};
pub use controller::{
    Command, ControllerEvent, LayerSelectionController, MapRenderer, SelectionState, UiHost,
};
pub use layer_factory::LayerFactory;
pub use session::{channel, Session, SessionHandle, SessionInbox};
pub use transport::{HttpFetch, ReqwestFetch, TransportOptions};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
