use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{
        BoundingBox, CapabilitiesDocument, FeatureTypeDescriptor, FeatureTypeName, GeometryType,
        LayerDescriptor, LayerSource, LayerStyle, RequestId, ServiceOperations,
    },
    error::LayerError,
};
use tokio::sync::oneshot;
use url::Url;

use crate::{
    controller::{MapRenderer, UiHost},
    transport::HttpFetch,
};

pub const ENDPOINT: &str = "https://wfs.example.org/geoserver/ows";

/// WFS 2.0 capabilities listing `(name, title)` pairs, each with a bbox around `(index, index)`.
pub fn capabilities_xml(feature_types: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (index, (name, title)) in feature_types.iter().enumerate() {
        body.push_str(&format!(
            r#"
    <FeatureType>
      <Name>{name}</Name>
      <Title>{title}</Title>
      <DefaultCRS>urn:ogc:def:crs:EPSG::2154</DefaultCRS>
      <ows:WGS84BoundingBox>
        <ows:LowerCorner>{index}.0 {index}.5</ows:LowerCorner>
        <ows:UpperCorner>{}.0 {}.5</ows:UpperCorner>
      </ows:WGS84BoundingBox>
    </FeatureType>"#,
            index + 1,
            index + 1
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:WFS_Capabilities version="2.0.0"
    xmlns:wfs="http://www.opengis.net/wfs/2.0"
    xmlns:ows="http://www.opengis.net/ows/1.1"
    xmlns:xlink="http://www.w3.org/1999/xlink"
    xmlns="http://www.opengis.net/wfs/2.0">
  <ows:ServiceIdentification>
    <ows:Title>Example WFS</ows:Title>
  </ows:ServiceIdentification>
  <ows:OperationsMetadata>
    <ows:Operation name="DescribeFeatureType">
      <ows:DCP><ows:HTTP><ows:Get xlink:href="{ENDPOINT}?map=describe"/></ows:HTTP></ows:DCP>
    </ows:Operation>
    <ows:Operation name="GetFeature">
      <ows:DCP><ows:HTTP><ows:Get xlink:href="{ENDPOINT}"/></ows:HTTP></ows:DCP>
      <ows:Parameter name="outputFormat">
        <ows:AllowedValues>
          <ows:Value>application/gml+xml; version=3.2</ows:Value>
          <ows:Value>application/json</ows:Value>
        </ows:AllowedValues>
      </ows:Parameter>
    </ows:Operation>
  </ows:OperationsMetadata>
  <FeatureTypeList>{body}
  </FeatureTypeList>
</wfs:WFS_Capabilities>"#
    )
}

pub fn describe_xml(local_name: &str, geometry_type: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:gml="http://www.opengis.net/gml/3.2"
    xmlns:ns="http://example.org/ns"
    targetNamespace="http://example.org/ns">
  <xsd:complexType name="{local_name}Type">
    <xsd:complexContent>
      <xsd:extension base="gml:AbstractFeatureType">
        <xsd:sequence>
          <xsd:element name="id" type="xsd:long" minOccurs="1"/>
          <xsd:element name="label" type="xsd:string" nillable="true" minOccurs="0"/>
          <xsd:element name="the_geom" type="gml:{geometry_type}"/>
          <xsd:element name="surveyed" type="xsd:date" minOccurs="0"/>
        </xsd:sequence>
      </xsd:extension>
    </xsd:complexContent>
  </xsd:complexType>
  <xsd:element name="{local_name}" type="ns:{local_name}Type" substitutionGroup="gml:AbstractFeature"/>
</xsd:schema>"#
    )
}

pub fn document(names: &[&str]) -> CapabilitiesDocument {
    CapabilitiesDocument {
        endpoint: Url::parse(ENDPOINT).expect("endpoint"),
        version: "2.0.0".to_string(),
        service_title: None,
        feature_types: names
            .iter()
            .enumerate()
            .map(|(index, name)| FeatureTypeDescriptor {
                name: FeatureTypeName::from(*name),
                title: name.to_uppercase(),
                abstract_text: None,
                default_crs: None,
                bounding_box: Some(BoundingBox::from_corners(
                    (index as f64, index as f64),
                    (index as f64 + 1.0, index as f64 + 1.0),
                )),
                output_formats: Vec::new(),
            })
            .collect(),
        operations: ServiceOperations {
            get_feature_output_formats: vec!["application/json".to_string()],
            ..ServiceOperations::default()
        },
    }
}

pub fn layer(name: &str, extent: BoundingBox) -> LayerDescriptor {
    LayerDescriptor {
        name: FeatureTypeName::from(name),
        title: name.to_uppercase(),
        source: LayerSource {
            get_feature_url: Url::parse(ENDPOINT).expect("endpoint"),
            output_format: "application/json".to_string(),
        },
        geometry_field: "the_geom".to_string(),
        geometry_type: GeometryType::Polygon,
        fields: Vec::new(),
        extent,
        spatial_reference: "urn:ogc:def:crs:EPSG::4326".to_string(),
        style: LayerStyle::for_geometry(GeometryType::Polygon),
    }
}

struct Route {
    request: &'static str,
    type_name: Option<String>,
    body: Result<String, String>,
    gate: Option<oneshot::Receiver<()>>,
}

/// In-memory fetch keyed on the `REQUEST` and `TYPENAMES` query parameters.
/// Gated routes hold their response until the paired sender fires.
#[derive(Default)]
pub struct ScriptedFetch {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<Url>>,
}

impl ScriptedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, request: &'static str, type_name: Option<&str>, body: Result<String, String>) {
        self.routes.lock().expect("routes").push(Route {
            request,
            type_name: type_name.map(str::to_string),
            body,
            gate: None,
        });
    }

    pub fn capabilities(self, body: impl Into<String>) -> Self {
        self.push("GetCapabilities", None, Ok(body.into()));
        self
    }

    pub fn describe(self, type_name: &str, body: impl Into<String>) -> Self {
        self.push("DescribeFeatureType", Some(type_name), Ok(body.into()));
        self
    }

    pub fn failing(self, request: &'static str, message: &str) -> Self {
        self.push(request, None, Err(message.to_string()));
        self
    }

    pub fn gated_describe(
        self,
        type_name: &str,
        body: impl Into<String>,
    ) -> (Self, oneshot::Sender<()>) {
        let (release, gate) = oneshot::channel();
        self.routes.lock().expect("routes").push(Route {
            request: "DescribeFeatureType",
            type_name: Some(type_name.to_string()),
            body: Ok(body.into()),
            gate: Some(gate),
        });
        (self, release)
    }

    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait]
impl HttpFetch for ScriptedFetch {
    async fn get_text(&self, url: &Url) -> Result<String> {
        self.calls.lock().expect("calls").push(url.clone());
        let query: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.to_ascii_uppercase(), v.into_owned()))
            .collect();

        let (body, gate) = {
            let mut routes = self.routes.lock().expect("routes");
            let route = routes
                .iter_mut()
                .find(|route| {
                    query.get("REQUEST").map(String::as_str) == Some(route.request)
                        && route
                            .type_name
                            .as_ref()
                            .map_or(true, |name| query.get("TYPENAMES") == Some(name))
                })
                .ok_or_else(|| anyhow!("no scripted response for {url}"))?;
            (route.body.clone(), route.gate.take())
        };

        if let Some(gate) = gate {
            let _ = gate.await;
        }
        body.map_err(|message| anyhow!(message))
    }
}

pub fn scripted(fetch: ScriptedFetch) -> (Arc<ScriptedFetch>, Arc<dyn HttpFetch>) {
    let fetch = Arc::new(fetch);
    let shared: Arc<dyn HttpFetch> = fetch.clone();
    (fetch, shared)
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiCall {
    Render(Vec<FeatureTypeName>),
    Loading(bool),
    Warning(bool),
    LayerFailed(FeatureTypeName, LayerError),
}

#[derive(Default)]
pub struct RecordingUi {
    pub calls: Vec<UiCall>,
}

impl RecordingUi {
    pub fn warning(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|call| match call {
                UiCall::Warning(flag) => Some(*flag),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn loading(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|call| match call {
                UiCall::Loading(flag) => Some(*flag),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn last_render(&self) -> Option<&[FeatureTypeName]> {
        self.calls.iter().rev().find_map(|call| match call {
            UiCall::Render(names) => Some(names.as_slice()),
            _ => None,
        })
    }
}

impl UiHost for RecordingUi {
    fn render(&mut self, feature_types: &[FeatureTypeDescriptor]) {
        self.calls.push(UiCall::Render(
            feature_types.iter().map(|ft| ft.name.clone()).collect(),
        ));
    }

    fn set_loading(&mut self, loading: bool) {
        self.calls.push(UiCall::Loading(loading));
    }

    fn set_warning(&mut self, warning: bool) {
        self.calls.push(UiCall::Warning(warning));
    }

    fn layer_failed(&mut self, name: &FeatureTypeName, error: &LayerError) {
        self.calls
            .push(UiCall::LayerFailed(name.clone(), error.clone()));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapCall {
    ClosePopup,
    RemoveAll,
    Add(RequestId, FeatureTypeName),
    Frame(BoundingBox),
}

/// Renderer that records calls and tracks what would be visible.
#[derive(Default)]
pub struct RecordingMap {
    pub calls: Vec<MapCall>,
    pub visible: Vec<FeatureTypeName>,
    pub max_visible: usize,
}

impl RecordingMap {
    pub fn last_added(&self) -> Option<RequestId> {
        self.calls.iter().rev().find_map(|call| match call {
            MapCall::Add(request_id, _) => Some(*request_id),
            _ => None,
        })
    }

    pub fn frames(&self) -> Vec<BoundingBox> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                MapCall::Frame(extent) => Some(*extent),
                _ => None,
            })
            .collect()
    }
}

impl MapRenderer for RecordingMap {
    fn close_popup(&mut self) {
        self.calls.push(MapCall::ClosePopup);
    }

    fn remove_all_layers(&mut self) {
        self.calls.push(MapCall::RemoveAll);
        self.visible.clear();
    }

    fn add_layer(&mut self, request_id: RequestId, layer: &LayerDescriptor) {
        self.calls.push(MapCall::Add(request_id, layer.name.clone()));
        self.visible.push(layer.name.clone());
        self.max_visible = self.max_visible.max(self.visible.len());
    }

    fn frame_extent(&mut self, extent: BoundingBox) {
        self.calls.push(MapCall::Frame(extent));
    }
}
