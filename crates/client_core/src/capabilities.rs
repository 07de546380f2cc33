//! WFS GetCapabilities client.

use std::{collections::HashSet, sync::Arc};

use anyhow::{bail, Context, Result};
use shared::{
    domain::{
        BoundingBox, CapabilitiesDocument, FeatureTypeDescriptor, FeatureTypeName,
        ServiceOperations,
    },
    error::CapabilitiesError,
    protocol::{WfsRequest, WFS_VERSION},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    transport::HttpFetch,
    xml::{self, Element},
};

/// Stateless: every call stands on its own and yields a fresh document.
#[derive(Clone)]
pub struct CapabilitiesClient {
    fetch: Arc<dyn HttpFetch>,
}

impl CapabilitiesClient {
    pub fn new(fetch: Arc<dyn HttpFetch>) -> Self {
        Self { fetch }
    }

    pub async fn fetch_capabilities(
        &self,
        endpoint: &str,
    ) -> Result<CapabilitiesDocument, CapabilitiesError> {
        let endpoint = parse_endpoint(endpoint)?;
        let request_url = WfsRequest::GetCapabilities.to_url(&endpoint);
        debug!(%endpoint, "requesting WFS capabilities");

        let body = match self.fetch.get_text(&request_url).await {
            Ok(body) => body,
            Err(err) => {
                warn!(%endpoint, error = %format!("{err:#}"), "capabilities request failed");
                return Err(CapabilitiesError::Unsupported(endpoint.to_string()));
            }
        };

        match parse_capabilities(endpoint.clone(), &body) {
            Ok(document) => {
                info!(
                    %endpoint,
                    version = %document.version,
                    feature_types = document.len(),
                    "capabilities loaded"
                );
                Ok(document)
            }
            Err(err) => {
                warn!(%endpoint, error = %format!("{err:#}"), "capabilities response rejected");
                Err(CapabilitiesError::Unsupported(endpoint.to_string()))
            }
        }
    }
}

pub fn parse_endpoint(raw: &str) -> Result<Url, CapabilitiesError> {
    let trimmed = raw.trim();
    let invalid = || CapabilitiesError::InvalidEndpoint(raw.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let url = Url::parse(trimmed).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

pub(crate) fn parse_capabilities(endpoint: Url, body: &str) -> Result<CapabilitiesDocument> {
    let root = xml::parse(body).context("capabilities response is not XML")?;
    if root.name() != "WFS_Capabilities" {
        bail!("unexpected root element <{}>", root.name());
    }

    let mut feature_types = Vec::new();
    let mut seen = HashSet::new();
    if let Some(list) = root.child("FeatureTypeList") {
        for (index, node) in list.children_named("FeatureType").enumerate() {
            let descriptor = parse_feature_type(node)
                .with_context(|| format!("feature type #{}", index + 1))?;
            if !seen.insert(descriptor.name.clone()) {
                bail!("duplicate feature type name '{}'", descriptor.name);
            }
            feature_types.push(descriptor);
        }
    }

    Ok(CapabilitiesDocument {
        endpoint,
        version: root.attr("version").unwrap_or(WFS_VERSION).to_string(),
        service_title: root
            .child("ServiceIdentification")
            .and_then(|service| service.child_text("Title"))
            .map(str::to_string),
        feature_types,
        operations: parse_operations(root.child("OperationsMetadata")),
    })
}

fn parse_feature_type(node: &Element) -> Result<FeatureTypeDescriptor> {
    let name = node.child_text("Name").context("missing <Name>")?;
    let title = node.child_text("Title").unwrap_or(name);

    Ok(FeatureTypeDescriptor {
        name: FeatureTypeName::new(name),
        title: title.to_string(),
        abstract_text: node.child_text("Abstract").map(str::to_string),
        default_crs: node
            .child_text("DefaultCRS")
            .or_else(|| node.child_text("DefaultSRS"))
            .map(str::to_string),
        bounding_box: node.child("WGS84BoundingBox").and_then(parse_bounding_box),
        output_formats: node
            .child("OutputFormats")
            .map(|formats| {
                formats
                    .children_named("Format")
                    .map(Element::text)
                    .filter(|format| !format.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn parse_corner(text: &str) -> Option<(f64, f64)> {
    let mut parts = text.split_whitespace().map(str::parse::<f64>);
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    if parts.next().is_some() || !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some((x, y))
}

fn parse_bounding_box(node: &Element) -> Option<BoundingBox> {
    let lower = parse_corner(node.child_text("LowerCorner")?)?;
    let upper = parse_corner(node.child_text("UpperCorner")?)?;
    Some(BoundingBox::from_corners(lower, upper))
}

fn operation_get_url(operation: &Element) -> Option<Url> {
    operation
        .child("DCP")?
        .child("HTTP")?
        .child("Get")?
        .attr("href")
        .and_then(|href| Url::parse(href.trim()).ok())
}

fn parse_operations(metadata: Option<&Element>) -> ServiceOperations {
    let mut operations = ServiceOperations::default();
    let Some(metadata) = metadata else {
        return operations;
    };

    for operation in metadata.children_named("Operation") {
        match operation.attr("name") {
            Some("GetFeature") => {
                operations.get_feature_url = operation_get_url(operation);
                operations.get_feature_output_formats = operation
                    .children_named("Parameter")
                    .filter(|param| {
                        param
                            .attr("name")
                            .is_some_and(|name| name.eq_ignore_ascii_case("outputFormat"))
                    })
                    .flat_map(|param| param.descendants_named("Value"))
                    .map(Element::text)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            Some("DescribeFeatureType") => {
                operations.describe_feature_type_url = operation_get_url(operation);
            }
            _ => {}
        }
    }
    operations
}

#[cfg(test)]
#[path = "tests/capabilities_tests.rs"]
mod tests;
