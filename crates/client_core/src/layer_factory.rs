//! Turns a selected feature type into a renderable layer descriptor.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use shared::{
    domain::{
        BoundingBox, CapabilitiesDocument, FeatureTypeDescriptor, FeatureTypeName, FieldDescriptor,
        FieldType, GeometryType, LayerDescriptor, LayerSource, LayerStyle, ServiceOperations,
    },
    error::LayerError,
    protocol::{is_geojson_format, WfsRequest, DEFAULT_CRS},
};
use tracing::{debug, info, warn};

use crate::{
    transport::HttpFetch,
    xml::{self, Element},
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FeatureSchema {
    pub geometry_field: String,
    pub geometry_type: GeometryType,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Clone)]
pub struct LayerFactory {
    fetch: Arc<dyn HttpFetch>,
}

impl LayerFactory {
    pub fn new(fetch: Arc<dyn HttpFetch>) -> Self {
        Self { fetch }
    }

    pub async fn build_layer(
        &self,
        name: &FeatureTypeName,
        doc: &CapabilitiesDocument,
    ) -> Result<LayerDescriptor, LayerError> {
        let feature_type = doc
            .feature_type(name)
            .ok_or_else(|| LayerError::NotFound(name.clone()))?;
        let output_format = select_output_format(feature_type, &doc.operations)
            .ok_or_else(|| LayerError::unsupported(name, "no GeoJSON output format advertised"))?;

        let describe_base = doc
            .operations
            .describe_feature_type_url
            .as_ref()
            .unwrap_or(&doc.endpoint);
        let describe_url = WfsRequest::DescribeFeatureType {
            type_name: name.clone(),
        }
        .to_url(describe_base);
        debug!(feature_type = %name, url = %describe_url, "describing feature type");

        let body = self.fetch.get_text(&describe_url).await.map_err(|err| {
            warn!(feature_type = %name, error = %format!("{err:#}"), "feature type description failed");
            LayerError::unsupported(name, "feature type description request failed")
        })?;
        let schema = parse_feature_schema(name, &body).map_err(|err| {
            warn!(feature_type = %name, error = %format!("{err:#}"), "feature type description rejected");
            LayerError::unsupported(name, format!("{err:#}"))
        })?;

        let get_feature_base = doc
            .operations
            .get_feature_url
            .as_ref()
            .unwrap_or(&doc.endpoint);
        let get_feature_url = WfsRequest::GetFeature {
            type_name: name.clone(),
            output_format: output_format.clone(),
        }
        .to_url(get_feature_base);

        info!(
            feature_type = %name,
            geometry = ?schema.geometry_type,
            fields = schema.fields.len(),
            "layer resolved"
        );
        Ok(LayerDescriptor {
            name: name.clone(),
            title: feature_type.title.clone(),
            source: LayerSource {
                get_feature_url,
                output_format,
            },
            style: LayerStyle::for_geometry(schema.geometry_type),
            geometry_field: schema.geometry_field,
            geometry_type: schema.geometry_type,
            fields: schema.fields,
            extent: feature_type.bounding_box.unwrap_or(BoundingBox::WORLD),
            spatial_reference: feature_type
                .default_crs
                .clone()
                .unwrap_or_else(|| DEFAULT_CRS.to_string()),
        })
    }
}

/// Per-type formats win over the service-wide GetFeature list.
pub(crate) fn select_output_format(
    feature_type: &FeatureTypeDescriptor,
    operations: &ServiceOperations,
) -> Option<String> {
    feature_type
        .output_formats
        .iter()
        .chain(operations.get_feature_output_formats.iter())
        .find(|format| is_geojson_format(format))
        .cloned()
}

fn strip_prefix(qualified: &str) -> &str {
    qualified
        .rsplit_once(':')
        .map(|(_, local)| local)
        .unwrap_or(qualified)
}

fn geometry_type_for(type_name: &str) -> Option<GeometryType> {
    let geometry = match type_name {
        "PointPropertyType" => GeometryType::Point,
        "MultiPointPropertyType" => GeometryType::MultiPoint,
        "LineStringPropertyType"
        | "MultiLineStringPropertyType"
        | "CurvePropertyType"
        | "MultiCurvePropertyType" => GeometryType::Polyline,
        "PolygonPropertyType"
        | "MultiPolygonPropertyType"
        | "SurfacePropertyType"
        | "MultiSurfacePropertyType" => GeometryType::Polygon,
        "GeometryPropertyType"
        | "MultiGeometryPropertyType"
        | "GeometryCollectionPropertyType" => GeometryType::Unknown,
        _ => return None,
    };
    Some(geometry)
}

fn field_type_for(type_name: &str) -> FieldType {
    match type_name {
        "string" | "token" | "normalizedString" | "anyURI" => FieldType::String,
        "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "positiveInteger" | "negativeInteger" | "nonPositiveInteger" | "unsignedInt"
        | "unsignedLong" | "unsignedShort" => FieldType::Integer,
        "double" | "float" | "decimal" => FieldType::Double,
        "date" | "dateTime" | "time" => FieldType::Date,
        "boolean" => FieldType::Boolean,
        _ => FieldType::Other,
    }
}

/// Resolves an element's type, following an inline `simpleType/restriction` if present.
fn element_type(element: &Element) -> &str {
    element
        .attr("type")
        .or_else(|| {
            element
                .descendants_named("restriction")
                .into_iter()
                .next()
                .and_then(|restriction| restriction.attr("base"))
        })
        .map(strip_prefix)
        .unwrap_or_default()
}

pub(crate) fn parse_feature_schema(name: &FeatureTypeName, body: &str) -> Result<FeatureSchema> {
    let root = xml::parse(body).context("feature type description is not XML")?;
    if root.name() != "schema" {
        bail!("unexpected root element <{}>", root.name());
    }

    let referenced_type = root
        .children_named("element")
        .find(|element| element.attr("name") == Some(name.local_name()))
        .and_then(|element| element.attr("type"))
        .map(strip_prefix);
    let complex_type = referenced_type
        .and_then(|type_name| {
            root.children_named("complexType")
                .find(|complex| complex.attr("name") == Some(type_name))
        })
        .or_else(|| root.children_named("complexType").next())
        .context("schema declares no complex type")?;

    let mut geometry = None;
    let mut fields = Vec::new();
    for element in complex_type.descendants_named("element") {
        let Some(field_name) = element.attr("name") else {
            continue;
        };
        let type_name = element_type(element);
        if let Some(geometry_type) = geometry_type_for(type_name) {
            if geometry.is_none() {
                geometry = Some((field_name.to_string(), geometry_type));
            }
            continue;
        }
        fields.push(FieldDescriptor {
            name: field_name.to_string(),
            field_type: field_type_for(type_name),
            nullable: element.attr("nillable") == Some("true")
                || element.attr("minOccurs") == Some("0"),
        });
    }

    let (geometry_field, geometry_type) =
        geometry.context("feature type has no geometry property")?;
    Ok(FeatureSchema {
        geometry_field,
        geometry_type,
        fields,
    })
}

#[cfg(test)]
#[path = "tests/layer_factory_tests.rs"]
mod tests;
