use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

macro_rules! generation_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

generation_newtype!(RequestId);
generation_newtype!(FetchId);

/// Qualified feature type name as advertised by the service, e.g. `fma:bvme_zhp_vs_culture`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureTypeName(String);

impl FeatureTypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.0
            .rsplit_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for FeatureTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureTypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FeatureTypeName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// WGS84 longitude/latitude extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub const WORLD: Self = Self {
        min_x: -180.0,
        min_y: -90.0,
        max_x: 180.0,
        max_y: 90.0,
    };

    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            min_x: a.0.min(b.0),
            min_y: a.1.min(b.1),
            max_x: a.0.max(b.0),
            max_y: a.1.max(b.1),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTypeDescriptor {
    pub name: FeatureTypeName,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_crs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_formats: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceOperations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_feature_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub describe_feature_type_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub get_feature_output_formats: Vec<String>,
}

/// One parsed GetCapabilities response. Feature types keep the server's order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitiesDocument {
    pub endpoint: Url,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_title: Option<String>,
    pub feature_types: Vec<FeatureTypeDescriptor>,
    #[serde(default)]
    pub operations: ServiceOperations,
}

impl CapabilitiesDocument {
    pub fn feature_type(&self, name: &FeatureTypeName) -> Option<&FeatureTypeDescriptor> {
        self.feature_types.iter().find(|ft| &ft.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &FeatureTypeName> {
        self.feature_types.iter().map(|ft| &ft.name)
    }

    pub fn len(&self) -> usize {
        self.feature_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_types.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType {
    Point,
    MultiPoint,
    Polyline,
    Polygon,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Double,
    Date,
    Boolean,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerStyle {
    Marker { color: Rgba, size: f32 },
    Stroke { color: Rgba, width: f32 },
    Fill { color: Rgba, outline: Rgba, outline_width: f32 },
}

impl LayerStyle {
    pub fn for_geometry(geometry_type: GeometryType) -> Self {
        let accent = Rgba(0, 121, 193, 255);
        match geometry_type {
            GeometryType::Point | GeometryType::MultiPoint => Self::Marker {
                color: accent,
                size: 6.0,
            },
            GeometryType::Polyline => Self::Stroke {
                color: accent,
                width: 1.5,
            },
            GeometryType::Polygon | GeometryType::Unknown => Self::Fill {
                color: Rgba(0, 121, 193, 64),
                outline: accent,
                outline_width: 1.0,
            },
        }
    }
}

/// Ready-to-issue GeoJSON GetFeature request for the layer's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSource {
    pub get_feature_url: Url,
    pub output_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub name: FeatureTypeName,
    pub title: String,
    pub source: LayerSource,
    pub geometry_field: String,
    pub geometry_type: GeometryType,
    pub fields: Vec<FieldDescriptor>,
    pub extent: BoundingBox,
    pub spatial_reference: String,
    pub style: LayerStyle,
}
