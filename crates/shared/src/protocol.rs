//! WFS 2.0 key-value-pair request vocabulary.

use url::Url;

use crate::domain::FeatureTypeName;

pub const WFS_SERVICE: &str = "WFS";
pub const WFS_VERSION: &str = "2.0.0";
pub const DEFAULT_CRS: &str = "urn:ogc:def:crs:EPSG::4326";
pub const GEOJSON_SRS_NAME: &str = "EPSG:4326";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WfsRequest {
    GetCapabilities,
    DescribeFeatureType {
        type_name: FeatureTypeName,
    },
    GetFeature {
        type_name: FeatureTypeName,
        output_format: String,
    },
}

impl WfsRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::GetCapabilities => "GetCapabilities",
            Self::DescribeFeatureType { .. } => "DescribeFeatureType",
            Self::GetFeature { .. } => "GetFeature",
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("SERVICE", WFS_SERVICE.to_string()),
            ("REQUEST", self.operation().to_string()),
            ("VERSION", WFS_VERSION.to_string()),
        ];
        match self {
            Self::GetCapabilities => {}
            Self::DescribeFeatureType { type_name } => {
                // TYPENAME is the pre-2.0 spelling; some servers still only read it.
                params.push(("TYPENAMES", type_name.to_string()));
                params.push(("TYPENAME", type_name.to_string()));
            }
            Self::GetFeature {
                type_name,
                output_format,
            } => {
                params.push(("TYPENAMES", type_name.to_string()));
                params.push(("OUTPUTFORMAT", output_format.clone()));
                params.push(("SRSNAME", GEOJSON_SRS_NAME.to_string()));
            }
        }
        params
    }

    /// Builds the request URL on `base`, keeping vendor parameters already present on it.
    pub fn to_url(&self, base: &Url) -> Url {
        let params = self.params();
        let retained: Vec<(String, String)> = base
            .query_pairs()
            .filter(|(key, _)| !params.iter().any(|(name, _)| name.eq_ignore_ascii_case(key)))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let mut url = base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (key, value) in &retained {
                pairs.append_pair(key, value);
            }
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

pub fn is_geojson_format(format: &str) -> bool {
    format.to_ascii_lowercase().contains("json")
}
