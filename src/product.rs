use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::util::{product_download_url, sanitize_file_name};

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Catalogue UUID, used to build the download URL.
    pub id: String,
    /// Product name, e.g. `S2A_MSIL2A_20230105T101401_N0509_R022_T32TQM_20230105T125541.SAFE`.
    pub name: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub online: Option<bool>,
    pub origin_date: Option<DateTime<Utc>>,
    pub publication_date: Option<DateTime<Utc>>,
    /// Acquisition start.
    pub content_start: Option<DateTime<Utc>>,
    /// Acquisition end.
    pub content_end: Option<DateTime<Utc>>,
    /// Footprint as WKT, without the `geography'SRID=4326;...'` wrapper.
    pub footprint: Option<String>,
    /// Expanded product attributes (`cloudCover`, `tileId`, ...).
    pub attributes: BTreeMap<String, Value>,
    pub download_url: String,
}

impl Product {
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// File name used when the product is downloaded into a directory.
    pub fn file_name(&self) -> String {
        let stem = if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        };
        let stem = sanitize_file_name(stem);
        if stem.to_ascii_lowercase().ends_with(".zip") {
            stem
        } else {
            format!("{}.zip", stem)
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ProductPage {
    #[serde(default)]
    pub(crate) value: Vec<ODataProduct>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ODataProduct {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    content_length: Option<u64>,
    #[serde(default)]
    online: Option<bool>,
    #[serde(default)]
    origin_date: Option<DateTime<Utc>>,
    #[serde(default)]
    publication_date: Option<DateTime<Utc>>,
    #[serde(default)]
    content_date: Option<ODataContentDate>,
    #[serde(default)]
    footprint: Option<String>,
    #[serde(default)]
    attributes: Vec<ODataAttribute>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ODataContentDate {
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ODataAttribute {
    name: String,
    #[serde(default)]
    value: Value,
}

impl ODataProduct {
    pub(crate) fn into_product(self, download_base: &str) -> Product {
        let (content_start, content_end) = match self.content_date {
            Some(d) => (d.start, d.end),
            None => (None, None),
        };
        Product {
            download_url: product_download_url(download_base, &self.id),
            footprint: self.footprint.as_deref().map(strip_geography),
            attributes: self
                .attributes
                .into_iter()
                .map(|a| (a.name, a.value))
                .collect(),
            id: self.id,
            name: self.name,
            content_type: self.content_type,
            content_length: self.content_length,
            online: self.online,
            origin_date: self.origin_date,
            publication_date: self.publication_date,
            content_start,
            content_end,
        }
    }
}

/// `geography'SRID=4326;POLYGON ((...))'` -> `POLYGON ((...))`
fn strip_geography(raw: &str) -> String {
    let s = raw.trim();
    let s = s
        .strip_prefix("geography'")
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(s);
    match s.split_once(';') {
        Some((srid, wkt)) if srid.starts_with("SRID=") => wkt.trim().to_string(),
        _ => s.to_string(),
    }
}
