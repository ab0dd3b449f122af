use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// One page of a paginated result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Link to the following page. `None` on the last page.
    pub next: Option<String>,
}

/// A search result. Everything except `id` is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// `properties.item_type`, when the service includes it.
    pub fn item_type(&self) -> Option<&str> {
        self.extra.get("properties")?.get("item_type")?.as_str()
    }

    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.extra.get("properties")?.as_object()
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    features: Vec<Feature>,
    #[serde(default, rename = "_links")]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    #[serde(default, rename = "_next")]
    next: Option<String>,
}

/// Decodes a search response body into a page of features.
pub fn decode_features(body: &str) -> Result<Page<Feature>> {
    let page: SearchPage = serde_json::from_str(body)?;
    Ok(Page {
        items: page.features,
        next: page
            .links
            .and_then(|l| l.next)
            .filter(|next| !next.is_empty()),
    })
}

/// Descriptor of one downloadable asset of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub status: String,
    #[serde(default, rename = "type")]
    pub asset_type: Option<String>,
    #[serde(default, rename = "_links")]
    pub links: Map<String, Value>,
    #[serde(default, rename = "_permissions")]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    /// Download URL; only present once the asset is active.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub md5_digest: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Asset {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn can_download(&self) -> bool {
        self.permissions.iter().any(|p| p == "download")
    }

    /// URL that activates the asset, from `_links.activate`.
    pub fn activate_link(&self) -> Option<&str> {
        self.links.get("activate")?.as_str()
    }
}

/// Asset-type name to descriptor.
pub type Assets = BTreeMap<String, Asset>;

pub fn decode_assets(body: &str) -> Result<Assets> {
    Ok(serde_json::from_str(body)?)
}
