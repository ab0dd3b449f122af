use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use futures::{Stream, TryStreamExt};
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::config::ClientConfig;
use crate::download::download_to;
use crate::error::{Error, Result};
use crate::http::{Method, Request};
use crate::models::{Asset, Assets, Feature, decode_assets, decode_features};
use crate::paging::paginate;
use crate::session::Session;
use crate::util::normalize_base_url;

const DATA_PATH: &str = "data/v1/";

/// Largest page size the service accepts.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Sort orders accepted by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    AcquiredAsc,
    AcquiredDesc,
    PublishedAsc,
    PublishedDesc,
}

impl Sort {
    pub const ALL: [Sort; 4] = [
        Sort::AcquiredAsc,
        Sort::AcquiredDesc,
        Sort::PublishedAsc,
        Sort::PublishedDesc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Sort::AcquiredAsc => "acquired asc",
            Sort::AcquiredDesc => "acquired desc",
            Sort::PublishedAsc => "published asc",
            Sort::PublishedDesc => "published desc",
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        Sort::ALL
            .into_iter()
            .find(|sort| sort.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown sort order '{s}', expected one of: {}",
                    Sort::ALL.map(Sort::as_str).join(", ")
                ))
            })
    }
}

/// Structured item search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Filter tree, e.g. `{"type": "RangeFilter", "field_name": "cloud_cover", ...}`.
    pub filter: Value,
    pub item_types: Vec<String>,
    pub name: Option<String>,
    pub page_size: Option<u32>,
    pub sort: Option<Sort>,
    /// Strictly remove false positives from geo intersection.
    pub strict: Option<bool>,
}

impl SearchRequest {
    pub fn new<I, S>(filter: Value, item_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filter,
            item_types: item_types.into_iter().map(Into::into).collect(),
            name: None,
            page_size: None,
            sort: None,
            strict: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.item_types.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one item type is required".to_string(),
            ));
        }
        if let Some(size) = self.page_size {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(Error::InvalidArgument(format!(
                    "page_size must be between 1 and {MAX_PAGE_SIZE}, got {size}"
                )));
            }
        }
        Ok(())
    }

    pub fn body(&self) -> Value {
        let mut body = json!({
            "filter": self.filter,
            "item_types": self.item_types,
        });
        if let Some(name) = &self.name {
            body["name"] = json!(name);
        }
        body
    }

    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(size) = self.page_size {
            params.push(("_page_size".to_string(), size.to_string()));
        }
        if let Some(sort) = self.sort {
            params.push(("_sort".to_string(), sort.as_str().to_string()));
        }
        if let Some(strict) = self.strict {
            params.push(("strict".to_string(), strict.to_string()));
        }
        params
    }
}

/// Async access to the Data API.
///
/// ```no_run
/// use futures::TryStreamExt;
/// use planetapi::{DataClient, SearchRequest};
/// use serde_json::json;
///
/// # async fn run() -> planetapi::Result<()> {
/// let client = DataClient::from_env().await?;
/// let filter = json!({"type": "RangeFilter", "field_name": "cloud_cover", "config": {"lt": 0.2}});
/// let search = SearchRequest::new(filter, ["PSScene"]);
/// let mut features = Box::pin(client.quick_search(&search, Some(10))?);
/// while let Some(feature) = features.try_next().await? {
///     println!("{}", feature.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DataClient {
    session: Session,
    base_url: String,
    progress: bool,
}

impl DataClient {
    /// Creates a client from the default configuration, taking the credential
    /// from `PL_API_KEY` or the secret file.
    pub async fn from_env() -> Result<Self> {
        Self::connect(&ClientConfig::default(), None).await
    }

    /// Creates a client using (in order of precedence):
    /// - the explicit `key` argument
    /// - the environment variable named by `config.auth.env_var`
    /// - the secret file at `config.auth.secret_path`
    pub async fn connect(config: &ClientConfig, key: Option<&str>) -> Result<Self> {
        let session = Session::new(config, key).await?;
        Ok(Self::new(session, &config.base_url).with_progress(config.progress))
    }

    pub fn new(session: Session, base_url: &str) -> Self {
        Self {
            session,
            base_url: normalize_base_url(base_url),
            progress: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
        params: Vec<(String, String)>,
    ) -> Request {
        Request::build(&self.base_url, &format!("{DATA_PATH}{path}"), method, body, params)
    }

    /// Runs a structured item search and streams matching features across
    /// all result pages, stopping after `limit` features when set.
    pub fn quick_search(
        &self,
        search: &SearchRequest,
        limit: Option<usize>,
    ) -> Result<impl Stream<Item = Result<Feature>> + Send + 'static + use<>> {
        search.validate()?;
        let request = self.request(
            "quick-search",
            Method::Post,
            Some(search.body()),
            search.params(),
        );
        Ok(paginate(self.session.clone(), request, decode_features, limit))
    }

    /// [`quick_search`](Self::quick_search), gathered into a `Vec`.
    pub async fn quick_search_collect(
        &self,
        search: &SearchRequest,
        limit: Option<usize>,
    ) -> Result<Vec<Feature>> {
        self.quick_search(search, limit)?.try_collect().await
    }

    #[instrument(skip(self))]
    pub async fn list_item_assets(&self, item_type: &str, item_id: &str) -> Result<Assets> {
        let path = format!("item-types/{item_type}/items/{item_id}/assets/");
        let response = self
            .session
            .execute(self.request(&path, Method::Get, None, Vec::new()))
            .await?;
        decode_assets(&response.body)
    }

    pub async fn get_asset(&self, item_type: &str, item_id: &str, asset_type: &str) -> Result<Asset> {
        let mut assets = self.list_item_assets(item_type, item_id).await?;
        assets.remove(asset_type).ok_or_else(|| {
            Error::MissingResource(format!(
                "asset type {asset_type} is not available for item {item_id}"
            ))
        })
    }

    /// Downloads an active asset into `directory` and returns the file path.
    pub async fn download_asset(&self, asset: &Asset, directory: &Path) -> Result<PathBuf> {
        if !asset.is_active() {
            return Err(Error::InvalidArgument(format!(
                "asset is not active (status: {})",
                asset.status
            )));
        }
        let location = asset.location.as_deref().ok_or_else(|| {
            Error::InvalidArgument("active asset has no download location".to_string())
        })?;

        let path = download_to(
            self.session.http(),
            self.session.credential(),
            location,
            directory,
            self.progress,
        )
        .await?;
        info!(path = %path.display(), "asset downloaded");
        Ok(path)
    }
}
