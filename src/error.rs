use std::path::PathBuf;

use serde_json::{Map, Value};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable credential, or the token refresh failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service rejected one of the request fields.
    #[error("{0}")]
    BadQuery(String),

    /// Referenced item, asset or item type does not exist.
    #[error("{0}")]
    MissingResource(String),

    /// Any other non-success status. The body is kept verbatim.
    #[error("API request failed: HTTP {status}\n{body}")]
    Transport { status: u16, body: String },

    #[error("could not connect: {0}")]
    Http(#[from] reqwest::Error),

    #[error("secret file {} does not exist", .0.display())]
    SecretNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse API JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Error payload returned by the Data API:
/// `{"general": [{"message": ...}], "field": {"<name>": [{"message": ...}]}}`.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) general: Vec<ApiErrorEntry>,
    // Map keeps server order, so "first field" is stable.
    #[serde(default)]
    pub(crate) field: Map<String, Value>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorEntry {
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl ApiErrorBody {
    fn first_field_message(&self) -> Option<String> {
        let (_, entries) = self.field.iter().next()?;
        let entries: Vec<ApiErrorEntry> = serde_json::from_value(entries.clone()).ok()?;
        entries.into_iter().next()?.message
    }

    fn first_general_message(&self) -> Option<String> {
        self.general.iter().find_map(|e| e.message.clone())
    }
}

/// Classifies a response. Returns `None` for 2xx.
///
/// The same status and body always produce the same variant and message.
pub fn translate(status: u16, body: &str) -> Option<Error> {
    if (200..300).contains(&status) {
        return None;
    }

    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();

    if status == 401 || status == 403 {
        let msg = parsed
            .as_ref()
            .and_then(ApiErrorBody::first_general_message)
            .unwrap_or_else(|| body.to_string());
        return Some(Error::Auth(msg));
    }

    if (400..500).contains(&status) {
        if let Some(parsed) = &parsed {
            if let Some(msg) = parsed.first_field_message() {
                return Some(Error::BadQuery(msg));
            }
            if let Some(msg) = parsed.first_general_message() {
                return Some(Error::MissingResource(msg));
            }
        }
    }

    Some(Error::Transport {
        status,
        body: body.to_string(),
    })
}
