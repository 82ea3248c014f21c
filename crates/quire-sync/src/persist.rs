//! Document persistence API: wire types shared with the server, plus an
//! HTTP client for native hosts.
//!
//! Saves are optimistic: the request carries the version the editor last
//! loaded, and the server refuses with `ERRCODE_VERSION_CONFLICT` when
//! someone saved in between. Resending with `cover` set overwrites anyway.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Save succeeded.
pub const ERRCODE_OK: i64 = 0;
/// Document does not exist.
pub const ERRCODE_NOT_FOUND: i64 = 6003;
/// Stored version is newer than the one the save was based on.
pub const ERRCODE_VERSION_CONFLICT: i64 = 6005;

/// A stored document as returned by `GET /api/documents/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: i64,
    pub doc_name: SmolStr,
    pub markdown: String,
    pub version: i64,
}

/// Body of `POST /api/documents/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub markdown: String,
    /// Version the edit was based on.
    pub version: i64,
    /// Overwrite even if the stored version moved on.
    #[serde(default)]
    pub cover: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDocument {
    pub doc_id: i64,
    pub version: i64,
}

/// Reply to a save.
///
/// On conflict `data` carries the version currently stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub errcode: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<SavedDocument>,
}

impl SaveResponse {
    pub fn ok(saved: SavedDocument) -> Self {
        Self {
            errcode: ERRCODE_OK,
            message: "ok".into(),
            data: Some(saved),
        }
    }

    pub fn conflict(current: SavedDocument) -> Self {
        Self {
            errcode: ERRCODE_VERSION_CONFLICT,
            message: "document has been modified since it was loaded".into(),
            data: Some(current),
        }
    }

    pub fn not_found() -> Self {
        Self {
            errcode: ERRCODE_NOT_FOUND,
            message: "document does not exist".into(),
            data: None,
        }
    }

    /// Interpret the errcode.
    pub fn into_result(self) -> Result<SavedDocument, PersistError> {
        match (self.errcode, self.data) {
            (ERRCODE_OK, Some(saved)) => Ok(saved),
            (ERRCODE_VERSION_CONFLICT, data) => Err(PersistError::Conflict {
                current_version: data.map(|d| d.version),
            }),
            (ERRCODE_NOT_FOUND, _) => Err(PersistError::NotFound),
            (errcode, _) => Err(PersistError::Server {
                errcode,
                message: self.message,
            }),
        }
    }
}

/// Errors from the persistence API.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PersistError {
    #[error("http request failed: {0}")]
    Http(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Someone else saved first. Retry with `cover` to overwrite.
    #[error("version conflict (stored version {current_version:?})")]
    Conflict { current_version: Option<i64> },

    #[error("document not found")]
    NotFound,

    #[error("server error {errcode}: {message}")]
    Server { errcode: i64, message: String },
}

#[cfg(feature = "native")]
impl From<reqwest::Error> for PersistError {
    fn from(e: reqwest::Error) -> Self {
        PersistError::Http(e.to_string())
    }
}

#[cfg(feature = "native")]
pub use client::DocumentClient;

#[cfg(feature = "native")]
mod client {
    use reqwest::StatusCode;
    use tracing::debug;
    use url::Url;

    use super::*;

    /// HTTP client for the document endpoints.
    #[derive(Debug, Clone)]
    pub struct DocumentClient {
        http: reqwest::Client,
        base: Url,
    }

    impl DocumentClient {
        pub fn new(base: Url) -> Self {
            Self::with_client(reqwest::Client::new(), base)
        }

        pub fn with_client(http: reqwest::Client, base: Url) -> Self {
            Self { http, base }
        }

        fn document_url(&self, doc_id: i64) -> Result<Url, PersistError> {
            Ok(self.base.join(&format!("/api/documents/{doc_id}"))?)
        }

        pub async fn fetch(&self, doc_id: i64) -> Result<DocumentRecord, PersistError> {
            let response = self.http.get(self.document_url(doc_id)?).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(PersistError::NotFound);
            }
            let record = response.error_for_status()?.json().await?;
            Ok(record)
        }

        /// Save, returning the new stored version.
        pub async fn save(
            &self,
            doc_id: i64,
            request: &SaveRequest,
        ) -> Result<SavedDocument, PersistError> {
            let response = self
                .http
                .post(self.document_url(doc_id)?)
                .json(request)
                .send()
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(PersistError::NotFound);
            }
            let reply: SaveResponse = response.json().await?;
            debug!(doc_id, errcode = reply.errcode, "save reply");
            reply.into_result()
        }
    }
}
