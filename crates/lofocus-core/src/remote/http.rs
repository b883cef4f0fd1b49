//! HttpRemoteStore: document store over plain HTTP.
//!
//! `GET {base}/{path}` returns the document as a JSON object (404 when
//! absent). `PATCH {base}/{path}` applies a merge write sent as
//! `{"increment": {...}, "set": {...}}`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use url::{ParseError, Url};

use super::{Document, DocumentPath, MergeWrite, RemoteStore};
use crate::error::RemoteError;
use crate::storage::RemoteConfig;

/// Client for a remote document store.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    base: Url,
    token: Option<String>,
    http_client: Client,
}

impl HttpRemoteStore {
    /// Create a client rooted at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let mut base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }
        // join() replaces the last segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base,
            token: token.filter(|t| !t.is_empty()),
            http_client,
        })
    }

    /// Build from the `[remote]` config section; `None` when no base URL is set.
    pub fn from_config(config: &RemoteConfig) -> Result<Option<Self>, RemoteError> {
        match config.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => Self::new(
                url.trim(),
                config.token.clone(),
                Duration::from_secs(config.timeout_secs.max(1)),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Each path segment is appended percent-encoded, so no segment can
    /// add a query, a fragment or a parent step to the URL.
    fn url_for(&self, path: &DocumentPath) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(path.as_str().split('/'));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn send_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() {
        RemoteError::Offline
    } else {
        RemoteError::Network(err)
    }
}

fn status_error(status: StatusCode, path: &DocumentPath) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::PermissionDenied {
            path: path.to_string(),
        },
        other => RemoteError::Status {
            status: other.as_u16(),
            path: path.to_string(),
        },
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn read_document(&self, path: &DocumentPath) -> Result<Option<Document>, RemoteError> {
        let url = self.url_for(path)?;
        let resp = self
            .authorize(self.http_client.get(url))
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, path));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| RemoteError::Malformed {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        match body {
            serde_json::Value::Object(doc) => Ok(Some(doc)),
            serde_json::Value::Null => Ok(None),
            other => Err(RemoteError::Malformed {
                path: path.to_string(),
                message: format!("expected an object, got {other}"),
            }),
        }
    }

    async fn merge_write(&self, path: &DocumentPath, write: &MergeWrite) -> Result<(), RemoteError> {
        let url = self.url_for(path)?;
        let resp = self
            .authorize(self.http_client.patch(url))
            .json(&write.to_wire())
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, path));
        }
        tracing::debug!(path = %path, "merge write accepted");
        Ok(())
    }
}
