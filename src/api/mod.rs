use std::fmt;
use std::future::Future;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{classify_status, RequestError};
use crate::model::{NewNote, Note};

pub mod model;

/// The remote notes REST API as the store sees it.
#[async_trait]
pub trait NotesApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Note>, RequestError>;

    async fn create(&self, note: &NewNote) -> Result<Note, RequestError>;

    async fn update(&self, id: i64, note: &Note) -> Result<Note, RequestError>;

    async fn delete(&self, id: i64) -> Result<(), RequestError>;

    async fn clear(&self) -> Result<(), RequestError>;

    async fn count(&self) -> Result<u64, RequestError>;
}

#[derive(Clone)]
pub struct HttpNotesClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for HttpNotesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpNotesClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpNotesClient {
    pub fn new(base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("notes-sync/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = cfg.base_url().context("invalid api.base_url")?;
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Request, RequestError> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|e| RequestError::Invalid(format!("invalid endpoint {}: {}", path, e)))?;
        let mut builder = self.http.request(method, endpoint);
        if let Some(body) = body {
            builder = builder
                .header("Content-Type", "application/json")
                .json(body);
        }
        builder.build().map_err(RequestError::from)
    }

    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, RequestError> {
        debug!(method = %request.method(), url = %request.url(), "sending notes request");
        let res = self.http.execute(request).await?;

        let status = res.status();
        if !status.is_success() {
            let body = match res.text().await {
                Ok(body) => body,
                Err(err) => {
                    debug!(?err, %status, "failed to read error body; classifying by status");
                    String::new()
                }
            };
            warn!(%status, %body, "notes API error");
            return Err(classify_status(
                status.as_u16(),
                status.canonical_reason(),
                &body,
            ));
        }
        Ok(res)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: reqwest::Request,
    ) -> Result<T, RequestError> {
        let res = self.execute(request).await?;
        let body = res.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| RequestError::Unknown(format!("invalid notes API response: {}", e)))
    }
}

#[async_trait]
impl NotesApi for HttpNotesClient {
    async fn list(&self) -> Result<Vec<Note>, RequestError> {
        let request = self.build_request(Method::GET, "notes", None)?;
        self.execute_json(request).await
    }

    async fn create(&self, note: &NewNote) -> Result<Note, RequestError> {
        let body = to_body(note)?;
        let request = self.build_request(Method::POST, "notes/new", Some(&body))?;
        self.execute_json(request).await
    }

    async fn update(&self, id: i64, note: &Note) -> Result<Note, RequestError> {
        let body = to_body(note)?;
        let request =
            self.build_request(Method::PUT, &format!("notes/{}/update", id), Some(&body))?;
        self.execute_json(request).await
    }

    async fn delete(&self, id: i64) -> Result<(), RequestError> {
        let request = self.build_request(Method::DELETE, &format!("notes/{}/delete", id), None)?;
        self.execute(request).await.map(|_| ())
    }

    async fn clear(&self) -> Result<(), RequestError> {
        let request = self.build_request(Method::DELETE, "notes/clear", None)?;
        self.execute(request).await.map(|_| ())
    }

    async fn count(&self) -> Result<u64, RequestError> {
        let request = self.build_request(Method::GET, "notes/count", None)?;
        self.execute_json(request).await
    }
}

/// Run `request` until it completes or `cancel` fires (sent or dropped).
///
/// Losing the race drops the request future, which aborts the underlying
/// HTTP exchange.
pub async fn abortable<F, T>(request: F, cancel: oneshot::Receiver<()>) -> Result<T, RequestError>
where
    F: Future<Output = Result<T, RequestError>>,
{
    tokio::select! {
        res = request => res,
        _ = cancel => Err(RequestError::Cancelled),
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, RequestError> {
    serde_json::to_value(value)
        .map_err(|e| RequestError::Invalid(format!("failed to encode request body: {}", e)))
}

// `Url::join` replaces the last segment unless the base ends with '/'.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
