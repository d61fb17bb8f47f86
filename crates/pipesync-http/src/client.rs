//! Pipeline store HTTP client.
//!
//! One deliberate twist: a 409 on save is a negotiation outcome, not an
//! error. It parses into [`SaveOutcome::Conflict`] and comes back as `Ok`,
//! so callers only see `Err` for conditions worth retrying.

use pipesync_core::{DocumentSummary, Operation, PipelineDocument, SaveOptions, SaveOutcome};
use reqwest::{
  StatusCode,
  header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue}
};
use tracing::{debug, error, trace};

use crate::models::{ConflictBody, CreateRequest, ErrorBody, ListResponse, SavePayload, SaveResponse};

/// Pipeline store HTTP client.
pub struct Client {
  /// reqwest HTTP client.
  c: reqwest::Client,
  /// Base URL (without trailing `/`).
  base: String
}

impl Client {
  /// Creates a store client.
  ///
  /// # Errors
  ///
  /// Returns an error if `base_url` is empty, a provided token is empty,
  /// or the HTTP client cannot be built.
  pub fn new(base_url: &str, auth_token: Option<&str>) -> anyhow::Result<Self> {
    if base_url.trim().is_empty() {
      anyhow::bail!("base_url must not be empty");
    }

    let mut h = HeaderMap::new();
    if let Some(token) = auth_token {
      if token.trim().is_empty() {
        anyhow::bail!("auth_token must not be empty when provided");
      }
      h.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))
          .map_err(|e| anyhow::anyhow!("invalid auth_token: {e}"))?
      );
    }
    h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(Self {
      c: reqwest::Client::builder()
        .default_headers(h)
        .no_proxy()
        .build()?,
      base: base_url.trim_end_matches('/').to_string()
    })
  }

  /// Creates a pipeline document.
  ///
  /// # Errors
  ///
  /// Returns a network/HTTP/deserialization error.
  pub async fn create_pipeline(
    &self,
    name: &str,
    description: &str
  ) -> anyhow::Result<PipelineDocument> {
    self
      .get_json(
        self
          .c
          .post(format!("{}/api/v1/pipelines", self.base))
          .json(&CreateRequest {
            name: name.to_string(),
            description: description.to_string(),
            nodes: Vec::new(),
            edges: Vec::new()
          })
      )
      .await
  }

  /// Reads a pipeline document by id.
  ///
  /// # Errors
  ///
  /// Returns a network/HTTP/deserialization error.
  pub async fn get_pipeline(&self, id: &str) -> anyhow::Result<PipelineDocument> {
    self
      .get_json(self.c.get(format!("{}/api/v1/pipelines/{id}", self.base)))
      .await
  }

  /// Lists pipeline documents (newest first, as served).
  ///
  /// # Errors
  ///
  /// Returns a network/HTTP/deserialization error.
  pub async fn list_pipelines(&self) -> anyhow::Result<Vec<DocumentSummary>> {
    let listing: ListResponse = self
      .get_json(self.c.get(format!("{}/api/v1/pipelines", self.base)))
      .await?;
    Ok(listing.into_items())
  }

  /// Saves a full document snapshot under optimistic concurrency.
  ///
  /// `base_updated_at` rides in the query string; the server compares it
  /// against its stored token unless `force` is set.
  ///
  /// # Errors
  ///
  /// Returns a network/HTTP/deserialization error. A version conflict is
  /// NOT an error; it is `Ok(SaveOutcome::Conflict { .. })`.
  pub async fn save_pipeline(
    &self,
    id: &str,
    document: &PipelineDocument,
    options: &SaveOptions
  ) -> anyhow::Result<SaveOutcome> {
    let (status, body) = self
      .exec(
        self
          .c
          .put(format!("{}/api/v1/pipelines/{id}", self.base))
          .query(&[
            ("autosave", options.autosave.to_string()),
            ("force", options.force.to_string()),
            ("base_updated_at", options.base_updated_at.clone())
          ])
          .json(&SavePayload::from(document))
      )
      .await?;

    if status.is_success() {
      let confirmed: SaveResponse = serde_json::from_str(&body)
        .map_err(|e| anyhow::anyhow!("deserialization (HTTP {status}): {e}"))?;
      return Ok(SaveOutcome::Saved {
        version: confirmed.version,
        updated_at: confirmed.updated_at
      });
    }

    if status == StatusCode::CONFLICT {
      let conflict: ConflictBody = serde_json::from_str(&body)
        .map_err(|e| anyhow::anyhow!("malformed conflict response: {e}"))?;
      return Ok(SaveOutcome::Conflict {
        current_version: conflict.current_version,
        current_updated_at: conflict.current_updated_at
      });
    }

    Self::check_error_response(status, &body)
  }

  /// Appends an operation batch to a pipeline's edit journal.
  ///
  /// # Errors
  ///
  /// Returns a network/HTTP error.
  pub async fn append_operations(&self, id: &str, batch: &[Operation]) -> anyhow::Result<()> {
    self
      .send_ok(
        self
          .c
          .post(format!("{}/api/v1/pipelines/{id}/ops", self.base))
          .json(&batch)
      )
      .await
  }

  /// Execute a request, logging method/latency/size, and return the raw
  /// status and body.
  async fn exec(&self, r: reqwest::RequestBuilder) -> anyhow::Result<(StatusCode, String)> {
    let rq = r
      .try_clone()
      .ok_or_else(|| anyhow::anyhow!("failed to clone request"))?
      .build()?;

    let start = std::time::Instant::now();
    debug!(method = %rq.method(), url = %rq.url(), "store request");

    let resp = self.c.execute(rq).await?;
    let status = resp.status();
    let body = resp.text().await?;

    debug!(
      status = status.as_u16(),
      ms = start.elapsed().as_millis(),
      bytes = body.len(),
      "store response"
    );

    if tracing::enabled!(tracing::Level::TRACE) {
      let n = 4096usize.min(body.len());
      trace!(status = status.as_u16(), body = %&body[..n], "store response body");
    }

    Ok((status, body))
  }

  /// Execute a request and deserialize the JSON response.
  async fn get_json<T: serde::de::DeserializeOwned>(
    &self,
    r: reqwest::RequestBuilder
  ) -> anyhow::Result<T> {
    let (status, body) = self.exec(r).await?;

    if status.is_success() {
      return serde_json::from_str(&body)
        .map_err(|e| anyhow::anyhow!("deserialization (HTTP {status}): {e}"));
    }

    Self::check_error_response(status, &body)
  }

  /// Execute a request and check status (without deserialization).
  async fn send_ok(&self, r: reqwest::RequestBuilder) -> anyhow::Result<()> {
    let (status, body) = self.exec(r).await?;

    if status.is_success() {
      return Ok(());
    }

    Self::check_error_response(status, &body)
  }

  /// Convert a non-2xx reply to `anyhow::Error`.
  fn check_error_response<T>(status: StatusCode, body: &str) -> anyhow::Result<T> {
    let e: Option<ErrorBody> = serde_json::from_str(body).ok();
    let error_code = e.as_ref().map(|x| x.error_code.as_str());

    error!(status = status.as_u16(), error_code, "store error");

    if status == StatusCode::NOT_FOUND {
      anyhow::bail!("pipeline not found");
    }
    if status == StatusCode::FORBIDDEN {
      anyhow::bail!("access denied");
    }

    anyhow::bail!("HTTP {status}: {body}")
  }
}
