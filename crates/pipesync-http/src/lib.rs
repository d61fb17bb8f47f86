//! pipesync-http — HTTP store backend for `PipeSync`.
//!
//! Implements `pipesync_core::DocumentStore` against the pipeline store
//! REST API under `/api/v1/pipelines`.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod models;

use pipesync_core::{
  DocumentStore, DocumentSummary, Operation, PipelineDocument, SaveOptions, SaveOutcome
};

pub use crate::client::Client;

/// Connection settings for the pipeline store.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
  /// Base URL of the store API.
  pub base_url: String,
  /// Bearer token, if the deployment requires auth.
  pub auth_token: Option<String>
}

/// Build a client from connection settings.
///
/// # Errors
///
/// Returns an error if the settings are invalid.
pub fn connect(config: &StoreConfig) -> anyhow::Result<Client> {
  Client::new(&config.base_url, config.auth_token.as_deref())
}

impl DocumentStore for Client {
  async fn create(&self, name: &str, description: &str) -> anyhow::Result<PipelineDocument> {
    self.create_pipeline(name, description).await
  }

  async fn fetch(&self, id: &str) -> anyhow::Result<PipelineDocument> {
    self.get_pipeline(id).await
  }

  async fn list(&self) -> anyhow::Result<Vec<DocumentSummary>> {
    self.list_pipelines().await
  }

  async fn save(
    &self,
    id: &str,
    document: &PipelineDocument,
    options: &SaveOptions
  ) -> anyhow::Result<SaveOutcome> {
    self.save_pipeline(id, document, options).await
  }

  async fn append_ops(&self, id: &str, batch: &[Operation]) -> anyhow::Result<()> {
    self.append_operations(id, batch).await
  }
}
