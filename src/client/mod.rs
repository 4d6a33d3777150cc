//! Query-execution backends
//!
//! The harness never interprets SQL itself; it hands each query to a
//! `QueryClient` and gets back a `QueryTable` or the backend's diagnostic.
//! The backend is selected once, at configuration-resolution time, by the
//! configuration's `database` field. Adding a warehouse means adding a
//! variant here, nothing else changes.

pub mod bigquery;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TestConfig;
use crate::error::{TdsqlError, TdsqlResult};
use crate::table::QueryTable;

/// Capability to execute one `SELECT` and return its result set
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn select(&self, sql: &str) -> TdsqlResult<QueryTable>;
}

/// Select the backend matching the configuration's `database` value
pub fn get_client(config: &TestConfig) -> TdsqlResult<Arc<dyn QueryClient>> {
    match config.database.as_str() {
        "bigquery" => Ok(Arc::new(bigquery::BigQueryClient::new(config)?)),
        other => Err(TdsqlError::invalid(format!(
            "`{}` is not supported",
            other
        ))),
    }
}
