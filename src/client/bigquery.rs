//! BigQuery backend
//!
//! Talks to the `jobs.query` REST endpoint. Authentication uses a
//! short-lived OAuth access token from `GOOGLE_OAUTH_ACCESS_TOKEN` (e.g.
//! `gcloud auth print-access-token`); the billing project comes from
//! `GOOGLE_CLOUD_PROJECT`. The configuration's `max_bytes_billed` and
//! `max_results` are forwarded on every job.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::QueryClient;
use crate::config::TestConfig;
use crate::error::{TdsqlError, TdsqlResult};
use crate::table::{CellValue, QueryTable};

/// Environment variable holding the OAuth bearer token
const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Environment variable holding the billing project id
const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Request timeout; BigQuery holds the HTTP connection while the job runs
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub struct BigQueryClient {
    client: Client,
    token: String,
    project: String,
    max_results: i64,
    max_bytes_billed: i64,
}

/// `jobs.query` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    max_results: i64,
    maximum_bytes_billed: String,
    timeout_ms: u64,
}

/// `jobs.query` response body (the fields the harness reads)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableFieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: String,
}

/// Error body on a non-2xx response
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
}

impl BigQueryClient {
    pub fn new(config: &TestConfig) -> TdsqlResult<Self> {
        let token = env::var(TOKEN_ENV).map_err(|_| {
            TdsqlError::invalid(format!("environment variable {} is not set", TOKEN_ENV))
        })?;
        let project = env::var(PROJECT_ENV).map_err(|_| {
            TdsqlError::invalid(format!("environment variable {} is not set", PROJECT_ENV))
        })?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TdsqlError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            token,
            project,
            max_results: config.max_results,
            max_bytes_billed: config.max_bytes_billed,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://bigquery.googleapis.com/bigquery/v2/projects/{}/queries",
            self.project
        )
    }
}

#[async_trait]
impl QueryClient for BigQueryClient {
    async fn select(&self, sql: &str) -> TdsqlResult<QueryTable> {
        let request = QueryRequest {
            query: sql.to_string(),
            use_legacy_sql: false,
            max_results: self.max_results,
            maximum_bytes_billed: self.max_bytes_billed.to_string(),
            timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| TdsqlError::Query {
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope.error.message,
                Err(_) => format!("HTTP {}", status),
            };
            return Err(TdsqlError::Query { message });
        }

        let body: QueryResponse = response.json().await.map_err(|e| TdsqlError::Query {
            message: format!("malformed response: {}", e),
        })?;

        if let Some(err) = body.errors.first() {
            return Err(TdsqlError::Query {
                message: format!("{} ({})", err.message, err.reason),
            });
        }
        if body.job_complete == Some(false) {
            return Err(TdsqlError::Query {
                message: "query did not complete within the request timeout".to_string(),
            });
        }

        let schema = body.schema.ok_or_else(|| TdsqlError::Query {
            message: "response carries no schema".to_string(),
        })?;

        let columns: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
        let mut rows = Vec::with_capacity(body.rows.len());
        for row in &body.rows {
            let mut cells = Vec::with_capacity(schema.fields.len());
            for (field, cell) in schema.fields.iter().zip(row.f.iter()) {
                cells.push(convert_cell(&field.field_type, &cell.v)?);
            }
            rows.push(cells);
        }

        QueryTable::new(columns, rows)
    }
}

/// Convert one wire cell. BigQuery serializes every value as a JSON string;
/// the schema's type decides how to read it.
fn convert_cell(field_type: &str, value: &serde_json::Value) -> TdsqlResult<CellValue> {
    if value.is_null() {
        return Ok(CellValue::Null);
    }
    let text = match value {
        serde_json::Value::String(s) => s.as_str(),
        other => {
            return Err(TdsqlError::Query {
                message: format!("unexpected cell encoding: {}", other),
            });
        }
    };

    let parsed = match field_type {
        "INTEGER" | "INT64" => text.parse::<i64>().ok().map(CellValue::Integer),
        "FLOAT" | "FLOAT64" => text.parse::<f64>().ok().map(CellValue::Float),
        "BOOLEAN" | "BOOL" => match text {
            "true" => Some(CellValue::Boolean(true)),
            "false" => Some(CellValue::Boolean(false)),
            _ => None,
        },
        "DATE" => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(CellValue::Date),
        "DATETIME" => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(CellValue::Timestamp),
        // TIMESTAMP arrives as epoch seconds with a fractional part
        "TIMESTAMP" => text
            .parse::<f64>()
            .ok()
            .and_then(|epoch| DateTime::<Utc>::from_timestamp_millis((epoch * 1000.0) as i64))
            .map(|dt| CellValue::Timestamp(dt.naive_utc())),
        _ => Some(CellValue::String(text.to_string())),
    };

    parsed.ok_or_else(|| TdsqlError::Query {
        message: format!("cannot read `{}` as {}", text, field_type),
    })
}
