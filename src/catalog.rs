use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::error::KiraError;
use crate::table::Table;

/// Source of published datasets. Every dataset, the catalog itself included,
/// comes back as one full table; filtering happens locally.
pub trait CatalogClient: Send + Sync {
    fn fetch_table(&self, dataset_id: &str, version: &str) -> Result<Table, KiraError>;
}

impl<T: CatalogClient + ?Sized> CatalogClient for Arc<T> {
    fn fetch_table(&self, dataset_id: &str, version: &str) -> Result<Table, KiraError> {
        (**self).fetch_table(dataset_id, version)
    }
}

#[derive(Clone)]
pub struct EdelweissHttpClient {
    client: Client,
    base_url: String,
    page_size: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataQuery {
    condition: Option<Value>,
    aggregation_filters: serde_json::Map<String, Value>,
    order_by: Vec<Value>,
    ascending: Option<bool>,
    limit: usize,
    offset: usize,
}

impl EdelweissHttpClient {
    pub fn new(base_url: &str, page_size: usize) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-tox/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::CatalogHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| KiraError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        })
    }

    fn dataset_url(&self, dataset_id: &str, version: &str) -> String {
        format!("{}/datasets/{dataset_id}/versions/{version}", self.base_url)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(KiraError::CatalogStatus { status, message })
    }

    fn fetch_page(&self, url: &str, offset: usize) -> Result<Value, KiraError> {
        let query = DataQuery {
            condition: None,
            aggregation_filters: serde_json::Map::new(),
            order_by: Vec::new(),
            ascending: None,
            limit: self.page_size,
            offset,
        };
        let response = self
            .client
            .post(format!("{url}/data"))
            .json(&query)
            .send()
            .map_err(|err| KiraError::CatalogHttp(err.to_string()))?;
        Self::handle_status(response)?
            .json()
            .map_err(|err| KiraError::CatalogResponse(err.to_string()))
    }
}

impl CatalogClient for EdelweissHttpClient {
    fn fetch_table(&self, dataset_id: &str, version: &str) -> Result<Table, KiraError> {
        let url = self.dataset_url(dataset_id, version);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| KiraError::CatalogHttp(err.to_string()))?;
        let metadata: Value = Self::handle_status(response)?
            .json()
            .map_err(|err| KiraError::CatalogResponse(err.to_string()))?;

        let mut pages = Vec::new();
        let mut offset = 0usize;
        loop {
            let page = self.fetch_page(&url, offset)?;
            let (rows, total) = page_rows(&page)?;
            let received = rows.len();
            pages.extend(rows.iter().cloned());
            offset += received;
            if received == 0 || total.map(|total| offset >= total).unwrap_or(true) {
                break;
            }
        }

        table_from_rows(&schema_columns(&metadata), &pages)
    }
}

/// Column order declared by the dataset's schema, if any.
pub fn schema_columns(metadata: &Value) -> Vec<String> {
    metadata
        .pointer("/schema/columns")
        .and_then(Value::as_array)
        .map(|columns| {
            columns
                .iter()
                .filter_map(|column| column.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn page_rows(page: &Value) -> Result<(&Vec<Value>, Option<usize>), KiraError> {
    let rows = page
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| KiraError::CatalogResponse("missing results array".to_string()))?;
    let total = page
        .get("total")
        .and_then(Value::as_u64)
        .map(|total| total as usize);
    Ok((rows, total))
}

/// Flattens catalog rows (`{"data": {column: value}}` or bare objects) into a
/// table. Columns missing from `columns` are appended in first-seen order.
pub fn table_from_rows(columns: &[String], rows: &[Value]) -> Result<Table, KiraError> {
    let mut names = columns.to_vec();
    let mut objects = Vec::with_capacity(rows.len());
    for row in rows {
        let object = row
            .get("data")
            .unwrap_or(row)
            .as_object()
            .ok_or_else(|| KiraError::CatalogResponse("row is not an object".to_string()))?;
        for key in object.keys() {
            if !names.iter().any(|name| name == key) {
                names.push(key.clone());
            }
        }
        objects.push(object);
    }

    let mut table = Table::new(names);
    for object in objects {
        let row = table
            .columns
            .iter()
            .map(|column| object.get(column).map(cell_text).unwrap_or_default())
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
