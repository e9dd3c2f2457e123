use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::multipart::Form;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KiraError;

/// One ranked hit returned by the enrichment service for a gene list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentTerm {
    pub rank: u64,
    pub pathway: String,
    pub p_value: f64,
    pub odds_ratio: f64,
    pub combined_score: f64,
    pub overlapping_genes: Vec<String>,
    pub adjusted_p_value: f64,
}

/// Single-gene enrichment against a named gene-set library. Implementations
/// block until results are available; an input the service refuses must be
/// reported as [`KiraError::EnrichmentRejected`].
pub trait EnrichmentClient: Send + Sync {
    fn enrich(&self, gene: &str, library: &str) -> Result<Vec<EnrichmentTerm>, KiraError>;
    /// Returns the library as GMT text.
    fn download_library(&self, library: &str) -> Result<String, KiraError>;
}

impl<T: EnrichmentClient + ?Sized> EnrichmentClient for Arc<T> {
    fn enrich(&self, gene: &str, library: &str) -> Result<Vec<EnrichmentTerm>, KiraError> {
        (**self).enrich(gene, library)
    }

    fn download_library(&self, library: &str) -> Result<String, KiraError> {
        (**self).download_library(library)
    }
}

#[derive(Clone)]
pub struct EnrichrHttpClient {
    client: Client,
    base_url: String,
    poll_delay: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddListResponse {
    user_list_id: u64,
}

impl EnrichrHttpClient {
    pub fn new(base_url: &str, poll_delay: Duration) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-tox/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::EnrichrHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KiraError::EnrichrHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_delay,
        })
    }

    fn handle_status(
        gene: Option<&str>,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Enrichr request failed".to_string());
        match gene {
            Some(gene) if is_input_rejection(status) => Err(KiraError::EnrichmentRejected {
                gene: gene.to_string(),
                message,
            }),
            _ => Err(KiraError::EnrichrStatus { status, message }),
        }
    }

    fn submit(&self, gene: &str) -> Result<u64, KiraError> {
        let form = Form::new()
            .text("list", gene.to_string())
            .text("description", format!("kira-tox {gene}"));
        let response = self
            .client
            .post(format!("{}/addList", self.base_url))
            .multipart(form)
            .send()
            .map_err(|err| KiraError::EnrichrHttp(err.to_string()))?;
        let added: AddListResponse = Self::handle_status(Some(gene), response)?
            .json()
            .map_err(|err| KiraError::EnrichrResponse(err.to_string()))?;
        Ok(added.user_list_id)
    }

    fn poll(&self, gene: &str, user_list_id: u64, library: &str) -> Result<Value, KiraError> {
        let response = self
            .client
            .get(format!("{}/enrich", self.base_url))
            .query(&[
                ("userListId", user_list_id.to_string()),
                ("backgroundType", library.to_string()),
            ])
            .send()
            .map_err(|err| KiraError::EnrichrHttp(err.to_string()))?;
        Self::handle_status(Some(gene), response)?
            .json()
            .map_err(|err| KiraError::EnrichrResponse(err.to_string()))
    }
}

impl EnrichmentClient for EnrichrHttpClient {
    fn enrich(&self, gene: &str, library: &str) -> Result<Vec<EnrichmentTerm>, KiraError> {
        let user_list_id = self.submit(gene)?;
        // The service needs time to index the list before it can be queried.
        thread::sleep(self.poll_delay);
        let payload = self.poll(gene, user_list_id, library)?;
        parse_enrichment_terms(&payload, library)
    }

    fn download_library(&self, library: &str) -> Result<String, KiraError> {
        let response = self
            .client
            .get(format!("{}/geneSetLibrary", self.base_url))
            .query(&[("mode", "text"), ("libraryName", library)])
            .send()
            .map_err(|err| KiraError::EnrichrHttp(err.to_string()))?;
        Self::handle_status(None, response)?
            .text()
            .map_err(|err| KiraError::EnrichrHttp(err.to_string()))
    }
}

pub fn is_input_rejection(status: u16) -> bool {
    matches!(status, 400 | 422)
}

/// Maps the positional result rows of `payload[library]` onto named terms.
/// Row layout: rank, term, p-value, odds ratio, combined score, overlapping
/// genes, adjusted p-value, old p-value, old adjusted p-value.
pub fn parse_enrichment_terms(
    payload: &Value,
    library: &str,
) -> Result<Vec<EnrichmentTerm>, KiraError> {
    let rows = payload
        .get(library)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            KiraError::EnrichrResponse(format!("library {library} missing from response"))
        })?;

    rows.iter().map(parse_term).collect()
}

fn parse_term(row: &Value) -> Result<EnrichmentTerm, KiraError> {
    let fields = row
        .as_array()
        .ok_or_else(|| KiraError::EnrichrResponse("result row is not an array".to_string()))?;
    let number = |index: usize, name: &str| {
        fields
            .get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| KiraError::EnrichrResponse(format!("result row has no {name}")))
    };

    Ok(EnrichmentTerm {
        rank: fields
            .get(0)
            .and_then(|value| value.as_u64().or_else(|| value.as_f64().map(|v| v as u64)))
            .ok_or_else(|| KiraError::EnrichrResponse("result row has no rank".to_string()))?,
        pathway: fields
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| KiraError::EnrichrResponse("result row has no term".to_string()))?
            .to_string(),
        p_value: number(2, "p-value")?,
        odds_ratio: number(3, "odds ratio")?,
        combined_score: number(4, "combined score")?,
        overlapping_genes: fields
            .get(5)
            .and_then(Value::as_array)
            .map(|genes| {
                genes
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        adjusted_p_value: number(6, "adjusted p-value")?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejection_statuses() {
        assert!(is_input_rejection(400));
        assert!(!is_input_rejection(500));
        assert!(!is_input_rejection(429));
    }

    #[test]
    fn malformed_row_is_an_error() {
        let payload = json!({"Lib": [[1, "Term", "oops"]]});
        assert!(parse_enrichment_terms(&payload, "Lib").is_err());
    }
}
