use crate::config::settings::{Credentials, Settings};
use crate::domain::ports::IndexSink;
use crate::utils::error::{PusherError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const NDJSON: &str = "application/x-ndjson";
const JSON: &str = "application/json";

/// `IndexSink` backed by the Elasticsearch REST API.
#[derive(Debug, Clone)]
pub struct ElasticSink {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        #[serde(rename = "type")]
        error_type: String,
        reason: Option<String>,
    },
    Message(String),
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

impl ElasticSink {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds()))
            .danger_accept_invalid_certs(settings.insecure_skip_verify)
            .build()?;

        if settings.insecure_skip_verify {
            tracing::warn!("TLS certificate verification is disabled");
        }

        let base_url = Url::parse(&settings.elk_host).map_err(|e| {
            PusherError::InvalidConfigValueError {
                field: "elk_host".to_string(),
                value: settings.elk_host.clone(),
                reason: format!("Invalid URL format: {}", e),
            }
        })?;

        Ok(Self {
            client,
            base_url,
            credentials: settings.credentials(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Appends percent-encoded path segments to the server URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PusherError::ConfigError {
                message: format!("{} cannot be used as a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::None => request,
            Credentials::Basic { username, password } => {
                request.basic_auth(username, password.as_ref())
            }
            Credentials::ApiKey(key) => request.header("Authorization", format!("ApiKey {}", key)),
        }
    }

    /// Turns a non-2xx response into a `SinkError` built from the store's
    /// `{"error": {"type", "reason"}}` envelope.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (error_type, reason) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(ErrorEnvelope {
                error: ErrorBody::Detailed { error_type, reason },
            }) => (error_type, reason.unwrap_or_default()),
            Ok(ErrorEnvelope {
                error: ErrorBody::Message(message),
            }) => ("error".to_string(), message),
            Err(_) => (
                status.canonical_reason().unwrap_or("error").to_string(),
                body,
            ),
        };

        Err(PusherError::SinkError {
            status: status.as_u16(),
            error_type,
            reason,
        })
    }
}

#[async_trait]
impl IndexSink for ElasticSink {
    async fn create_document(&self, index: &str, body: Vec<u8>) -> Result<()> {
        let id = uuid::Uuid::new_v4();
        let url = self.endpoint(&[index, "_create", &id.to_string()])?;
        tracing::debug!("Creating document {} in index {}", id, index);

        let request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, JSON)
            .body(body);
        let response = self.authorize(request).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn bulk_write(&self, index: &str, framed_body: Vec<u8>) -> Result<()> {
        let url = self.endpoint(&[index, "_bulk"])?;
        tracing::debug!("Sending bulk request ({} bytes) to {}", framed_body.len(), url);

        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, NDJSON)
            .body(framed_body);
        let response = Self::check(self.authorize(request).send().await?).await?;

        // Item failures come back with a 200; report them without failing the push.
        if let Ok(summary) = response.json::<BulkResponse>().await {
            if summary.errors {
                let failed = summary
                    .items
                    .iter()
                    .filter(|item| {
                        item.as_object()
                            .and_then(|actions| actions.values().next())
                            .and_then(|result| result.get("error"))
                            .is_some()
                    })
                    .count();
                tracing::warn!(
                    "{} of {} bulk items were rejected by index {}",
                    failed,
                    summary.items.len(),
                    index
                );
            }
        }
        Ok(())
    }

    async fn create_index(&self, index: &str, mapping: &str) -> Result<()> {
        let url = self.endpoint(&[index])?;
        let request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, JSON)
            .body(mapping.to_string());
        let response = self.authorize(request).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
