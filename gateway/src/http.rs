//! reqwest-backed [`Gateway`] implementation.

use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use wrangle_types::{Dataset, Suggestion};

use crate::wire::{
    ApplyRequest, SuggestionsResponse, TableResponse, UploadResponse, content_disposition_filename,
};
use crate::{Endpoint, ExportedFile, Gateway, GatewayConfig, GatewayError, UploadFile, UploadReceipt};

// reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Talks to the backend over HTTP. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = client_builder(&config)
            .build()
            .map_err(|e| GatewayError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(endpoint, &e))?;
        let status = response.status();
        debug!(endpoint = endpoint.path(), status = status.as_u16(), "backend response");
        if status.is_success() {
            return Ok(response);
        }
        let body = read_capped_error_body(response).await;
        Err(GatewayError::from_status(endpoint, status, &body))
    }

    async fn read_json<T: DeserializeOwned>(
        endpoint: Endpoint,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::from_reqwest(endpoint, &e))?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::malformed(endpoint, &e))
    }

    async fn fetch_table(
        &self,
        endpoint: Endpoint,
        request: reqwest::RequestBuilder,
    ) -> Result<Dataset, GatewayError> {
        let response = self.send(endpoint, request).await?;
        let table: TableResponse = Self::read_json(endpoint, response).await?;
        let (dataset, repair) = Dataset::normalized(table.columns, table.data);
        if repair.derived {
            debug!(endpoint = endpoint.path(), "Backend sent no column list; derived from records");
        } else if !repair.is_clean() {
            warn!(
                endpoint = endpoint.path(),
                added = ?repair.added_columns,
                "Backend table schema was inconsistent; normalized"
            );
        }
        Ok(dataset)
    }
}

fn client_builder(config: &GatewayConfig) -> reqwest::ClientBuilder {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("wrangle/", env!("CARGO_PKG_VERSION"))),
    );

    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(std::time::Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(std::time::Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

/// Read at most 32 KiB of an error response body.
pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

impl Gateway for HttpGateway {
    async fn upload_file(&self, file: UploadFile) -> Result<UploadReceipt, GatewayError> {
        let endpoint = Endpoint::Upload;
        let (file_name, format, bytes) = file.into_parts();
        debug!(file = %file_name, bytes = bytes.len(), format = format.as_str(), "uploading");

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(format.mime_type())
            .map_err(|e| GatewayError::from_reqwest(endpoint, &e))?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .client
            .post(self.config.url_for(endpoint))
            .multipart(form);

        let response = self.send(endpoint, request).await?;
        let body: UploadResponse = Self::read_json(endpoint, response).await?;
        if !body.success {
            let message = body
                .error
                .or(body.message)
                .unwrap_or_else(|| "upload rejected".to_string());
            return Err(GatewayError::validation(message));
        }
        Ok(UploadReceipt {
            message: body.message,
        })
    }

    async fn fetch_data(&self) -> Result<Dataset, GatewayError> {
        let endpoint = Endpoint::Data;
        let request = self.client.get(self.config.url_for(endpoint));
        self.fetch_table(endpoint, request).await
    }

    async fn fetch_suggestions(&self) -> Result<Vec<Suggestion>, GatewayError> {
        let endpoint = Endpoint::Suggestions;
        let request = self.client.get(self.config.url_for(endpoint));
        let response = self.send(endpoint, request).await?;
        let body: SuggestionsResponse = Self::read_json(endpoint, response).await?;

        let mut suggestions = Vec::with_capacity(body.suggestions.len());
        for payload in body.suggestions {
            match Suggestion::from_payload(payload) {
                Ok(suggestion) => suggestions.push(suggestion),
                Err(e) => warn!("Skipping undecodable suggestion: {e}"),
            }
        }
        Ok(suggestions)
    }

    async fn apply_transformation(&self, suggestion: &Suggestion) -> Result<Dataset, GatewayError> {
        let endpoint = Endpoint::Apply;
        debug!(suggestion = %suggestion.id(), "applying");
        let request = self
            .client
            .post(self.config.url_for(endpoint))
            .json(&ApplyRequest {
                suggestion: suggestion.payload(),
            });
        self.fetch_table(endpoint, request).await
    }

    async fn export_current_data(&self) -> Result<ExportedFile, GatewayError> {
        let endpoint = Endpoint::Export;
        let request = self.client.get(self.config.url_for(endpoint));
        let response = self.send(endpoint, request).await?;
        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(content_disposition_filename);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::from_reqwest(endpoint, &e))?
            .to_vec();
        Ok(ExportedFile { file_name, bytes })
    }
}
