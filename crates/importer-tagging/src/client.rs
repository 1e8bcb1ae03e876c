//! HTTP implementation of [`TagIndex`]

use crate::error::TaggingError;
use crate::wire::{GetResourcesInput, GetResourcesOutput, ServiceFault};
use async_trait::async_trait;
use importer_core::{GetResourcesPage, GetResourcesRequest, IndexError, TagIndex, TaggingConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, warn};

/// `X-Amz-Target` value of the `GetResources` operation
pub const GET_RESOURCES_TARGET: &str = "ResourceGroupsTaggingAPI_20170126.GetResources";

/// Content type of the JSON 1.1 protocol
pub const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

const TARGET_HEADER: &str = "x-amz-target";

/// Tag index served over the Resource Groups Tagging JSON protocol
///
/// Requests are sent unsigned; point `endpoint` at a signing proxy or a
/// compatible service, and use configured headers for any credentials it
/// expects.
#[derive(Debug, Clone)]
pub struct HttpTagIndex {
    http_client: Client,
    endpoint: String,
}

impl HttpTagIndex {
    /// Build a client from configuration
    ///
    /// # Errors
    /// [`TaggingError::InvalidHeader`] for unusable configured headers,
    /// [`TaggingError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &TaggingConfig) -> Result<Self, TaggingError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON_CONTENT_TYPE));
        headers.insert(TARGET_HEADER, HeaderValue::from_static(GET_RESOURCES_TARGET));

        // Add custom headers
        for (name, value) in &config.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| TaggingError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| TaggingError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: config.resolved_endpoint(),
        })
    }

    /// URL requests are posted to
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch one page
    ///
    /// # Errors
    /// Any [`TaggingError`]; nothing is retried.
    pub async fn fetch(&self, request: &GetResourcesRequest) -> Result<GetResourcesPage, TaggingError> {
        let body = serde_json::to_vec(&GetResourcesInput::from(request))?;
        debug!(
            endpoint = %self.endpoint,
            filters = request.tag_filters.len(),
            token = request.pagination_token.as_deref().unwrap_or(""),
            "sending GetResources"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let fault: ServiceFault = serde_json::from_str(&text).unwrap_or_default();
            warn!(status = status.as_u16(), code = fault.code(), "GetResources rejected");
            return Err(TaggingError::Service {
                status: status.as_u16(),
                code: fault.code().to_string(),
                message: if fault.message.is_empty() {
                    text
                } else {
                    fault.message
                },
            });
        }

        let output: GetResourcesOutput = serde_json::from_str(&text)?;
        Ok(output.into())
    }
}

#[async_trait]
impl TagIndex for HttpTagIndex {
    async fn get_resources(
        &self,
        request: &GetResourcesRequest,
    ) -> Result<GetResourcesPage, IndexError> {
        self.fetch(request)
            .await
            .map_err(|e| IndexError::with_source(e.to_string(), e))
    }
}
