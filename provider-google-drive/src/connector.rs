//! Google Drive API connector implementation
//!
//! Implements the `RemoteStore` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpStreamResponse};
use bridge_traits::remote::{AccessTokenProvider, ByteRange, RemoteResponse, RemoteStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

const STATUS_UNAUTHORIZED: u16 = 401;

/// Google Drive API connector
///
/// Implements `RemoteStore` for Google Drive API v3 media downloads.
///
/// # Features
///
/// - Streaming `files/{id}?alt=media` downloads
/// - `Range` forwarding (bounded, open-ended and suffix forms)
/// - One forced token refresh and retry after a `401`
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::remote::{ByteRange, RemoteStore};
///
/// let connector = GoogleDriveConnector::new(http_client, token_provider);
/// let response = connector
///     .fetch_range("file123", Some(ByteRange::Bounded { start: 0, end: 1023 }))
///     .await?;
/// ```
pub struct GoogleDriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Source of OAuth 2.0 access tokens
    token_provider: Arc<dyn AccessTokenProvider>,

    api_base: String,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `token_provider` - supplies tokens with the `drive.readonly` scope
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        token_provider: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            http_client,
            token_provider,
            api_base: DRIVE_API_BASE.to_string(),
        }
    }

    /// Point the connector at a different API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Media download URL for a file
    fn media_url(&self, file_id: &str) -> String {
        format!(
            "{}/files/{}?alt=media",
            self.api_base,
            urlencoding::encode(file_id)
        )
    }

    async fn send(
        &self,
        url: &str,
        token: &str,
        range: Option<ByteRange>,
    ) -> Result<HttpStreamResponse> {
        let mut request = HttpRequest::new(HttpMethod::Get, url).bearer_token(token);
        if let Some(range) = range {
            request = request.header("Range", range.to_header());
        }

        self.http_client.execute_stream(request).await
    }
}

#[async_trait]
impl RemoteStore for GoogleDriveConnector {
    #[instrument(skip(self))]
    async fn fetch_range(
        &self,
        remote_id: &str,
        range: Option<ByteRange>,
    ) -> Result<RemoteResponse> {
        if remote_id.trim().is_empty() {
            return Err(GoogleDriveError::InvalidFileId(remote_id.to_string()).into());
        }

        let url = self.media_url(remote_id);

        let token = self.token_provider.access_token().await.map_err(|e| {
            warn!(error = %e, "No access token available");
            GoogleDriveError::AuthenticationFailed(e.to_string())
        })?;

        let mut response = self.send(&url, &token, range).await?;

        if response.status == STATUS_UNAUTHORIZED {
            info!("Drive rejected access token, refreshing");

            let token = self.token_provider.force_refresh().await.map_err(|e| {
                warn!(error = %e, "Token refresh failed");
                GoogleDriveError::AuthenticationFailed(e.to_string())
            })?;

            response = self.send(&url, &token, range).await?;

            if response.status == STATUS_UNAUTHORIZED {
                warn!("Drive rejected refreshed access token");
                return Err(GoogleDriveError::AuthenticationFailed(format!(
                    "Access to {} denied after token refresh",
                    remote_id
                ))
                .into());
            }
        }

        debug!(status = response.status, "Drive media response");

        Ok(RemoteResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }
}
