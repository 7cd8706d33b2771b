use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_runtime::logging::redact_url;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use super::{check_range, ByteSource, SourceKind};
use crate::error::{Result, WaveformError};

/// Remote resource read with HTTP byte-range requests.
///
/// ## Size discovery
///
/// 1. `HEAD` and read `Content-Length`.
/// 2. `GET` with `Range: bytes=0-0` and read the total from
///    `Content-Range: bytes 0-0/<total>` (`*` counts as absent).
/// 3. If the server ignored the range and answered `200`, its
///    `Content-Length` is the full size.
///
/// The first answer is memoised for the lifetime of the source.
///
/// ## Reads
///
/// Every ranged `GET` must come back `206` with a body of exactly the
/// requested length. A `200` means the server ignored the `Range` header and
/// is reported as [`WaveformError::RangeUnsupported`] rather than sliced.
pub struct HttpRangeSource {
    client: Arc<dyn HttpClient>,
    url: String,
    headers: HashMap<String, String>,
    size: OnceCell<u64>,
}

impl HttpRangeSource {
    pub fn new(client: Arc<dyn HttpClient>, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            headers: HashMap::new(),
            size: OnceCell::new(),
        }
    }

    /// Extra headers sent with every request.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    fn request(&self, method: HttpMethod) -> HttpRequest {
        HttpRequest::new(method, self.url.clone()).headers(&self.headers)
    }

    async fn probe_size(&self) -> Result<u64> {
        match self.client.execute(self.request(HttpMethod::Head)).await {
            Ok(response) if response.is_success() => {
                if let Some(length) = response.content_length() {
                    debug!(url = %redact_url(&self.url), size = length, "Size from HEAD");
                    return Ok(length);
                }
            }
            Ok(response) => {
                debug!(status = response.status, "HEAD probe rejected, trying range probe");
            }
            Err(e) => {
                debug!(error = %e, "HEAD probe failed, trying range probe");
            }
        }

        let response = self
            .client
            .execute(self.request(HttpMethod::Get).range(0, 0))
            .await?;

        if let Some(total) = response.content_range().and_then(|range| range.total) {
            debug!(url = %redact_url(&self.url), size = total, "Size from Content-Range");
            return Ok(total);
        }

        if response.status == 200 {
            if let Some(length) = response.content_length() {
                debug!(url = %redact_url(&self.url), size = length, "Size from full response");
                return Ok(length);
            }
        }

        Err(WaveformError::SourceUnavailable(format!(
            "cannot determine size of {} (HTTP {})",
            redact_url(&self.url),
            response.status
        )))
    }

    fn check_response(&self, response: &HttpResponse, start: u64, end: u64) -> Result<()> {
        match response.status {
            _ if response.is_partial_content() => {}
            200 => {
                return Err(WaveformError::RangeUnsupported(format!(
                    "{} answered 200 to a range request",
                    redact_url(&self.url)
                )))
            }
            416 => {
                return Err(WaveformError::OutOfRange(format!(
                    "bytes {}..{} not satisfiable by {}",
                    start,
                    end,
                    redact_url(&self.url)
                )))
            }
            status => {
                return Err(WaveformError::SourceUnavailable(format!(
                    "HTTP {} reading {}",
                    status,
                    redact_url(&self.url)
                )))
            }
        }

        if let Some(first) = response.content_range().and_then(|range| range.first) {
            if first != start {
                return Err(WaveformError::integrity(
                    format!("Content-Range start for {}", redact_url(&self.url)),
                    start,
                    first,
                ));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ByteSource for HttpRangeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::HttpRange
    }

    fn describe(&self) -> String {
        redact_url(&self.url)
    }

    async fn size(&self) -> Result<u64> {
        self.size
            .get_or_try_init(|| self.probe_size())
            .await
            .copied()
    }

    #[instrument(skip(self), fields(url = %redact_url(&self.url)))]
    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        let len = check_range(start, end)?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let response = self
            .client
            .execute(self.request(HttpMethod::Get).range(start, end))
            .await?;

        self.check_response(&response, start, end)?;

        if response.body.len() as u64 != len {
            return Err(WaveformError::integrity(
                format!("bytes {}..{} of {}", start, end, redact_url(&self.url)),
                len,
                response.body.len() as u64,
            ));
        }

        Ok(response.body)
    }
}
