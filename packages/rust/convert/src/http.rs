//! Conversion service reached over HTTP.
//!
//! Each method is a `POST {base}/{method}` with body `{"content": ...}`,
//! answered with the same shape.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::debug;
use url::Url;

use courseforge_shared::{CourseError, Result};

use crate::{Method, TextConverter};

const USER_AGENT: &str = concat!("courseforge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct Request<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct Response {
    content: String,
}

/// [`TextConverter`] for a conversion service listening on HTTP.
///
/// The client is async; calls block on the runtime that was current when
/// the converter was built, so they must come from a blocking thread
/// (`spawn_blocking`), never from inside an async task.
pub struct HttpConverter {
    client: Client,
    base: Url,
    runtime: Handle,
}

impl HttpConverter {
    /// Build a client for the service at `base_url`. Must be called within a Tokio runtime.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url).map_err(|e| {
            CourseError::config(format!("invalid converter url '{base_url}': {e}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CourseError::Conversion(format!("failed to build HTTP client: {e}")))?;

        let runtime = Handle::try_current().map_err(|e| {
            CourseError::Conversion(format!("HTTP converter needs a Tokio runtime: {e}"))
        })?;

        Ok(Self {
            client,
            base,
            runtime,
        })
    }

    async fn call(&self, method: Method, content: &str) -> Result<String> {
        let url = self
            .base
            .join(method.as_str())
            .map_err(|e| CourseError::Conversion(format!("bad converter url: {e}")))?;

        debug!(%url, len = content.len(), "converter request");

        let response = self
            .client
            .post(url.clone())
            .json(&Request { content })
            .send()
            .await
            .map_err(|e| CourseError::Conversion(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourseError::Conversion(format!(
                "{url}: converter returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| CourseError::Conversion(format!("{url}: invalid response body: {e}")))?;
        Ok(body.content)
    }
}

impl TextConverter for HttpConverter {
    fn convert(&self, method: Method, content: &str) -> Result<String> {
        self.runtime.block_on(self.call(method, content))
    }

    fn name(&self) -> &str {
        "http"
    }
}
