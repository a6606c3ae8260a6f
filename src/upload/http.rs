use super::{validate_name, UploadSink};
use crate::error::{Error, Result};
use crate::pipeline::ContentType;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// PUTs objects to an HTTP origin (WebDAV, object-store gateways, nginx
/// `dav_methods PUT`).
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
    overwrite: bool,
}

impl HttpSink {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        bearer_token: Option<String>,
        overwrite: bool,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
            overwrite,
        })
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }
}

#[async_trait::async_trait]
impl UploadSink for HttpSink {
    async fn upload(&self, name: &str, payload: Bytes, content_type: ContentType) -> Result<()> {
        validate_name(name)?;

        let mut request = self
            .client
            .put(self.url(name))
            .header(CONTENT_TYPE, content_type.mime())
            .body(payload);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if !self.overwrite {
            request = request.header(IF_NONE_MATCH, "*");
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::PRECONDITION_FAILED && !self.overwrite {
            tracing::debug!(object = %name, "Object exists on origin, skipping");
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upload(name, format!("HTTP {}: {}", status, body.trim())));
        }

        Ok(())
    }

    fn describe(&self) -> String {
        format!("http {}", self.base_url)
    }
}
