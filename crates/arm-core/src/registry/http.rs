//! Authenticated GET helpers shared by the HTTP registries.

use std::sync::Arc;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::context::OpContext;
use crate::credentials::CredentialResolver;
use crate::error::{ArmError, Result};

/// Page size requested from paginated endpoints.
pub const PAGE_SIZE: usize = 100;

/// Upper bound on buffer space reserved from a `Content-Length` header.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    credentials: Arc<dyn CredentialResolver>,
    auth_header: &'static str,
    auth_prefix: &'static str,
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource")
            .field("auth_header", &self.auth_header)
            .finish_non_exhaustive()
    }
}

impl HttpSource {
    /// `auth_header: auth_prefix + token` is attached when a token resolves.
    pub fn new(
        client: Client,
        credentials: Arc<dyn CredentialResolver>,
        auth_header: &'static str,
        auth_prefix: &'static str,
    ) -> Self {
        Self {
            client,
            credentials,
            auth_header,
            auth_prefix,
        }
    }

    async fn send(&self, ctx: &OpContext, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let parsed = Url::parse(url).map_err(|e| ArmError::config(format!("invalid URL '{url}': {e}")))?;
        let mut req = self.client.get(parsed.clone()).query(query);
        if let Some(host) = parsed.host_str() {
            if let Some(token) = self.credentials.token(host, parsed.path()) {
                req = req.header(self.auth_header, format!("{}{token}", self.auth_prefix));
            }
        }

        debug!(url, "GET");
        let resp = ctx.run(async { Ok(req.send().await?) }).await?;
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(ArmError::NotFound(url.to_string())),
            s => Err(ArmError::Transport(format!("GET {url}: HTTP {s}"))),
        }
    }

    /// GET and decode JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &OpContext,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self.send(ctx, url, query).await?;
        let bytes = ctx.run(async { Ok(resp.bytes().await?) }).await?;
        serde_json::from_slice(&bytes).map_err(|e| ArmError::parse(url, e))
    }

    /// Every page of a list endpoint taking `page`/`per_page`-style params.
    ///
    /// Stops at the first short page.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        ctx: &OpContext,
        url: &str,
        query: &[(&str, String)],
        page_size_param: &str,
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for page in 1.. {
            let mut q = query.to_vec();
            q.push(("page", page.to_string()));
            q.push((page_size_param, PAGE_SIZE.to_string()));
            let batch: Vec<T> = match self.get_json(ctx, url, &q).await {
                Ok(b) => b,
                Err(e) if e.is_not_found() && page == 1 => return Ok(Vec::new()),
                Err(e) if e.is_not_found() => break,
                Err(e) => return Err(e),
            };
            let n = batch.len();
            out.extend(batch);
            if n < PAGE_SIZE {
                break;
            }
        }
        Ok(out)
    }

    /// GET raw bytes, read chunk by chunk so cancellation is honoured
    /// between chunks.
    pub async fn get_bytes(&self, ctx: &OpContext, url: &str) -> Result<Vec<u8>> {
        let mut resp = self.send(ctx, url, &[]).await?;
        let hint = resp
            .content_length()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        let mut body = Vec::with_capacity(hint.min(MAX_PREALLOC));
        while let Some(chunk) = ctx.run(async { Ok(resp.chunk().await?) }).await? {
            body.extend_from_slice(&chunk);
        }
        debug!(url, bytes = body.len(), "downloaded");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::NoCredentials;
    use mockito::Server;

    fn source() -> HttpSource {
        HttpSource::new(Client::new(), Arc::new(NoCredentials), "Authorization", "Bearer ")
    }

    #[tokio::test]
    async fn downloads_whole_body() {
        let mut server = Server::new_async().await;
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let _m = server
            .mock("GET", "/blob")
            .with_body(payload.clone())
            .create_async()
            .await;

        let got = source()
            .get_bytes(&OpContext::new(), &format!("{}/blob", server.url()))
            .await
            .unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let mut server = Server::new_async().await;
        let _m = server.mock("GET", "/gone").with_status(404).create_async().await;
        let err = source()
            .get_bytes(&OpContext::new(), &format!("{}/gone", server.url()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn cancelled_download_stops() {
        let server = Server::new_async().await;
        let ctx = OpContext::new();
        ctx.cancel();
        let err = source()
            .get_bytes(&ctx, &format!("{}/blob", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ArmError::Cancelled));
    }
}
