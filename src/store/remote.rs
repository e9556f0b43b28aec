// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Remote content API backend (GitHub-contents compatible)

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{retain_allowed, ContentStore, PendingUpload};
use crate::config::RemoteConfig;
use crate::unlock::TokenProbe;
use crate::visual::{Locator, VisualItem};
use crate::{Result, VisualError};

/// Remote repository client
pub struct RemoteStore {
    client: Client,
    config: RemoteConfig,
    token: Option<String>,
}

/// Directory listing entry
#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct WriteResponse {
    content: ContentEntry,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    message: String,
    sha: &'a str,
    branch: &'a str,
}

impl ContentEntry {
    fn into_item(self) -> Option<VisualItem> {
        if self.kind != "file" {
            return None;
        }
        let url = self.download_url?;
        Some(VisualItem::new(
            self.path,
            Locator::Remote { url },
            self.name,
            Some(self.sha),
        ))
    }
}

impl RemoteStore {
    /// Create a new remote store client
    pub fn new(config: &RemoteConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("visual-supports/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut config = config.clone();
        config.api_base = config.api_base.trim_end_matches('/').to_string();
        config.content_path = config.content_path.trim_matches('/').to_string();

        Ok(Self { client, config, token })
    }

    fn repo_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| VisualError::Config(format!("Invalid api_base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| VisualError::Config("api_base cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["repos", self.config.owner.as_str(), self.config.repo.as_str()]);
        Ok(url)
    }

    /// `.../contents/{content_path}[/{filename}]`, each segment percent-encoded
    fn contents_url(&self, filename: Option<&str>) -> Result<Url> {
        let mut url = self.repo_url()?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| VisualError::Config("api_base cannot be a base URL".to_string()))?;
            segments.push("contents");
            segments.extend(self.config.content_path.split('/').filter(|s| !s.is_empty()));
            if let Some(name) = filename {
                segments.push(name);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        authorize_with(request, self.token.as_deref())
    }

    async fn check(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from));
        Err(VisualError::Store(match detail {
            Some(message) => format!("{} failed with status {}: {}", action, status, message),
            None => format!("{} failed with status {}", action, status),
        }))
    }

    async fn send(request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| VisualError::Store(format!("{} failed: {}", action, e)))?;
        Self::check(response, action).await
    }
}

fn authorize_with(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    let request = request.header(reqwest::header::ACCEPT, "application/vnd.github+json");
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

#[async_trait]
impl ContentStore for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn list(&self) -> Result<Vec<VisualItem>> {
        let url = self.contents_url(None)?;
        debug!("Listing {}", url);
        let request = self
            .authorize(self.client.get(url))
            .query(&[("ref", self.config.branch.as_str())]);
        let response = Self::send(request, "Listing visuals").await?;

        let entries: Vec<ContentEntry> = response
            .json()
            .await
            .map_err(|e| VisualError::Store(format!("Unexpected listing format: {}", e)))?;
        let items: Vec<VisualItem> = entries.into_iter().filter_map(ContentEntry::into_item).collect();
        info!("Remote store lists {} entries", items.len());
        Ok(retain_allowed(items))
    }

    async fn put(&self, upload: &PendingUpload, revision: Option<&str>) -> Result<VisualItem> {
        let url = self.contents_url(Some(&upload.filename))?;
        let verb = if revision.is_some() { "Update" } else { "Add" };
        let body = WriteRequest {
            message: format!("{} visual {}", verb, upload.filename),
            content: general_purpose::STANDARD.encode(&upload.bytes),
            branch: &self.config.branch,
            sha: revision,
        };
        debug!("{} {} ({} bytes)", verb, upload.filename, upload.bytes.len());

        let response = Self::send(
            self.authorize(self.client.put(url)).json(&body),
            &format!("Uploading {}", upload.filename),
        )
        .await?;
        let written: WriteResponse = response
            .json()
            .await
            .map_err(|e| VisualError::Store(format!("Unexpected upload response: {}", e)))?;
        written
            .content
            .into_item()
            .ok_or_else(|| VisualError::Store("Upload response did not describe a file".to_string()))
    }

    async fn remove(&self, item: &VisualItem) -> Result<()> {
        let sha = item.revision.as_deref().ok_or_else(|| {
            VisualError::Store(format!("{} has no revision token", item.filename))
        })?;
        let url = self.contents_url(Some(&item.filename))?;
        let body = DeleteRequest {
            message: format!("Remove visual {}", item.filename),
            sha,
            branch: &self.config.branch,
        };
        Self::send(
            self.authorize(self.client.delete(url)).json(&body),
            &format!("Deleting {}", item.filename),
        )
        .await?;
        info!("Deleted {}", item.id);
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let url = self.repo_url()?;
        Self::send(self.authorize(self.client.get(url)), "Probing repository").await?;
        Ok(())
    }
}

/// Probes the configured repository with a candidate token
pub struct RemoteProbe {
    config: RemoteConfig,
}

impl RemoteProbe {
    pub fn new(config: &RemoteConfig) -> Self {
        Self { config: config.clone() }
    }
}

#[async_trait]
impl TokenProbe for RemoteProbe {
    async fn probe(&self, token: &str) -> Result<()> {
        RemoteStore::new(&self.config, Some(token.to_string()))?
            .probe()
            .await
    }
}
