//! GitHub REST v3 client.
//!
//! Files come from the contents API (`/repos/{owner}/{repo}/contents/{path}?ref=`), which
//! returns base64 content and the blob SHA. Files too large for inline content are
//! fetched from the `download_url` the API hands back. Trees come from the recursive git
//! trees API (`/repos/{owner}/{repo}/git/trees/{ref}?recursive=1`).

use anyhow::{Context, Result};
use base64::Engine;
use futures::future::BoxFuture;
use serde::Deserialize;
use url::Url;

use super::repo_url::{GITHUB_PATH_PATTERN, extract_location};
use super::{
    FileContent, PathSkipper, Platform, RepoInfo, RepoLocation, RepoTree, check_response,
    filter_tree, http_client, transport_error,
};
use crate::constants::GITHUB_API_URL;
use crate::core::ProjiError;

const NAME: &str = "github";

/// GitHub client, anonymous when no token is configured.
#[derive(Debug, Clone)]
pub struct GitHub {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    sha: String,
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GitHub {
    /// Client against api.github.com.
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_api_url(GITHUB_API_URL, token)
    }

    /// Client against a different API root, e.g. GitHub Enterprise or a test server.
    pub fn with_api_url(api_url: &str, token: Option<String>) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .with_context(|| format!("Invalid GitHub API URL: {api_url}"))?;
        if token.is_none() {
            tracing::debug!("no token provided, using anonymous GitHub client");
        }
        Ok(Self {
            client: http_client()?,
            api_url,
            token: token.filter(|token| !token.trim().is_empty()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("GitHub API URL cannot be a base: {}", self.api_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request =
            self.client.get(url).header(reqwest::header::ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response =
            request.send().await.map_err(|e| transport_error(NAME, what, e))?;
        Ok(check_response(NAME, what, response)?)
    }

    async fn fetch_file(&self, repo: &RepoInfo, path: &str) -> Result<FileContent> {
        let what = format!("{repo}:{path}");
        tracing::debug!(target: "platform", "fetching {what} from GitHub");

        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str(), "contents"];
        segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut().append_pair("ref", &repo.reference);

        let body = self
            .send(self.get(url), &what)
            .await?
            .bytes()
            .await
            .map_err(|e| transport_error(NAME, &what, e))?;
        let content: ContentResponse = serde_json::from_slice(&body).map_err(|_| {
            ProjiError::invalid(format!("'{what}' is not a file"))
        })?;

        if content.kind != "file" {
            return Err(ProjiError::invalid(format!(
                "'{what}' is a {}, not a file",
                content.kind
            ))
            .into());
        }

        let bytes = match (content.encoding.as_deref(), content.content.as_deref()) {
            (Some("base64"), Some(encoded)) if !encoded.is_empty() => decode_base64(encoded)
                .map_err(|e| transport_error(NAME, &what, format!("invalid base64: {e}")))?,
            _ => {
                let download_url = content.download_url.as_deref().ok_or_else(|| {
                    transport_error(NAME, &what, "response carries neither content nor download URL")
                })?;
                let url = Url::parse(download_url)
                    .map_err(|e| transport_error(NAME, &what, format!("bad download URL: {e}")))?;
                self.send(self.get(url), &what)
                    .await?
                    .bytes()
                    .await
                    .map_err(|e| transport_error(NAME, &what, e))?
                    .to_vec()
            }
        };

        Ok(FileContent {
            bytes,
            sha: content.sha,
        })
    }

    async fn fetch_tree(&self, repo: &RepoInfo, skip: &PathSkipper<'_>) -> Result<RepoTree> {
        let what = repo.to_string();
        tracing::debug!(target: "platform", "listing tree of {what} on GitHub");

        let mut url = self.endpoint(&[
            "repos",
            repo.owner.as_str(),
            repo.name.as_str(),
            "git",
            "trees",
            repo.reference.as_str(),
        ])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let tree: TreeResponse = self
            .send(self.get(url), &what)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(NAME, &what, e))?;

        if tree.truncated {
            tracing::warn!("GitHub truncated the tree listing of {what}; some entries are missing");
        }

        let raw = tree.tree.into_iter().map(|item| (item.path, item.kind == "tree"));
        Ok(RepoTree {
            entries: filter_tree(raw, skip),
            sha: Some(tree.sha),
        })
    }
}

pub(crate) fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact)
}

impl Platform for GitHub {
    fn name(&self) -> &'static str {
        NAME
    }

    fn locate(&self, url: &Url) -> Result<RepoLocation, ProjiError> {
        extract_location(url, GITHUB_PATH_PATTERN)
    }

    fn fetch_file_content<'a>(
        &'a self,
        repo: &'a RepoInfo,
        path: &'a str,
    ) -> BoxFuture<'a, Result<FileContent>> {
        Box::pin(self.fetch_file(repo, path))
    }

    fn list_tree<'a>(
        &'a self,
        repo: &'a RepoInfo,
        skip: &'a PathSkipper<'a>,
    ) -> BoxFuture<'a, Result<RepoTree>> {
        Box::pin(self.fetch_tree(repo, skip))
    }
}
