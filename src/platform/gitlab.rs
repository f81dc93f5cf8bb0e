//! GitLab REST v4 client.
//!
//! Projects are addressed by their URL-encoded `owner/name` path. Files come from
//! `/projects/{id}/repository/files/{path}?ref=`, trees from the paginated
//! `/projects/{id}/repository/tree?recursive=true` listing, and the tree hash is the id of
//! the commit the reference points at.
//!
//! Tokens starting with `oauth2:` or `Bearer:` are sent as OAuth bearer tokens, anything
//! else as a personal access token.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::Deserialize;
use url::Url;

use super::github::decode_base64;
use super::repo_url::{GITLAB_PATH_PATTERN, extract_location};
use super::{
    FileContent, PathSkipper, Platform, RepoInfo, RepoLocation, RepoTree, check_response,
    filter_tree, http_client, transport_error,
};
use crate::constants::{GITLAB_API_URL, TREE_PAGE_SIZE};
use crate::core::ProjiError;

const NAME: &str = "gitlab";

#[derive(Debug, Clone)]
enum Credential {
    Anonymous,
    PersonalAccessToken(String),
    OAuth(String),
}

impl Credential {
    fn from_token(token: Option<String>) -> Self {
        match token.filter(|token| !token.trim().is_empty()) {
            None => Self::Anonymous,
            Some(token) => {
                for prefix in ["oauth2:", "Bearer:"] {
                    if let Some(rest) = token.strip_prefix(prefix) {
                        return Self::OAuth(rest.trim().to_string());
                    }
                }
                Self::PersonalAccessToken(token)
            }
        }
    }
}

/// GitLab client, anonymous when no token is configured.
#[derive(Debug, Clone)]
pub struct GitLab {
    client: reqwest::Client,
    api_url: Url,
    credential: Credential,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    content: String,
    #[serde(default)]
    encoding: String,
    content_sha256: String,
}

#[derive(Debug, Deserialize)]
struct TreeNode {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    id: String,
}

impl GitLab {
    /// Client against gitlab.com.
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_api_url(GITLAB_API_URL, token)
    }

    /// Client against a different API root, e.g. a self-hosted instance or a test server.
    pub fn with_api_url(api_url: &str, token: Option<String>) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .with_context(|| format!("Invalid GitLab API URL: {api_url}"))?;
        let credential = Credential::from_token(token);
        let auth_kind = match credential {
            Credential::Anonymous => "anonymous",
            Credential::PersonalAccessToken(_) => "personal access token",
            Credential::OAuth(_) => "oauth",
        };
        tracing::debug!(target: "platform", "creating GitLab client ({auth_kind})");
        Ok(Self {
            client: http_client()?,
            api_url,
            credential,
        })
    }

    /// `/projects/{owner%2Fname}/repository/...` with each extra segment encoded whole.
    fn endpoint(&self, repo: &RepoInfo, rest: &[&str]) -> Result<Url> {
        let project = format!("{}/{}", repo.owner, repo.name);
        let mut url = self.api_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                anyhow::anyhow!("GitLab API URL cannot be a base: {}", self.api_url)
            })?;
            segments.pop_if_empty().push("projects").push(&project).push("repository");
            for segment in rest {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.credential {
            Credential::Anonymous => request,
            Credential::PersonalAccessToken(token) => request.header("PRIVATE-TOKEN", token),
            Credential::OAuth(token) => request.bearer_auth(token),
        }
    }

    async fn send(&self, url: Url, what: &str) -> Result<reqwest::Response> {
        let response = self.get(url).send().await.map_err(|e| transport_error(NAME, what, e))?;
        Ok(check_response(NAME, what, response)?)
    }

    async fn fetch_file(&self, repo: &RepoInfo, path: &str) -> Result<FileContent> {
        let what = format!("{repo}:{path}");
        tracing::debug!(target: "platform", "fetching {what} from GitLab");

        let mut url = self.endpoint(repo, &["files", path])?;
        url.query_pairs_mut().append_pair("ref", &repo.reference);

        let file: FileResponse = self
            .send(url, &what)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(NAME, &what, e))?;

        let bytes = match file.encoding.as_str() {
            "base64" => decode_base64(&file.content)
                .map_err(|e| transport_error(NAME, &what, format!("invalid base64: {e}")))?,
            "" | "text" => file.content.into_bytes(),
            other => {
                return Err(transport_error(NAME, &what, format!("unsupported encoding '{other}'"))
                    .into());
            }
        };

        Ok(FileContent {
            bytes,
            sha: file.content_sha256,
        })
    }

    async fn commit_sha(&self, repo: &RepoInfo) -> Result<String> {
        let url = self.endpoint(repo, &["commits", repo.reference.as_str()])?;
        let commit: CommitResponse = self
            .send(url, &repo.to_string())
            .await?
            .json()
            .await
            .map_err(|e| transport_error(NAME, &repo.to_string(), e))?;
        Ok(commit.id)
    }

    async fn fetch_tree(&self, repo: &RepoInfo, skip: &PathSkipper<'_>) -> Result<RepoTree> {
        let what = repo.to_string();
        tracing::debug!(target: "platform", "listing tree of {what} on GitLab");

        let sha = match self.commit_sha(repo).await {
            Ok(sha) => Some(sha),
            Err(e) if find_rate_limit(&e) => return Err(e),
            Err(e) => {
                tracing::debug!("no commit hash for {what}: {e:#}");
                None
            }
        };

        let mut raw = Vec::new();
        let mut page = 1u32;
        loop {
            let mut url = self.endpoint(repo, &["tree"])?;
            url.query_pairs_mut()
                .append_pair("recursive", "true")
                .append_pair("ref", &repo.reference)
                .append_pair("per_page", &TREE_PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            tracing::debug!(target: "platform", "fetching tree page {page} of {what}");
            let response = self.send(url, &what).await?;
            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u32>().ok());
            let nodes: Vec<TreeNode> =
                response.json().await.map_err(|e| transport_error(NAME, &what, e))?;
            raw.extend(nodes.into_iter().map(|node| (node.path, node.kind == "tree")));

            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(RepoTree {
            entries: filter_tree(raw, skip),
            sha,
        })
    }
}

fn find_rate_limit(error: &anyhow::Error) -> bool {
    crate::core::find_error(error).is_some_and(ProjiError::is_retryable)
}

impl Platform for GitLab {
    fn name(&self) -> &'static str {
        NAME
    }

    fn locate(&self, url: &Url) -> Result<RepoLocation, ProjiError> {
        extract_location(url, GITLAB_PATH_PATTERN)
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
