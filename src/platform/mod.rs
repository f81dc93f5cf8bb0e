//! Source-hosting platform clients.
//!
//! A [`Platform`] knows how to decompose its repository URLs, fetch a single file with
//! its content hash, and list a repository tree. Two variants exist, [`GitHub`] and
//! [`GitLab`]; [`PlatformRegistry`] picks one by URL host through a lookup table.
//!
//! # Errors
//!
//! Platform calls fail with typed root causes from [`ProjiError`]:
//!
//! - `NotFound` when the repository or file does not exist (HTTP 404)
//! - `RateLimited` when the request quota is exhausted. This is the only retryable class.
//! - `Transport` for every other network or authentication failure
//!
//! Nothing here retries on its own.
//!
//! # Examples
//!
//! ```rust,no_run
//! use proji_cli::config::Auth;
//! use proji_cli::platform::PlatformRegistry;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = PlatformRegistry::new(&Auth::default())?;
//! let (platform, location) = registry.locate("gh:owner/repo@main")?;
//! let tree = platform.list_tree(&location.repo, &|path: &str| path.starts_with("vendor")).await?;
//! println!("{} entries", tree.entries.len());
//! # Ok(())
//! # }
//! ```

pub mod github;
pub mod gitlab;
pub mod repo_url;

use anyhow::Result;
use futures::future::BoxFuture;
use reqwest::{Response, StatusCode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::Auth;
use crate::constants::{HTTP_CONNECT_TIMEOUT, HTTP_REQUEST_TIMEOUT, USER_AGENT};
use crate::core::ProjiError;
use crate::models::DirEntry;

pub use github::GitHub;
pub use gitlab::GitLab;
pub use repo_url::{extract_location, parse_repo_url, url_basename};

/// Repository identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoInfo {
    pub owner: String,
    pub name: String,
    /// Branch, tag or commit
    pub reference: String,
}

impl std::fmt::Display for RepoInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.reference)
    }
}

/// A repository plus a path inside it (empty for the repository root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub repo: RepoInfo,
    pub path: String,
}

/// Raw file bytes and the platform's content hash for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub bytes: Vec<u8>,
    pub sha: String,
}

/// Result of a tree listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoTree {
    /// Entries in platform order, with skipped paths and their subtrees removed
    pub entries: Vec<DirEntry>,
    /// Hash identifying the listed revision, when the platform reports one
    pub sha: Option<String>,
}

/// Predicate deciding which repository paths to leave out of a tree listing.
pub type PathSkipper<'a> = dyn Fn(&str) -> bool + Send + Sync + 'a;

/// Capability set of a source-hosting platform.
pub trait Platform: Send + Sync {
    /// Short identifier used in cache paths and messages ("github", "gitlab").
    fn name(&self) -> &'static str;

    /// Decompose a normalized URL into repository identity and in-repository path.
    fn locate(&self, url: &::url::Url) -> Result<RepoLocation, ProjiError>;

    /// Decompose a normalized URL into owner, name and reference.
    fn resolve_repo_info(&self, url: &::url::Url) -> Result<RepoInfo, ProjiError> {
        Ok(self.locate(url)?.repo)
    }

    /// Fetch one file's bytes and content hash.
    fn fetch_file_content<'a>(
        &'a self,
        repo: &'a RepoInfo,
        path: &'a str,
    ) -> BoxFuture<'a, Result<FileContent>>;

    /// List the repository tree. Paths for which `skip` returns true are left out, and
    /// so is everything below a skipped directory.
    fn list_tree<'a>(
        &'a self,
        repo: &'a RepoInfo,
        skip: &'a PathSkipper<'a>,
    ) -> BoxFuture<'a, Result<RepoTree>>;
}

/// Supported platform variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    GitHub,
    GitLab,
}

/// Host → variant lookup table.
pub const PLATFORM_HOSTS: &[(&str, PlatformKind)] =
    &[("github.com", PlatformKind::GitHub), ("gitlab.com", PlatformKind::GitLab)];

impl PlatformKind {
    /// Variant serving `host`, if any.
    #[must_use]
    pub fn for_host(host: &str) -> Option<Self> {
        PLATFORM_HOSTS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(host))
            .map(|(_, kind)| *kind)
    }

    /// Build a client for this variant with the matching credential.
    pub fn build(self, auth: &Auth) -> Result<Arc<dyn Platform>> {
        Ok(match self {
            Self::GitHub => Arc::new(GitHub::new(auth.github_token.clone())?),
            Self::GitLab => Arc::new(GitLab::new(auth.gitlab_token.clone())?),
        })
    }
}

/// Platform clients keyed by host.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    platforms: HashMap<String, Arc<dyn Platform>>,
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut hosts: Vec<&String> = self.platforms.keys().collect();
        hosts.sort();
        f.debug_struct("PlatformRegistry").field("hosts", &hosts).finish()
    }
}

impl PlatformRegistry {
    /// Registry with a client for every host in [`PLATFORM_HOSTS`].
    pub fn new(auth: &Auth) -> Result<Self> {
        let mut registry = Self::empty();
        for (host, kind) in PLATFORM_HOSTS {
            registry.register(*host, kind.build(auth)?);
        }
        Ok(registry)
    }

    /// Registry without any platform.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serve `host` with `platform`, replacing any previous client.
    pub fn register(&mut self, host: impl Into<String>, platform: Arc<dyn Platform>) {
        self.platforms.insert(host.into().to_ascii_lowercase(), platform);
    }

    /// Client for a host.
    pub fn for_host(&self, host: &str) -> Result<Arc<dyn Platform>, ProjiError> {
        self.platforms.get(&host.to_ascii_lowercase()).cloned().ok_or_else(|| {
            ProjiError::UnsupportedPlatform {
                host: host.to_string(),
            }
        })
    }

    /// Normalize a raw URL and split it with the platform serving its host.
    pub fn locate(&self, raw_url: &str) -> Result<(Arc<dyn Platform>, RepoLocation), ProjiError> {
        let url = parse_repo_url(raw_url)?;
        let host = url.host_str().ok_or_else(|| ProjiError::InvalidUrl {
            url: raw_url.to_string(),
            reason: "URL has no host".to_string(),
        })?;
        let platform = self.for_host(host)?;
        let location = platform.locate(&url)?;
        Ok((platform, location))
    }
}

/// Drop skipped paths and everything below skipped directories.
///
/// `raw` yields `(path, is_dir)` pairs in platform order. The predicate is asked once per
/// directory and once per file that is not already inside a skipped directory.
pub fn filter_tree<I>(raw: I, skip: &PathSkipper<'_>) -> Vec<DirEntry>
where
    I: IntoIterator<Item = (String, bool)>,
{
    let raw: Vec<(String, bool)> = raw.into_iter().collect();

    let skipped_dirs: HashSet<&str> = raw
        .iter()
        .filter(|(path, is_dir)| *is_dir && skip(path.as_str()))
        .map(|(path, _)| path.as_str())
        .collect();

    let inside_skipped = |path: &str| {
        path.match_indices('/').any(|(index, _)| skipped_dirs.contains(&path[..index]))
    };

    raw.iter()
        .filter(|(path, is_dir)| {
            if inside_skipped(path.as_str()) {
                return false;
            }
            if *is_dir {
                !skipped_dirs.contains(path.as_str())
            } else {
                !skip(path.as_str())
            }
        })
        .map(|(path, is_dir)| DirEntry {
            path: path.clone(),
            is_dir: *is_dir,
            template: None,
        })
        .collect()
}

/// HTTP client shared by platform implementations.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| {
            ProjiError::Other {
                message: format!("failed to build HTTP client: {e}"),
            }
            .into()
        })
}

pub(crate) fn transport_error(platform: &str, path: &str, reason: impl ToString) -> ProjiError {
    ProjiError::Transport {
        platform: platform.to_string(),
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Map a platform response onto the error taxonomy, passing successful ones through.
pub(crate) fn check_response(
    platform: &str,
    what: &str,
    response: Response,
) -> Result<Response, ProjiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(ProjiError::not_found(format!("'{what}' on {platform}")));
    }

    if is_rate_limited(&response) {
        tracing::warn!("{platform} rate limit exhausted while fetching {what}");
        return Err(ProjiError::RateLimited {
            platform: platform.to_string(),
            path: what.to_string(),
        });
    }

    let reason = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("access denied ({status}); check the configured token")
        }
        _ => format!("unexpected status {status}"),
    };
    Err(transport_error(platform, what, reason))
}

fn is_rate_limited(response: &Response) -> bool {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if status != StatusCode::FORBIDDEN {
        return false;
    }
    let headers = response.headers();
    let exhausted = ["x-ratelimit-remaining", "ratelimit-remaining"].iter().any(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim() == "0")
    });
    exhausted || headers.contains_key("retry-after")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, bool)]) -> Vec<(String, bool)> {
        entries.iter().map(|(path, is_dir)| ((*path).to_string(), *is_dir)).collect()
    }

    #[test]
    fn test_filter_tree_drops_skipped_subtree() {
        let tree = raw(&[
            ("README.md", false),
            ("src", true),
            ("src/main.rs", false),
            ("vendor", true),
            ("vendor/lib", true),
            ("vendor/lib/a.c", false),
            ("vendorish.txt", false),
        ]);

        let entries = filter_tree(tree, &|path: &str| path == "vendor");
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();

        assert_eq!(paths, vec!["README.md", "src", "src/main.rs", "vendorish.txt"]);
        assert!(entries.iter().all(|e| !e.path.starts_with("vendor/")));
    }

    #[test]
    fn test_filter_tree_handles_children_before_parents() {
        let tree = raw(&[("vendor/a.c", false), ("vendor", true), ("lib.c", false)]);
        let entries = filter_tree(tree, &|path: &str| path == "vendor");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "lib.c");
    }

    #[test]
    fn test_filter_tree_does_not_ask_about_skipped_descendants() {
        use std::sync::Mutex;

        let asked = Mutex::new(Vec::new());
        let skip = |path: &str| {
            asked.lock().unwrap().push(path.to_string());
            path == "node_modules"
        };
        let tree = raw(&[("node_modules", true), ("node_modules/x.js", false), ("a.js", false)]);

        let entries = filter_tree(tree, &skip);
        assert_eq!(entries.len(), 1);
        assert!(!asked.lock().unwrap().contains(&"node_modules/x.js".to_string()));
    }

    #[test]
    fn test_platform_kind_lookup() {
        assert_eq!(PlatformKind::for_host("github.com"), Some(PlatformKind::GitHub));
        assert_eq!(PlatformKind::for_host("GitLab.com"), Some(PlatformKind::GitLab));
        assert_eq!(PlatformKind::for_host("bitbucket.org"), None);
    }

    #[test]
    fn test_registry_rejects_unknown_host() {
        let registry = PlatformRegistry::new(&Auth::default()).unwrap();
        let err = registry.locate("https://bitbucket.org/owner/repo").err().unwrap();
        assert!(matches!(err, ProjiError::UnsupportedPlatform { ref host } if host == "bitbucket.org"));
    }

    #[test]
    fn test_registry_locates_github_url() {
        let registry = PlatformRegistry::new(&Auth::default()).unwrap();
        let (platform, location) = registry.locate("gh:owner/repo@v1").unwrap();
        assert_eq!(platform.name(), "github");
        assert_eq!(location.repo.reference, "v1");
    }
}
