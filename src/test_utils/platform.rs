//! In-memory platform for resolver and import tests.

use anyhow::Result;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::ProjiError;
use crate::platform::repo_url::{GITHUB_PATH_PATTERN, GITLAB_PATH_PATTERN, extract_location};
use crate::platform::{
    FileContent, PathSkipper, Platform, RepoInfo, RepoLocation, RepoTree, filter_tree,
};
use crate::utils::fs::sha256_hex;

/// A single repository held in memory. Any owner/name/ref resolves to it.
///
/// Counts file fetches and tree listings so tests can assert on cache behavior.
#[derive(Debug, Default)]
pub struct FakePlatform {
    name: &'static str,
    files: BTreeMap<String, Vec<u8>>,
    fetches: AtomicUsize,
    listings: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FakePlatform {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Fake answering for github.com URLs.
    pub fn github() -> Self {
        Self::new("github")
    }

    /// Fake answering for gitlab.com URLs.
    pub fn gitlab() -> Self {
        Self::new("gitlab")
    }

    /// Add a file. Parent directories are implied.
    #[must_use]
    pub fn with_file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.files.insert(path.trim_matches('/').to_string(), content.as_ref().to_vec());
        self
    }

    /// Fire `token` once the `fetches`-th file has been served.
    #[must_use]
    pub fn cancel_after(mut self, fetches: usize, token: &CancellationToken) -> Self {
        self.cancel_after = Some((fetches, token.clone()));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    fn raw_tree(&self) -> Vec<(String, bool)> {
        let mut dirs = BTreeSet::new();
        for path in self.files.keys() {
            for (index, _) in path.match_indices('/') {
                dirs.insert(path[..index].to_string());
            }
        }
        let mut raw: Vec<(String, bool)> = dirs
            .into_iter()
            .map(|dir| (dir, true))
            .chain(self.files.keys().map(|file| (file.clone(), false)))
            .collect();
        raw.sort();
        raw
    }
}

impl Platform for FakePlatform {
    fn name(&self) -> &'static str {
        self.name
    }

    fn locate(&self, url: &Url) -> Result<RepoLocation, ProjiError> {
        let pattern = if self.name == "gitlab" {
            GITLAB_PATH_PATTERN
        } else {
            GITHUB_PATH_PATTERN
        };
        extract_location(url, pattern)
    }

    fn fetch_file_content<'a>(
        &'a self,
        repo: &'a RepoInfo,
        path: &'a str,
    ) -> BoxFuture<'a, Result<FileContent>> {
        Box::pin(async move {
            let served = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((_, token)) = self.cancel_after.as_ref().filter(|(after, _)| *after == served) {
                token.cancel();
            }
            let bytes = self
                .files
                .get(path.trim_matches('/'))
                .cloned()
                .ok_or_else(|| ProjiError::not_found(format!("'{repo}:{path}' on {}", self.name)))?;
            let sha = sha256_hex(&bytes);
            Ok(FileContent {
                bytes,
                sha,
            })
        })
    }

    fn list_tree<'a>(
        &'a self,
        _repo: &'a RepoInfo,
        skip: &'a PathSkipper<'a>,
    ) -> BoxFuture<'a, Result<RepoTree>> {
        Box::pin(async move {
            self.listings.fetch_add(1, Ordering::SeqCst);
            Ok(RepoTree {
                entries: filter_tree(self.raw_tree(), skip),
                sha: Some("fake-tree-sha".to_string()),
            })
        })
    }
}
