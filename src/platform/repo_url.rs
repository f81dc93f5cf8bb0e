//! Repository URL handling.
//!
//! Accepted forms:
//!
//! - `https://github.com/owner/repo`, optionally with `.git` or a trailing slash
//! - `https://github.com/owner/repo/tree/<ref>/<path>` and `/blob/<ref>/<path>`
//! - `https://gitlab.com/owner/repo/-/tree/<ref>/<path>` (the `/-` is optional)
//! - `gh:owner/repo` and `gl:owner/repo` abbreviations
//! - a trailing `@<ref>` on any of the above, e.g. `gh:owner/repo@v1.2.0`
//!
//! [`parse_repo_url`] normalizes all of these into a [`Url`] whose path carries the
//! reference in the host's own tree syntax. [`extract_location`] then splits that path
//! into owner, name, reference and in-repository path.

use regex::Regex;
use url::Url;

use super::{RepoInfo, RepoLocation};
use crate::constants::DEFAULT_REF;
use crate::core::ProjiError;

/// Known host abbreviations.
const ABBREVIATIONS: &[(&str, &str)] =
    &[("gh:", "https://github.com/"), ("gl:", "https://gitlab.com/")];

/// Path pattern of GitHub repository URLs.
pub const GITHUB_PATH_PATTERN: &str = r"^/?([^/]+)/([^/]+)(?:/(?:tree|blob)/([^/]+)(?:/(.+))?)?";

/// Path pattern of GitLab repository URLs.
pub const GITLAB_PATH_PATTERN: &str =
    r"^/?([^/]+)/([^/]+)(?:(?:/-)?/(?:tree|blob)/([^/]+)(?:/(.+))?)?";

fn invalid(url: &str, reason: impl Into<String>) -> ProjiError {
    ProjiError::InvalidUrl {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Normalize a user-supplied repository URL.
///
/// # Errors
///
/// [`ProjiError::InvalidUrl`] for empty input, more than one `@`, or unparseable URLs.
///
/// ```
/// use proji_cli::platform::parse_repo_url;
///
/// let url = parse_repo_url("gh:owner/repo@develop").unwrap();
/// assert_eq!(url.as_str(), "https://github.com/owner/repo/tree/develop");
/// ```
pub fn parse_repo_url(raw: &str) -> Result<Url, ProjiError> {
    let mut normalized = raw.trim().to_string();
    if normalized.is_empty() {
        return Err(invalid(raw, "empty URL"));
    }

    normalized = normalized.trim_end_matches('/').to_string();
    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized = stripped.to_string();
    }

    for (abbreviation, full) in ABBREVIATIONS {
        if let Some(rest) = normalized.strip_prefix(abbreviation) {
            normalized = format!("{full}{}", rest.trim_start_matches('/'));
            break;
        }
    }

    let parts: Vec<&str> = normalized.split('@').collect();
    let (base, reference) = match parts.as_slice() {
        [base] => (*base, None),
        [base, reference] if !reference.is_empty() => (*base, Some(*reference)),
        [_, _] => return Err(invalid(raw, "empty reference after '@'")),
        _ => return Err(invalid(raw, "more than one '@' in URL")),
    };

    let mut url = Url::parse(base).map_err(|e| invalid(raw, e.to_string()))?;
    if let Some(reference) = reference {
        let suffix = match url.host_str() {
            Some("gitlab.com") => format!("/-/tree/{reference}"),
            _ => format!("/tree/{reference}"),
        };
        let path = format!("{}{suffix}", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }

    Ok(url)
}

/// Split a normalized URL's path into repository identity and in-repository path.
///
/// The reference defaults to `main` when the URL names none. The path is empty when the
/// URL points at the repository itself.
pub fn extract_location(url: &Url, pattern: &str) -> Result<RepoLocation, ProjiError> {
    let regex = Regex::new(pattern).map_err(|e| ProjiError::Other {
        message: format!("invalid repository path pattern: {e}"),
    })?;

    let captures = regex
        .captures(url.path())
        .ok_or_else(|| invalid(url.as_str(), "path does not name an owner and repository"))?;

    let group = |index: usize| captures.get(index).map_or("", |m| m.as_str());
    let owner = group(1);
    let name = group(2);
    if owner.is_empty() || name.is_empty() {
        return Err(invalid(url.as_str(), "missing owner or repository name"));
    }

    let reference = match group(3) {
        "" => {
            tracing::debug!("no ref in {url}, using default '{DEFAULT_REF}'");
            DEFAULT_REF
        }
        reference => reference,
    };

    Ok(RepoLocation {
        repo: RepoInfo {
            owner: owner.to_string(),
            name: name.to_string(),
            reference: reference.to_string(),
        },
        path: group(4).to_string(),
    })
}

/// Last path segment of a URL, used as the cache file name of a dependency.
pub fn url_basename(url: &Url) -> Option<String> {
    url.path_segments()?.filter(|segment| !segment.is_empty()).next_back().map(str::to_string)
}
