use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static RE_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)/([A-Za-z0-9._-]+)$").unwrap());
static RE_SSH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^git@github\.com:([^/]+/[^/]+?)(?:\.git)?/?$").unwrap());

/// A GitHub repository named by owner and repository name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// `owner/name`, the form stored as a project's full name.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// True if a project's full name refers to this repository.
    /// GitHub names are case-insensitive.
    pub fn matches(&self, full_name: &str) -> bool {
        full_name.eq_ignore_ascii_case(&self.full_name())
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parse a repository reference.
///
/// Accepted forms:
/// - `owner/repo`
/// - `https://github.com/owner/repo` (any trailing path, `.git` suffix allowed)
/// - `git@github.com:owner/repo.git`
pub fn parse_repo_ref(input: &str) -> Result<RepoRef> {
    let input = input.trim();

    if let Some(caps) = RE_SSH.captures(input) {
        return parse_slug(input, &caps[1]);
    }

    if input.contains("://") {
        let url = url::Url::parse(input)
            .map_err(|e| Error::InvalidRepository(format!("{input}: {e}")))?;
        let host = url.host_str().unwrap_or("");
        if !host.eq_ignore_ascii_case("github.com") && !host.eq_ignore_ascii_case("www.github.com")
        {
            return Err(Error::InvalidRepository(format!("not a GitHub URL: {input}")));
        }
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        return match segments.as_slice() {
            [owner, repo, ..] => parse_slug(input, &format!("{owner}/{repo}")),
            _ => Err(Error::InvalidRepository(format!(
                "missing owner or repository in URL: {input}"
            ))),
        };
    }

    parse_slug(input, input)
}

fn parse_slug(input: &str, slug: &str) -> Result<RepoRef> {
    let slug = slug.strip_suffix(".git").unwrap_or(slug);
    let caps = RE_SLUG
        .captures(slug)
        .ok_or_else(|| Error::InvalidRepository(format!("expected owner/repo, got: {input}")))?;
    Ok(RepoRef {
        owner: caps[1].to_string(),
        name: caps[2].to_string(),
    })
}
