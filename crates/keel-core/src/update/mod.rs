//! Remote version checking for module bundles.
//!
//! A module directory may carry a `manifest.json` with its version and
//! repository URL; [`UpdateChecker`] compares the local version against the
//! latest tag reported by a [`ReleaseSource`]. The source itself (the
//! hosting service client) is deliberately an interface only.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::kernel::constants;
use crate::kernel::error::{KernelError, Result};

/// Outcome of a version check for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub module_name: String,
    pub current_version: String,
    pub latest_version: Option<String>,
    pub has_update: bool,
    pub repository_url: Option<String>,
}

/// Client for the code-hosting service, keyed by `owner/repo`.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Tag of the latest published release, if any.
    async fn latest_release_tag(&self, repo: &str) -> Result<Option<String>>;

    /// First tag of the repository, used when no release exists.
    async fn first_tag(&self, repo: &str) -> Result<Option<String>>;
}

/// Compare two dotted-numeric version strings.
///
/// Components are compared numerically left to right; the shorter version is
/// padded with zeros, so `"1.2"` equals `"1.2.0"` and `"2.0"` sorts below
/// `"10.0"`. Non-numeric components count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |version: &str| -> Vec<u64> {
        version
            .split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let left = parse(a);
    let right = parse(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Normalize a repository URL into `owner/repo` form.
///
/// Accepts `https://host/owner/repo(.git)?`, `git+https://…` and
/// `git@host:owner/repo(.git)?`. Anything else yields `None`.
pub fn normalize_repository_url(url: &str) -> Option<String> {
    let url = url.trim();

    let path = if let Some(rest) = url.strip_prefix("git@") {
        // git@host:owner/repo
        rest.split_once(':').map(|(_, path)| path)?
    } else {
        let rest = url.strip_prefix("git+").unwrap_or(url);
        let rest = rest.strip_prefix("https://")?;
        // host/owner/repo
        rest.split_once('/').map(|(_, path)| path)?
    };

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(format!("{}/{}", owner, repo))
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<String>,
    version: String,
    #[serde(default)]
    repository: Option<RepositoryField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepositoryField {
    Url(String),
    Object { url: String },
}

impl RepositoryField {
    fn url(&self) -> &str {
        match self {
            RepositoryField::Url(url) => url,
            RepositoryField::Object { url } => url,
        }
    }
}

/// Checks module directories for newer published versions.
pub struct UpdateChecker {
    source: Arc<dyn ReleaseSource>,
}

impl UpdateChecker {
    pub fn new(source: Arc<dyn ReleaseSource>) -> Self {
        Self { source }
    }

    /// Check one module directory.
    ///
    /// Directories without a manifest are skipped (`Ok(None)`); a manifest
    /// without a recognizable repository yields a status with no remote
    /// version.
    pub async fn check_module(&self, module_dir: &Path) -> Result<Option<UpdateStatus>> {
        let manifest_path = module_dir.join(constants::MODULE_MANIFEST_FILE);
        let contents = match tokio::fs::read_to_string(&manifest_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(KernelError::io(e, "read", manifest_path)),
        };
        let manifest: RawManifest = serde_json::from_str(&contents)?;

        let module_name = manifest.name.unwrap_or_else(|| {
            module_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let repository_url = manifest
            .repository
            .as_ref()
            .and_then(|r| normalize_repository_url(r.url()));

        let Some(repo) = repository_url.clone() else {
            return Ok(Some(UpdateStatus {
                module_name,
                current_version: manifest.version,
                latest_version: None,
                has_update: false,
                repository_url: None,
            }));
        };

        let tag = match self.source.latest_release_tag(&repo).await? {
            Some(tag) => Some(tag),
            None => self.source.first_tag(&repo).await?,
        };
        let latest_version = tag.map(|t| t.strip_prefix('v').unwrap_or(&t).to_string());

        let has_update = latest_version
            .as_deref()
            .map(|latest| compare_versions(latest, &manifest.version) == Ordering::Greater)
            .unwrap_or(false);

        Ok(Some(UpdateStatus {
            module_name,
            current_version: manifest.version,
            latest_version,
            has_update,
            repository_url,
        }))
    }
}

#[cfg(test)]
mod tests;
