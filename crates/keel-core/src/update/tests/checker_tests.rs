use std::sync::Arc;

use async_trait::async_trait;
use tempfile::tempdir;

use crate::kernel::error::Result;
use crate::update::{ReleaseSource, UpdateChecker};

/// Canned release source.
struct FakeSource {
    latest_release: Option<String>,
    first_tag: Option<String>,
}

#[async_trait]
impl ReleaseSource for FakeSource {
    async fn latest_release_tag(&self, _repo: &str) -> Result<Option<String>> {
        Ok(self.latest_release.clone())
    }

    async fn first_tag(&self, _repo: &str) -> Result<Option<String>> {
        Ok(self.first_tag.clone())
    }
}

fn checker(latest_release: Option<&str>, first_tag: Option<&str>) -> UpdateChecker {
    UpdateChecker::new(Arc::new(FakeSource {
        latest_release: latest_release.map(str::to_string),
        first_tag: first_tag.map(str::to_string),
    }))
}

fn write_manifest(dir: &std::path::Path, contents: &str) {
    std::fs::write(dir.join("manifest.json"), contents).unwrap();
}

const MANIFEST: &str = r#"{
  "name": "widgets",
  "version": "1.2.0",
  "repository": { "url": "https://github.com/acme/widgets.git" }
}"#;

#[tokio::test]
async fn test_update_available_when_remote_is_newer() {
    let dir = tempdir().unwrap();
    write_manifest(dir.path(), MANIFEST);

    let status = checker(Some("v1.10.0"), None)
        .check_module(dir.path())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(status.module_name, "widgets");
    assert_eq!(status.current_version, "1.2.0");
    assert_eq!(status.latest_version.as_deref(), Some("1.10.0"));
    assert!(status.has_update);
    assert_eq!(status.repository_url.as_deref(), Some("acme/widgets"));
}

#[tokio::test]
async fn test_no_update_when_remote_is_not_newer() {
    let dir = tempdir().unwrap();
    write_manifest(dir.path(), MANIFEST);

    let status = checker(Some("v1.2"), None)
        .check_module(dir.path())
        .await
        .unwrap()
        .unwrap();
    assert!(!status.has_update);
}

#[tokio::test]
async fn test_falls_back_to_first_tag_without_releases() {
    let dir = tempdir().unwrap();
    write_manifest(dir.path(), MANIFEST);

    let status = checker(None, Some("2.0.0"))
        .check_module(dir.path())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.latest_version.as_deref(), Some("2.0.0"));
    assert!(status.has_update);
}

#[tokio::test]
async fn test_no_remote_version_at_all() {
    let dir = tempdir().unwrap();
    write_manifest(dir.path(), MANIFEST);

    let status = checker(None, None)
        .check_module(dir.path())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.latest_version, None);
    assert!(!status.has_update);
}

#[tokio::test]
async fn test_directory_without_manifest_is_skipped() {
    let dir = tempdir().unwrap();
    let status = checker(Some("9.9.9"), None).check_module(dir.path()).await.unwrap();
    assert!(status.is_none());
}

#[tokio::test]
async fn test_manifest_without_repository_reports_no_remote() {
    let dir = tempdir().unwrap();
    write_manifest(dir.path(), r#"{"version": "0.1.0"}"#);

    let status = checker(Some("9.9.9"), None)
        .check_module(dir.path())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.repository_url, None);
    assert_eq!(status.latest_version, None);
    assert!(!status.has_update);
    // Name falls back to the directory name.
    assert!(!status.module_name.is_empty());
}

#[tokio::test]
async fn test_string_repository_field_is_accepted() {
    let dir = tempdir().unwrap();
    write_manifest(
        dir.path(),
        r#"{"version": "1.0.0", "repository": "git@github.com:acme/widgets.git"}"#,
    );

    let status = checker(Some("v1.0.1"), None)
        .check_module(dir.path())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.repository_url.as_deref(), Some("acme/widgets"));
    assert!(status.has_update);
}
