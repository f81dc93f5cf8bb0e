//! Dependency downloads into the template and plugin caches.

use proji_cli::core::{ProjiError, find_error};
use proji_cli::models::{DirEntry, Package, Plugin, PluginSchedule, Template};
use proji_cli::platform::filter_tree;
use proji_cli::test_utils::{FakePlatform, TestEnvironment};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

fn remote_package() -> Package {
    let mut package = Package::new("web", "Web");
    package.dir_tree.entries = vec![
        DirEntry {
            path: "index.html".into(),
            is_dir: false,
            template: Some(Template {
                is_file: true,
                upstream_url: Some("https://github.com/owner/tpl/blob/main/site/index.html".into()),
                ..Template::default()
            }),
        },
        DirEntry {
            path: "assets".into(),
            is_dir: true,
            template: Some(Template {
                is_file: false,
                upstream_url: Some("gh:owner/tpl/tree/main/site/assets".into()),
                ..Template::default()
            }),
        },
    ];
    package.plugins = Some(PluginSchedule {
        pre: Vec::new(),
        post: vec![Plugin {
            upstream_url: Some("https://github.com/owner/tpl/blob/main/hooks/setup.sh".into()),
            ..Plugin::default()
        }],
    });
    package
}

fn fake() -> Arc<FakePlatform> {
    Arc::new(
        FakePlatform::github()
            .with_file("site/index.html", "<html></html>")
            .with_file("site/assets/app.css", "body {}")
            .with_file("site/assets/img/logo.svg", "<svg/>")
            .with_file("hooks/setup.sh", "echo setup"),
    )
}

/// Every file under `root` with its content.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let rel = entry.path().strip_prefix(root).unwrap().to_string_lossy().into_owned();
            (rel, std::fs::read(entry.path()).unwrap())
        })
        .collect()
}

#[tokio::test]
async fn test_fills_in_cache_paths() {
    let env = TestEnvironment::new().unwrap();
    let platform = fake();
    let resolver = env.resolver_with("github.com", platform.clone());
    let mut package = remote_package();

    let resolution = resolver.resolve(&mut package, &CancellationToken::new()).await.unwrap();

    assert_eq!(resolution.fetched.len(), 3);
    let index = package.dir_tree.entries[0].template.as_ref().unwrap();
    assert_eq!(index.path, "github/owner/index.html");
    let assets = package.dir_tree.entries[1].template.as_ref().unwrap();
    assert_eq!(assets.path, "github/owner/assets");
    assert_eq!(package.post_plugins()[0].path, "github/owner/setup.sh");

    assert_eq!(
        std::fs::read_to_string(env.templates_dir.join("github/owner/assets/img/logo.svg")).unwrap(),
        "<svg/>"
    );
    assert_eq!(
        std::fs::read_to_string(env.plugins_dir.join("github/owner/setup.sh")).unwrap(),
        "echo setup"
    );
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let env = TestEnvironment::new().unwrap();
    let platform = fake();
    let resolver = env.resolver_with("github.com", platform.clone());
    let cancel = CancellationToken::new();

    let mut first = remote_package();
    resolver.resolve(&mut first, &cancel).await.unwrap();
    let fetches = platform.fetch_count();
    let listings = platform.listing_count();
    let templates = snapshot(&env.templates_dir);
    let plugins = snapshot(&env.plugins_dir);

    let mut second = remote_package();
    let resolution = resolver.resolve(&mut second, &cancel).await.unwrap();

    assert!(resolution.fetched.is_empty());
    assert_eq!(resolution.cached.len(), 3);
    assert_eq!(platform.fetch_count(), fetches);
    assert_eq!(platform.listing_count(), listings);
    assert_eq!(snapshot(&env.templates_dir), templates);
    assert_eq!(snapshot(&env.plugins_dir), plugins);
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_local_dependencies_are_left_alone() {
    let env = TestEnvironment::new().unwrap();
    let platform = fake();
    let resolver = env.resolver_with("github.com", platform.clone());
    let mut package = proji_cli::test_utils::fixtures::full_package();
    let before = package.clone();

    let resolution = resolver.resolve(&mut package, &CancellationToken::new()).await.unwrap();

    assert!(resolution.is_empty());
    assert_eq!(package, before);
    assert_eq!(platform.fetch_count(), 0);
}

#[test]
fn test_vendor_subtree_is_skipped() {
    let raw = vec![
        ("cmd".to_string(), true),
        ("cmd/main.go".to_string(), false),
        ("vendor".to_string(), true),
        ("vendor/lib".to_string(), true),
        ("vendor/lib/lib.go".to_string(), false),
        ("vendored.txt".to_string(), false),
    ];

    let kept = filter_tree(raw, &|path: &str| path == "vendor");

    let paths: Vec<&str> = kept.iter().map(|entry| entry.path.as_str()).collect();
    assert_eq!(paths, vec!["cmd", "cmd/main.go", "vendored.txt"]);
    assert!(kept[0].is_dir);
    assert!(!kept[2].is_dir);
}

#[tokio::test]
async fn test_cancellation_after_first_download_stops_the_run() {
    let env = TestEnvironment::new().unwrap();
    let cancel = CancellationToken::new();
    let platform = Arc::new(
        FakePlatform::github()
            .with_file("site/index.html", "<html></html>")
            .with_file("site/assets/app.css", "body {}")
            .with_file("hooks/setup.sh", "echo setup")
            .cancel_after(1, &cancel),
    );
    let resolver = env.resolver_with("github.com", platform.clone());
    let mut package = remote_package();

    let err = resolver.resolve(&mut package, &cancel).await.unwrap_err();

    assert!(matches!(find_error(&err), Some(ProjiError::Cancelled { .. })));
    assert_eq!(platform.fetch_count(), 1);
    assert_eq!(platform.listing_count(), 0);
    assert!(env.templates_dir.join("github/owner/index.html").is_file());
    assert!(!env.templates_dir.join("github/owner/assets").exists());
    assert!(!env.plugins_dir.join("github/owner/setup.sh").exists());
}

#[tokio::test]
async fn test_cancellation_inside_directory_download_leaves_no_partial_copy() {
    let env = TestEnvironment::new().unwrap();
    let cancel = CancellationToken::new();
    let platform = Arc::new(
        FakePlatform::github()
            .with_file("site/assets/app.css", "body {}")
            .with_file("site/assets/img/logo.svg", "<svg/>")
            .cancel_after(1, &cancel),
    );
    let resolver = env.resolver_with("github.com", platform.clone());
    let mut package = remote_package();
    package.dir_tree.entries.remove(0);
    package.plugins = None;

    let err = resolver.resolve(&mut package, &cancel).await.unwrap_err();

    assert!(matches!(find_error(&err), Some(ProjiError::Cancelled { .. })));
    assert_eq!(platform.fetch_count(), 1);
    assert!(!env.templates_dir.join("github/owner/assets").exists());
    let owner_dir = env.templates_dir.join("github/owner");
    let staged: Vec<_> = std::fs::read_dir(&owner_dir)
        .map(|entries| entries.filter_map(Result::ok).collect())
        .unwrap_or_default();
    assert!(staged.is_empty(), "left behind: {staged:?}");
}
