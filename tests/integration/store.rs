//! JSON-backed stores, reopened from disk between steps.

use proji_cli::core::{ProjiError, find_error};
use proji_cli::models::{Package, ProjectRecord};
use proji_cli::store::{JsonStore, PackageStore, ProjectStore};
use proji_cli::test_utils::fixtures::full_package;
use tempfile::TempDir;

fn is_conflict(err: &anyhow::Error) -> bool {
    matches!(find_error(err), Some(ProjiError::Conflict { .. }))
}

fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(find_error(err), Some(ProjiError::NotFound { .. }))
}

#[test]
fn test_package_conflict_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data/packages.json");

    let store = JsonStore::<Package>::open(&path).unwrap();
    store.store(full_package()).unwrap();
    drop(store);

    let reopened = JsonStore::<Package>::open(&path).unwrap();
    assert_eq!(PackageStore::get(&reopened, "rs").unwrap(), full_package());

    let mut other = full_package();
    other.name = "Another".into();
    let err = PackageStore::store(&reopened, other).unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(PackageStore::get(&reopened, "rs").unwrap().name, "Rust Service");
}

#[test]
fn test_missing_keys_are_not_found() {
    let store = JsonStore::<Package>::in_memory();

    assert!(is_not_found(&PackageStore::get(&store, "nope").unwrap_err()));
    assert!(is_not_found(&PackageStore::update(&store, Package::new("nope", "Nope")).unwrap_err()));
    assert!(is_not_found(&PackageStore::remove(&store, "nope").unwrap_err()));
}

#[test]
fn test_project_path_is_free_again_after_removal() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("projects.json");
    let project_dir = temp.path().join("app");

    let store = JsonStore::<ProjectRecord>::open(&path).unwrap();
    let first = ProjectRecord::new(&project_dir, "go");
    ProjectStore::store(&store, first.clone()).unwrap();

    let clash = ProjectRecord::new(&project_dir, "py");
    assert!(is_conflict(&ProjectStore::store(&store, clash.clone()).unwrap_err()));

    ProjectStore::remove(&store, &first.id).unwrap();
    ProjectStore::store(&store, clash.clone()).unwrap();
    drop(store);

    let reopened = JsonStore::<ProjectRecord>::open(&path).unwrap();
    assert_eq!(ProjectStore::fetch_all(&reopened, false).unwrap().len(), 1);
    assert_eq!(ProjectStore::fetch_all(&reopened, true).unwrap().len(), 2);
    assert_eq!(reopened.get_by_path(&project_dir).unwrap().id, clash.id);
    assert!(!ProjectStore::get(&reopened, &first.id).unwrap().is_live());
}
