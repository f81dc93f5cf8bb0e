//! Package config files, folder import and export.

use proji_cli::core::{ProjiError, find_error};
use proji_cli::portability::{
    ConfigFormat, decode, encode, export_config_file, import_config_file, import_folder,
};
use proji_cli::test_utils::fixtures::full_package;
use regex::Regex;
use tempfile::TempDir;

#[test]
fn test_full_package_survives_both_encodings() {
    let package = full_package();
    for format in [ConfigFormat::Toml, ConfigFormat::Json] {
        let encoded = encode(&package, format).unwrap();
        let decoded = decode(&encoded, format).unwrap();
        assert_eq!(decoded, package, "{format} round trip changed the package");
        assert_eq!(decoded.pre_plugins(), package.pre_plugins());
        assert_eq!(decoded.post_plugins(), package.post_plugins());
    }
}

#[tokio::test]
async fn test_export_then_import_in_each_format() {
    let temp = TempDir::new().unwrap();
    let package = full_package();

    for format in [ConfigFormat::Toml, ConfigFormat::Json] {
        let path = export_config_file(&package, temp.path(), format).await.unwrap();
        assert_eq!(path.file_name().unwrap().to_string_lossy(), format!("proji-rs.{format}"));

        let imported = import_config_file(&path).await.unwrap();
        assert_eq!(imported, package);

        let err = export_config_file(&package, temp.path(), format).await.unwrap_err();
        assert!(matches!(find_error(&err), Some(ProjiError::Conflict { .. })));
    }
}

#[tokio::test]
async fn test_import_without_hash_records_file_hash() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go.toml");
    std::fs::write(&path, "label = \"go\"\nname = \"Go\"\n").unwrap();

    let first = import_config_file(&path).await.unwrap();
    let second = import_config_file(&path).await.unwrap();

    let sha = first.sha.clone().unwrap();
    assert_eq!(sha.len(), 64);
    assert_eq!(second.sha, first.sha);
}

#[tokio::test]
async fn test_unknown_extension_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go.yaml");
    std::fs::write(&path, "label: go").unwrap();

    let err = import_config_file(&path).await.unwrap_err();
    assert!(matches!(find_error(&err), Some(ProjiError::InvalidInput { .. })));
}

#[test]
fn test_folder_import_skips_excluded_subtrees() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("service");
    for dir in ["src/handlers", ".git/objects", "node_modules/pkg"] {
        std::fs::create_dir_all(root.join(dir)).unwrap();
    }
    std::fs::write(root.join("src/handlers/http.go"), "package handlers").unwrap();
    std::fs::write(root.join(".git/objects/ab"), "").unwrap();
    std::fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
    std::fs::write(root.join("go.mod"), "module service").unwrap();

    let exclude = Regex::new(r"^(\.git|node_modules)$").unwrap();
    let package = import_folder(&root, Some(&exclude)).unwrap();

    let entries: Vec<(&str, bool)> =
        package.dir_tree.entries.iter().map(|entry| (entry.path.as_str(), entry.is_dir)).collect();
    assert_eq!(
        entries,
        vec![
            ("go.mod", false),
            ("src", true),
            ("src/handlers", true),
            ("src/handlers/http.go", false),
        ]
    );
    assert_eq!(package.name, "service");
    assert!(package.validate().is_ok());
}
