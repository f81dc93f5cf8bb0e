//! Sample packages shared by unit and integration tests.

use crate::models::{DirEntry, Package, Plugin, PluginSchedule, Template};

/// Directory entry without a template.
pub fn dir(path: &str) -> DirEntry {
    DirEntry {
        path: path.to_string(),
        is_dir: true,
        template: None,
    }
}

/// Empty file entry.
pub fn file(path: &str) -> DirEntry {
    DirEntry {
        path: path.to_string(),
        is_dir: false,
        template: None,
    }
}

/// File entry filled from a cached template.
pub fn templated_file(path: &str, template_path: &str) -> DirEntry {
    DirEntry {
        path: path.to_string(),
        is_dir: false,
        template: Some(Template {
            path: template_path.to_string(),
            destination: path.to_string(),
            is_file: true,
            ..Template::default()
        }),
    }
}

/// Plugin referencing a script in the plugin cache.
pub fn plugin(path: &str) -> Plugin {
    Plugin {
        path: path.to_string(),
        ..Plugin::default()
    }
}

/// The `demo` package: a `src` directory plus `src/main.x` from `tmpl/main.x.tmpl`.
pub fn demo_package() -> Package {
    let mut package = Package::new("demo", "Demo");
    package.dir_tree.entries = vec![dir("src"), templated_file("src/main.x", "tmpl/main.x.tmpl")];
    package
}

/// A package exercising every field, local dependencies only.
pub fn full_package() -> Package {
    let mut package = Package::new("rs", "Rust Service");
    package.description = Some("Service skeleton".to_string());
    package.upstream_url = Some("https://github.com/owner/packages/blob/main/rust.toml".to_string());
    package.sha = Some("abc123".to_string());
    package.dir_tree.entries = vec![
        dir("src"),
        templated_file("src/main.rs", "rust/main.rs"),
        file("README.md"),
        DirEntry {
            path: "docs".to_string(),
            is_dir: true,
            template: Some(Template {
                path: "rust/docs".to_string(),
                destination: String::new(),
                is_file: false,
                upstream_url: None,
                description: Some("documentation skeleton".to_string()),
            }),
        },
    ];
    package.plugins = Some(PluginSchedule {
        pre: vec![plugin("git-init.sh")],
        post: vec![Plugin {
            path: "readme.lua".to_string(),
            upstream_url: None,
            description: Some("fills the readme".to_string()),
        }],
    });
    package
}
