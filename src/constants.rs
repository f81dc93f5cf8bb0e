//! Global constants used throughout the proji codebase.
//!
//! Default locations, hosting endpoints, HTTP timeouts and file names live here so
//! magic values stay discoverable.

use std::time::Duration;

/// Directory name under the platform config dir (`~/.config/proji` on Linux).
pub const APP_DIR_NAME: &str = "proji";

/// Name of the configuration file inside the app directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "PROJI_CONFIG";

/// Environment variable holding a GitHub token. Takes precedence over the config file.
pub const GITHUB_TOKEN_ENV: &str = "PROJI_GITHUB_TOKEN";

/// Environment variable holding a GitLab token. Takes precedence over the config file.
pub const GITLAB_TOKEN_ENV: &str = "PROJI_GITLAB_TOKEN";

/// Sub-directory holding cached templates.
pub const TEMPLATES_DIR: &str = "templates";

/// Sub-directory holding cached plugins.
pub const PLUGINS_DIR: &str = "plugins";

/// Sub-directory holding the package and project stores.
pub const DATA_DIR: &str = "data";

/// Package store document inside [`DATA_DIR`].
pub const PACKAGES_FILE: &str = "packages.json";

/// Project store document inside [`DATA_DIR`].
pub const PROJECTS_FILE: &str = "projects.json";

/// Folder names skipped when a local folder or repository is imported as a package.
pub const DEFAULT_EXCLUDE_PATTERN: &str = r"^(.git|.env|.idea|.vscode)$";

/// Branch assumed when a repository URL does not name a reference.
pub const DEFAULT_REF: &str = "main";

/// Prefix of exported package configuration files (`proji-<label>.toml`).
pub const EXPORT_FILE_PREFIX: &str = "proji-";

/// Generated labels are cut to this many characters.
pub const MAX_GENERATED_LABEL_LEN: usize = 4;

/// Upper bound for user-chosen labels.
pub const MAX_LABEL_LEN: usize = 16;

/// GitHub REST API root.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// GitLab REST API root.
pub const GITLAB_API_URL: &str = "https://gitlab.com/api/v4";

/// Page size requested from paginated tree listings.
pub const TREE_PAGE_SIZE: u32 = 100;

/// User agent sent with every HTTP request. GitHub rejects requests without one.
pub const USER_AGENT: &str = concat!("proji/", env!("CARGO_PKG_VERSION"));

/// Connect timeout for platform and remote-manager requests.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall timeout for a single platform or remote-manager request.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Versioned path prefix of the remote package endpoint.
pub const REMOTE_API_PREFIX: &str = "/api/v1/packages";
