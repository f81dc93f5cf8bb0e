//! Error handling for proji
//!
//! Two layers work together here:
//! 1. [`ProjiError`] is the strongly-typed root cause. Callers branch on it.
//! 2. [`ErrorContext`] wraps an error with a suggestion and details for CLI output.
//!
//! Library code returns [`anyhow::Result`] and attaches operation context with
//! [`anyhow::Context`] (`"download template ..."`, `"run pre plugin ..."`). The typed root
//! cause stays reachable through the chain; use [`find_error`] to get it back.
//!
//! # Error classes
//!
//! - **Input**: [`ProjiError::InvalidInput`], [`ProjiError::InvalidUrl`] fail fast
//! - **Lookup**: [`ProjiError::NotFound`] and [`ProjiError::Conflict`] are distinct
//! - **Transport**: [`ProjiError::Transport`] is terminal, [`ProjiError::RateLimited`] is
//!   the only retryable class (see [`ProjiError::is_retryable`])
//! - **Execution**: [`ProjiError::PluginFailed`] names the plugin and its phase
//! - **Cancellation**: [`ProjiError::Cancelled`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use proji_cli::core::{ProjiError, find_error, user_friendly_error};
//! use anyhow::Context;
//!
//! fn store() -> anyhow::Result<()> {
//!     Err(ProjiError::Conflict { what: "package 'rs'".to_string() })
//!         .context("store package 'rs'")?;
//!     Ok(())
//! }
//!
//! let err = store().unwrap_err();
//! assert!(matches!(find_error(&err), Some(ProjiError::Conflict { .. })));
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::models::Phase;

/// The main error type for proji operations.
#[derive(Error, Debug)]
pub enum ProjiError {
    /// Malformed input such as an invalid package definition or a bad path.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input
        reason: String,
    },

    /// A repository URL could not be decomposed into owner, name and reference.
    #[error("Invalid repository URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL as given
        url: String,
        /// Why decomposition failed
        reason: String,
    },

    /// No registered platform handles the URL's host.
    #[error("Unsupported code hosting platform: {host}")]
    UnsupportedPlatform {
        /// Host name taken from the URL
        host: String,
    },

    /// A package, project, file or directory does not exist.
    #[error("{what} not found")]
    NotFound {
        /// Human-readable description of the missing thing
        what: String,
    },

    /// A package label, project path or project root is already taken.
    #[error("{what} already exists")]
    Conflict {
        /// Human-readable description of the existing thing
        what: String,
    },

    /// Network or authentication failure while talking to a platform or endpoint.
    #[error("Transport failure on {platform} while fetching '{path}': {reason}")]
    Transport {
        /// Platform or endpoint name ("github", "gitlab", "remote")
        platform: String,
        /// Repository path or API path being fetched
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// The platform's request quota is exhausted.
    ///
    /// This is the only error class callers may retry after a delay.
    #[error("Rate limit exceeded on {platform} while fetching '{path}'")]
    RateLimited {
        /// Platform name
        platform: String,
        /// Repository path being fetched
        path: String,
    },

    /// A plugin exited unsuccessfully or could not be started.
    #[error("{phase} plugin '{plugin}' failed: {reason}")]
    PluginFailed {
        /// Plugin path as configured in the package
        plugin: String,
        /// Phase the plugin ran in
        phase: Phase,
        /// Exit status or spawn error
        reason: String,
    },

    /// The caller's cancellation signal fired.
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// The step that was abandoned
        operation: String,
    },

    /// Configuration file problems
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl ProjiError {
    /// Whether the failure is transient and the caller may retry later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Shorthand for [`ProjiError::InvalidInput`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ProjiError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
        }
    }

    /// Shorthand for [`ProjiError::Conflict`].
    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict {
            what: what.into(),
        }
    }

    /// Shorthand for [`ProjiError::Cancelled`].
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Copy the error for display. Foreign source errors collapse into [`ProjiError::Other`].
    fn duplicate(&self) -> Self {
        match self {
            Self::InvalidInput {
                reason,
            } => Self::invalid(reason.clone()),
            Self::InvalidUrl {
                url,
                reason,
            } => Self::InvalidUrl {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::UnsupportedPlatform {
                host,
            } => Self::UnsupportedPlatform {
                host: host.clone(),
            },
            Self::NotFound {
                what,
            } => Self::not_found(what.clone()),
            Self::Conflict {
                what,
            } => Self::conflict(what.clone()),
            Self::Transport {
                platform,
                path,
                reason,
            } => Self::Transport {
                platform: platform.clone(),
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::RateLimited {
                platform,
                path,
            } => Self::RateLimited {
                platform: platform.clone(),
                path: path.clone(),
            },
            Self::PluginFailed {
                plugin,
                phase,
                reason,
            } => Self::PluginFailed {
                plugin: plugin.clone(),
                phase: *phase,
                reason: reason.clone(),
            },
            Self::Cancelled {
                operation,
            } => Self::cancelled(operation.clone()),
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            other => Self::Other {
                message: other.to_string(),
            },
        }
    }
}

/// Walk an error chain and return the first [`ProjiError`] in it.
///
/// Context layers added with [`anyhow::Context`] are skipped over, so this finds the
/// typed root cause no matter how many operations wrapped it.
#[must_use]
pub fn find_error(error: &anyhow::Error) -> Option<&ProjiError> {
    error.chain().find_map(|cause| cause.downcast_ref::<ProjiError>())
}

/// Error context wrapper that provides user-friendly error information.
///
/// Displayed as a red `error:` line, followed by optional yellow details and a
/// green suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ProjiError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: ProjiError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions for the CLI.
///
/// The operation chain built up with [`anyhow::Context`] is kept in the details so the
/// user sees which step failed ("create project ..." → "run pre plugin ...").
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain: Vec<String> = error.chain().map(std::string::ToString::to_string).collect();

    if let Some(root) = find_error(&error) {
        let mut context = create_error_context(root.duplicate());
        let operations: Vec<&String> =
            chain.iter().take_while(|message| **message != root.to_string()).collect();
        if !operations.is_empty() {
            let trail =
                operations.iter().map(|op| op.as_str()).collect::<Vec<_>>().join("\n  while: ");
            let details = match context.details.take() {
                Some(existing) => format!("while: {trail}\n{existing}"),
                None => format!("while: {trail}"),
            };
            context = context.with_details(details);
        }
        return context;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(ProjiError::Other {
                    message: io_error.to_string(),
                })
                .with_suggestion("Check file ownership and permissions");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(ProjiError::Other {
                    message: io_error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    let mut message = error.to_string();
    let causes: Vec<&String> = chain.iter().skip(1).collect();
    if !causes.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in causes.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(ProjiError::Other {
        message,
    })
}

fn create_error_context(error: ProjiError) -> ErrorContext {
    match &error {
        ProjiError::InvalidUrl { .. } => ErrorContext::new(error).with_suggestion(
            "Use a full repository URL such as https://github.com/owner/repo or an abbreviation like gh:owner/repo",
        ),
        ProjiError::UnsupportedPlatform { .. } => ErrorContext::new(error)
            .with_suggestion("Only github.com and gitlab.com repositories are supported"),
        ProjiError::NotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'proji package ls' or 'proji ls' to see what is available"),
        ProjiError::Conflict { .. } => ErrorContext::new(error)
            .with_suggestion("Choose another label or path, or remove the existing one first"),
        ProjiError::Transport { .. } => ErrorContext::new(error)
            .with_suggestion("Check your network connection and that the configured token has access to the repository"),
        ProjiError::RateLimited { platform, .. } => {
            let variable = if platform == "gitlab" {
                "PROJI_GITLAB_TOKEN"
            } else {
                "PROJI_GITHUB_TOKEN"
            };
            ErrorContext::new(error)
                .with_suggestion(format!("Wait a while and retry, or set {variable} to raise the quota"))
                .with_details("Anonymous API access is limited to a small number of requests per hour")
        }
        ProjiError::PluginFailed { .. } => ErrorContext::new(error)
            .with_suggestion("Run the plugin by hand inside the project directory to see its output")
            .with_details("Files created before the failure are left on disk"),
        ProjiError::Cancelled { .. } => ErrorContext::new(error),
        ProjiError::ConfigError { .. } | ProjiError::TomlError(_) => ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax of your configuration. Run 'proji init' to write a default one"),
        _ => ErrorContext::new(error),
    }
}
