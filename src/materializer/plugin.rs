//! Plugin execution.
//!
//! Plugins are scripts run as child processes. The interpreter comes from the file
//! extension:
//!
//! | Extension | Interpreter |
//! |-----------|-------------|
//! | `.lua`    | `lua`       |
//! | `.sh`     | `sh`        |
//! | `.py`     | `python3`   |
//! | `.js`     | `node`      |
//!
//! Any other file is executed directly. The child runs with the project root as its
//! working directory and gets `PROJI_PROJECT_ROOT`, `PROJI_PACKAGE_LABEL` and
//! `PROJI_PHASE` in its environment. Output is captured and logged at debug level.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::core::ProjiError;
use crate::models::{Phase, Plugin};

/// Interpreter per script extension.
const INTERPRETERS: &[(&str, &str)] =
    &[("lua", "lua"), ("sh", "sh"), ("py", "python3"), ("js", "node")];

pub const PROJECT_ROOT_ENV: &str = "PROJI_PROJECT_ROOT";
pub const PACKAGE_LABEL_ENV: &str = "PROJI_PACKAGE_LABEL";
pub const PHASE_ENV: &str = "PROJI_PHASE";

/// What a plugin runs against.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    /// Absolute project root
    pub root: &'a Path,
    pub label: &'a str,
    pub phase: Phase,
}

/// Runs plugin scripts from the plugin cache.
#[derive(Debug, Clone)]
pub struct PluginRunner {
    plugins_dir: PathBuf,
}

impl PluginRunner {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
        }
    }

    /// Absolute script path; relative plugin paths live under the plugin cache.
    #[must_use]
    pub fn script_path(&self, plugin: &Plugin) -> PathBuf {
        let path = Path::new(&plugin.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.plugins_dir.join(path)
        }
    }

    /// Run one plugin to completion.
    ///
    /// # Errors
    ///
    /// [`ProjiError::PluginFailed`] when the script is missing, no interpreter is found,
    /// the process cannot be spawned or it exits unsuccessfully.
    /// [`ProjiError::Cancelled`] when the token fires while the plugin runs; the child is
    /// killed.
    pub async fn run(
        &self,
        plugin: &Plugin,
        context: PluginContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ProjiError> {
        let failed = |reason: String| ProjiError::PluginFailed {
            plugin: plugin.path.clone(),
            phase: context.phase,
            reason,
        };

        let script = self.script_path(plugin);
        if tokio::fs::metadata(&script).await.is_err() {
            return Err(failed(format!("script {} does not exist", script.display())));
        }

        let (program, args) = command_for(&script).map_err(failed)?;
        tracing::debug!(
            target: "plugin",
            "executing {} plugin: {} {}",
            context.phase,
            program.display(),
            args.iter().map(|arg| arg.to_string_lossy()).collect::<Vec<_>>().join(" ")
        );

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(context.root)
            .env(PROJECT_ROOT_ENV, context.root)
            .env(PACKAGE_LABEL_ENV, context.label)
            .env(PHASE_ENV, context.phase.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| failed(format!("failed to start: {e}")))?;

        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::warn!("cancelled while running plugin {}, killing it", plugin.path);
                return Err(ProjiError::cancelled(format!("{} plugin {}", context.phase, plugin.path)));
            }
            output = child.wait_with_output() => {
                output.map_err(|e| failed(format!("failed to wait for process: {e}")))?
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(target: "plugin", "{} stdout: {}", plugin.path, stdout.trim());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "a signal".to_string(), |code| format!("exit code {code}"));
            let mut reason = format!("terminated with {code}");
            if !stderr.trim().is_empty() {
                reason.push_str(": ");
                reason.push_str(stderr.trim());
            }
            return Err(failed(reason));
        }

        Ok(())
    }
}

/// Program and arguments that execute `script`.
fn command_for(script: &Path) -> Result<(PathBuf, Vec<OsString>), String> {
    let extension = script.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    let interpreter = INTERPRETERS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(extension))
        .map(|(_, interpreter)| *interpreter);

    match interpreter {
        Some(interpreter) => {
            let program = which::which(interpreter)
                .map_err(|_| format!("interpreter '{interpreter}' not found in PATH"))?;
            Ok((program, vec![script.as_os_str().to_os_string()]))
        }
        None => Ok((script.to_path_buf(), Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(root: &Path) -> PluginContext<'_> {
        PluginContext {
            root,
            label: "demo",
            phase: Phase::Pre,
        }
    }

    #[test]
    fn test_script_path_resolution() {
        let runner = PluginRunner::new("/cache/plugins");
        let relative = Plugin {
            path: "github/owner/init.sh".into(),
            ..Plugin::default()
        };
        assert_eq!(runner.script_path(&relative), PathBuf::from("/cache/plugins/github/owner/init.sh"));

        let absolute = Plugin {
            path: "/opt/init.sh".into(),
            ..Plugin::default()
        };
        assert_eq!(runner.script_path(&absolute), PathBuf::from("/opt/init.sh"));
    }

    #[test]
    fn test_unknown_extension_runs_directly() {
        let (program, args) = command_for(Path::new("/tmp/setup")).unwrap();
        assert_eq!(program, PathBuf::from("/tmp/setup"));
        assert!(args.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plugin_sees_environment_and_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(
            temp.path().join("env.sh"),
            "echo \"$PROJI_PACKAGE_LABEL $PROJI_PHASE\" > seen.txt\npwd >> seen.txt\n",
        )
        .unwrap();

        let runner = PluginRunner::new(temp.path());
        let plugin = Plugin {
            path: "env.sh".into(),
            ..Plugin::default()
        };
        runner.run(&plugin, context(&root), &CancellationToken::new()).await.unwrap();

        let seen = std::fs::read_to_string(root.join("seen.txt")).unwrap();
        let mut lines = seen.lines();
        assert_eq!(lines.next(), Some("demo pre"));
        let cwd = PathBuf::from(lines.next().unwrap());
        assert_eq!(cwd.canonicalize().unwrap(), root.canonicalize().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_plugin_failure() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("fail.sh"), "echo broken >&2\nexit 3\n").unwrap();

        let runner = PluginRunner::new(temp.path());
        let plugin = Plugin {
            path: "fail.sh".into(),
            ..Plugin::default()
        };
        let err = runner
            .run(&plugin, context(temp.path()), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ProjiError::PluginFailed {
                plugin,
                phase,
                reason,
            } => {
                assert_eq!(plugin, "fail.sh");
                assert_eq!(phase, Phase::Pre);
                assert!(reason.contains("exit code 3"));
                assert!(reason.contains("broken"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_script_is_plugin_failure() {
        let temp = TempDir::new().unwrap();
        let runner = PluginRunner::new(temp.path());
        let plugin = Plugin {
            path: "nope.sh".into(),
            ..Plugin::default()
        };
        let err = runner
            .run(&plugin, context(temp.path()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProjiError::PluginFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_running_plugin() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("slow.sh"), "sleep 30\n").unwrap();

        let runner = PluginRunner::new(temp.path());
        let plugin = Plugin {
            path: "slow.sh".into(),
            ..Plugin::default()
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = runner.run(&plugin, context(temp.path()), &cancel).await.unwrap_err();
        assert!(matches!(err, ProjiError::Cancelled { .. }));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
