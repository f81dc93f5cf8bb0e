//! Scoped ownership of the process working directory.
//!
//! The working directory is process-wide state. [`WorkingDirGuard`] is the only place
//! that changes it: at most one guard exists at a time, and the previous directory is
//! restored when the guard is left or dropped, whichever comes first. A [`Reservation`]
//! claims that single slot ahead of the switch, so a caller that loses the race learns
//! about it before creating anything.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::ProjiError;

static HELD: AtomicBool = AtomicBool::new(false);

/// Exclusive claim on the process working directory, taken before anything touches the
/// filesystem. Dropping an unused reservation releases it.
#[derive(Debug)]
pub struct Reservation {
    active: bool,
}

impl Reservation {
    /// Claim the working directory for a later switch into `dir`.
    ///
    /// # Errors
    ///
    /// [`ProjiError::InvalidInput`] if another reservation or guard is alive.
    pub fn acquire(dir: &Path) -> Result<Self, ProjiError> {
        if HELD.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(ProjiError::invalid(format!(
                "cannot enter {}: the working directory is held by another materialization",
                dir.display()
            )));
        }
        Ok(Self {
            active: true,
        })
    }

    /// Switch into `dir`, remembering the current directory.
    ///
    /// # Errors
    ///
    /// I/O errors if the current directory cannot be read or `dir` cannot be entered.
    /// The reservation is released and the working directory is unchanged.
    pub fn enter(mut self, dir: &Path) -> Result<WorkingDirGuard> {
        let previous =
            std::env::current_dir().context("Failed to read the current working directory")?;
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to change directory to {}", dir.display()))?;

        self.active = false;
        tracing::debug!("entered {} (was {})", dir.display(), previous.display());
        Ok(WorkingDirGuard {
            previous,
            restored: false,
        })
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.active {
            HELD.store(false, Ordering::SeqCst);
        }
    }
}

/// Holds the process working directory inside a project root.
#[derive(Debug)]
pub struct WorkingDirGuard {
    previous: PathBuf,
    restored: bool,
}

impl WorkingDirGuard {
    /// Reserve and switch into `dir` in one step.
    ///
    /// # Errors
    ///
    /// See [`Reservation::acquire`] and [`Reservation::enter`]. On error the working
    /// directory is unchanged and nothing is held.
    pub fn enter(dir: &Path) -> Result<Self> {
        Reservation::acquire(dir)?.enter(dir)
    }

    /// Directory that will be restored.
    #[must_use]
    pub fn previous(&self) -> &Path {
        &self.previous
    }

    /// Restore the previous directory and release the guard, reporting failures.
    pub fn leave(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        let result = std::env::set_current_dir(&self.previous);
        HELD.store(false, Ordering::SeqCst);
        tracing::debug!("returned to {}", self.previous.display());
        result.with_context(|| {
            format!("Failed to change back to {}", self.previous.display())
        })
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!("{e:#}");
        }
    }
}

/// Whether a guard is currently alive.
#[must_use]
pub fn is_held() -> bool {
    HELD.load(Ordering::SeqCst)
}
