// ABOUTME: Diagnostics accumulator for non-fatal warnings during release operations.
// ABOUTME: Collects warnings that shouldn't fail an operation but should be shown to users.

/// Collects non-fatal warnings during release operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Hand over the collected warnings, leaving the accumulator empty.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

/// A non-fatal warning collected during a release operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A compensating action failed while unwinding a transaction.
    pub fn rollback_step(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::RollbackStep,
            message: message.into(),
        }
    }

    /// The symlink was unwound with no earlier release to point back to.
    pub fn no_rollback_target(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::NoRollbackTarget,
            message: message.into(),
        }
    }

    /// Cleanup found nothing outside the retention window.
    pub fn nothing_to_clean(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::NothingToClean,
            message: message.into(),
        }
    }

    /// Cleanup failed after a release had already gone live.
    pub fn cleanup_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::CleanupFailed,
            message: message.into(),
        }
    }

    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during release operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A rollback step failed; the remote state may be partially restored.
    RollbackStep,
    /// No previous release existed when unwinding a symlink change.
    NoRollbackTarget,
    /// Cleanup was a no-op.
    NothingToClean,
    /// Post-deploy cleanup failed; old releases may remain.
    CleanupFailed,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
}
