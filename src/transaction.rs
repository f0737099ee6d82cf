// ABOUTME: Ordered steps with compensating actions, unwound in reverse on failure.
// ABOUTME: Idle -> Running -> Committed | RolledBack.

use std::fmt;

use futures::future::LocalBoxFuture;

use crate::deploy::DeployError;

/// Lifecycle of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Running,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionState::Idle => "idle",
            TransactionState::Running => "running",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        };
        f.write_str(s)
    }
}

/// A deferred compensating action.
pub type Compensation<'a> = LocalBoxFuture<'a, Result<(), DeployError>>;

/// A compensating action that failed while unwinding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindFailure {
    pub label: String,
    pub error: String,
}

/// Executes steps in order and, when one fails, runs every registered
/// compensation in reverse registration order before returning the failure.
///
/// Compensations run one at a time on the caller's task. A compensation that
/// fails is logged and recorded, and unwinding continues.
pub struct Transaction<'a> {
    state: TransactionState,
    compensations: Vec<(String, Compensation<'a>)>,
    unwind_failures: Vec<UnwindFailure>,
}

impl Default for Transaction<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Transaction<'a> {
    pub fn new() -> Self {
        Self {
            state: TransactionState::Idle,
            compensations: Vec::new(),
            unwind_failures: Vec::new(),
        }
    }

    /// Create and begin in one call.
    pub fn started() -> Self {
        let mut tx = Self::new();
        tx.begin();
        tx
    }

    /// Enter Running and forget any previously registered compensations.
    pub fn begin(&mut self) {
        self.state = TransactionState::Running;
        self.compensations.clear();
        self.unwind_failures.clear();
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Compensations that failed during the last unwind.
    pub fn unwind_failures(&self) -> &[UnwindFailure] {
        &self.unwind_failures
    }

    /// Register an action to run only if a later step fails.
    pub fn on_rollback(
        &mut self,
        label: impl Into<String>,
        compensation: Compensation<'a>,
    ) -> Result<(), DeployError> {
        self.ensure_running()?;
        self.compensations.push((label.into(), compensation));
        Ok(())
    }

    /// Run `action` now. On failure, unwind and return the original error.
    pub async fn step<T>(
        &mut self,
        label: &str,
        action: impl Future<Output = Result<T, DeployError>>,
    ) -> Result<T, DeployError> {
        self.ensure_running()?;
        tracing::debug!("transaction step: {}", label);

        match action.await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!("step '{}' failed: {}", label, e);
                self.unwind().await;
                Err(e)
            }
        }
    }

    /// Finish successfully. Registered compensations are dropped unrun.
    pub fn commit(&mut self) -> Result<(), DeployError> {
        self.ensure_running()?;
        self.compensations.clear();
        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Unwind explicitly, e.g. when a failure happened outside any step.
    pub async fn rollback(&mut self) -> Result<(), DeployError> {
        self.ensure_running()?;
        self.unwind().await;
        Ok(())
    }

    async fn unwind(&mut self) {
        if !self.compensations.is_empty() {
            tracing::info!("rolling back {} step(s)", self.compensations.len());
        }
        while let Some((label, compensation)) = self.compensations.pop() {
            tracing::debug!("rollback: {}", label);
            if let Err(e) = compensation.await {
                tracing::warn!("rollback step '{}' failed: {}", label, e);
                self.unwind_failures.push(UnwindFailure {
                    label,
                    error: e.to_string(),
                });
            }
        }
        self.state = TransactionState::RolledBack;
    }

    fn ensure_running(&self) -> Result<(), DeployError> {
        match self.state {
            TransactionState::Running => Ok(()),
            other => Err(DeployError::Transaction(other)),
        }
    }
}
