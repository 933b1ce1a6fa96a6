//! Error hook port
//!
//! Abstracts the host runtime's global "uncaught error" mechanism so the
//! agent never assumes a particular one. The callback receives the captured
//! error and, when available, a stack trace.

use std::sync::Arc;

use crate::domain::CapturedError;

/// Callback invoked for every uncaught error seen by an installed hook
pub type ErrorCallback = Arc<dyn Fn(CapturedError, Option<String>) + Send + Sync>;

/// Installs and removes host-level error hooks
pub trait IErrorHookInstaller: Send + Sync {
    /// Routes uncaught errors to `on_error`
    fn install(&self, on_error: ErrorCallback) -> anyhow::Result<()>;

    /// Restores whatever hook was active before `install`
    fn uninstall(&self);

    /// Whether a hook is currently installed
    fn is_installed(&self) -> bool;
}
