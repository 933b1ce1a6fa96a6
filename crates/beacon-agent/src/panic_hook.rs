//! Panic hook error installer
//!
//! Routes uncaught panics to the crash reporter. The hook chains with the
//! hook that was active before it, so default behavior (the message on
//! stderr) is preserved, and `uninstall` puts that hook back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use beacon_core::domain::CapturedError;
use beacon_core::ports::{ErrorCallback, IErrorHookInstaller};

/// Error type reported for panics
pub const PANIC_ERROR_TYPE: &str = "Panic";

type Restore = Box<dyn FnOnce() + Send>;

/// [`IErrorHookInstaller`] built on `std::panic::set_hook`
#[derive(Default)]
pub struct PanicHookInstaller {
    installed: AtomicBool,
    restore: Mutex<Option<Restore>>,
}

impl PanicHookInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    fn restore_slot(&self) -> MutexGuard<'_, Option<Restore>> {
        self.restore.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IErrorHookInstaller for PanicHookInstaller {
    fn install(&self, on_error: ErrorCallback) -> anyhow::Result<()> {
        if self.installed.swap(true, Ordering::SeqCst) {
            anyhow::bail!("panic hook is already installed");
        }

        let previous = Arc::new(std::panic::take_hook());
        let chained = previous.clone();

        std::panic::set_hook(Box::new(move |panic_info| {
            let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };

            let location = panic_info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "<unknown>".to_string());
            let backtrace = std::backtrace::Backtrace::force_capture();

            on_error(
                CapturedError::new(PANIC_ERROR_TYPE, message),
                Some(format!("at {location}\n{backtrace}")),
            );

            (**chained)(panic_info);
        }));

        *self.restore_slot() = Some(Box::new(move || {
            std::panic::set_hook(Box::new(move |panic_info| (**previous)(panic_info)));
        }));

        debug!("Panic hook installed");
        Ok(())
    }

    fn uninstall(&self) {
        if !self.installed.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(restore) = self.restore_slot().take() {
            restore();
            debug!("Panic hook removed");
        }
    }

    fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for PanicHookInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicHookInstaller")
            .field("installed", &self.is_installed())
            .finish()
    }
}
