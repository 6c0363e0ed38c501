//! Toast notifications
//!
//! One slot: showing a toast replaces whatever was showing before.

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Danger,
}

impl std::fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

#[derive(Default)]
pub struct Toaster {
    current: Mutex<Option<Toast>>,
}

impl Toaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, level: ToastLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            ToastLevel::Danger | ToastLevel::Warning => warn!(%level, "{}", message),
            _ => info!(%level, "{}", message),
        }
        *self.current.lock() = Some(Toast { level, message });
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(ToastLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.show(ToastLevel::Warning, message);
    }

    pub fn danger(&self, message: impl Into<String>) {
        self.show(ToastLevel::Danger, message);
    }

    /// Remove and return the toast currently showing.
    pub fn take(&self) -> Option<Toast> {
        self.current.lock().take()
    }

    pub fn peek(&self) -> Option<Toast> {
        self.current.lock().clone()
    }
}
