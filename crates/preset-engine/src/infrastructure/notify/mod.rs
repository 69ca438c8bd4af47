//! User-facing notices.
//!
//! The engine never talks to a UI directly.  Whenever something happens the
//! user should hear about (a preset failed to load, a save went through, an
//! import was rejected) it hands a [`Notice`] to a [`Notifier`].  The host
//! decides how to show it; the binary uses [`TracingNotifier`], which simply
//! logs, and tests use [`recording::RecordingNotifier`] or the generated
//! `MockNotifier`.

pub mod recording;

use std::fmt;

use tracing::{error, info, warn};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message meant for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.level, self.message)
    }
}

/// Sink for user-facing notices.
///
/// Implementations must be cheap and must not block; notices are emitted
/// from inside async operations.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that forwards every notice to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(target: "preset_engine::notice", "{}", notice.message),
            NoticeLevel::Warning => warn!(target: "preset_engine::notice", "{}", notice.message),
            NoticeLevel::Error => error!(target: "preset_engine::notice", "{}", notice.message),
        }
    }
}
