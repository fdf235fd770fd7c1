//! User-facing notices for hook misconfiguration.

use serde::Serialize;
use tracing::{error, warn};

use crate::models::Hook;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Error,
    Warning,
}

/// A non-fatal problem scoped to one hook.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub hook_id: String,
    pub hook_name: String,
    pub message: String,
    pub timestamp: i64,
}

impl Notice {
    pub fn error(hook: &Hook, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, hook, message)
    }

    pub fn warning(hook: &Hook, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, hook, message)
    }

    fn new(level: NoticeLevel, hook: &Hook, message: impl Into<String>) -> Self {
        Self {
            level,
            hook_id: hook.id.clone(),
            hook_name: hook.name.clone(),
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Receives notices destined for the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that only writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => {
                error!(hook = %notice.hook_id, message = %notice.message, "Hook notice")
            }
            NoticeLevel::Warning => {
                warn!(hook = %notice.hook_id, message = %notice.message, "Hook notice")
            }
        }
    }
}
