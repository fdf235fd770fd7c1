//! Notifier that keeps the latest hook notices for the API.

use parking_lot::Mutex;
use printhook_core::hooks::{LogNotifier, Notice, Notifier};
use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 100;

/// Bounded buffer of recent notices, newest last.
#[derive(Debug)]
pub struct RecentNotices {
    notices: Mutex<VecDeque<Notice>>,
    capacity: usize,
}

impl RecentNotices {
    pub fn new(capacity: usize) -> Self {
        Self {
            notices: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn recent(&self) -> Vec<Notice> {
        self.notices.lock().iter().cloned().collect()
    }
}

impl Default for RecentNotices {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier for RecentNotices {
    fn notify(&self, notice: Notice) {
        LogNotifier.notify(notice.clone());

        let mut notices = self.notices.lock();
        if notices.len() == self.capacity {
            notices.pop_front();
        }
        notices.push_back(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printhook_core::Hook;

    #[test]
    fn test_oldest_notice_is_dropped_at_capacity() {
        let notices = RecentNotices::new(2);
        let hook = Hook::new("printer", "http://example.com");

        for message in ["first", "second", "third"] {
            notices.notify(Notice::error(&hook, message));
        }

        let messages: Vec<_> = notices.recent().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["second", "third"]);
    }
}
