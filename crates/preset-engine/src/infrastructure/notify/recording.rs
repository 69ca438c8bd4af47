//! Notifier that remembers every notice, for assertions in tests.

use std::sync::Mutex;

use super::{Notice, NoticeLevel, Notifier};

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice received so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("lock poisoned").clone()
    }

    /// Notices of the given level.
    pub fn at_level(&self, level: NoticeLevel) -> Vec<Notice> {
        self.notices()
            .into_iter()
            .filter(|n| n.level == level)
            .collect()
    }

    pub fn clear(&self) {
        self.notices.lock().expect("lock poisoned").clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("lock poisoned").push(notice);
    }
}
